/*
 * template.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Casella, a file-based bridge to a remote message queue.
 *
 * Casella is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Casella is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Casella.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Outgoing envelope template: built-in default or a file named in the configuration.

use std::fs;
use std::path::Path;

/// Fixed-shape template with the four slots `encode` fills.
pub const DEFAULT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Message>
  <Header>
    <MsgTypeIdentifier/>
    <MsgCreatedTime/>
    <Reference/>
  </Header>
  <Body/>
</Message>
"#;

/// Template text from `path`, or the default when none is configured.
pub fn load_template(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(p) => fs::read_to_string(p),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}
