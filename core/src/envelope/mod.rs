/*
 * mod.rs
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

//! Envelope documents: header + body message format, record types, outgoing template.

mod codec;
mod record;
mod template;

pub use codec::{decode, encode, encode_at, CodecError, CREATED_TIME_FORMAT};
pub use record::{DecodedDocument, MessageHeader, MessageRecord, MessageType, INSTR_SUCCESS};
pub use template::{load_template, DEFAULT_TEMPLATE};
