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

//! Local storage: the outgoing/sent/incoming/failed folder store, generated file names,
//! and the sent-files index used to validate remote references.

mod filename;
mod sent_index;
mod state;

pub use filename::{FileExtensions, MessageFileName, DEFAULT_MESSAGE_EXTENSION};
pub use sent_index::{reference_of, SentIndex, ValidatedReference};
pub use state::{FileState, FileStateStore, FolderPaths, StoreError};
