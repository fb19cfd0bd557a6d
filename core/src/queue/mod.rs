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

//! Remote queue access: the QueueClient capability and the drain loop built on it.

mod client;
mod drain;
mod error;

pub use client::{GetResponse, PutResponse, QueueClient, QueueNames, QueueType, QUEUE_EMPTY};
pub use drain::{drain, DrainCursor, DrainReport, DrainState, ItemOutcome};
pub use error::TransportError;
