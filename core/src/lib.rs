/*
 * lib.rs
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

//! Casella core: bridges a local outbox/inbox folder tree with a remote RPC message queue.
//!
//! - `localstorage`: the outgoing/sent/incoming/failed folder store and the sent-files index.
//! - `envelope`: header + body message documents, decode and template-driven encode.
//! - `queue`: the `QueueClient` capability and the acknowledgment-driven drain loop.
//! - `dispatch`: per-queue policies (confirmation, assessment, image, outgoing-ack).
//! - `upload`: one pass over `outgoing`.
//! - `protocol::soap`: the SOAP transport.
//! - `bridge`: a full run wiring the above together.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod image;
pub mod localstorage;
pub mod protocol;
pub mod queue;
pub mod upload;

pub use bridge::{Bridge, RunReport, StartupError};
pub use config::{load_config, BridgeConfig, ConfigError};
pub use protocol::SoapQueueClient;
pub use queue::{QueueClient, QueueType};
