/*
 * client.rs
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

//! QueueClient capability: put an envelope on, or take the next one off, a remote queue.

use std::fmt;

use super::error::TransportError;
use crate::envelope::MessageType;

/// Error code the remote reports (with depth 0) when a queue has nothing left.
pub const QUEUE_EMPTY: i32 = 4101;

/// Logical remote queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum QueueType {
    /// Target of uploads from the outgoing folder.
    Outgoing = 0,
    Confirmation = 1,
    Assessment = 2,
    Image = 3,
    OutgoingAck = 4,
}

impl QueueType {
    /// Queues drained on every run, in order.
    pub const DRAIN_ORDER: [QueueType; 4] = [
        QueueType::Confirmation,
        QueueType::Assessment,
        QueueType::Image,
        QueueType::OutgoingAck,
    ];

    /// Name the remote service uses for this queue unless configured otherwise. Drained
    /// queues are named after the message type they carry; uploads go to the mail queue.
    pub fn default_wire_name(self) -> &'static str {
        match self {
            QueueType::Outgoing => MessageType::Mail.as_str(),
            QueueType::Confirmation => MessageType::Confirmation.as_str(),
            QueueType::Assessment => MessageType::Assessment.as_str(),
            QueueType::Image => MessageType::Image.as_str(),
            QueueType::OutgoingAck => "MSGTYPE_MAIL_ACK",
        }
    }

    /// Short lowercase name, used in generated file names and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueType::Outgoing => "outgoing",
            QueueType::Confirmation => "confirmation",
            QueueType::Assessment => "assessment",
            QueueType::Image => "image",
            QueueType::OutgoingAck => "outgoing-ack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [QueueType::Outgoing]
            .into_iter()
            .chain(Self::DRAIN_ORDER)
            .find(|q| q.as_str().eq_ignore_ascii_case(s) || q.default_wire_name().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue names sent as `QueueType` on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub outgoing: String,
    pub confirmation: String,
    pub assessment: String,
    pub image: String,
    pub outgoing_ack: String,
}

impl QueueNames {
    /// Defaults, with uploads going to the queue of `outgoing_type`.
    pub fn for_outgoing_type(outgoing_type: MessageType) -> Self {
        Self {
            outgoing: outgoing_type.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn wire_name(&self, queue: QueueType) -> &str {
        match queue {
            QueueType::Outgoing => &self.outgoing,
            QueueType::Confirmation => &self.confirmation,
            QueueType::Assessment => &self.assessment,
            QueueType::Image => &self.image,
            QueueType::OutgoingAck => &self.outgoing_ack,
        }
    }

    pub fn wire_name_mut(&mut self, queue: QueueType) -> &mut String {
        match queue {
            QueueType::Outgoing => &mut self.outgoing,
            QueueType::Confirmation => &mut self.confirmation,
            QueueType::Assessment => &mut self.assessment,
            QueueType::Image => &mut self.image,
            QueueType::OutgoingAck => &mut self.outgoing_ack,
        }
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        let name = |q: QueueType| q.default_wire_name().to_string();
        Self {
            outgoing: name(QueueType::Outgoing),
            confirmation: name(QueueType::Confirmation),
            assessment: name(QueueType::Assessment),
            image: name(QueueType::Image),
            outgoing_ack: name(QueueType::OutgoingAck),
        }
    }
}

/// Result of `put`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResponse {
    pub error_code: i32,
    pub error_message: String,
    pub additional_data: String,
}

impl PutResponse {
    pub fn accepted(&self) -> bool {
        self.error_code == 0
    }
}

/// Result of `get`. `message_envelope` is the raw document, empty when the queue had nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResponse {
    pub error_code: i32,
    pub error_message: String,
    /// Id of the message now removed; pass it back on the next call.
    pub ack_msg_id: i64,
    pub queue_depth: i64,
    pub message_envelope: String,
}

impl GetResponse {
    pub fn is_queue_empty(&self) -> bool {
        self.error_code == QUEUE_EMPTY && self.queue_depth == 0
    }
}

/// Remote queue reachable over a blocking request/response call.
/// Implementations own whatever credentials and endpoint they were built with.
pub trait QueueClient {
    /// Submit one envelope document to `queue`.
    fn put(&self, queue: QueueType, envelope: &str) -> Result<PutResponse, TransportError>;

    /// Acknowledge `ack_msg_id` (0 for none) and fetch the next message of `queue`.
    fn get(&self, queue: QueueType, ack_msg_id: i64) -> Result<GetResponse, TransportError>;
}

impl<C: QueueClient + ?Sized> QueueClient for &C {
    fn put(&self, queue: QueueType, envelope: &str) -> Result<PutResponse, TransportError> {
        (**self).put(queue, envelope)
    }

    fn get(&self, queue: QueueType, ack_msg_id: i64) -> Result<GetResponse, TransportError> {
        (**self).get(queue, ack_msg_id)
    }
}

impl<C: QueueClient + ?Sized> QueueClient for Box<C> {
    fn put(&self, queue: QueueType, envelope: &str) -> Result<PutResponse, TransportError> {
        (**self).put(queue, envelope)
    }

    fn get(&self, queue: QueueType, ack_msg_id: i64) -> Result<GetResponse, TransportError> {
        (**self).get(queue, ack_msg_id)
    }
}
