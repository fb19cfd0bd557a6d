/*
 * record.rs
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

//! Message header fields, message type ids and the record handed to dispatchers.

use std::fmt;

use crate::localstorage::MessageFileName;
use crate::queue::{GetResponse, QueueType};

/// Literal success value of `InstrResultCode`.
pub const INSTR_SUCCESS: &str = "0";

/// Message type identifier carried in `MsgTypeIdentifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ping,
    Assessment,
    Confirmation,
    Mail,
    MailExt,
    MailAdmin,
    MailIntAdv,
    MailAuth,
    Image,
}

impl MessageType {
    pub const ALL: [MessageType; 9] = [
        MessageType::Ping,
        MessageType::Assessment,
        MessageType::Confirmation,
        MessageType::Mail,
        MessageType::MailExt,
        MessageType::MailAdmin,
        MessageType::MailIntAdv,
        MessageType::MailAuth,
        MessageType::Image,
    ];

    /// Wire form, as written into `MsgTypeIdentifier` and sent as a queue name.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Ping => "MSGTYPE_PING",
            MessageType::Assessment => "MSGTYPE_ASSESSMENT",
            MessageType::Confirmation => "MSGTYPE_CONF",
            MessageType::Mail => "MSGTYPE_MAIL",
            MessageType::MailExt => "MSGTYPE_MAIL_EXT",
            MessageType::MailAdmin => "MSGTYPE_MAIL_ADMIN",
            MessageType::MailIntAdv => "MSGTYPE_MAIL_INTADV",
            MessageType::MailAuth => "MSGTYPE_MAIL_AUTH",
            MessageType::Image => "MSGTYPE_IMAGE",
        }
    }

    /// Lowercase alias accepted in configuration, e.g. `mail-ext`.
    pub fn short_name(self) -> &'static str {
        match self {
            MessageType::Ping => "ping",
            MessageType::Assessment => "assessment",
            MessageType::Confirmation => "confirmation",
            MessageType::Mail => "mail",
            MessageType::MailExt => "mail-ext",
            MessageType::MailAdmin => "mail-admin",
            MessageType::MailIntAdv => "mail-intadv",
            MessageType::MailAuth => "mail-auth",
            MessageType::Image => "image",
        }
    }

    /// Parse the wire form or the short alias (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.short_name().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header fields of an envelope. Every field is optional on the wire; absent ones stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Raw `MsgTypeIdentifier` text.
    pub message_type_id: String,
    pub sequence: String,
    pub created_time: String,
    /// Untrusted; see `SentIndex::validate` before using it to name a file.
    pub reference: String,
    pub originator: String,
    pub assessment_number: String,
    pub instr_result_code: String,
    pub instr_result_message: String,
}

impl MessageHeader {
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.message_type_id)
    }

    pub fn instr_succeeded(&self) -> bool {
        self.instr_result_code.trim() == INSTR_SUCCESS
    }
}

/// Result of splitting a raw document: header fields, the body, and the body-free envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedDocument {
    pub header: MessageHeader,
    /// Inner content of `Body`, verbatim. Empty when there is no `Body` or it is empty.
    pub body: String,
    /// The document has a `Body` element, even an empty one.
    pub body_present: bool,
    /// The whole document with the `Body` element emptied.
    pub envelope: String,
}

/// One item pulled from a remote queue.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub queue: QueueType,
    pub ack_id: i64,
    pub queue_depth: i64,
    pub error_code: i32,
    pub error_message: String,
    pub header: MessageHeader,
    pub body: String,
    pub body_present: bool,
    pub envelope: String,
    /// Local name for types that carry no usable reference.
    pub generated_file_name: MessageFileName,
}

impl MessageRecord {
    /// Combine a poll response with its decoded envelope document.
    pub fn new(queue: QueueType, response: &GetResponse, document: DecodedDocument) -> Self {
        Self {
            queue,
            ack_id: response.ack_msg_id,
            queue_depth: response.queue_depth,
            error_code: response.error_code,
            error_message: response.error_message.clone(),
            header: document.header,
            body: document.body,
            body_present: document.body_present,
            envelope: document.envelope,
            generated_file_name: MessageFileName::generate(queue),
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.header.message_type()
    }

    /// Remote reported no error for this item.
    pub fn succeeded(&self) -> bool {
        self.error_code == 0
    }

    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}
