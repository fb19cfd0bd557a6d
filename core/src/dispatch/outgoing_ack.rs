/*
 * outgoing_ack.rs
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

//! Outgoing-ack queue: the remote's receipt for an uploaded message. The envelope is kept
//! in `incoming` as an audit record; the sent file is left for the confirmation queue.

use tracing::{error, info, warn};

use super::{DispatchContext, Dispatcher};
use crate::envelope::MessageRecord;
use crate::localstorage::FileState;
use crate::queue::{ItemOutcome, QueueType};

pub struct OutgoingAckDispatcher<'a> {
    ctx: DispatchContext<'a>,
}

impl<'a> OutgoingAckDispatcher<'a> {
    pub fn new(ctx: DispatchContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Dispatcher for OutgoingAckDispatcher<'_> {
    fn queue(&self) -> QueueType {
        QueueType::OutgoingAck
    }

    fn handle(&mut self, record: MessageRecord) -> ItemOutcome {
        let reference = self.ctx.sent_index.effective_reference(&record.header.reference);
        if !record.succeeded() {
            warn!(
                ack_id = record.ack_id,
                reference,
                error_code = record.error_code,
                "outgoing message not acknowledged: {}",
                record.error_message
            );
            return ItemOutcome::Failed;
        }
        let name = record.generated_file_name.with_extension(&self.ctx.extensions.message);
        match self.ctx.store.write(FileState::Incoming, &name, record.envelope.as_bytes()) {
            Ok(_) => {
                info!(reference, file = %name, "outgoing message acknowledged");
                ItemOutcome::Delivered
            }
            Err(e) => {
                error!(reference, file = %name, "could not store acknowledgement: {}", e);
                ItemOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::{record, Fixture};

    const ACK: &str = "<Message><Header><Reference>order-17</Reference></Header><Body>x</Body></Message>";

    #[test]
    fn ack_envelope_is_kept_and_sent_untouched() {
        let f = Fixture::new(&["order-17.xml"]);
        let r = record(QueueType::OutgoingAck, 0, ACK);
        let name = r.generated_file_name.with_extension(".xml");
        let mut d = OutgoingAckDispatcher::new(f.ctx());
        assert_eq!(d.handle(r), ItemOutcome::Delivered);
        let kept = String::from_utf8(f.store.read(FileState::Incoming, &name).unwrap()).unwrap();
        assert_eq!(kept, "<Message><Header><Reference>order-17</Reference></Header><Body></Body></Message>");
        assert!(f.store.contains(FileState::Sent, "order-17.xml"));
    }

    #[test]
    fn failed_ack_is_logged_only() {
        let f = Fixture::new(&[]);
        let mut d = OutgoingAckDispatcher::new(f.ctx());
        assert_eq!(d.handle(record(QueueType::OutgoingAck, 1, ACK)), ItemOutcome::Failed);
        assert!(f.store.list(FileState::Incoming).unwrap().is_empty());
    }
}
