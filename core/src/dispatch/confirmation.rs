/*
 * confirmation.rs
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

//! Confirmation queue: the remote's verdict on a file uploaded earlier, matched by reference.

use tracing::{error, info, warn};

use super::{DispatchContext, Dispatcher};
use crate::envelope::MessageRecord;
use crate::localstorage::FileState;
use crate::queue::{ItemOutcome, QueueType};

/// The verdict is `InstrResultCode` alone: `"0"` accepts, anything else rejects.
/// Accepted: envelope to `incoming/<file>`, `sent/<file>` removed.
/// Rejected: `sent/<file>` moved to `failed` and its mtime refreshed so it lines up with
/// transport logs.
pub struct ConfirmationDispatcher<'a> {
    ctx: DispatchContext<'a>,
}

impl<'a> ConfirmationDispatcher<'a> {
    pub fn new(ctx: DispatchContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Dispatcher for ConfirmationDispatcher<'_> {
    fn queue(&self) -> QueueType {
        QueueType::Confirmation
    }

    fn handle(&mut self, record: MessageRecord) -> ItemOutcome {
        let Some(reference) = self.ctx.sent_index.validate(&record.header.reference) else {
            warn!(
                ack_id = record.ack_id,
                reference = %record.header.reference,
                "confirmation does not match any sent file, ignoring"
            );
            return ItemOutcome::Skipped;
        };
        let file = reference.file_name();
        let store = self.ctx.store;

        if !record.succeeded() {
            warn!(
                reference = reference.as_str(),
                error_code = record.error_code,
                "remote reported an error with this confirmation: {}",
                record.error_message
            );
        }
        if record.header.instr_succeeded() {
            if let Err(e) = store.write(FileState::Incoming, file, record.envelope.as_bytes()) {
                error!(reference = reference.as_str(), "could not deliver confirmation: {}", e);
                return ItemOutcome::Failed;
            }
            if let Err(e) = store.delete(FileState::Sent, file) {
                error!(
                    reference = reference.as_str(),
                    "confirmation delivered but sent file remains: {}", e
                );
            }
            info!(reference = reference.as_str(), "message confirmed");
            return ItemOutcome::Delivered;
        }

        warn!(
            reference = reference.as_str(),
            error_code = record.error_code,
            result_code = %record.header.instr_result_code,
            result = %record.header.instr_result_message,
            "message rejected by remote: {}",
            record.error_message
        );
        match store.move_to(file, FileState::Sent, FileState::Failed) {
            Ok(_) => {
                if let Err(e) = store.touch(FileState::Failed, file) {
                    warn!(reference = reference.as_str(), "could not refresh mtime: {}", e);
                }
            }
            Err(e) => {
                error!(reference = reference.as_str(), "could not move rejected file to failed: {}", e);
                error!(reference = reference.as_str(), "rejected message left in sent");
            }
        }
        ItemOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::{record, Fixture};

    fn confirmation(reference: &str, code: &str) -> String {
        format!(
            "<Message><Header><Reference>{}</Reference><InstrResultCode>{}</InstrResultCode>\
             <InstrResultMessage>m</InstrResultMessage></Header><Body><Detail/></Body></Message>",
            reference, code
        )
    }

    #[test]
    fn accepted_confirmation_delivers_envelope_and_clears_sent() {
        let f = Fixture::new(&["order-17.xml"]);
        let mut d = ConfirmationDispatcher::new(f.ctx());
        let outcome = d.handle(record(QueueType::Confirmation, 0, &confirmation("order-17", "0")));
        assert_eq!(outcome, ItemOutcome::Delivered);
        assert!(!f.store.contains(FileState::Sent, "order-17.xml"));
        let delivered = String::from_utf8(f.store.read(FileState::Incoming, "order-17.xml").unwrap()).unwrap();
        assert!(delivered.contains("<Reference>order-17</Reference>"));
        assert!(delivered.contains("<Body></Body>"));
    }

    #[test]
    fn rejected_confirmation_moves_sent_to_failed() {
        let f = Fixture::new(&["order-17.xml"]);
        let mut d = ConfirmationDispatcher::new(f.ctx());
        let outcome = d.handle(record(QueueType::Confirmation, 0, &confirmation("order-17", "12")));
        assert_eq!(outcome, ItemOutcome::Failed);
        assert!(!f.store.contains(FileState::Sent, "order-17.xml"));
        assert!(f.store.contains(FileState::Failed, "order-17.xml"));
        assert!(f.store.list(FileState::Incoming).unwrap().is_empty());
    }

    #[test]
    fn verdict_follows_instr_result_code_only() {
        let f = Fixture::new(&["order-17.xml", "order-18.xml"]);
        let mut d = ConfirmationDispatcher::new(f.ctx());
        let outcome = d.handle(record(QueueType::Confirmation, 3, &confirmation("order-17", "0")));
        assert_eq!(outcome, ItemOutcome::Delivered);
        assert!(f.store.contains(FileState::Incoming, "order-17.xml"));
        let outcome = d.handle(record(QueueType::Confirmation, 0, &confirmation("order-18", "")));
        assert_eq!(outcome, ItemOutcome::Failed);
        assert!(f.store.contains(FileState::Failed, "order-18.xml"));
    }

    #[test]
    fn reference_matches_only_message_extension_files() {
        let f = Fixture::new(&["order-17.txt"]);
        let mut d = ConfirmationDispatcher::new(f.ctx());
        let outcome = d.handle(record(QueueType::Confirmation, 0, &confirmation("order-17", "0")));
        assert_eq!(outcome, ItemOutcome::Skipped);
        assert!(f.store.contains(FileState::Sent, "order-17.txt"));
    }

    #[test]
    fn unknown_reference_touches_nothing() {
        let f = Fixture::new(&["order-17.xml"]);
        let mut d = ConfirmationDispatcher::new(f.ctx());
        for reference in ["../../etc/passwd", "order-99", ""] {
            let outcome = d.handle(record(QueueType::Confirmation, 0, &confirmation(reference, "0")));
            assert_eq!(outcome, ItemOutcome::Skipped);
        }
        assert!(f.store.contains(FileState::Sent, "order-17.xml"));
        assert!(f.store.list(FileState::Incoming).unwrap().is_empty());
        assert!(f.store.list(FileState::Failed).unwrap().is_empty());
        assert!(!f.dir.path().join("etc").exists());
    }
}
