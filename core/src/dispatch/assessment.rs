/*
 * assessment.rs
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

//! Assessment queue: the body is the document; it lands in `incoming` under a generated name.
//! A present but empty `Body` is still written, so the item leaves a trace.

use tracing::{error, info, warn};

use super::{DispatchContext, Dispatcher};
use crate::envelope::MessageRecord;
use crate::localstorage::FileState;
use crate::queue::{ItemOutcome, QueueType};

pub struct AssessmentDispatcher<'a> {
    ctx: DispatchContext<'a>,
}

impl<'a> AssessmentDispatcher<'a> {
    pub fn new(ctx: DispatchContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Dispatcher for AssessmentDispatcher<'_> {
    fn queue(&self) -> QueueType {
        QueueType::Assessment
    }

    fn handle(&mut self, record: MessageRecord) -> ItemOutcome {
        if !record.succeeded() {
            warn!(
                ack_id = record.ack_id,
                error_code = record.error_code,
                "assessment not retrieved: {}",
                record.error_message
            );
            return ItemOutcome::Failed;
        }
        if !record.body_present {
            warn!(
                ack_id = record.ack_id,
                assessment = %record.header.assessment_number,
                "assessment has no Body element"
            );
            return ItemOutcome::Skipped;
        }
        if !record.has_body() {
            error!(
                ack_id = record.ack_id,
                assessment = %record.header.assessment_number,
                "assessment body is empty"
            );
        }
        let name = record.generated_file_name.with_extension(&self.ctx.extensions.message);
        match self.ctx.store.write(FileState::Incoming, &name, record.body.as_bytes()) {
            Ok(_) => {
                info!(file = %name, assessment = %record.header.assessment_number, "assessment received");
                ItemOutcome::Delivered
            }
            Err(e) => {
                error!(file = %name, "could not store assessment: {}", e);
                ItemOutcome::Failed
            }
        }
    }
}
