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

//! Per-queue dispatch policies run by the drain loop: what each record type persists and
//! which file-state transition follows. Local I/O failures are logged, never propagated,
//! so one bad item does not stop a drain.

mod assessment;
mod confirmation;
mod image;
mod outgoing_ack;

pub use assessment::AssessmentDispatcher;
pub use confirmation::ConfirmationDispatcher;
pub use image::ImageDispatcher;
pub use outgoing_ack::OutgoingAckDispatcher;

use crate::envelope::MessageRecord;
use crate::localstorage::{FileExtensions, FileStateStore, SentIndex};
use crate::queue::{drain, DrainReport, ItemOutcome, QueueClient, QueueType};

/// What every dispatcher needs from the run.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub store: &'a FileStateStore,
    pub sent_index: &'a SentIndex,
    pub extensions: &'a FileExtensions,
}

/// Handles the records of one queue.
pub trait Dispatcher {
    fn queue(&self) -> QueueType;

    fn handle(&mut self, record: MessageRecord) -> ItemOutcome;
}

/// Dispatcher for a drainable queue; `None` for `QueueType::Outgoing`.
pub fn dispatcher_for<'a>(queue: QueueType, ctx: DispatchContext<'a>) -> Option<Box<dyn Dispatcher + 'a>> {
    match queue {
        QueueType::Confirmation => Some(Box::new(ConfirmationDispatcher::new(ctx))),
        QueueType::Assessment => Some(Box::new(AssessmentDispatcher::new(ctx))),
        QueueType::Image => Some(Box::new(ImageDispatcher::new(ctx))),
        QueueType::OutgoingAck => Some(Box::new(OutgoingAckDispatcher::new(ctx))),
        QueueType::Outgoing => None,
    }
}

/// Drain the dispatcher's queue to exhaustion.
pub fn run_dispatcher<C>(client: &C, dispatcher: &mut dyn Dispatcher) -> DrainReport
where
    C: QueueClient + ?Sized,
{
    let queue = dispatcher.queue();
    drain(client, queue, |record| dispatcher.handle(record))
}
