/*
 * drain.rs
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

//! Drain loop: poll one remote queue with ack-id feedback until it is exhausted, stalls out
//! or the transport fails, handing each received record to a per-queue handler.
//!
//! The remote depth counter does not always shrink after an ack. When the reported depth
//! repeats, the cursor counts down on its own instead, so a loop that starts at depth `d`
//! makes at most `d + 1` calls. A queue that is merely slow can therefore be left with
//! items for the next run. Only a reported depth of zero means the queue is empty; the
//! record fetched by the call that runs the local count down is still handled.

use std::fmt;

use tracing::{debug, error, info, warn};

use super::client::{GetResponse, QueueClient, QueueType};
use crate::envelope::{decode, CodecError, DecodedDocument, MessageRecord};

/// Where a drain stands between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// Nothing received yet.
    Polling,
    /// Last poll reported a fresh depth.
    Draining,
    /// Last poll repeated the previous depth; counting down locally. A drain that ends
    /// here gave up on a queue that never reported empty.
    Stalled,
    /// The remote reported depth zero.
    Exhausted,
    /// The transport failed; the rest of the queue is left for the next run.
    Failed,
}

impl DrainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DrainState::Exhausted | DrainState::Failed)
    }
}

/// Ack id, depth and previous raw depth of one drain, with the transition between polls.
#[derive(Debug, Clone)]
pub struct DrainCursor {
    ack_id: i64,
    queue_depth: i64,
    previous_depth: i64,
    state: DrainState,
}

impl DrainCursor {
    pub fn new() -> Self {
        Self {
            ack_id: 0,
            queue_depth: 1,
            previous_depth: -1,
            state: DrainState::Polling,
        }
    }

    pub fn state(&self) -> DrainState {
        self.state
    }

    /// Ack id to send with the next poll.
    pub fn ack_id(&self) -> i64 {
        self.ack_id
    }

    pub fn queue_depth(&self) -> i64 {
        self.queue_depth
    }

    pub fn wants_poll(&self) -> bool {
        !self.state.is_terminal() && self.queue_depth > 0
    }

    pub fn fail(&mut self) {
        self.state = DrainState::Failed;
    }

    /// Apply one poll result. `previous_depth` always takes the raw reported value, and only
    /// the raw value can exhaust the queue; the local count just stops further polls.
    pub fn advance(&mut self, reported_ack_id: i64, reported_depth: i64) -> DrainState {
        self.ack_id = reported_ack_id;
        let stalled = reported_depth == self.previous_depth;
        self.queue_depth = if stalled {
            self.queue_depth - 1
        } else {
            reported_depth
        };
        self.previous_depth = reported_depth;
        self.state = if reported_depth <= 0 {
            DrainState::Exhausted
        } else if stalled {
            DrainState::Stalled
        } else {
            DrainState::Draining
        };
        self.state
    }
}

impl Default for DrainCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// What a handler did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Delivered,
    Failed,
    Skipped,
}

/// Counts for one drain of one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub queue: QueueType,
    /// Poll calls attempted, including a failed one.
    pub calls: u32,
    pub delivered: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Records whose envelope could not be parsed.
    pub dropped: u32,
    pub end_state: DrainState,
}

impl DrainReport {
    pub fn new(queue: QueueType) -> Self {
        Self {
            queue,
            calls: 0,
            delivered: 0,
            failed: 0,
            skipped: 0,
            dropped: 0,
            end_state: DrainState::Polling,
        }
    }

    /// Records received from the remote, whatever happened to them.
    pub fn items(&self) -> u32 {
        self.delivered + self.failed + self.skipped + self.dropped
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Delivered => self.delivered += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for DrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} calls, {} delivered, {} failed, {} skipped, {} dropped ({:?})",
            self.queue, self.calls, self.delivered, self.failed, self.skipped, self.dropped, self.end_state
        )
    }
}

fn record_from(queue: QueueType, response: &GetResponse) -> Result<MessageRecord, CodecError> {
    let document = if response.message_envelope.trim().is_empty() {
        DecodedDocument::default()
    } else {
        decode(&response.message_envelope)?
    };
    Ok(MessageRecord::new(queue, response, document))
}

/// Drain `queue` until exhausted or the transport fails, calling `on_item` for each record.
pub fn drain<C, F>(client: &C, queue: QueueType, mut on_item: F) -> DrainReport
where
    C: QueueClient + ?Sized,
    F: FnMut(MessageRecord) -> ItemOutcome,
{
    let mut cursor = DrainCursor::new();
    let mut report = DrainReport::new(queue);

    while cursor.wants_poll() {
        report.calls += 1;
        let response = match client.get(queue, cursor.ack_id()) {
            Ok(r) => r,
            Err(e) => {
                error!(queue = %queue, ack_id = cursor.ack_id(), "poll failed, ending drain: {}", e);
                cursor.fail();
                break;
            }
        };
        let state = cursor.advance(response.ack_msg_id, response.queue_depth);
        if state == DrainState::Stalled {
            warn!(
                queue = %queue,
                reported = response.queue_depth,
                remaining = cursor.queue_depth(),
                "queue depth did not change after ack"
            );
            if !cursor.wants_poll() {
                warn!(queue = %queue, "giving up on stalled queue after this message");
            }
        }
        if state == DrainState::Exhausted {
            debug!(queue = %queue, code = response.error_code, "queue exhausted");
            break;
        }

        let record = match record_from(queue, &response) {
            Ok(r) => r,
            Err(e) => {
                error!(queue = %queue, ack_id = response.ack_msg_id, "dropping unparseable message: {}", e);
                report.dropped += 1;
                continue;
            }
        };
        debug!(
            queue = %queue,
            ack_id = record.ack_id,
            depth = record.queue_depth,
            envelope = %record.envelope,
            "received message"
        );
        report.record(on_item(record));
    }

    report.end_state = cursor.state();
    info!(queue = %queue, "{}", report);
    report
}
