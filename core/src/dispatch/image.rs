/*
 * image.rs
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

//! Image queue: decode the embedded image and write it next to a metadata sidecar.

use tracing::{error, info, warn};

use super::{DispatchContext, Dispatcher};
use crate::envelope::MessageRecord;
use crate::image::{materialize, ImageAttributes};
use crate::localstorage::FileState;
use crate::queue::{ItemOutcome, QueueType};

/// Writes `incoming/<stem>.jpg` and `incoming/<stem><metadata-ext>` for each image.
pub struct ImageDispatcher<'a> {
    ctx: DispatchContext<'a>,
}

impl<'a> ImageDispatcher<'a> {
    pub fn new(ctx: DispatchContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Dispatcher for ImageDispatcher<'_> {
    fn queue(&self) -> QueueType {
        QueueType::Image
    }

    fn handle(&mut self, record: MessageRecord) -> ItemOutcome {
        if !record.succeeded() || !record.has_body() {
            warn!(
                ack_id = record.ack_id,
                error_code = record.error_code,
                "skipping image without content: {}",
                record.error_message
            );
            return ItemOutcome::Skipped;
        }
        let attrs = ImageAttributes {
            assessment_number: &record.header.assessment_number,
            originator: &record.header.originator,
        };
        let materialized = match materialize(&record.body, &attrs) {
            Ok(m) => m,
            Err(e) => {
                error!(ack_id = record.ack_id, assessment = attrs.assessment_number, "could not decode image: {}", e);
                return ItemOutcome::Failed;
            }
        };

        let extensions = self.ctx.extensions;
        let image_name = record.generated_file_name.with_extension(&extensions.image);
        let metadata_name = record.generated_file_name.with_extension(&extensions.metadata);
        let store = self.ctx.store;
        if let Err(e) = store.write(FileState::Incoming, &image_name, &materialized.image) {
            error!(file = %image_name, "could not store image: {}", e);
            return ItemOutcome::Failed;
        }
        if let Err(e) = store.write(FileState::Incoming, &metadata_name, materialized.metadata.as_bytes()) {
            error!(file = %metadata_name, "image stored without metadata: {}", e);
            return ItemOutcome::Failed;
        }
        info!(
            file = %image_name,
            bytes = materialized.image.len(),
            assessment = attrs.assessment_number,
            "image received"
        );
        ItemOutcome::Delivered
    }
}
