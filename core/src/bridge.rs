/*
 * bridge.rs
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

//! One bridge run: upload `outgoing`, then drain every remote queue in turn.

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::dispatch::{dispatcher_for, run_dispatcher, DispatchContext};
use crate::envelope::{load_template, MessageType};
use crate::localstorage::{FileExtensions, FileStateStore, SentIndex, StoreError};
use crate::queue::{DrainReport, QueueClient, QueueType};
use crate::upload::{UploadOutcome, UploadReport, Uploader};

/// Failures that prevent a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub upload: UploadReport,
    pub drains: Vec<DrainReport>,
}

impl RunReport {
    pub fn delivered(&self) -> u32 {
        self.drains.iter().map(|d| d.delivered).sum()
    }

    pub fn failed(&self) -> u32 {
        self.upload.rejected + self.drains.iter().map(|d| d.failed).sum::<u32>()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.upload)?;
        for d in &self.drains {
            write!(f, "; {}", d)?;
        }
        Ok(())
    }
}

pub struct Bridge<C> {
    client: C,
    store: FileStateStore,
    template: String,
    outgoing_type: MessageType,
    extensions: FileExtensions,
}

impl<C: QueueClient> Bridge<C> {
    pub fn new(
        client: C,
        store: FileStateStore,
        template: String,
        outgoing_type: MessageType,
        extensions: FileExtensions,
    ) -> Self {
        Self {
            client,
            store,
            template,
            outgoing_type,
            extensions,
        }
    }

    /// Open the folders and load the template named by `config`.
    pub fn from_config(config: &BridgeConfig, client: C) -> Result<Self, StartupError> {
        let store = FileStateStore::open(config.folders.clone())?;
        let template = load_template(config.template_path.as_deref()).map_err(|source| StartupError::Template {
            path: config.template_path.clone().unwrap_or_default(),
            source,
        })?;
        Ok(Self::new(
            client,
            store,
            template,
            config.outgoing_type,
            config.extensions.clone(),
        ))
    }

    pub fn store(&self) -> &FileStateStore {
        &self.store
    }

    /// Upload pass only.
    pub fn upload(&self) -> UploadOutcome {
        Uploader::new(&self.client, &self.store, &self.template, self.outgoing_type)
            .message_extension(&self.extensions.message)
            .upload_all()
    }

    /// Drain one queue. `None` for a queue that cannot be drained.
    pub fn drain_queue(&self, queue: QueueType, sent_index: &SentIndex) -> Option<DrainReport> {
        let ctx = DispatchContext {
            store: &self.store,
            sent_index,
            extensions: &self.extensions,
        };
        let mut dispatcher = dispatcher_for(queue, ctx)?;
        Some(run_dispatcher(&self.client, dispatcher.as_mut()))
    }

    /// Index of `sent` as it is now, for draining without a preceding upload.
    pub fn sent_index(&self) -> SentIndex {
        self.store.load_sent_index(&self.extensions.message).unwrap_or_else(|e| {
            warn!("cannot index sent folder: {}", e);
            SentIndex::default()
        })
    }

    /// Upload, then drain each queue to exhaustion, strictly in sequence.
    pub fn run(&self) -> RunReport {
        let UploadOutcome { report, sent_index } = self.upload();
        let drains = QueueType::DRAIN_ORDER
            .iter()
            .filter_map(|&queue| self.drain_queue(queue, &sent_index))
            .collect();
        let report = RunReport { upload: report, drains };
        info!("run complete: {}", report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localstorage::FolderPaths;
    use crate::queue::{GetResponse, PutResponse, TransportError, QUEUE_EMPTY};
    use std::cell::RefCell;

    #[derive(Default)]
    struct EmptyRemote {
        polled: RefCell<Vec<QueueType>>,
    }

    impl QueueClient for EmptyRemote {
        fn put(&self, _queue: QueueType, _envelope: &str) -> Result<PutResponse, TransportError> {
            Ok(PutResponse::default())
        }

        fn get(&self, queue: QueueType, _ack: i64) -> Result<GetResponse, TransportError> {
            self.polled.borrow_mut().push(queue);
            Ok(GetResponse {
                error_code: QUEUE_EMPTY,
                ..Default::default()
            })
        }
    }

    #[test]
    fn drains_in_fixed_order_after_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(FolderPaths::under(dir.path())).unwrap();
        let bridge = Bridge::new(
            EmptyRemote::default(),
            store,
            crate::envelope::DEFAULT_TEMPLATE.to_string(),
            MessageType::Mail,
            FileExtensions::default(),
        );
        let report = bridge.run();
        assert_eq!(*bridge.client.polled.borrow(), QueueType::DRAIN_ORDER.to_vec());
        assert_eq!(report.drains.len(), 4);
        assert_eq!(report.delivered(), 0);
    }

    #[test]
    fn outgoing_queue_is_not_drained() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(FolderPaths::under(dir.path())).unwrap();
        let bridge = Bridge::new(
            EmptyRemote::default(),
            store,
            String::new(),
            MessageType::Mail,
            FileExtensions::default(),
        );
        assert!(bridge.drain_queue(QueueType::Outgoing, &SentIndex::default()).is_none());
        assert!(bridge.client.polled.borrow().is_empty());
    }
}
