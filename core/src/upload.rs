/*
 * upload.rs
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

//! Outgoing uploader: one pass over a snapshot of `outgoing`. Each file is wrapped in an
//! envelope (reference = file name minus extension), put on the remote queue and moved to
//! `sent` or `failed` by the result code. The first transport failure ends the pass and
//! leaves the remaining files where they are.

use std::fmt;

use tracing::{error, info, warn};

use crate::envelope::{encode, MessageType};
use crate::localstorage::{reference_of, FileState, FileStateStore, SentIndex, DEFAULT_MESSAGE_EXTENSION};
use crate::queue::{QueueClient, QueueType};

/// Counts for one upload pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Accepted and moved to `sent`.
    pub uploaded: u32,
    /// Rejected by the remote, or not encodable; moved to `failed`.
    pub rejected: u32,
    /// Could not be read; left in `outgoing`.
    pub unreadable: u32,
    /// Left in `outgoing` because the transport failed.
    pub deferred: u32,
    pub aborted: bool,
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upload: {} sent, {} failed, {} unreadable, {} deferred{}",
            self.uploaded,
            self.rejected,
            self.unreadable,
            self.deferred,
            if self.aborted { " (aborted)" } else { "" }
        )
    }
}

/// Report plus the sent-files index loaded after the pass.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub report: UploadReport,
    pub sent_index: SentIndex,
}

pub struct Uploader<'a, C: ?Sized> {
    client: &'a C,
    store: &'a FileStateStore,
    template: &'a str,
    message_type: MessageType,
    message_extension: &'a str,
}

enum Step {
    Next,
    Abort,
}

impl<'a, C> Uploader<'a, C>
where
    C: QueueClient + ?Sized,
{
    pub fn new(client: &'a C, store: &'a FileStateStore, template: &'a str, message_type: MessageType) -> Self {
        Self {
            client,
            store,
            template,
            message_type,
            message_extension: DEFAULT_MESSAGE_EXTENSION,
        }
    }

    /// Extension a confirmation reference is completed with when the sent index is built.
    pub fn message_extension(mut self, extension: &'a str) -> Self {
        self.message_extension = extension;
        self
    }

    /// Upload everything currently in `outgoing`, then index `sent`.
    pub fn upload_all(&self) -> UploadOutcome {
        let mut report = UploadReport::default();
        let names = match self.store.list(FileState::Outgoing) {
            Ok(n) => n,
            Err(e) => {
                error!("cannot list outgoing folder: {}", e);
                report.aborted = true;
                Vec::new()
            }
        };

        for (i, name) in names.iter().enumerate() {
            if let Step::Abort = self.upload_one(name, &mut report) {
                report.aborted = true;
                report.deferred = (names.len() - i) as u32;
                break;
            }
        }
        info!("{}", report);

        let sent_index = self.store.load_sent_index(self.message_extension).unwrap_or_else(|e| {
            error!("cannot index sent folder, confirmations will be ignored: {}", e);
            SentIndex::default()
        });
        UploadOutcome { report, sent_index }
    }

    fn upload_one(&self, name: &str, report: &mut UploadReport) -> Step {
        let raw = match self.store.read(FileState::Outgoing, name) {
            Ok(r) => r,
            Err(e) => {
                error!(file = name, "cannot read outgoing file: {}", e);
                report.unreadable += 1;
                return Step::Next;
            }
        };
        let reference = reference_of(name);
        let envelope = String::from_utf8(raw)
            .map_err(|e| e.to_string())
            .and_then(|payload| {
                encode(self.template, self.message_type, reference, &payload).map_err(|e| e.to_string())
            });
        let envelope = match envelope {
            Ok(e) => e,
            Err(e) => {
                error!(file = name, "cannot build envelope: {}", e);
                self.transition(name, FileState::Failed);
                report.rejected += 1;
                return Step::Next;
            }
        };

        let response = match self.client.put(QueueType::Outgoing, &envelope) {
            Ok(r) => r,
            Err(e) => {
                error!(file = name, "upload failed, stopping: {}", e);
                return Step::Abort;
            }
        };
        if response.accepted() {
            info!(file = name, reference, "uploaded");
            self.transition(name, FileState::Sent);
            report.uploaded += 1;
        } else {
            warn!(
                file = name,
                reference,
                error_code = response.error_code,
                additional = %response.additional_data,
                "upload rejected: {}",
                response.error_message
            );
            self.transition(name, FileState::Failed);
            report.rejected += 1;
        }
        Step::Next
    }

    fn transition(&self, name: &str, to: FileState) {
        if let Err(e) = self.store.move_to(name, FileState::Outgoing, to) {
            error!(file = name, to = %to, "could not move outgoing file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{decode, DEFAULT_TEMPLATE};
    use crate::localstorage::FolderPaths;
    use crate::queue::{GetResponse, PutResponse, TransportError};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Recorder {
        codes: RefCell<VecDeque<Result<i32, ()>>>,
        puts: RefCell<Vec<(QueueType, String)>>,
    }

    impl QueueClient for Recorder {
        fn put(&self, queue: QueueType, envelope: &str) -> Result<PutResponse, TransportError> {
            self.puts.borrow_mut().push((queue, envelope.to_string()));
            match self.codes.borrow_mut().pop_front().unwrap_or(Ok(0)) {
                Ok(code) => Ok(PutResponse {
                    error_code: code,
                    ..Default::default()
                }),
                Err(()) => Err(TransportError::Http("timed out".into())),
            }
        }

        fn get(&self, _queue: QueueType, _ack: i64) -> Result<GetResponse, TransportError> {
            unreachable!("uploader never polls")
        }
    }

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, FileStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(FolderPaths::under(dir.path())).unwrap();
        for (name, content) in files {
            store.write(FileState::Outgoing, name, content.as_bytes()).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn empty_outgoing_makes_no_calls() {
        let (_dir, store) = setup(&[]);
        let client = Recorder::default();
        let outcome = Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::Mail).upload_all();
        assert!(client.puts.borrow().is_empty());
        assert_eq!(outcome.report, UploadReport::default());
        assert!(outcome.sent_index.is_empty());
    }

    #[test]
    fn accepted_goes_to_sent_rejected_to_failed() {
        let (_dir, store) = setup(&[("a.xml", "<A/>"), ("b.xml", "<B/>")]);
        let client = Recorder::default();
        client.codes.borrow_mut().extend([Ok(0), Ok(7)]);
        let outcome = Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::Mail).upload_all();

        assert!(store.contains(FileState::Sent, "a.xml"));
        assert!(store.contains(FileState::Failed, "b.xml"));
        assert!(store.list(FileState::Outgoing).unwrap().is_empty());
        assert_eq!((outcome.report.uploaded, outcome.report.rejected), (1, 1));
        assert!(outcome.sent_index.validate("a").is_some());
        assert!(outcome.sent_index.validate("b").is_none());
    }

    #[test]
    fn envelope_carries_reference_type_and_content() {
        let (_dir, store) = setup(&[("order-17.xml", "<Order n=\"17\"/>")]);
        let client = Recorder::default();
        Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::MailExt).upload_all();
        let puts = client.puts.borrow();
        assert_eq!(puts[0].0, QueueType::Outgoing);
        assert!(puts[0].1.contains("<MsgTypeIdentifier>MSGTYPE_MAIL_EXT</MsgTypeIdentifier>"));
        let doc = decode(&puts[0].1).unwrap();
        assert_eq!(doc.header.reference, "order-17");
        assert_eq!(doc.header.message_type(), Some(MessageType::MailExt));
        assert_eq!(doc.body, "<Order n=\"17\"/>");
    }

    #[test]
    fn transport_failure_leaves_rest_in_outgoing() {
        let (_dir, store) = setup(&[("a.xml", "<A/>"), ("b.xml", "<B/>"), ("c.xml", "<C/>")]);
        let client = Recorder::default();
        client.codes.borrow_mut().extend([Ok(0), Err(())]);
        let outcome = Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::Mail).upload_all();

        assert_eq!(client.puts.borrow().len(), 2);
        assert!(store.contains(FileState::Sent, "a.xml"));
        assert_eq!(store.list(FileState::Outgoing).unwrap(), vec!["b.xml", "c.xml"]);
        assert!(outcome.report.aborted);
        assert_eq!(outcome.report.deferred, 2);
    }

    #[test]
    fn unencodable_file_fails_without_a_call() {
        let (_dir, store) = setup(&[("bad.xml", "<open>")]);
        store.write(FileState::Outgoing, "bin.xml", &[0xff, 0xfe, 0x00]).unwrap();
        let client = Recorder::default();
        let outcome = Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::Mail).upload_all();
        assert!(client.puts.borrow().is_empty());
        assert_eq!(outcome.report.rejected, 2);
        assert!(store.contains(FileState::Failed, "bad.xml"));
        assert!(store.contains(FileState::Failed, "bin.xml"));
    }

    #[test]
    fn sent_index_completes_references_with_message_extension() {
        let (_dir, store) = setup(&[("a.msg", "<A/>"), ("b.xml", "<B/>")]);
        let client = Recorder::default();
        let outcome = Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::Mail)
            .message_extension(".msg")
            .upload_all();
        assert_eq!(outcome.report.uploaded, 2);
        assert_eq!(outcome.sent_index.validate("a").unwrap().file_name(), "a.msg");
        assert!(outcome.sent_index.validate("b").is_none());
    }

    #[test]
    fn sent_index_includes_files_from_earlier_runs() {
        let (_dir, store) = setup(&[]);
        store.write(FileState::Sent, "old.xml", b"<Old/>").unwrap();
        let client = Recorder::default();
        let outcome = Uploader::new(&client, &store, DEFAULT_TEMPLATE, MessageType::Mail).upload_all();
        assert!(outcome.sent_index.validate("old").is_some());
    }
}
