/*
 * bridge_run.rs
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

//! Whole runs against a scripted in-memory remote and temporary folders.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use casella_core::bridge::Bridge;
use casella_core::envelope::{decode, MessageType, DEFAULT_TEMPLATE};
use casella_core::localstorage::{FileExtensions, FileState, FileStateStore, FolderPaths};
use casella_core::queue::{
    DrainState, GetResponse, PutResponse, QueueClient, QueueType, TransportError, QUEUE_EMPTY,
};

/// Remote with one scripted list of messages per queue and fixed put result codes.
#[derive(Default)]
struct ScriptedRemote {
    queues: RefCell<HashMap<QueueType, VecDeque<GetResponse>>>,
    put_codes: RefCell<VecDeque<i32>>,
    puts: RefCell<Vec<String>>,
    acks: RefCell<HashMap<QueueType, Vec<i64>>>,
    fail_gets: bool,
}

impl ScriptedRemote {
    /// Queue `envelopes`, reporting depth as the number still waiting, acks from `first_ack`.
    fn enqueue(&self, queue: QueueType, first_ack: i64, envelopes: &[String]) {
        let n = envelopes.len() as i64;
        let items = envelopes.iter().enumerate().map(|(i, env)| GetResponse {
            error_code: 0,
            ack_msg_id: first_ack + i as i64,
            queue_depth: n - i as i64,
            message_envelope: env.clone(),
            ..Default::default()
        });
        self.queues.borrow_mut().entry(queue).or_default().extend(items);
    }
}

impl QueueClient for ScriptedRemote {
    fn put(&self, _queue: QueueType, envelope: &str) -> Result<PutResponse, TransportError> {
        self.puts.borrow_mut().push(envelope.to_string());
        Ok(PutResponse {
            error_code: self.put_codes.borrow_mut().pop_front().unwrap_or(0),
            ..Default::default()
        })
    }

    fn get(&self, queue: QueueType, ack_msg_id: i64) -> Result<GetResponse, TransportError> {
        self.acks.borrow_mut().entry(queue).or_default().push(ack_msg_id);
        if self.fail_gets {
            return Err(TransportError::Http("connection refused".into()));
        }
        let next = self.queues.borrow_mut().get_mut(&queue).and_then(VecDeque::pop_front);
        Ok(next.unwrap_or(GetResponse {
            error_code: QUEUE_EMPTY,
            error_message: "no messages".into(),
            ..Default::default()
        }))
    }
}

fn confirmation(reference: &str, result_code: &str) -> String {
    format!(
        "<Message><Header><MsgTypeIdentifier>MSGTYPE_CONF</MsgTypeIdentifier>\
         <Reference>{}</Reference><InstrResultCode>{}</InstrResultCode>\
         <InstrResultMessage>checked</InstrResultMessage></Header><Body><Receipt/></Body></Message>",
        reference, result_code
    )
}

fn setup(outgoing: &[(&str, &str)]) -> (tempfile::TempDir, FileStateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::open(FolderPaths::under(dir.path())).unwrap();
    for (name, content) in outgoing {
        store.write(FileState::Outgoing, name, content.as_bytes()).unwrap();
    }
    (dir, store)
}

fn bridge(remote: &ScriptedRemote, store: FileStateStore) -> Bridge<&ScriptedRemote> {
    Bridge::new(
        remote,
        store,
        DEFAULT_TEMPLATE.to_string(),
        MessageType::Mail,
        FileExtensions::default(),
    )
}

fn incoming_ending(store: &FileStateStore, suffix: &str) -> Vec<String> {
    store
        .list(FileState::Incoming)
        .unwrap()
        .into_iter()
        .filter(|n| n.ends_with(suffix))
        .collect()
}

#[test_log::test]
fn full_run_moves_every_file_through_its_lifecycle() {
    let (_dir, store) = setup(&[("order-1.xml", "<Order id=\"1\"/>"), ("order-2.xml", "<Order id=\"2\"/>")]);
    let remote = ScriptedRemote::default();
    remote.enqueue(
        QueueType::Confirmation,
        11,
        &[
            confirmation("order-1", "0"),
            confirmation("order-2", "E17"),
            confirmation("../../etc/passwd", "0"),
        ],
    );
    remote.enqueue(
        QueueType::Assessment,
        21,
        &["<Message><Header><AssessmentNumber>A-1</AssessmentNumber></Header>\
           <Body><Assessment score=\"9\"/></Body></Message>"
            .to_string()],
    );
    remote.enqueue(
        QueueType::Image,
        31,
        &["<Message><Header><AssessmentNumber>A-1</AssessmentNumber><Originator>lab</Originator></Header>\
           <Body><AudaImage><AudaImageContent><Image>/9j/4A==</Image></AudaImageContent></AudaImage></Body></Message>"
            .to_string()],
    );
    remote.enqueue(
        QueueType::OutgoingAck,
        41,
        &["<Message><Header><Reference>order-1</Reference></Header><Body/></Message>".to_string()],
    );

    let bridge = bridge(&remote, store);
    let report = bridge.run();
    let store = bridge.store();

    assert_eq!(remote.puts.borrow().len(), 2);
    assert!(remote.puts.borrow()[0].contains("<MsgTypeIdentifier>MSGTYPE_MAIL</MsgTypeIdentifier>"));
    assert_eq!(report.upload.uploaded, 2);
    assert!(store.list(FileState::Outgoing).unwrap().is_empty());

    // Confirmation: order-1 delivered, order-2 failed, traversal attempt ignored.
    assert!(store.contains(FileState::Incoming, "order-1.xml"));
    assert!(!store.contains(FileState::Sent, "order-1.xml"));
    assert!(store.contains(FileState::Failed, "order-2.xml"));
    assert!(store.list(FileState::Sent).unwrap().is_empty());
    let confirmed = String::from_utf8(store.read(FileState::Incoming, "order-1.xml").unwrap()).unwrap();
    let confirmed = decode(&confirmed).unwrap();
    assert_eq!(confirmed.header.reference, "order-1");
    assert_eq!(confirmed.body, "");

    let assessments = incoming_ending(store, ".assessment.xml");
    assert_eq!(assessments.len(), 1);
    assert_eq!(
        store.read(FileState::Incoming, &assessments[0]).unwrap(),
        b"<Assessment score=\"9\"/>"
    );

    let images = incoming_ending(store, ".image.jpg");
    assert_eq!(images.len(), 1);
    assert_eq!(store.read(FileState::Incoming, &images[0]).unwrap(), vec![0xff, 0xd8, 0xff, 0xe0]);
    let sidecars = incoming_ending(store, ".image.meta.xml");
    assert_eq!(sidecars.len(), 1);
    let sidecar = String::from_utf8(store.read(FileState::Incoming, &sidecars[0]).unwrap()).unwrap();
    assert!(sidecar.contains("assessmentNumber=\"A-1\""));
    assert!(sidecar.contains("originator=\"lab\""));
    assert!(sidecar.contains("<AudaImageContent><Image></Image></AudaImageContent>"));

    assert_eq!(incoming_ending(store, ".outgoing-ack.xml").len(), 1);

    let drained: Vec<(QueueType, u32, u32, u32)> = report
        .drains
        .iter()
        .map(|d| (d.queue, d.delivered, d.failed, d.skipped))
        .collect();
    assert_eq!(
        drained,
        vec![
            (QueueType::Confirmation, 1, 1, 1),
            (QueueType::Assessment, 1, 0, 0),
            (QueueType::Image, 1, 0, 0),
            (QueueType::OutgoingAck, 1, 0, 0),
        ]
    );
    assert!(report.drains.iter().all(|d| d.end_state == DrainState::Exhausted));

    let acks = remote.acks.borrow();
    assert_eq!(acks[&QueueType::Confirmation], vec![0, 11, 12, 13]);
    assert_eq!(acks[&QueueType::Image], vec![0, 31]);
}

#[test_log::test]
fn rejected_upload_goes_to_failed_and_is_never_confirmed() {
    let (_dir, store) = setup(&[("a.xml", "<A/>"), ("b.xml", "<B/>")]);
    let remote = ScriptedRemote::default();
    remote.put_codes.borrow_mut().extend([0, 9]);
    remote.enqueue(QueueType::Confirmation, 1, &[confirmation("b", "0")]);

    let bridge = bridge(&remote, store);
    let report = bridge.run();
    let store = bridge.store();

    assert!(store.contains(FileState::Sent, "a.xml"));
    assert!(store.contains(FileState::Failed, "b.xml"));
    assert!(!store.contains(FileState::Incoming, "b.xml"));
    assert_eq!(report.upload.rejected, 1);
    assert_eq!(report.drains[0].skipped, 1);
}

#[test_log::test]
fn empty_run_only_polls_each_queue_once() {
    let (_dir, store) = setup(&[]);
    let remote = ScriptedRemote::default();
    let bridge = bridge(&remote, store);
    let report = bridge.run();

    assert!(remote.puts.borrow().is_empty());
    assert_eq!(report.drains.iter().map(|d| d.calls).collect::<Vec<_>>(), vec![1, 1, 1, 1]);
    for queue in QueueType::DRAIN_ORDER {
        assert_eq!(remote.acks.borrow()[&queue], vec![0]);
    }
    for state in FileState::ALL {
        assert!(bridge.store().list(state).unwrap().is_empty());
    }
}

#[test_log::test]
fn unreachable_remote_ends_each_drain_after_one_call() {
    let (_dir, store) = setup(&[]);
    store.write(FileState::Sent, "pending.xml", b"<P/>").unwrap();
    let remote = ScriptedRemote {
        fail_gets: true,
        ..Default::default()
    };
    let bridge = bridge(&remote, store);
    let report = bridge.run();

    assert!(report.drains.iter().all(|d| d.calls == 1 && d.end_state == DrainState::Failed));
    assert!(bridge.store().contains(FileState::Sent, "pending.xml"));
}

#[test_log::test]
fn stalled_assessment_queue_keeps_every_fetched_record() {
    let (_dir, store) = setup(&[]);
    let remote = ScriptedRemote::default();
    let stuck: VecDeque<GetResponse> = (1..=3)
        .map(|ack| GetResponse {
            ack_msg_id: ack,
            queue_depth: 2,
            message_envelope: format!("<Message><Header/><Body><Assessment n=\"{}\"/></Body></Message>", ack),
            ..Default::default()
        })
        .collect();
    remote.queues.borrow_mut().insert(QueueType::Assessment, stuck);

    let bridge = bridge(&remote, store);
    let index = bridge.sent_index();
    let report = bridge.drain_queue(QueueType::Assessment, &index).unwrap();

    assert_eq!(report.calls, 3);
    assert_eq!(report.delivered, 3);
    assert_eq!(report.end_state, DrainState::Stalled);
    assert_eq!(incoming_ending(bridge.store(), ".assessment.xml").len(), 3);
}

#[test_log::test]
fn drain_single_queue_uses_existing_sent_files() {
    let (_dir, store) = setup(&[]);
    store.write(FileState::Sent, "earlier.xml", b"<E/>").unwrap();
    let remote = ScriptedRemote::default();
    remote.enqueue(QueueType::Confirmation, 5, &[confirmation("earlier", "0")]);

    let bridge = bridge(&remote, store);
    let index = bridge.sent_index();
    let report = bridge.drain_queue(QueueType::Confirmation, &index).unwrap();

    assert_eq!(report.delivered, 1);
    assert!(bridge.store().contains(FileState::Incoming, "earlier.xml"));
    assert!(remote.acks.borrow().get(&QueueType::Assessment).is_none());
}
