/*
 * codec.rs
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

//! Two-part document codec: split a received document into header fields, body and
//! body-free envelope; fill an outgoing template with type, time, reference and body.
//! All XML is read and written with quick_xml events; body content is copied event by
//! event so it comes out byte-identical to what went in.

use chrono::{Local, NaiveDateTime};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use super::record::{DecodedDocument, MessageHeader, MessageType};

const HEADER: &str = "Header";
const BODY: &str = "Body";
const MSG_TYPE_IDENTIFIER: &str = "MsgTypeIdentifier";
const MSG_SEQUENCE: &str = "MsgSequence";
const MSG_CREATED_TIME: &str = "MsgCreatedTime";
const REFERENCE: &str = "Reference";
const ORIGINATOR: &str = "Originator";
const ASSESSMENT_NUMBER: &str = "AssessmentNumber";
const INSTR_RESULT_CODE: &str = "InstrResultCode";
const INSTR_RESULT_MESSAGE: &str = "InstrResultMessage";

/// Sortable local time written into `MsgCreatedTime`.
pub const CREATED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Errors from decoding or encoding a document.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("template has no {0} element")]
    MissingSlot(&'static str),
    #[error("XML write failed: {0}")]
    Write(String),
}

fn xml_err(e: impl std::fmt::Display) -> CodecError {
    CodecError::Xml(e.to_string())
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), CodecError> {
    writer
        .write_event(event)
        .map_err(|e| CodecError::Write(e.to_string()))
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, CodecError> {
    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Header field addressed by the current element path (`.../Header/<Field>`).
fn header_field<'h>(header: &'h mut MessageHeader, path: &[String]) -> Option<&'h mut String> {
    let [.., parent, name] = path else {
        return None;
    };
    if parent != HEADER {
        return None;
    }
    match name.as_str() {
        MSG_TYPE_IDENTIFIER => Some(&mut header.message_type_id),
        MSG_SEQUENCE => Some(&mut header.sequence),
        MSG_CREATED_TIME => Some(&mut header.created_time),
        REFERENCE => Some(&mut header.reference),
        ORIGINATOR => Some(&mut header.originator),
        ASSESSMENT_NUMBER => Some(&mut header.assessment_number),
        INSTR_RESULT_CODE => Some(&mut header.instr_result_code),
        INSTR_RESULT_MESSAGE => Some(&mut header.instr_result_message),
        _ => None,
    }
}

fn trim_in_place(s: &mut String) {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
        *s = trimmed.to_string();
    }
}

fn trim_header(header: &mut MessageHeader) {
    for field in [
        &mut header.message_type_id,
        &mut header.sequence,
        &mut header.created_time,
        &mut header.reference,
        &mut header.originator,
        &mut header.assessment_number,
        &mut header.instr_result_code,
        &mut header.instr_result_message,
    ] {
        trim_in_place(field);
    }
}

/// Split a raw document into header fields, verbatim body content and the body-free envelope.
/// Only the first `Body` element is split out; a document without one has an empty body.
pub fn decode(raw: &str) -> Result<DecodedDocument, CodecError> {
    let mut reader = Reader::from_str(raw);
    let mut envelope = Writer::new(Vec::new());
    let mut body = Writer::new(Vec::new());
    let mut header = MessageHeader::default();
    let mut path: Vec<String> = Vec::new();
    let mut body_depth: Option<usize> = None;
    let mut body_seen = false;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(xml_err)?;

        if let Some(depth) = body_depth {
            let closes_body = matches!(event, Event::End(_)) && path.len() == depth;
            if !closes_body {
                match &event {
                    Event::Start(e) => path.push(local_name(e)),
                    Event::End(_) => {
                        path.pop();
                    }
                    Event::Eof => return Err(CodecError::Xml("document ends inside Body".into())),
                    _ => {}
                }
                emit(&mut body, event)?;
                continue;
            }
            body_depth = None;
        }

        match &event {
            Event::Start(e) => {
                saw_root = true;
                let name = local_name(e);
                let is_body = !body_seen && name == BODY;
                path.push(name);
                if is_body {
                    body_seen = true;
                    body_depth = Some(path.len());
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                if local_name(e) == BODY {
                    body_seen = true;
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(e) => {
                if let Some(field) = header_field(&mut header, &path) {
                    field.push_str(&e.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(e) => {
                if let Some(field) = header_field(&mut header, &path) {
                    field.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        emit(&mut envelope, event)?;
    }

    if !saw_root {
        return Err(CodecError::Xml("document has no root element".into()));
    }
    if !path.is_empty() {
        return Err(CodecError::Xml(format!("unclosed element {}", path.join("/"))));
    }
    trim_header(&mut header);
    Ok(DecodedDocument {
        header,
        body: into_string(body)?,
        body_present: body_seen,
        envelope: into_string(envelope)?,
    })
}

/// Drop a leading BOM and XML declaration so the payload can sit inside `Body`.
fn strip_declaration(payload: &str) -> &str {
    let p = payload.strip_prefix('\u{feff}').unwrap_or(payload);
    let trimmed = p.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start_matches(|c: char| c == '\r' || c == '\n');
        }
    }
    p
}

/// The payload must be balanced markup (or plain, correctly escaped text).
fn check_well_formed(payload: &str) -> Result<(), CodecError> {
    let mut reader = Reader::from_str(payload);
    let mut depth = 0usize;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| CodecError::Xml("unbalanced end tag in payload".into()))?;
            }
            Event::Text(e) => {
                e.unescape().map_err(xml_err)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if depth != 0 {
        return Err(CodecError::Xml("unclosed element in payload".into()));
    }
    Ok(())
}

/// Slot that `encode` fills, with the content written into it.
enum Fill<'p> {
    Text(String),
    Raw(&'p str),
}

struct SlotValues<'a> {
    message_type: MessageType,
    created: String,
    reference: &'a str,
    payload: &'a str,
}

fn slot_for<'a>(path: &[String], name: &str, body_done: bool, values: &SlotValues<'a>) -> Option<Fill<'a>> {
    if name == BODY {
        return (!body_done).then_some(Fill::Raw(values.payload));
    }
    if path.last().map(String::as_str) != Some(HEADER) {
        return None;
    }
    match name {
        MSG_TYPE_IDENTIFIER => Some(Fill::Text(values.message_type.as_str().to_string())),
        MSG_CREATED_TIME => Some(Fill::Text(values.created.clone())),
        REFERENCE => Some(Fill::Text(values.reference.to_string())),
        _ => None,
    }
}

/// Fill `template` with message type, current local time, reference and payload.
pub fn encode(
    template: &str,
    message_type: MessageType,
    reference: &str,
    payload: &str,
) -> Result<String, CodecError> {
    encode_at(template, message_type, reference, payload, Local::now().naive_local())
}

/// `encode` with an explicit creation time.
pub fn encode_at(
    template: &str,
    message_type: MessageType,
    reference: &str,
    payload: &str,
    created: NaiveDateTime,
) -> Result<String, CodecError> {
    let payload = strip_declaration(payload);
    check_well_formed(payload)?;
    let values = SlotValues {
        message_type,
        created: created.format(CREATED_TIME_FORMAT).to_string(),
        reference,
        payload,
    };

    let mut reader = Reader::from_str(template);
    let mut writer = Writer::new(Vec::new());
    let mut path: Vec<String> = Vec::new();
    let mut skip_depth: Option<usize> = None;
    let mut filled: Vec<&'static str> = Vec::new();

    loop {
        let event = reader.read_event().map_err(xml_err)?;

        if let Some(depth) = skip_depth {
            match &event {
                Event::Start(e) => path.push(local_name(e)),
                Event::End(_) => {
                    if path.len() == depth {
                        skip_depth = None;
                        path.pop();
                        emit(&mut writer, event)?;
                    } else {
                        path.pop();
                    }
                }
                Event::Eof => return Err(CodecError::Xml("template ends inside a slot".into())),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                let fill = slot_for(&path, &name, filled.contains(&BODY), &values);
                path.push(name.clone());
                emit(&mut writer, Event::Start(e))?;
                if let Some(fill) = fill {
                    write_fill(&mut writer, fill)?;
                    filled.push(slot_name(&name));
                    skip_depth = Some(path.len());
                }
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                match slot_for(&path, &name, filled.contains(&BODY), &values) {
                    Some(fill) => {
                        let end = e.to_end().into_owned();
                        emit(&mut writer, Event::Start(e))?;
                        write_fill(&mut writer, fill)?;
                        emit(&mut writer, Event::End(end))?;
                        filled.push(slot_name(&name));
                    }
                    None => emit(&mut writer, Event::Empty(e))?,
                }
            }
            Event::End(e) => {
                path.pop();
                emit(&mut writer, Event::End(e))?;
            }
            Event::Eof => break,
            other => emit(&mut writer, other)?,
        }
    }

    for slot in [MSG_TYPE_IDENTIFIER, MSG_CREATED_TIME, REFERENCE, BODY] {
        if !filled.contains(&slot) {
            return Err(CodecError::MissingSlot(slot));
        }
    }
    into_string(writer)
}

fn slot_name(name: &str) -> &'static str {
    match name {
        MSG_TYPE_IDENTIFIER => MSG_TYPE_IDENTIFIER,
        MSG_CREATED_TIME => MSG_CREATED_TIME,
        REFERENCE => REFERENCE,
        _ => BODY,
    }
}

fn write_fill(writer: &mut Writer<Vec<u8>>, fill: Fill<'_>) -> Result<(), CodecError> {
    match fill {
        Fill::Text(s) => emit(writer, Event::Text(BytesText::new(&s))),
        Fill::Raw(raw) => emit(writer, Event::Text(BytesText::from_escaped(raw))),
    }
}
