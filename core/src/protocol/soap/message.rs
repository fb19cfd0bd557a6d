/*
 * message.rs
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

//! SOAP 1.1 request bodies and response parsing for the PutData and GetData operations.
//! Responses are matched by element local name only, so any prefix or wrapper works.
//! Queues are addressed by their wire name (`MSGTYPE_CONF` and so on), see `QueueNames`.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::config::Credentials;
use crate::queue::{GetResponse, PutResponse, TransportError};

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const OP_PUT: &str = "PutData";
pub const OP_GET: &str = "GetData";
const CREDENTIALS: &str = "Credentials";

fn write_err(e: impl std::fmt::Display) -> TransportError {
    TransportError::Response(format!("cannot build request: {}", e))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<(), TransportError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(write_err)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(write_err)
}

/// Envelope for `operation` with credentials, queue name and any extra `(name, value)` fields.
fn build_request(
    namespace: &str,
    operation: &str,
    credentials: &Credentials,
    queue_name: &str,
    fields: &[(&str, &str)],
) -> Result<String, TransportError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_err)?;
    let mut envelope = BytesStart::new("soap:Envelope");
    envelope.push_attribute(("xmlns:soap", SOAP_ENV_NS));
    writer.write_event(Event::Start(envelope)).map_err(write_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("soap:Body")))
        .map_err(write_err)?;
    let mut op = BytesStart::new(operation);
    op.push_attribute(("xmlns", namespace));
    writer.write_event(Event::Start(op)).map_err(write_err)?;

    writer
        .write_event(Event::Start(BytesStart::new(CREDENTIALS)))
        .map_err(write_err)?;
    text_element(&mut writer, "CompanyCode", &credentials.company)?;
    text_element(&mut writer, "UserId", &credentials.user)?;
    text_element(&mut writer, "Password", &credentials.password)?;
    writer
        .write_event(Event::End(BytesEnd::new(CREDENTIALS)))
        .map_err(write_err)?;
    text_element(&mut writer, "QueueType", queue_name)?;
    for (name, value) in fields {
        text_element(&mut writer, name, value)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(operation)))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("soap:Body")))
        .map_err(write_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("soap:Envelope")))
        .map_err(write_err)?;
    String::from_utf8(writer.into_inner()).map_err(write_err)
}

/// PutData request; the envelope document travels as escaped text.
pub fn build_put_request(
    namespace: &str,
    credentials: &Credentials,
    queue_name: &str,
    envelope: &str,
) -> Result<String, TransportError> {
    build_request(namespace, OP_PUT, credentials, queue_name, &[("MessageEnvelope", envelope)])
}

pub fn build_get_request(
    namespace: &str,
    credentials: &Credentials,
    queue_name: &str,
    ack_id: i64,
) -> Result<String, TransportError> {
    let ack = ack_id.to_string();
    build_request(namespace, OP_GET, credentials, queue_name, &[("AckMsgId", &ack)])
}

/// Text content of the response fields this client reads.
#[derive(Debug, Default)]
struct ResponseFields {
    error_code: Option<String>,
    error_message: Option<String>,
    additional_data: Option<String>,
    ack_msg_id: Option<String>,
    queue_depth: Option<String>,
    message_envelope: Option<String>,
    fault_code: Option<String>,
    fault_string: Option<String>,
    fault: bool,
}

impl ResponseFields {
    fn slot(&mut self, local_name: &[u8]) -> Option<&mut Option<String>> {
        match local_name {
            b"ErrorCode" => Some(&mut self.error_code),
            b"ErrorMessage" => Some(&mut self.error_message),
            b"AdditionalData" => Some(&mut self.additional_data),
            b"MessageId" | b"AckMsgId" => Some(&mut self.ack_msg_id),
            b"QueueDepth" => Some(&mut self.queue_depth),
            b"MessageEnvelope" => Some(&mut self.message_envelope),
            b"faultcode" => Some(&mut self.fault_code),
            b"faultstring" => Some(&mut self.fault_string),
            _ => None,
        }
    }
}

fn parse_fields(body: &str) -> Result<ResponseFields, TransportError> {
    let mut reader = Reader::from_str(body);
    let mut fields = ResponseFields::default();
    let mut current: Option<Vec<u8>> = None;
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| TransportError::Response(format!("malformed response: {}", e)))?;
        match event {
            Event::Start(e) => {
                seen_root = true;
                depth += 1;
                let name = e.local_name().as_ref().to_vec();
                if name == b"Fault" {
                    fields.fault = true;
                }
                current = fields.slot(&name).is_some().then_some(name);
            }
            Event::Empty(e) => {
                seen_root = true;
                let name = e.local_name().as_ref().to_vec();
                if let Some(slot) = fields.slot(&name) {
                    slot.get_or_insert_with(String::new);
                }
            }
            Event::Text(e) => {
                if let Some(name) = &current {
                    let text = e
                        .unescape()
                        .map_err(|e| TransportError::Response(format!("malformed response: {}", e)))?;
                    if let Some(slot) = fields.slot(name) {
                        slot.get_or_insert_with(String::new).push_str(&text);
                    }
                }
            }
            Event::CData(e) => {
                if let Some(name) = &current {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    if let Some(slot) = fields.slot(name) {
                        slot.get_or_insert_with(String::new).push_str(&text);
                    }
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                current = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !seen_root || depth != 0 {
        return Err(TransportError::Response("incomplete response document".into()));
    }
    if fields.fault {
        return Err(TransportError::Fault {
            code: fields.fault_code.unwrap_or_default().trim().to_string(),
            message: fields.fault_string.unwrap_or_default().trim().to_string(),
        });
    }
    Ok(fields)
}

/// The SOAP fault in `body`, when it is a response document with a `Fault` element.
pub fn fault_of(body: &str) -> Option<TransportError> {
    match parse_fields(body) {
        Err(fault @ TransportError::Fault { .. }) => Some(fault),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<T, TransportError> {
    let value = value.ok_or_else(|| TransportError::Response(format!("response has no {}", name)))?;
    value
        .trim()
        .parse()
        .map_err(|_| TransportError::Response(format!("{} is not a number: {:?}", name, value)))
}

fn parse_optional_number<T: std::str::FromStr + Default>(name: &str, value: Option<String>) -> Result<T, TransportError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_number(name, Some(v)),
        _ => Ok(T::default()),
    }
}

pub fn parse_put_response(body: &str) -> Result<PutResponse, TransportError> {
    let fields = parse_fields(body)?;
    Ok(PutResponse {
        error_code: parse_number("ErrorCode", fields.error_code)?,
        error_message: fields.error_message.unwrap_or_default(),
        additional_data: fields.additional_data.unwrap_or_default(),
    })
}

/// GetData result. `MessageId` and `QueueDepth` default to 0 when absent (empty queue).
pub fn parse_get_response(body: &str) -> Result<GetResponse, TransportError> {
    let fields = parse_fields(body)?;
    Ok(GetResponse {
        error_code: parse_number("ErrorCode", fields.error_code)?,
        error_message: fields.error_message.unwrap_or_default(),
        ack_msg_id: parse_optional_number("AckMsgId", fields.ack_msg_id)?,
        queue_depth: parse_optional_number("QueueDepth", fields.queue_depth)?,
        message_envelope: fields.message_envelope.unwrap_or_default(),
    })
}
