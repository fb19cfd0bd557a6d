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

//! Image materializer: base64 image payload inside an XML body → image bytes plus a
//! metadata sidecar (the body with the payload emptied and two index attributes on the root).
//!
//! The payload sits at `<root>/AudaImageContent/Image`; an `Image` element anywhere else is
//! ordinary content.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// Path of the base64 image element below the body's root element.
pub const IMAGE_PATH: [&str; 2] = ["AudaImageContent", "Image"];
pub const ATTR_ASSESSMENT_NUMBER: &str = "assessmentNumber";
pub const ATTR_ORIGINATOR: &str = "originator";

/// Why an image body could not be turned into files.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("malformed image body: {0}")]
    Xml(String),
    #[error("image body has no AudaImageContent/Image element")]
    MissingPayload,
    #[error("image payload is empty")]
    EmptyPayload,
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("XML write failed: {0}")]
    Write(String),
}

fn xml_err(e: impl std::fmt::Display) -> MaterializeError {
    MaterializeError::Xml(e.to_string())
}

/// Values stamped on the sidecar's root element.
#[derive(Debug, Clone, Copy)]
pub struct ImageAttributes<'a> {
    pub assessment_number: &'a str,
    pub originator: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedImage {
    pub image: Vec<u8>,
    pub metadata: String,
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), MaterializeError> {
    writer
        .write_event(event)
        .map_err(|e| MaterializeError::Write(e.to_string()))
}

/// `path` holds the open elements from the root down to and including the candidate.
fn is_payload_path(path: &[Vec<u8>]) -> bool {
    match path {
        [_root, rest @ ..] => {
            rest.len() == IMAGE_PATH.len()
                && rest
                    .iter()
                    .zip(IMAGE_PATH)
                    .all(|(name, want)| name.as_slice() == want.as_bytes())
        }
        [] => false,
    }
}

/// Copy of the root start tag with both index attributes set (replacing any present).
fn stamp_root(e: &BytesStart<'_>, attrs: &ImageAttributes<'_>) -> Result<BytesStart<'static>, MaterializeError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut root = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = attr.key.local_name();
        if key.as_ref() == ATTR_ASSESSMENT_NUMBER.as_bytes() || key.as_ref() == ATTR_ORIGINATOR.as_bytes() {
            continue;
        }
        root.push_attribute(attr);
    }
    root.push_attribute((ATTR_ASSESSMENT_NUMBER, attrs.assessment_number));
    root.push_attribute((ATTR_ORIGINATOR, attrs.originator));
    Ok(root)
}

/// Decode the image in `body_xml` and build its metadata sidecar.
pub fn materialize(body_xml: &str, attrs: &ImageAttributes<'_>) -> Result<MaterializedImage, MaterializeError> {
    let mut reader = Reader::from_str(body_xml);
    let mut writer = Writer::new(Vec::new());
    // Open elements outside the payload, root first.
    let mut path: Vec<Vec<u8>> = Vec::new();
    // Elements opened inside the payload while it is being captured.
    let mut payload_nesting: Option<usize> = None;
    let mut payload: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(xml_err)?;

        if let Some(nesting) = payload_nesting {
            match event {
                Event::Text(e) => {
                    let text = e.unescape().map_err(xml_err)?;
                    payload.get_or_insert_with(String::new).push_str(&text);
                }
                Event::CData(e) => {
                    payload
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&e));
                }
                Event::Start(_) => payload_nesting = Some(nesting + 1),
                Event::End(e) => {
                    if nesting == 0 {
                        payload_nesting = None;
                        path.pop();
                        emit(&mut writer, Event::End(e))?;
                    } else {
                        payload_nesting = Some(nesting - 1);
                    }
                }
                Event::Eof => return Err(MaterializeError::Xml("document ends inside the image element".into())),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                path.push(e.local_name().as_ref().to_vec());
                let capture = payload.is_none() && is_payload_path(&path);
                if path.len() == 1 {
                    emit(&mut writer, Event::Start(stamp_root(&e, attrs)?))?;
                } else {
                    emit(&mut writer, Event::Start(e))?;
                }
                if capture {
                    payload = Some(String::new());
                    payload_nesting = Some(0);
                }
            }
            Event::Empty(e) => {
                path.push(e.local_name().as_ref().to_vec());
                if payload.is_none() && is_payload_path(&path) {
                    payload = Some(String::new());
                }
                let is_root = path.len() == 1;
                path.pop();
                if is_root {
                    emit(&mut writer, Event::Empty(stamp_root(&e, attrs)?))?;
                } else {
                    emit(&mut writer, Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                path.pop()
                    .ok_or_else(|| MaterializeError::Xml("unbalanced end tag".into()))?;
                emit(&mut writer, Event::End(e))?;
            }
            Event::Eof => break,
            other => emit(&mut writer, other)?,
        }
    }

    if !path.is_empty() {
        return Err(MaterializeError::Xml("unclosed element".into()));
    }
    let payload = payload.ok_or(MaterializeError::MissingPayload)?;
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(MaterializeError::EmptyPayload);
    }
    let image = STANDARD.decode(compact.as_bytes())?;
    let metadata = String::from_utf8(writer.into_inner()).map_err(xml_err)?;
    Ok(MaterializedImage { image, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTRS: ImageAttributes<'static> = ImageAttributes {
        assessment_number: "A-9",
        originator: "lab & co",
    };

    fn body(b64: &str) -> String {
        format!(
            "<AudaImage kind=\"photo\"><Caption>front</Caption>\
             <AudaImageContent><Image>{}</Image><Taken>2026-03-01</Taken></AudaImageContent></AudaImage>",
            b64
        )
    }

    #[test]
    fn decodes_payload_bytes() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let out = materialize(&body(&STANDARD.encode(&bytes)), &ATTRS).unwrap();
        assert_eq!(out.image.len(), 1000);
        assert_eq!(out.image, bytes);
    }

    #[test]
    fn sidecar_has_empty_image_node_and_root_attributes() {
        let out = materialize(&body(&STANDARD.encode(b"\xff\xd8\xff")), &ATTRS).unwrap();
        assert_eq!(
            out.metadata,
            "<AudaImage kind=\"photo\" assessmentNumber=\"A-9\" originator=\"lab &amp; co\">\
             <Caption>front</Caption><AudaImageContent><Image></Image><Taken>2026-03-01</Taken>\
             </AudaImageContent></AudaImage>"
        );
    }

    #[test]
    fn existing_index_attributes_are_replaced() {
        let xml = format!(
            "<AudaImage originator=\"old\" assessmentNumber=\"old\">\
             <AudaImageContent><Image>{}</Image></AudaImageContent></AudaImage>",
            STANDARD.encode(b"x")
        );
        let out = materialize(&xml, &ATTRS).unwrap();
        assert!(!out.metadata.contains("old"));
        assert_eq!(out.metadata.matches("originator=").count(), 1);
    }

    #[test]
    fn wrapped_base64_is_accepted() {
        let encoded = STANDARD.encode(vec![7u8; 300]);
        let wrapped: Vec<String> = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| String::from_utf8(c.to_vec()).unwrap())
            .collect();
        let out = materialize(&body(&format!("\n{}\n", wrapped.join("\r\n"))), &ATTRS).unwrap();
        assert_eq!(out.image, vec![7u8; 300]);
    }

    #[test]
    fn short_jpeg_header_in_payload_path() {
        let xml = "<AudaImage><AudaImageContent><Image>/9j/</Image></AudaImageContent></AudaImage>";
        let out = materialize(xml, &ATTRS).unwrap();
        assert_eq!(out.image, vec![0xff, 0xd8, 0xff]);
        assert!(out.metadata.contains("<AudaImageContent><Image></Image></AudaImageContent>"));
    }

    #[test]
    fn image_outside_payload_path_is_content() {
        let xml = format!(
            "<AudaImage><Image>{}</Image><Thumb><AudaImageContent><Image>AAAA</Image></AudaImageContent></Thumb>\
             <AudaImageContent><Image>{}</Image></AudaImageContent></AudaImage>",
            STANDARD.encode(b"thumb"),
            STANDARD.encode(b"full")
        );
        let out = materialize(&xml, &ATTRS).unwrap();
        assert_eq!(out.image, b"full");
        assert!(out.metadata.contains(&STANDARD.encode(b"thumb")));
        assert!(out.metadata.contains("<Thumb><AudaImageContent><Image>AAAA</Image>"));
    }

    #[test]
    fn errors() {
        assert!(matches!(
            materialize("<AudaImage><Caption/></AudaImage>", &ATTRS),
            Err(MaterializeError::MissingPayload)
        ));
        assert!(matches!(
            materialize("<AudaImage><Image>AAAA</Image></AudaImage>", &ATTRS),
            Err(MaterializeError::MissingPayload)
        ));
        assert!(matches!(
            materialize("<AudaImage><AudaImageContent><Image/></AudaImageContent></AudaImage>", &ATTRS),
            Err(MaterializeError::EmptyPayload)
        ));
        assert!(matches!(
            materialize(&body("not*base64!"), &ATTRS),
            Err(MaterializeError::Base64(_))
        ));
        assert!(matches!(
            materialize("<AudaImage><AudaImageContent><Image>AAAA</AudaImageContent></AudaImage>", &ATTRS),
            Err(MaterializeError::Xml(_))
        ));
    }
}
