/*
 * filename.rs
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

//! Locally generated message file names, maildir style: `<unix-millis>.<random-hex>.<queue>`.
//! e.g. 1733356800000.9f3c2a1b.assessment

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::queue::QueueType;

/// Generated stem for a received message that has no usable reference.
/// Never contains remote data, so it is always a safe file name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageFileName {
    pub timestamp: u64,
    pub unique_part: String,
    pub queue: QueueType,
    stem: String,
}

impl MessageFileName {
    /// New name for a message just received from `queue`.
    pub fn generate(queue: QueueType) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let unique_part = format!("{:08x}", rand::thread_rng().gen::<u32>());
        Self::from_parts(timestamp, unique_part, queue)
    }

    fn from_parts(timestamp: u64, unique_part: String, queue: QueueType) -> Self {
        let stem = format!("{}.{}.{}", timestamp, unique_part, queue.as_str());
        Self {
            timestamp,
            unique_part,
            queue,
            stem,
        }
    }

    /// Parse a stem produced by `generate` (extension already removed).
    pub fn parse(stem: &str) -> Option<Self> {
        let mut parts = stem.splitn(3, '.');
        let timestamp = parts.next()?.parse().ok()?;
        let unique_part = parts.next()?;
        if unique_part.is_empty() || !unique_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let queue = QueueType::parse(parts.next()?)?;
        Some(Self::from_parts(timestamp, unique_part.to_string(), queue))
    }

    pub fn as_str(&self) -> &str {
        &self.stem
    }

    /// File name with `extension` (including its leading dot) appended.
    pub fn with_extension(&self, extension: &str) -> String {
        format!("{}{}", self.stem, extension)
    }
}

impl fmt::Display for MessageFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem)
    }
}

pub const DEFAULT_MESSAGE_EXTENSION: &str = ".xml";

/// Extensions (with leading dot) of files written locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileExtensions {
    /// Incoming and outgoing message documents.
    pub message: String,
    /// Image metadata sidecars.
    pub metadata: String,
    pub image: String,
}

impl Default for FileExtensions {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE_EXTENSION.to_string(),
            metadata: ".meta.xml".to_string(),
            image: ".jpg".to_string(),
        }
    }
}
