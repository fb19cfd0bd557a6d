/*
 * sent_index.rs
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

//! In-memory index of files in `sent`. A remote `Reference` names the file
//! `<reference><message-ext>`; only a name present in the index is ever used as a path.

use std::collections::HashSet;

/// Reference of a local file: its name without the final extension.
pub fn reference_of(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// A remote reference known to name a file in `sent`. Only `SentIndex::validate` creates one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedReference {
    reference: String,
    file_name: String,
}

impl ValidatedReference {
    pub fn as_str(&self) -> &str {
        &self.reference
    }

    /// Name of the file in `sent` this reference belongs to.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Snapshot of `sent`, built once per run after upload.
#[derive(Debug, Clone, Default)]
pub struct SentIndex {
    file_names: HashSet<String>,
    message_extension: String,
}

impl SentIndex {
    /// Index `names`; references resolve to `<reference><message_extension>`.
    pub fn from_file_names<I, S>(names: I, message_extension: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_names: names.into_iter().map(Into::into).collect(),
            message_extension: message_extension.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.file_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_names.is_empty()
    }

    pub fn validate(&self, reference: &str) -> Option<ValidatedReference> {
        if reference.is_empty() {
            return None;
        }
        let candidate = format!("{}{}", reference, self.message_extension);
        self.file_names.get(&candidate).map(|file_name| ValidatedReference {
            reference: reference.to_string(),
            file_name: file_name.clone(),
        })
    }

    /// The reference if it is known, otherwise `""`.
    pub fn effective_reference<'a>(&self, reference: &'a str) -> &'a str {
        if self.validate(reference).is_some() {
            reference
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SentIndex {
        SentIndex::from_file_names(["order-17.xml", "order-18.xml", "order-19.txt", "plain"], ".xml")
    }

    #[test]
    fn reference_is_name_minus_extension() {
        assert_eq!(reference_of("order-17.xml"), "order-17");
        assert_eq!(reference_of("a.b.xml"), "a.b");
        assert_eq!(reference_of("plain"), "plain");
        assert_eq!(reference_of(".hidden"), ".hidden");
    }

    #[test]
    fn known_reference_validates() {
        let r = index().validate("order-17").unwrap();
        assert_eq!(r.as_str(), "order-17");
        assert_eq!(r.file_name(), "order-17.xml");
    }

    #[test]
    fn reference_must_carry_the_message_extension() {
        let idx = index();
        assert!(idx.validate("order-19").is_none());
        assert!(idx.validate("plain").is_none());
        assert!(idx.validate("order-17.xml").is_none());
        let bare = SentIndex::from_file_names(["plain"], "");
        assert_eq!(bare.validate("plain").unwrap().file_name(), "plain");
    }

    #[test]
    fn unknown_reference_is_never_a_path() {
        let idx = index();
        assert!(idx.validate("../../etc/passwd").is_none());
        assert_eq!(idx.effective_reference("../../etc/passwd"), "");
        assert!(idx.validate("").is_none());
        assert_eq!(idx.effective_reference("order-18"), "order-18");
    }
}
