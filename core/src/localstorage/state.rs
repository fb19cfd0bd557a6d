/*
 * state.rs
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

//! File-state store: four sibling folders holding each message file in exactly one
//! lifecycle state. Moves are plain renames; writes go through a hidden temp file in the
//! target folder and are renamed into place.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use super::sent_index::SentIndex;

/// Lifecycle state of a message file (the folder it lives in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Queued by a local producer, not yet uploaded.
    Outgoing,
    /// Uploaded, awaiting confirmation.
    Sent,
    /// Delivered to the downstream consumer.
    Incoming,
    /// Needs an operator.
    Failed,
}

impl FileState {
    pub const ALL: [FileState; 4] = [
        FileState::Outgoing,
        FileState::Sent,
        FileState::Incoming,
        FileState::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FileState::Outgoing => "outgoing",
            FileState::Sent => "sent",
            FileState::Incoming => "incoming",
            FileState::Failed => "failed",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the file-state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid file name {0:?}")]
    InvalidName(String),
}

fn io_err(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { op, path, source }
}

/// `name` must be one plain, non-hidden path component.
fn check_name(name: &str) -> Result<(), StoreError> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == OsStr::new(name)
    );
    if !single || name.starts_with('.') || name.contains('\0') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Locations of the four state folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPaths {
    pub outgoing: PathBuf,
    pub sent: PathBuf,
    pub incoming: PathBuf,
    pub failed: PathBuf,
}

impl FolderPaths {
    /// `root/outgoing`, `root/sent`, `root/incoming`, `root/failed`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            outgoing: root.join(FileState::Outgoing.as_str()),
            sent: root.join(FileState::Sent.as_str()),
            incoming: root.join(FileState::Incoming.as_str()),
            failed: root.join(FileState::Failed.as_str()),
        }
    }

    pub fn get(&self, state: FileState) -> &Path {
        match state {
            FileState::Outgoing => &self.outgoing,
            FileState::Sent => &self.sent,
            FileState::Incoming => &self.incoming,
            FileState::Failed => &self.failed,
        }
    }
}

/// The four folders, created on open.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    folders: FolderPaths,
}

impl FileStateStore {
    pub fn open(folders: FolderPaths) -> Result<Self, StoreError> {
        for state in FileState::ALL {
            let dir = folders.get(state);
            fs::create_dir_all(dir).map_err(io_err("create", dir))?;
        }
        Ok(Self { folders })
    }

    pub fn folders(&self) -> &FolderPaths {
        &self.folders
    }

    /// Path of `name` in `state`. Fails for anything but a single plain file name.
    pub fn path(&self, state: FileState, name: &str) -> Result<PathBuf, StoreError> {
        check_name(name)?;
        Ok(self.folders.get(state).join(name))
    }

    /// Snapshot of regular, non-hidden files in `state`, sorted by name.
    pub fn list(&self, state: FileState) -> Result<Vec<String>, StoreError> {
        let dir = self.folders.get(state);
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err("list", dir))? {
            let entry = entry.map_err(io_err("list", dir))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_file = entry
                .file_type()
                .map(|t| t.is_file())
                .map_err(io_err("stat", &entry.path()))?;
            if is_file {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn contains(&self, state: FileState, name: &str) -> bool {
        self.path(state, name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn read(&self, state: FileState, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path(state, name)?;
        fs::read(&path).map_err(io_err("read", &path))
    }

    /// Write `contents` as `name` in `state`, replacing any existing file.
    pub fn write(&self, state: FileState, name: &str, contents: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.path(state, name)?;
        let tmp = self.folders.get(state).join(format!(".{}.tmp", name));
        fs::write(&tmp, contents).map_err(io_err("write", &tmp))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err("rename", &path)(e));
        }
        debug!(state = %state, file = name, bytes = contents.len(), "wrote file");
        Ok(path)
    }

    /// Move `name` from one state folder to another.
    pub fn move_to(&self, name: &str, from: FileState, to: FileState) -> Result<PathBuf, StoreError> {
        let src = self.path(from, name)?;
        let dst = self.path(to, name)?;
        fs::rename(&src, &dst).map_err(io_err("move", &src))?;
        debug!(file = name, from = %from, to = %to, "moved file");
        Ok(dst)
    }

    pub fn delete(&self, state: FileState, name: &str) -> Result<(), StoreError> {
        let path = self.path(state, name)?;
        fs::remove_file(&path).map_err(io_err("delete", &path))?;
        debug!(state = %state, file = name, "deleted file");
        Ok(())
    }

    /// Set the modification time of `name` to now.
    pub fn touch(&self, state: FileState, name: &str) -> Result<(), StoreError> {
        let path = self.path(state, name)?;
        let file = fs::File::options()
            .write(true)
            .open(&path)
            .map_err(io_err("open", &path))?;
        file.set_modified(SystemTime::now())
            .map_err(io_err("touch", &path))
    }

    /// Index of everything currently in `sent`, for references naming `<ref><message_extension>`.
    pub fn load_sent_index(&self, message_extension: &str) -> Result<SentIndex, StoreError> {
        Ok(SentIndex::from_file_names(self.list(FileState::Sent)?, message_extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store() -> (tempfile::TempDir, FileStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(FolderPaths::under(dir.path())).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_all_folders() {
        let (dir, _store) = store();
        for state in FileState::ALL {
            assert!(dir.path().join(state.as_str()).is_dir());
        }
    }

    #[test]
    fn names_must_be_single_components() {
        let (_dir, store) = store();
        for bad in ["../../etc/passwd", "a/b", "/abs", "..", ".", "", ".hidden", "x/"] {
            assert!(
                matches!(store.path(FileState::Incoming, bad), Err(StoreError::InvalidName(_))),
                "{:?}",
                bad
            );
        }
        assert!(store.path(FileState::Incoming, "order-17.xml").is_ok());
    }

    #[test]
    fn write_move_delete() {
        let (_dir, store) = store();
        store.write(FileState::Outgoing, "a.xml", b"<a/>").unwrap();
        assert_eq!(store.list(FileState::Outgoing).unwrap(), vec!["a.xml"]);

        store.move_to("a.xml", FileState::Outgoing, FileState::Sent).unwrap();
        assert!(!store.contains(FileState::Outgoing, "a.xml"));
        assert_eq!(store.read(FileState::Sent, "a.xml").unwrap(), b"<a/>");

        store.delete(FileState::Sent, "a.xml").unwrap();
        assert!(store.list(FileState::Sent).unwrap().is_empty());
        assert!(store.delete(FileState::Sent, "a.xml").is_err());
    }

    #[test]
    fn list_skips_hidden_files_and_directories() {
        let (dir, store) = store();
        fs::write(dir.path().join("sent").join(".partial.tmp"), b"x").unwrap();
        fs::create_dir(dir.path().join("sent").join("sub")).unwrap();
        fs::write(dir.path().join("sent").join("b.xml"), b"x").unwrap();
        fs::write(dir.path().join("sent").join("a.xml"), b"x").unwrap();
        assert_eq!(store.list(FileState::Sent).unwrap(), vec!["a.xml", "b.xml"]);
        let index = store.load_sent_index(".xml").unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.validate("a").is_some());
    }

    #[test]
    fn write_replaces_existing() {
        let (_dir, store) = store();
        store.write(FileState::Incoming, "x.xml", b"one").unwrap();
        store.write(FileState::Incoming, "x.xml", b"two").unwrap();
        assert_eq!(store.read(FileState::Incoming, "x.xml").unwrap(), b"two");
        assert_eq!(store.list(FileState::Incoming).unwrap(), vec!["x.xml"]);
    }

    #[test]
    fn touch_refreshes_mtime() {
        let (_dir, store) = store();
        let path = store.write(FileState::Failed, "old.xml", b"x").unwrap();
        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options().write(true).open(&path).unwrap().set_modified(past).unwrap();
        store.touch(FileState::Failed, "old.xml").unwrap();
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(mtime > past + Duration::from_secs(1800));
    }
}
