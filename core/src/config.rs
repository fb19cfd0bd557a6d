/*
 * config.rs
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

//! Bridge configuration: one XML file (default ~/.casella/config.xml) read with the quick_xml
//! event reader. When the file has no password it is looked up in the system keychain.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keyring::Entry;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::envelope::MessageType;
use crate::localstorage::{FileExtensions, FileState, FolderPaths};
use crate::queue::{QueueNames, QueueType};

/// Service name for keyring entries (account is `<user>@<endpoint>`).
const KEYRING_SERVICE: &str = "casella";

pub const CONFIG_FILE_NAME: &str = "config.xml";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XML parse error: {0}")]
    Xml(String),
    #[error("missing required setting <{0}>")]
    Missing(&'static str),
    #[error("invalid value {value:?} for <{key}>")]
    Invalid { key: &'static str, value: String },
    #[error("no password configured and keychain lookup failed: {0}")]
    Keychain(String),
}

/// Default config directory: ~/.casella.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".casella"))
}

pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Logging verbosity. 0 keeps errors and warnings, 2 adds envelope dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(LogLevel::Warn),
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Debug),
            _ => None,
        }
    }

    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Remote queue credentials, sent with every call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub company: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("company", &self.company)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// SOAP service URL.
    pub endpoint: String,
    /// SOAP operation namespace; also the SOAPAction prefix.
    pub namespace: String,
    pub credentials: Credentials,
    pub folders: FolderPaths,
    pub extensions: FileExtensions,
    /// Envelope template; the built-in one when unset.
    pub template_path: Option<PathBuf>,
    pub outgoing_type: MessageType,
    /// Wire name of each queue; uploads default to the queue of `outgoing_type`.
    pub queue_names: QueueNames,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub timeout: Duration,
    /// Pause before the process exits.
    pub exit_delay: Duration,
}

pub const DEFAULT_NAMESPACE: &str = "http://tempuri.org/";

/// Raw values as found in the file, before defaults and validation.
#[derive(Debug, Default)]
struct RawConfig {
    endpoint: Option<String>,
    namespace: Option<String>,
    company: Option<String>,
    user: Option<String>,
    password: Option<String>,
    root: Option<String>,
    outgoing: Option<String>,
    sent: Option<String>,
    incoming: Option<String>,
    failed: Option<String>,
    message_extension: Option<String>,
    metadata_extension: Option<String>,
    image_extension: Option<String>,
    template: Option<String>,
    outgoing_type: Option<String>,
    outgoing_queue: Option<String>,
    confirmation_queue: Option<String>,
    assessment_queue: Option<String>,
    image_queue: Option<String>,
    outgoing_ack_queue: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    timeout_secs: Option<String>,
    exit_delay_secs: Option<String>,
}

impl RawConfig {
    /// Slot for the element at `path` (names below the document root).
    fn slot(&mut self, path: &[Vec<u8>]) -> Option<&mut Option<String>> {
        let slot = match path {
            [key] => match key.as_slice() {
                b"endpoint" => &mut self.endpoint,
                b"namespace" => &mut self.namespace,
                b"company" => &mut self.company,
                b"user" => &mut self.user,
                b"password" => &mut self.password,
                b"root" => &mut self.root,
                b"messageExtension" => &mut self.message_extension,
                b"metadataExtension" => &mut self.metadata_extension,
                b"imageExtension" => &mut self.image_extension,
                b"template" => &mut self.template,
                b"outgoingType" => &mut self.outgoing_type,
                b"logLevel" => &mut self.log_level,
                b"logFile" => &mut self.log_file,
                b"timeoutSecs" => &mut self.timeout_secs,
                b"exitDelaySecs" => &mut self.exit_delay_secs,
                _ => return None,
            },
            [group, key] if group.as_slice() == b"folders" => match key.as_slice() {
                b"outgoing" => &mut self.outgoing,
                b"sent" => &mut self.sent,
                b"incoming" => &mut self.incoming,
                b"failed" => &mut self.failed,
                _ => return None,
            },
            [group, key] if group.as_slice() == b"queues" => match key.as_slice() {
                b"outgoing" => &mut self.outgoing_queue,
                b"confirmation" => &mut self.confirmation_queue,
                b"assessment" => &mut self.assessment_queue,
                b"image" => &mut self.image_queue,
                b"outgoingAck" => &mut self.outgoing_ack_queue,
                _ => return None,
            },
            _ => return None,
        };
        Some(slot)
    }
}

fn parse_raw(content: &str) -> Result<RawConfig, ConfigError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut raw = RawConfig::default();
    // Element names below the document root.
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Err(e) => return Err(ConfigError::Xml(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                if depth > 0 {
                    path.push(e.local_name().as_ref().to_vec());
                }
                depth += 1;
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| ConfigError::Xml(e.to_string()))?;
                if let Some(slot) = raw.slot(&path) {
                    *slot = Some(text.trim().to_string());
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).trim().to_string();
                if let Some(slot) = raw.slot(&path) {
                    *slot = Some(text);
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ConfigError::Xml("unclosed element".into()));
    }
    Ok(raw)
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn resolve(base: &Path, value: &str) -> PathBuf {
    let p = Path::new(value);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn parse_secs(key: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    match non_empty(value) {
        None => Ok(Duration::from_secs(default)),
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

/// Parse configuration text. Relative paths resolve against `base_dir`. A missing password
/// is left empty; `load_config` fills it from the keychain.
pub fn parse_config(content: &str, base_dir: &Path) -> Result<BridgeConfig, ConfigError> {
    let raw = parse_raw(content)?;

    let endpoint = non_empty(raw.endpoint).ok_or(ConfigError::Missing("endpoint"))?;
    let company = non_empty(raw.company).ok_or(ConfigError::Missing("company"))?;
    let user = non_empty(raw.user).ok_or(ConfigError::Missing("user"))?;

    let root = non_empty(raw.root)
        .map(|r| resolve(base_dir, &r))
        .unwrap_or_else(|| base_dir.to_path_buf());
    let folder = |value: Option<String>, state: FileState| {
        non_empty(value)
            .map(|v| resolve(&root, &v))
            .unwrap_or_else(|| root.join(state.as_str()))
    };
    let folders = FolderPaths {
        outgoing: folder(raw.outgoing, FileState::Outgoing),
        sent: folder(raw.sent, FileState::Sent),
        incoming: folder(raw.incoming, FileState::Incoming),
        failed: folder(raw.failed, FileState::Failed),
    };

    let defaults = FileExtensions::default();
    let extensions = FileExtensions {
        message: non_empty(raw.message_extension).unwrap_or(defaults.message),
        metadata: non_empty(raw.metadata_extension).unwrap_or(defaults.metadata),
        image: non_empty(raw.image_extension).unwrap_or(defaults.image),
    };

    let outgoing_type = match non_empty(raw.outgoing_type) {
        None => MessageType::Mail,
        Some(v) => MessageType::parse(&v).ok_or(ConfigError::Invalid {
            key: "outgoingType",
            value: v,
        })?,
    };
    let mut queue_names = QueueNames::for_outgoing_type(outgoing_type);
    for (queue, value) in [
        (QueueType::Outgoing, raw.outgoing_queue),
        (QueueType::Confirmation, raw.confirmation_queue),
        (QueueType::Assessment, raw.assessment_queue),
        (QueueType::Image, raw.image_queue),
        (QueueType::OutgoingAck, raw.outgoing_ack_queue),
    ] {
        if let Some(name) = non_empty(value) {
            *queue_names.wire_name_mut(queue) = name;
        }
    }
    let log_level = match non_empty(raw.log_level) {
        None => LogLevel::default(),
        Some(v) => v
            .parse::<u8>()
            .ok()
            .and_then(LogLevel::from_number)
            .ok_or(ConfigError::Invalid { key: "logLevel", value: v })?,
    };

    Ok(BridgeConfig {
        endpoint,
        namespace: non_empty(raw.namespace).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        credentials: Credentials {
            company,
            user,
            password: raw.password.unwrap_or_default(),
        },
        folders,
        extensions,
        template_path: non_empty(raw.template).map(|t| resolve(base_dir, &t)),
        outgoing_type,
        queue_names,
        log_level,
        log_file: non_empty(raw.log_file).map(|f| resolve(base_dir, &f)),
        timeout: parse_secs("timeoutSecs", raw.timeout_secs, DEFAULT_TIMEOUT_SECS)?,
        exit_delay: parse_secs("exitDelaySecs", raw.exit_delay_secs, 0)?,
    })
}

fn keychain_account(user: &str, endpoint: &str) -> String {
    format!("{}@{}", user, endpoint)
}

/// Password stored in the system keychain for this user and endpoint.
pub fn keychain_password(user: &str, endpoint: &str) -> Result<String, ConfigError> {
    let entry = Entry::new(KEYRING_SERVICE, &keychain_account(user, endpoint))
        .map_err(|e| ConfigError::Keychain(e.to_string()))?;
    entry.get_password().map_err(|e| ConfigError::Keychain(e.to_string()))
}

/// Store the password in the system keychain so the config file can omit it.
pub fn save_keychain_password(user: &str, endpoint: &str, password: &str) -> Result<(), ConfigError> {
    let entry = Entry::new(KEYRING_SERVICE, &keychain_account(user, endpoint))
        .map_err(|e| ConfigError::Keychain(e.to_string()))?;
    entry
        .set_password(password)
        .map_err(|e| ConfigError::Keychain(e.to_string()))
}

/// Read and validate the configuration at `path` without consulting the keychain.
pub fn read_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    parse_config(&content, &base_dir)
}

/// Read and validate the configuration at `path`, taking a missing password from the keychain.
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let mut config = read_config(path)?;
    if config.credentials.password.is_empty() {
        config.credentials.password = keychain_password(&config.credentials.user, &config.endpoint)?;
    }
    Ok(config)
}
