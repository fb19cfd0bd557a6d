/*
 * main.rs
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

//! casella CLI: upload the outgoing folder and drain the remote queues into local folders.

mod logging;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::thread;

use casella_core::config::{
    default_config_path, load_config, read_config, save_keychain_password, BridgeConfig, ConfigError,
};
use casella_core::envelope::load_template;
use casella_core::localstorage::FileStateStore;
use casella_core::{Bridge, QueueType, SoapQueueClient, StartupError};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "casella")]
#[command(version, about = "Bridge a local outbox/inbox folder tree with a remote message queue", long_about = None)]
struct Cli {
    /// Configuration file (default ~/.casella/config.xml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload outgoing, then drain every queue
    Run,

    /// Upload outgoing only
    Upload,

    /// Drain one queue (confirmation, assessment, image, outgoing-ack)
    Drain {
        #[arg(value_parser = parse_drainable)]
        queue: QueueType,
    },

    /// Validate the configuration and create the folders
    CheckConfig,

    /// Store the password read from stdin in the system keychain for the configured user
    SetPassword,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("no configuration path given and HOME is not set")]
    NoConfigPath,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("cannot open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot install logger: {0}")]
    Logging(String),
    #[error("cannot read password from stdin: {0}")]
    Stdin(#[source] io::Error),
    #[error("no password given on stdin")]
    EmptyPassword,
}

fn parse_drainable(s: &str) -> Result<QueueType, String> {
    match QueueType::parse(s) {
        Some(QueueType::Outgoing) => Err("the outgoing queue is written by `upload`, not drained".to_string()),
        Some(q) => Ok(q),
        None => Err(format!("unknown queue {:?}", s)),
    }
}

fn check_config(config: &BridgeConfig) -> Result<(), CliError> {
    FileStateStore::open(config.folders.clone()).map_err(StartupError::from)?;
    load_template(config.template_path.as_deref()).map_err(|source| StartupError::Template {
        path: config.template_path.clone().unwrap_or_default(),
        source,
    })?;
    println!("endpoint: {}", config.endpoint);
    println!("company: {}, user: {}", config.credentials.company, config.credentials.user);
    println!("outgoing: {}", config.folders.outgoing.display());
    println!("sent: {}", config.folders.sent.display());
    println!("incoming: {}", config.folders.incoming.display());
    println!("failed: {}", config.folders.failed.display());
    println!("outgoing type: {}", config.outgoing_type);
    for queue in [QueueType::Outgoing].into_iter().chain(QueueType::DRAIN_ORDER) {
        println!("{} queue: {}", queue, config.queue_names.wire_name(queue));
    }
    Ok(())
}

/// First line of `input`, without its line ending.
fn read_password(mut input: impl BufRead) -> Result<String, CliError> {
    let mut line = String::new();
    input.read_line(&mut line).map_err(CliError::Stdin)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::EmptyPassword);
    }
    Ok(password.to_string())
}

fn set_password(config: &BridgeConfig) -> Result<(), CliError> {
    let user = &config.credentials.user;
    eprintln!("password for {}@{}:", user, config.endpoint);
    let password = read_password(io::stdin().lock())?;
    save_keychain_password(user, &config.endpoint, &password)?;
    println!("password stored in keychain for {}@{}", user, config.endpoint);
    Ok(())
}

fn execute(cli: Cli) -> Result<(), CliError> {
    let path = match cli.config {
        Some(p) => p,
        None => default_config_path().ok_or(CliError::NoConfigPath)?,
    };
    if let Commands::SetPassword = cli.command {
        return set_password(&read_config(&path)?);
    }
    let config = load_config(&path)?;
    logging::init(config.log_level, config.log_file.as_deref())?;
    info!(config = %path.display(), "casella starting");

    if let Commands::CheckConfig = cli.command {
        return check_config(&config);
    }

    let bridge = Bridge::from_config(&config, SoapQueueClient::from_config(&config))?;
    match cli.command {
        Commands::Run => {
            let report = bridge.run();
            println!("{}", report);
        }
        Commands::Upload => {
            let outcome = bridge.upload();
            println!("{}", outcome.report);
        }
        Commands::Drain { queue } => {
            let sent_index = bridge.sent_index();
            if let Some(report) = bridge.drain_queue(queue, &sent_index) {
                println!("{}", report);
            }
        }
        Commands::CheckConfig | Commands::SetPassword => {}
    }

    if !config.exit_delay.is_zero() {
        thread::sleep(config.exit_delay);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
