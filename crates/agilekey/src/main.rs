// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! agilekey - read and edit Agile Keychain password vaults.
//!
//! This is the binary entry point.

mod commands;

use std::path::PathBuf;

use agilekey_vault::{get_master_password, get_new_master_password};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{NewLogin, VaultLocation};

/// agilekey - read and edit Agile Keychain password vaults.
#[derive(Parser, Debug)]
#[command(name = "agilekey", version, about, long_about = None)]
struct Cli {
    /// Path of the `.agilekeychain` directory. Overrides `vault.path`.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new, empty vault.
    Create {
        /// Password hint stored next to the key file.
        #[arg(long, default_value = "")]
        hint: String,
        /// PBKDF2 iterations for the master key. Defaults to `vault.iterations`.
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// List items from the vault index.
    List {
        /// Include deletion markers.
        #[arg(long)]
        tombstones: bool,
    },
    /// Decrypt and print one item.
    Show {
        uuid: String,
        /// Print the password instead of masking it.
        #[arg(long)]
        reveal: bool,
    },
    /// Add a login item.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Move an item to the trash.
    Trash { uuid: String },
    /// Change the master password.
    Passwd {
        /// New password hint. The current hint is kept when omitted.
        #[arg(long)]
        hint: Option<String>,
        /// Re-wrap keys with this many PBKDF2 iterations.
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Print the password hint.
    Hint,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agilekey={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match agilekey_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            agilekey_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log.level);

    let path = cli
        .vault
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.vault.path));
    let location = VaultLocation::new(&path);
    let read_only = config.vault.read_only;

    let result = match cli.command {
        Commands::Create { hint, iterations } => match get_new_master_password() {
            Ok(password) => {
                let iterations = iterations.unwrap_or(config.vault.iterations);
                commands::create(&location, &password, &hint, iterations).await
            }
            Err(e) => Err(e),
        },
        Commands::List { tombstones } => {
            let vault = location.open(read_only);
            commands::list(&vault, tombstones).await
        }
        Commands::Show { uuid, reveal } => match get_master_password("Master password: ") {
            Ok(password) => {
                let vault = location.open(read_only);
                commands::show(&vault, &password, &uuid, reveal).await
            }
            Err(e) => Err(e),
        },
        Commands::Add {
            title,
            url,
            username,
            password: item_password,
        } => match get_master_password("Master password: ") {
            Ok(password) => {
                let vault = location.open(read_only);
                let login = NewLogin {
                    title,
                    url,
                    username,
                    password: item_password,
                };
                commands::add(&vault, &password, login).await
            }
            Err(e) => Err(e),
        },
        Commands::Trash { uuid } => match get_master_password("Master password: ") {
            Ok(password) => {
                let vault = location.open(read_only);
                commands::trash(&vault, &password, &uuid).await
            }
            Err(e) => Err(e),
        },
        Commands::Passwd { hint, iterations } => {
            let passwords = get_master_password("Current master password: ")
                .and_then(|old| get_new_master_password().map(|new| (old, new)));
            match passwords {
                Ok((old, new)) => {
                    let vault = location.open(read_only);
                    commands::passwd(&vault, &old, &new, hint.as_deref(), iterations).await
                }
                Err(e) => Err(e),
            }
        }
        Commands::Hint => {
            let vault = location.open(read_only);
            commands::hint(&vault).await
        }
    };

    if let Err(e) = result {
        eprintln!("agilekey: {e}");
        std::process::exit(1);
    }
}
