// Obscura — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, serve, register, check, passwd, unregister,
// add-key, list-keys, delete-key.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Obscura — a credential-gated vault for client-encrypted keys.
#[derive(Parser, Debug)]
#[command(name = "obscura")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: <config_dir>/obscura/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and write a default config file if none exists.
    Init,

    /// Start the vault server on the configured Unix socket.
    Serve,

    /// Register a new account.
    Register {
        /// Credentials as `address:password`.
        #[arg(long)]
        credentials: String,
    },

    /// Check whether credentials match an account.
    Check {
        /// Credentials as `address:password`.
        #[arg(long)]
        credentials: String,
    },

    /// Change the password of an account.
    Passwd {
        /// Current credentials as `address:password`.
        #[arg(long)]
        credentials: String,

        /// The replacement password.
        #[arg(long)]
        new_password: String,
    },

    /// Delete an account. It must not own any key records.
    Unregister {
        /// Credentials as `address:password`.
        #[arg(long)]
        credentials: String,
    },

    /// Store an encrypted key record. All blobs are standard base64.
    AddKey {
        /// Credentials as `address:password`.
        #[arg(long)]
        credentials: String,

        #[arg(long)]
        encrypted_key: String,

        #[arg(long)]
        key_iv: String,

        #[arg(long)]
        encrypted_data: String,

        #[arg(long)]
        data_iv: String,
    },

    /// List the key records of an account, newest first.
    ListKeys {
        /// Credentials as `address:password`.
        #[arg(long)]
        credentials: String,
    },

    /// Delete one key record by ID.
    DeleteKey {
        /// The UUID of the record to delete.
        id: String,

        /// Credentials of the owning account as `address:password`.
        #[arg(long)]
        credentials: String,
    },
}
