// Obscura — CLI Command Handlers
//
// Each function handles one CLI subcommand. Account and key commands run
// the same vault service the socket server uses, against the configured
// database, with the configured request timeout as their deadline.

use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::config::Config;
use crate::credentials::{Argon2Hasher, Credentials};
use crate::deadline::Deadline;
use crate::error::{ObscuraError, Result};
use crate::gateway::UdsServer;
use crate::store::{Database, KeyPayload, SqliteAccountStore, SqliteKeyStore};
use crate::vault::VaultService;

use super::{Cli, Commands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Init => cmd_init(&config, cli.config.as_deref()),
        Commands::Serve => cmd_serve(&config).await,
        Commands::Register { credentials } => cmd_register(&config, &credentials),
        Commands::Check { credentials } => cmd_check(&config, &credentials),
        Commands::Passwd {
            credentials,
            new_password,
        } => cmd_passwd(&config, &credentials, &new_password),
        Commands::Unregister { credentials } => cmd_unregister(&config, &credentials),
        Commands::AddKey {
            credentials,
            encrypted_key,
            key_iv,
            encrypted_data,
            data_iv,
        } => {
            let payload = KeyPayload {
                encrypted_key: decode_arg("--encrypted-key", &encrypted_key)?,
                key_iv: decode_arg("--key-iv", &key_iv)?,
                encrypted_data: decode_arg("--encrypted-data", &encrypted_data)?,
                data_iv: decode_arg("--data-iv", &data_iv)?,
            };
            cmd_add_key(&config, &credentials, &payload)
        }
        Commands::ListKeys { credentials } => cmd_list_keys(&config, &credentials),
        Commands::DeleteKey { id, credentials } => cmd_delete_key(&config, &id, &credentials),
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let _db = open_database(config)?;

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);
    let wrote_config = write_default_config(&config_path, config)?;

    println!("✓ Obscura initialized successfully");
    println!("  Database: {}", config.database.path.display());
    if wrote_config {
        println!("  Config:   {} (new)", config_path.display());
    } else {
        println!("  Config:   {}", config_path.display());
    }
    println!();
    println!("Next: register an account with `obscura register --credentials <address>:<password>`");

    Ok(())
}

/// Write `config` to `path` unless a file is already there.
fn write_default_config(path: &Path, config: &Config) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| ObscuraError::Other(format!("Failed to encode config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(true)
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(config: &Config) -> Result<()> {
    let service = open_service(config)?;

    println!(
        "Starting Obscura UDS server at {}...",
        config.server.socket_path.display()
    );

    let server = UdsServer::new(service, &config.server);
    server.run().await?;

    Ok(())
}

// ─── Accounts ────────────────────────────────────────────────────────────────

fn cmd_register(config: &Config, raw: &str) -> Result<()> {
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    let account = service.register(&credentials, &deadline(config))?;
    println!("✓ Account registered");
    println!("  ID:      {}", account.id);
    println!("  Address: {}", account.address);

    Ok(())
}

fn cmd_check(config: &Config, raw: &str) -> Result<()> {
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    if service.check_account(&credentials, &deadline(config))? {
        println!("✓ Credentials match account {}", credentials.address());
    } else {
        println!("No account matches these credentials.");
    }

    Ok(())
}

fn cmd_passwd(config: &Config, raw: &str, new_password: &str) -> Result<()> {
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    service.change_password(&credentials, new_password, &deadline(config))?;
    println!("✓ Password updated for {}", credentials.address());

    Ok(())
}

fn cmd_unregister(config: &Config, raw: &str) -> Result<()> {
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    service.delete_account(&credentials, &deadline(config))?;
    println!("✓ Account {} deleted", credentials.address());

    Ok(())
}

// ─── Keys ────────────────────────────────────────────────────────────────────

fn cmd_add_key(config: &Config, raw: &str, payload: &KeyPayload) -> Result<()> {
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    let record = service.add_key(&credentials, payload, &deadline(config))?;
    println!("✓ Key stored");
    println!("  ID:      {}", record.id);
    println!("  Address: {}", record.address);

    Ok(())
}

fn cmd_list_keys(config: &Config, raw: &str) -> Result<()> {
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    let records = service.list_keys(&credentials, &deadline(config))?;

    if records.is_empty() {
        println!("No keys stored for {}.", credentials.address());
        return Ok(());
    }

    println!("Stored keys ({}):\n", records.len());
    for record in &records {
        println!(
            "  {} │ {:>6} bytes │ {}",
            record.id,
            record.payload.encrypted_data.len(),
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }

    Ok(())
}

fn cmd_delete_key(config: &Config, id_str: &str, raw: &str) -> Result<()> {
    let id = Uuid::parse_str(id_str)
        .map_err(|e| ObscuraError::Other(format!("Invalid UUID: {}", e)))?;
    let credentials = parse_credentials(raw)?;
    let service = open_service(config)?;

    service.delete_key(&id, &credentials, &deadline(config))?;
    println!("✓ Key {} deleted", id);

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn open_database(config: &Config) -> Result<Arc<Database>> {
    let db = Database::open(
        &config.database.path,
        config.database.pool_size,
        config.busy_timeout(),
    )?;
    Ok(Arc::new(db))
}

/// Wire the stores, hasher and vault service from config.
fn open_service(config: &Config) -> Result<Arc<VaultService>> {
    let db = open_database(config)?;
    let hasher = Argon2Hasher::new(
        config.hashing.memory_kib,
        config.hashing.iterations,
        config.hashing.parallelism,
    )?;

    let accounts = Arc::new(SqliteAccountStore::new(db.clone(), Arc::new(hasher)));
    let keys = Arc::new(SqliteKeyStore::new(db));
    let span = tracing::info_span!("vault", db = %config.database.path.display());

    Ok(Arc::new(VaultService::new(accounts, keys, span)))
}

fn parse_credentials(raw: &str) -> Result<Credentials> {
    Credentials::parse(raw).map_err(|e| ObscuraError::Other(format!("Invalid --credentials: {}", e)))
}

fn decode_arg(flag: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| ObscuraError::Other(format!("Invalid base64 for {}: {}", flag, e)))
}

fn deadline(config: &Config) -> Deadline {
    Deadline::after(config.request_timeout())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
