// Obscura — Unix Domain Socket Server
//
// Newline-delimited JSON-RPC 2.0 over a Unix socket. Each connection runs in
// its own tokio task; each request runs on the blocking pool with a fresh
// deadline, since every vault call hashes or waits on SQLite.
//
// Methods:
//   users.create, users.check, users.update_password, users.delete
//   keys.add, keys.list, keys.delete
//
// Every method authenticates with either `credentials: "address:password"`
// or the pair `user_address` + `password`. Key blobs travel as standard
// base64.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::config::ServerConfig;
use crate::credentials::Credentials;
use crate::deadline::Deadline;
use crate::store::{KeyPayload, KeyRecord};
use crate::vault::{VaultError, VaultService};

use super::protocol::{JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND};

/// Unix Domain Socket server for the vault.
pub struct UdsServer {
    service: Arc<VaultService>,
    socket_path: PathBuf,
    socket_mode: u32,
    request_timeout: Duration,
    connections: Arc<Semaphore>,
}

impl UdsServer {
    pub fn new(service: Arc<VaultService>, config: &ServerConfig) -> Self {
        Self {
            service,
            socket_path: config.socket_path.clone(),
            socket_mode: config.socket_mode,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            connections: Arc::new(Semaphore::new(config.max_connections.max(1))),
        }
    }

    /// Serve until Ctrl-C.
    pub async fn run(&self) -> io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve until `shutdown` completes, then remove the socket file.
    /// Connections already accepted finish on their own.
    pub async fn run_until<F>(&self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        tracing::info!(
            socket = %self.socket_path.display(),
            max_connections = self.connections.available_permits(),
            "Obscura UDS server listening"
        );

        tokio::pin!(shutdown);

        loop {
            // Hold a permit before accepting so excess clients queue in the backlog
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.connections.clone().acquire_owned() => {
                    permit.map_err(io::Error::other)?
                }
            };

            let stream = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => stream,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            let service = self.service.clone();
            let timeout = self.request_timeout;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, service, timeout).await {
                    tracing::error!(error = %e, "Connection handler error");
                }
                drop(permit);
            });
        }

        tracing::info!("Shutting down UDS server");
        if let Err(e) = tokio::fs::remove_file(&self.socket_path).await {
            tracing::warn!(error = %e, "Failed to remove socket file");
        }
        Ok(())
    }

    async fn bind(&self) -> io::Result<UnixListener> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove stale socket file if it exists
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(self.socket_mode);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        Ok(listener)
    }
}

/// Handle a single client connection.
/// Reads newline-delimited JSON-RPC requests and writes responses.
async fn handle_connection(
    stream: UnixStream,
    service: Arc<VaultService>,
    timeout: Duration,
) -> io::Result<()> {
    match stream.peer_cred() {
        Ok(cred) => tracing::info!(uid = cred.uid(), pid = ?cred.pid(), "Client connected"),
        Err(e) => tracing::debug!(error = %e, "Peer credentials unavailable"),
    }

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let deadline = Deadline::after(timeout);
        let worker_service = service.clone();
        let response =
            match tokio::task::spawn_blocking(move || process_request(&line, &worker_service, &deadline)).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "Request worker failed");
                    JsonRpcResponse::error(Value::Null, INTERNAL_ERROR, "Internal error")
                }
            };

        let mut json = serde_json::to_string(&response).map_err(io::Error::other)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    tracing::debug!("Client disconnected");
    Ok(())
}

/// Parse and dispatch a single JSON-RPC request.
fn process_request(raw: &str, service: &VaultService, deadline: &Deadline) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let params = &request.params;
    let result = match request.method.as_str() {
        "users.create" => handle_create_user(service, params, deadline),
        "users.check" => handle_check_user(service, params, deadline),
        "users.update_password" => handle_update_password(service, params, deadline),
        "users.delete" => handle_delete_user(service, params, deadline),
        "keys.add" => handle_add_key(service, params, deadline),
        "keys.list" => handle_list_keys(service, params, deadline),
        "keys.delete" => handle_delete_key(service, params, deadline),
        _ => {
            return JsonRpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            )
        }
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(e) => JsonRpcResponse::from_vault_error(request.id, &e),
    }
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

fn handle_create_user(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    let account = service.register(&credentials, deadline)?;
    Ok(json!({
        "id": account.id,
        "address": account.address,
        "created_at": account.created_at.to_rfc3339(),
    }))
}

fn handle_check_user(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    let exists = service.check_account(&credentials, deadline)?;
    Ok(json!({ "exists": exists }))
}

fn handle_update_password(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    let new_password = extract_str(params, "new_password")?;
    service.change_password(&credentials, new_password, deadline)?;
    Ok(json!({ "updated": true }))
}

fn handle_delete_user(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    service.delete_account(&credentials, deadline)?;
    Ok(json!({ "deleted": true }))
}

fn handle_add_key(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    let payload = KeyPayload {
        encrypted_key: extract_bytes(params, "encrypted_key")?,
        key_iv: extract_bytes(params, "key_iv")?,
        encrypted_data: extract_bytes(params, "encrypted_data")?,
        data_iv: extract_bytes(params, "data_iv")?,
    };
    let record = service.add_key(&credentials, &payload, deadline)?;
    Ok(record_to_json(&record))
}

fn handle_list_keys(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    let records = service.list_keys(&credentials, deadline)?;
    Ok(Value::Array(records.iter().map(record_to_json).collect()))
}

fn handle_delete_key(service: &VaultService, params: &Value, deadline: &Deadline) -> Result<Value, VaultError> {
    let credentials = extract_credentials(params)?;
    let record_id = extract_uuid(params)?;
    service.delete_key(&record_id, &credentials, deadline)?;
    Ok(json!({ "deleted": true, "id": record_id.to_string() }))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn extract_credentials(params: &Value) -> Result<Credentials, VaultError> {
    if let Some(raw) = params.get("credentials").and_then(|v| v.as_str()) {
        return Ok(Credentials::parse(raw)?);
    }

    match (
        params.get("user_address").and_then(|v| v.as_str()),
        params.get("password").and_then(|v| v.as_str()),
    ) {
        (Some(address), Some(password)) => Ok(Credentials::new(address, password)?),
        _ => Err(VaultError::InvalidInput(
            "missing 'credentials' or 'user_address'/'password'".into(),
        )),
    }
}

fn extract_str<'a>(params: &'a Value, name: &str) -> Result<&'a str, VaultError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| VaultError::InvalidInput(format!("missing '{}'", name)))
}

fn extract_bytes(params: &Value, name: &str) -> Result<Vec<u8>, VaultError> {
    let encoded = extract_str(params, name)?;
    STANDARD
        .decode(encoded)
        .map_err(|e| VaultError::InvalidInput(format!("'{}' is not valid base64: {}", name, e)))
}

fn extract_uuid(params: &Value) -> Result<uuid::Uuid, VaultError> {
    let id_str = extract_str(params, "id")?;
    uuid::Uuid::parse_str(id_str).map_err(|e| VaultError::InvalidInput(format!("Invalid UUID: {}", e)))
}

fn record_to_json(record: &KeyRecord) -> Value {
    json!({
        "id": record.id.to_string(),
        "address": record.address,
        "encrypted_key": STANDARD.encode(&record.payload.encrypted_key),
        "key_iv": STANDARD.encode(&record.payload.key_iv),
        "encrypted_data": STANDARD.encode(&record.payload.encrypted_data),
        "data_iv": STANDARD.encode(&record.payload.data_iv),
        "created_at": record.created_at.to_rfc3339(),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
