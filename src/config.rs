//! # Config loader
//!
//! Reads the static JSON configuration, applies defaults, validates it, and
//! hands a frozen [`Config`] to the rest of the system. The client registry
//! inside it is read-only for the lifetime of the process — no runtime
//! reload is specified (spec.md §9); a future reload would be an atomic
//! swap of the `Arc<Config>` reference, not an in-place mutation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Destination allowlist token meaning "any registered client".
pub const WILDCARD: &str = "*";

pub const DEFAULT_SOCKET_MODE: u32 = 0o660;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 65536;
pub const DEFAULT_QUEUE_LIMIT: usize = 500;
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8787;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSpec {
    pub id: String,
    #[serde(rename = "keyHash")]
    pub key_hash: String,
    #[serde(rename = "canSendTo", default)]
    pub can_send_to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct RawConfig {
    #[serde(rename = "socketPath")]
    socket_path: Option<String>,
    #[serde(rename = "socketMode")]
    socket_mode: Option<String>,
    #[serde(rename = "httpHost")]
    http_host: Option<String>,
    #[serde(rename = "httpPort")]
    http_port: Option<u16>,
    #[serde(rename = "maxFrameBytes")]
    max_frame_bytes: Option<usize>,
    #[serde(rename = "queueLimit")]
    queue_limit: Option<usize>,
    #[serde(rename = "logFile")]
    log_file: Option<String>,
    clients: Option<Vec<ClientSpec>>,
    #[serde(rename = "adminTokenHash")]
    admin_token_hash: Option<String>,
}

/// Immutable client descriptor, read-only after load.
#[derive(Debug, Clone)]
pub struct ClientDescriptor {
    pub id: String,
    pub key_hash: String,
    pub can_send_to: HashSet<String>,
}

impl ClientDescriptor {
    /// Whether this client's allowlist permits routing to `target`.
    pub fn can_route_to(&self, target: &str) -> bool {
        self.can_send_to.contains(WILDCARD) || self.can_send_to.contains(target)
    }
}

/// Read-only snapshot of all provisioned clients, keyed by identifier.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientDescriptor>,
}

impl ClientRegistry {
    pub fn get(&self, id: &str) -> Option<&ClientDescriptor> {
        self.clients.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientDescriptor> {
        self.clients.values()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Frozen runtime configuration, handed out by reference to every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    pub socket_mode: u32,
    pub http_host: String,
    pub http_port: u16,
    pub max_frame_bytes: usize,
    pub queue_limit: usize,
    pub log_file: Option<PathBuf>,
    pub registry: ClientRegistry,
    pub admin_token_hash: Option<String>,
}

impl Config {
    /// Load and validate a config file at `path`, applying defaults for
    /// missing optional fields. Every failure here is fatal at startup.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let raw_text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {e}", path.display())))?;
        let raw: RawConfig =
            serde_json::from_str(&raw_text).map_err(ConfigError::InvalidJson)?;
        Self::from_raw(raw, path)
    }

    fn from_raw(raw: RawConfig, config_path: &Path) -> Result<Self, ConfigError> {
        let specs = raw.clients.unwrap_or_default();
        if specs.is_empty() {
            return Err(ConfigError::EmptyClients);
        }

        let mut clients = HashMap::with_capacity(specs.len());
        for (idx, spec) in specs.into_iter().enumerate() {
            if spec.id.trim().is_empty() {
                return Err(ConfigError::MissingClientId(idx));
            }
            if spec.key_hash.trim().is_empty() {
                return Err(ConfigError::MissingKeyHash(idx));
            }
            if clients.contains_key(&spec.id) {
                return Err(ConfigError::DuplicateClientId(spec.id));
            }
            let descriptor = ClientDescriptor {
                id: spec.id.clone(),
                key_hash: spec.key_hash,
                can_send_to: spec.can_send_to.into_iter().collect(),
            };
            clients.insert(spec.id, descriptor);
        }

        let runtime_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

        let socket_mode = match raw.socket_mode {
            Some(s) => u32::from_str_radix(s.trim_start_matches("0o"), 8)
                .unwrap_or(DEFAULT_SOCKET_MODE),
            None => DEFAULT_SOCKET_MODE,
        };

        Ok(Config {
            socket_path: raw
                .socket_path
                .map(PathBuf::from)
                .unwrap_or_else(|| runtime_dir.join("bridge.sock")),
            socket_mode,
            http_host: raw.http_host.unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            http_port: raw.http_port.unwrap_or(DEFAULT_HTTP_PORT),
            max_frame_bytes: raw.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES),
            queue_limit: raw.queue_limit.unwrap_or(DEFAULT_QUEUE_LIMIT),
            log_file: raw.log_file.map(PathBuf::from),
            registry: ClientRegistry { clients },
            admin_token_hash: raw.admin_token_hash,
        })
    }

    /// Apply environment-variable overrides (spec.md §6). Called after
    /// `load` with values already resolved by the CLI layer.
    pub fn with_overrides(mut self, socket_path: Option<PathBuf>, admin_token_plain: Option<String>) -> Self {
        if let Some(p) = socket_path {
            self.socket_path = p;
        }
        if let Some(token) = admin_token_plain {
            self.admin_token_hash = Some(crate::util::hash_secret(&token));
        }
        self
    }
}
