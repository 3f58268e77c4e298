//! Typed resource records for the panel API
//!
//! Each record maps one resource's `attributes` object. Records are flat;
//! fragments shared between resources (limits, feature limits) are embedded
//! structs rather than parent classes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One-time websocket credentials for a server's console channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketAuth {
    pub token: String,
    pub socket: String,
}

/// The account behind the client API key in use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: u32,
    pub admin: bool,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub identifier: String,
    pub description: String,
    pub allowed_ips: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// A user granted access to someone else's server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubUser {
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub image: Option<String>,
    pub permissions: Vec<String>,
    #[serde(rename = "2fa_enabled")]
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Build resource limits shared by server records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    pub memory: i64,
    pub disk: i64,
    pub swap: i64,
    pub io: Option<i64>,
    pub cpu: i64,
    pub threads: Option<String>,
    pub oom_disabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureLimits {
    pub allocations: u32,
    pub backups: u32,
    pub databases: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpDetails {
    pub ip: String,
    pub port: u16,
}

/// A server as seen through the client API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientServer {
    pub server_owner: bool,
    pub identifier: String,
    pub internal_id: u32,
    pub uuid: String,
    pub name: String,
    pub node: String,
    pub description: Option<String>,
    pub sftp_details: SftpDetails,
    pub limits: Limits,
    pub feature_limits: FeatureLimits,
    pub invocation: Option<String>,
    pub docker_image: Option<String>,
    pub egg_features: Option<Vec<String>>,
    pub status: Option<String>,
    pub is_suspended: bool,
    pub is_installing: bool,
    pub is_transferring: bool,
}

/// Live resource usage reported by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resources {
    pub memory_bytes: u64,
    pub cpu_absolute: f64,
    pub disk_bytes: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub current_state: String,
    pub is_suspended: bool,
    pub resources: Resources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub uuid: String,
    pub name: String,
    pub is_successful: bool,
    pub is_locked: bool,
    pub ignored_files: Vec<String>,
    pub checksum: Option<String>,
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A port binding as seen through the client API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAllocation {
    pub id: u32,
    pub ip: String,
    pub ip_alias: Option<String>,
    pub port: u16,
    pub notes: Option<String>,
    pub is_default: bool,
}

/// A panel user as seen through the application API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub external_id: Option<String>,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub language: String,
    pub root_admin: bool,
    #[serde(rename = "2fa")]
    pub two_factor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub startup_command: String,
    pub image: String,
    pub installed: bool,
    pub environment: Value,
}

/// A server as seen through the application API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppServer {
    pub id: u32,
    pub external_id: Option<String>,
    pub uuid: String,
    pub identifier: String,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub suspended: bool,
    pub limits: Limits,
    pub feature_limits: FeatureLimits,
    pub user: u32,
    pub node: u32,
    pub allocation: u32,
    pub nest: u32,
    pub egg: u32,
    pub container: Container,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    pub location_id: u32,
    pub public: bool,
    pub fqdn: String,
    pub scheme: String,
    pub behind_proxy: bool,
    pub maintenance_mode: bool,
    pub memory: i64,
    pub memory_overallocate: i64,
    pub disk: i64,
    pub disk_overallocate: i64,
    pub upload_size: i64,
    pub daemon_base: String,
    pub daemon_sftp: u16,
    pub daemon_listen: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The daemon-side configuration blob for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfiguration {
    pub debug: bool,
    pub uuid: String,
    pub token_id: String,
    pub token: String,
    pub api: Value,
    pub system: Value,
    pub allowed_mounts: Vec<String>,
    pub remote: String,
}

/// A port binding as seen through the application API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: u32,
    pub ip: String,
    pub alias: Option<String>,
    pub port: u16,
    pub notes: Option<String>,
    pub assigned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nest {
    pub id: u32,
    pub uuid: String,
    pub author: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Egg {
    pub id: u32,
    pub uuid: String,
    pub name: String,
    pub nest: u32,
    pub author: String,
    pub description: Option<String>,
    pub docker_image: String,
    pub startup: String,
    pub script: Option<Value>,
    pub config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: u32,
    pub short: String,
    pub long: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A pre-signed download link handed out by the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

/// One entry of a server's file listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub mode: String,
    pub mode_bits: String,
    pub size: u64,
    pub is_file: bool,
    pub is_symlink: bool,
    pub mimetype: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}
