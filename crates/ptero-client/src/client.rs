//! The client-API surface
//!
//! This half of the API uses account-scoped keys (`ptlc_`-prefixed, found
//! under the panel's account settings), NOT administrative application
//! keys.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use ptero_api::requests::{
    AddSubUserRequest, CreateApiKeyRequest, CreateBackupRequest, RenameServerRequest,
    SendCommandRequest, SetPowerRequest, UpdateEmailRequest, UpdatePasswordRequest,
    UpdateSubUserRequest,
};
use ptero_api::resources::{
    Account, ApiKey, Backup, ClientServer, NetworkAllocation, SignedUrl, Statistics, SubUser,
    WebSocketAuth,
};

use crate::emitter::Emitter;
use crate::error::Result;
use crate::files::Directory;
use crate::http::{ApiKind, RequestManager};
use crate::permissions::Permissions;
use crate::shard::Shard;
use crate::transport::PanelConnector;

/// Power actions accepted by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSignal {
    Start,
    Stop,
    Restart,
    Kill,
}

impl PowerSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
        }
    }
}

/// A client for the account-scoped half of the panel API.
///
/// # Example
/// ```no_run
/// use ptero_client::{PowerSignal, PteroClient};
///
/// # async fn example() -> ptero_client::Result<()> {
/// let client = PteroClient::new("https://panel.example.com", "ptlc_key")?;
///
/// let account = client.get_account().await?;
/// println!("logged in as {}", account.username);
///
/// for server in client.get_servers().await? {
///     println!("{}: {:?}", server.name, server.status);
/// }
///
/// client.set_server_power("6f54a229", PowerSignal::Start).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PteroClient {
    url: String,
    http: Arc<RequestManager>,
}

impl PteroClient {
    /// Create a client for the panel at `url`.
    ///
    /// # Errors
    /// Returns an error if the URL is not absolute.
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let url = url.trim_end_matches('/').to_string();
        let http = Arc::new(RequestManager::new(ApiKind::Client, &url, key)?);
        Ok(Self { url, http })
    }

    /// Create a client over a custom `reqwest::Client`.
    ///
    /// # Errors
    /// Returns an error if the URL is not absolute.
    pub fn with_client(url: &str, key: &str, client: reqwest::Client) -> Result<Self> {
        let url = url.trim_end_matches('/').to_string();
        let http = Arc::new(RequestManager::with_client(
            ApiKind::Client,
            &url,
            key,
            client,
        )?);
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hook registry for `debug`/`receive`/`error` pipeline events.
    pub fn emitter(&self) -> &Emitter {
        self.http.emitter()
    }

    /// Round-trip latency of the most recent request.
    pub fn ping(&self) -> Option<Duration> {
        self.http.ping()
    }

    /// The permission keys, values and descriptions known to the panel.
    pub async fn get_permission_keys(&self) -> Result<Value> {
        self.http.get("/permissions").await?.attributes()
    }

    /// The account behind the API key in use.
    pub async fn get_account(&self) -> Result<Account> {
        self.http.get("/account").await?.attributes()
    }

    pub async fn update_account_email(&self, email: &str, password: &str) -> Result<()> {
        self.http
            .put(
                "/account/email",
                &UpdateEmailRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub async fn update_account_password(&self, old: &str, new: &str) -> Result<()> {
        self.http
            .put(
                "/account/password",
                &UpdatePasswordRequest {
                    current_password: old.to_string(),
                    new_password: new.to_string(),
                    password_confirmation: new.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub async fn get_api_keys(&self) -> Result<Vec<ApiKey>> {
        self.http.get("/account/api-keys").await?.listing()
    }

    pub async fn create_api_key(
        &self,
        description: &str,
        allowed_ips: Vec<String>,
    ) -> Result<ApiKey> {
        self.http
            .post(
                "/account/api-keys",
                &CreateApiKeyRequest {
                    description: description.to_string(),
                    allowed_ips,
                },
            )
            .await?
            .attributes()
    }

    pub async fn delete_api_key(&self, identifier: &str) -> Result<()> {
        self.http
            .delete(&format!("/account/api-keys/{identifier}"))
            .await?;
        Ok(())
    }

    /// All servers the account can access.
    pub async fn get_servers(&self) -> Result<Vec<ClientServer>> {
        self.http.get("/").await?.listing()
    }

    pub async fn get_server(&self, identifier: &str) -> Result<ClientServer> {
        self.http
            .get(&format!("/servers/{identifier}"))
            .await?
            .attributes()
    }

    /// One-time websocket credentials for a server's console channel.
    pub async fn get_server_ws_auth(&self, identifier: &str) -> Result<WebSocketAuth> {
        self.http
            .get(&format!("/servers/{identifier}/websocket"))
            .await?
            .wrapped()
    }

    /// Build a [`Shard`] for live console/stat streaming from a server.
    ///
    /// The shard is returned unconnected; call
    /// [`launch`](Shard::launch) to open the channel.
    pub fn create_shard(&self, identifier: &str) -> Shard {
        let connector = PanelConnector::new(
            Arc::clone(&self.http),
            self.url.clone(),
            identifier.to_string(),
        );
        Shard::with_connector(identifier, Box::new(connector))
    }

    /// Current resource usage of a server.
    pub async fn get_server_resources(&self, identifier: &str) -> Result<Statistics> {
        self.http
            .get(&format!("/servers/{identifier}/resources"))
            .await?
            .attributes()
    }

    pub async fn send_server_command(&self, identifier: &str, command: &str) -> Result<()> {
        self.http
            .post(
                &format!("/servers/{identifier}/command"),
                &SendCommandRequest {
                    command: command.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub async fn set_server_power(&self, identifier: &str, signal: PowerSignal) -> Result<()> {
        self.http
            .post(
                &format!("/servers/{identifier}/power"),
                &SetPowerRequest {
                    signal: signal.as_str().to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub async fn get_server_allocations(
        &self,
        identifier: &str,
    ) -> Result<Vec<NetworkAllocation>> {
        self.http
            .get(&format!("/servers/{identifier}/network/allocations"))
            .await?
            .listing()
    }

    pub async fn get_server_subusers(&self, identifier: &str) -> Result<Vec<SubUser>> {
        self.http
            .get(&format!("/servers/{identifier}/users"))
            .await?
            .listing()
    }

    pub async fn get_server_subuser(&self, identifier: &str, uuid: &str) -> Result<SubUser> {
        self.http
            .get(&format!("/servers/{identifier}/users/{uuid}"))
            .await?
            .attributes()
    }

    /// Invite a user to a server by email.
    pub async fn add_server_subuser(&self, identifier: &str, email: &str) -> Result<SubUser> {
        self.http
            .post(
                &format!("/servers/{identifier}/users"),
                &AddSubUserRequest {
                    email: email.to_string(),
                },
            )
            .await?
            .attributes()
    }

    /// Replace a subuser's permission set.
    pub async fn update_subuser_permissions(
        &self,
        identifier: &str,
        uuid: &str,
        permissions: &Permissions,
    ) -> Result<SubUser> {
        self.http
            .post(
                &format!("/servers/{identifier}/users/{uuid}"),
                &UpdateSubUserRequest {
                    permissions: permissions.value().to_vec(),
                },
            )
            .await?
            .attributes()
    }

    pub async fn remove_server_subuser(&self, identifier: &str, uuid: &str) -> Result<()> {
        self.http
            .delete(&format!("/servers/{identifier}/users/{uuid}"))
            .await?;
        Ok(())
    }

    pub async fn get_backups(&self, identifier: &str) -> Result<Vec<Backup>> {
        self.http
            .get(&format!("/servers/{identifier}/backups"))
            .await?
            .listing()
    }

    pub async fn create_backup(
        &self,
        identifier: &str,
        name: Option<String>,
        ignored_files: Option<Vec<String>>,
        locked: bool,
    ) -> Result<Backup> {
        self.http
            .post(
                &format!("/servers/{identifier}/backups"),
                &CreateBackupRequest {
                    name,
                    ignored_files,
                    is_locked: locked,
                },
            )
            .await?
            .attributes()
    }

    pub async fn get_backup(&self, identifier: &str, uuid: &str) -> Result<Backup> {
        self.http
            .get(&format!("/servers/{identifier}/backups/{uuid}"))
            .await?
            .attributes()
    }

    /// A pre-signed URL for downloading a backup; fetch it with
    /// [`RequestManager::raw`] since it must not carry the bearer header.
    pub async fn get_backup_download_url(&self, identifier: &str, uuid: &str) -> Result<String> {
        let signed: SignedUrl = self
            .http
            .get(&format!("/servers/{identifier}/backups/{uuid}/download"))
            .await?
            .attributes()?;
        Ok(signed.url)
    }

    pub async fn delete_backup(&self, identifier: &str, uuid: &str) -> Result<()> {
        self.http
            .delete(&format!("/servers/{identifier}/backups/{uuid}"))
            .await?;
        Ok(())
    }

    pub async fn rename_server(&self, identifier: &str, name: &str) -> Result<()> {
        self.http
            .post(
                &format!("/servers/{identifier}/settings/rename"),
                &RenameServerRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    pub async fn reinstall_server(&self, identifier: &str) -> Result<()> {
        self.http
            .post_empty(&format!("/servers/{identifier}/settings/reinstall"))
            .await?;
        Ok(())
    }

    /// A handle on one directory of a server's filesystem.
    pub fn directory(&self, identifier: &str, root: &str) -> Directory {
        Directory::new(Arc::clone(&self.http), identifier.to_string(), root)
    }
}
