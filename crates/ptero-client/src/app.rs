//! The application-API surface
//!
//! This half of the API uses administrative (`ptla_`-prefixed) keys and
//! manages panel-wide resources: users, servers, nodes, allocations,
//! nests/eggs and locations.

use std::sync::Arc;
use std::time::Duration;

use ptero_api::requests::{
    CreateAllocationRequest, CreateLocationRequest, CreateUserRequest, UpdateUserRequest,
};
use ptero_api::resources::{
    Allocation, AppServer, Egg, Location, Nest, Node, NodeConfiguration, User,
};

use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::http::{ApiKind, RequestManager};
use crate::query::Query;

/// A client for the administrative half of the panel API.
///
/// # Example
/// ```no_run
/// use ptero_client::{PteroApp, Query};
///
/// # async fn example() -> ptero_client::Result<()> {
/// let app = PteroApp::new("https://panel.example.com", "ptla_key")?;
///
/// let admins = app
///     .get_users(Query::new().filter("email", "@example.com"))
///     .await?;
/// for user in admins {
///     println!("{} ({})", user.username, user.email);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PteroApp {
    url: String,
    http: Arc<RequestManager>,
}

impl PteroApp {
    /// Create a client for the panel at `url`.
    ///
    /// # Errors
    /// Returns an error if the URL is not absolute.
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let url = url.trim_end_matches('/').to_string();
        let http = Arc::new(RequestManager::new(ApiKind::Application, &url, key)?);
        Ok(Self { url, http })
    }

    /// Create a client over a custom `reqwest::Client`.
    ///
    /// # Errors
    /// Returns an error if the URL is not absolute.
    pub fn with_client(url: &str, key: &str, client: reqwest::Client) -> Result<Self> {
        let url = url.trim_end_matches('/').to_string();
        let http = Arc::new(RequestManager::with_client(
            ApiKind::Application,
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

    // Users

    pub async fn get_users(&self, query: Query) -> Result<Vec<User>> {
        self.http.get_with("/users", query).await?.listing()
    }

    pub async fn get_user(&self, id: u32) -> Result<User> {
        self.http.get(&format!("/users/{id}")).await?.attributes()
    }

    pub async fn create_user(&self, fields: CreateUserRequest) -> Result<User> {
        self.http.post("/users", &fields).await?.attributes()
    }

    pub async fn update_user(&self, id: u32, fields: UpdateUserRequest) -> Result<User> {
        self.http
            .patch(&format!("/users/{id}"), &fields)
            .await?
            .attributes()
    }

    pub async fn delete_user(&self, id: u32) -> Result<()> {
        self.http.delete(&format!("/users/{id}")).await?;
        Ok(())
    }

    // Servers

    pub async fn get_servers(&self, query: Query) -> Result<Vec<AppServer>> {
        self.http.get_with("/servers", query).await?.listing()
    }

    pub async fn get_server(&self, id: u32) -> Result<AppServer> {
        self.http
            .get(&format!("/servers/{id}"))
            .await?
            .attributes()
    }

    pub async fn suspend_server(&self, id: u32) -> Result<()> {
        self.http
            .post_empty(&format!("/servers/{id}/suspend"))
            .await?;
        Ok(())
    }

    pub async fn unsuspend_server(&self, id: u32) -> Result<()> {
        self.http
            .post_empty(&format!("/servers/{id}/unsuspend"))
            .await?;
        Ok(())
    }

    // Nodes

    pub async fn get_nodes(&self, query: Query) -> Result<Vec<Node>> {
        self.http.get_with("/nodes", query).await?.listing()
    }

    pub async fn get_node(&self, id: u32) -> Result<Node> {
        self.http.get(&format!("/nodes/{id}")).await?.attributes()
    }

    /// The daemon-side configuration blob for a node. Returned bare, not
    /// in a resource envelope.
    pub async fn get_node_configuration(&self, id: u32) -> Result<NodeConfiguration> {
        self.http
            .get(&format!("/nodes/{id}/configuration"))
            .await?
            .deserialize()
    }

    pub async fn delete_node(&self, id: u32) -> Result<()> {
        self.http.delete(&format!("/nodes/{id}")).await?;
        Ok(())
    }

    // Allocations

    pub async fn get_node_allocations(&self, node: u32) -> Result<Vec<Allocation>> {
        self.http
            .get(&format!("/nodes/{node}/allocations"))
            .await?
            .listing()
    }

    /// Create allocations on a node for the given IP and ports.
    ///
    /// Each entry of `ports` is a single port (`"25565"`) or a dash range
    /// (`"25565-25570"`). Ranges must be numeric, run low to high, stay
    /// within 1024–65535, and span at most 1000 ports.
    ///
    /// # Errors
    /// [`Error::Range`] or [`Error::Validation`] if a port entry violates
    /// the contract; nothing is sent in that case.
    pub async fn create_node_allocation(
        &self,
        node: u32,
        ip: &str,
        alias: Option<String>,
        ports: Vec<String>,
    ) -> Result<()> {
        validate_ports(&ports)?;

        self.http
            .post(
                &format!("/nodes/{node}/allocations"),
                &CreateAllocationRequest {
                    ip: ip.to_string(),
                    alias,
                    ports,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn delete_node_allocation(&self, node: u32, id: u32) -> Result<()> {
        self.http
            .delete(&format!("/nodes/{node}/allocations/{id}"))
            .await?;
        Ok(())
    }

    // Nests & eggs

    pub async fn get_nests(&self) -> Result<Vec<Nest>> {
        self.http.get("/nests").await?.listing()
    }

    pub async fn get_nest(&self, id: u32) -> Result<Nest> {
        self.http.get(&format!("/nests/{id}")).await?.attributes()
    }

    pub async fn get_nest_eggs(&self, nest: u32) -> Result<Vec<Egg>> {
        self.http
            .get(&format!("/nests/{nest}/eggs"))
            .await?
            .listing()
    }

    pub async fn get_nest_egg(&self, nest: u32, id: u32) -> Result<Egg> {
        self.http
            .get(&format!("/nests/{nest}/eggs/{id}"))
            .await?
            .attributes()
    }

    // Locations

    pub async fn get_locations(&self) -> Result<Vec<Location>> {
        self.http.get("/locations").await?.listing()
    }

    pub async fn get_location(&self, id: u32) -> Result<Location> {
        self.http
            .get(&format!("/locations/{id}"))
            .await?
            .attributes()
    }

    pub async fn create_location(&self, short: &str, long: &str) -> Result<Location> {
        self.http
            .post(
                "/locations",
                &CreateLocationRequest {
                    short: short.to_string(),
                    long: long.to_string(),
                },
            )
            .await?
            .attributes()
    }

    pub async fn delete_location(&self, id: u32) -> Result<()> {
        self.http.delete(&format!("/locations/{id}")).await?;
        Ok(())
    }
}

fn validate_ports(ports: &[String]) -> Result<()> {
    for port in ports {
        let Some((start, stop)) = port.split_once('-') else {
            continue;
        };

        let start: u32 = start
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("invalid allocation port range '{port}'")))?;
        let stop: u32 = stop
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("invalid allocation port range '{port}'")))?;

        if start > stop {
            return Err(Error::Range("start cannot be greater than stop".into()));
        }
        if start <= 1024 || stop > 65535 {
            return Err(Error::Range(
                "port range must be between 1024 and 65535".into(),
            ));
        }
        if stop - start > 1000 {
            return Err(Error::Range("maximum port range exceeded (1000)".into()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_valid_ranges_pass() {
        assert!(validate_ports(&ports(&["2000-3000"])).is_ok());
        assert!(validate_ports(&ports(&["25565"])).is_ok());
        assert!(validate_ports(&ports(&["1025-1025", "60000-61000"])).is_ok());
        assert!(validate_ports(&[]).is_ok());
    }

    #[test]
    fn test_inverted_range_fails() {
        assert!(matches!(
            validate_ports(&ports(&["3000-2000"])),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_range_fails() {
        // low end at or below 1024
        assert!(matches!(
            validate_ports(&ports(&["100-200"])),
            Err(Error::Range(_))
        ));
        assert!(matches!(
            validate_ports(&ports(&["1024-2000"])),
            Err(Error::Range(_))
        ));
        // high end above 65535
        assert!(matches!(
            validate_ports(&ports(&["65000-65536"])),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_oversized_span_fails() {
        assert!(matches!(
            validate_ports(&ports(&["2000-4500"])),
            Err(Error::Range(_))
        ));
        // exactly 1000 is allowed
        assert!(validate_ports(&ports(&["2000-3000"])).is_ok());
    }

    #[test]
    fn test_non_numeric_range_fails() {
        assert!(matches!(
            validate_ports(&ports(&["abc-def"])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let app = PteroApp::new("https://panel.example.com/", "key").unwrap();
        assert_eq!(app.url(), "https://panel.example.com");
    }
}
