//! File and directory handles over a server's filesystem

use std::sync::Arc;

use ptero_api::requests::{DeleteFilesRequest, RenameFileEntry, RenameFilesRequest};
use ptero_api::resources::{FileEntry, SignedUrl};

use crate::error::Result;
use crate::http::{Method, Payload, RequestManager, RequestOptions};
use crate::query::Query;

/// A handle on one directory of a server's filesystem.
#[derive(Debug, Clone)]
pub struct Directory {
    http: Arc<RequestManager>,
    identifier: String,
    root: String,
}

impl Directory {
    pub(crate) fn new(http: Arc<RequestManager>, identifier: String, root: &str) -> Self {
        Self {
            http,
            identifier,
            root: normalize(root),
        }
    }

    pub fn path(&self) -> &str {
        &self.root
    }

    /// The files in this directory (directories excluded).
    pub async fn get_files(&self) -> Result<Vec<File>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|entry| entry.is_file)
            .map(|entry| File::new(Arc::clone(&self.http), self.identifier.clone(), &self.root, entry))
            .collect())
    }

    /// The subdirectories of this directory.
    pub async fn get_directories(&self) -> Result<Vec<Directory>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|entry| !entry.is_file)
            .map(|entry| {
                Directory::new(
                    Arc::clone(&self.http),
                    self.identifier.clone(),
                    &join(&self.root, &entry.name),
                )
            })
            .collect())
    }

    async fn list(&self) -> Result<Vec<FileEntry>> {
        self.http
            .get_with(
                &format!("/servers/{}/files/list", self.identifier),
                Query::new().param("directory", &self.root),
            )
            .await?
            .listing()
    }
}

/// A handle on one file of a server's filesystem.
#[derive(Debug, Clone)]
pub struct File {
    http: Arc<RequestManager>,
    identifier: String,
    path: String,
    entry: FileEntry,
}

impl File {
    fn new(http: Arc<RequestManager>, identifier: String, root: &str, entry: FileEntry) -> Self {
        let path = join(root, &entry.name);
        Self {
            http,
            identifier,
            path,
            entry,
        }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The listing attributes this handle was built from.
    pub fn entry(&self) -> &FileEntry {
        &self.entry
    }

    /// The directory containing this file.
    pub fn root(&self) -> String {
        match self.path.rsplit_once('/') {
            Some(("", _)) | None => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
        }
    }

    /// The file's contents. The panel serves these as plain text; JSON
    /// files come back re-serialized.
    pub async fn contents(&self) -> Result<String> {
        let payload = self
            .http
            .request(
                Method::Get,
                &format!("/servers/{}/files/contents", self.identifier),
                RequestOptions::with_query(Query::new().param("file", &self.path)),
            )
            .await?;

        match payload {
            Payload::Json(value) => Ok(value.to_string()),
            other => other.into_text(),
        }
    }

    /// A pre-signed URL for downloading this file.
    pub async fn download_url(&self) -> Result<String> {
        let signed: SignedUrl = self
            .http
            .get_with(
                &format!("/servers/{}/files/download", self.identifier),
                Query::new().param("file", &self.path),
            )
            .await?
            .attributes()?;
        Ok(signed.url)
    }

    /// Fetch the file through its pre-signed URL.
    pub async fn download(&self) -> Result<Vec<u8>> {
        let url = self.download_url().await?;
        let payload = self.http.raw(Method::Get, &url, "text/plain").await?;

        match payload {
            Payload::Json(value) => Ok(value.to_string().into_bytes()),
            other => Ok(other.into_text()?.into_bytes()),
        }
    }

    /// Overwrite the file's contents. The body is sent raw, not as JSON.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let opts = RequestOptions {
            query: Query::new().param("file", &self.path),
            ..RequestOptions::raw(data.to_vec(), "text/plain")
        };

        self.http
            .request(
                Method::Post,
                &format!("/servers/{}/files/write", self.identifier),
                opts,
            )
            .await?;
        Ok(())
    }

    /// Rename the file in place.
    pub async fn rename(&mut self, name: &str) -> Result<()> {
        self.http
            .put(
                &format!("/servers/{}/files/rename", self.identifier),
                &RenameFilesRequest {
                    root: self.root(),
                    files: vec![RenameFileEntry {
                        from: self.entry.name.clone(),
                        to: name.to_string(),
                    }],
                },
            )
            .await?;

        self.path = join(&self.root(), name);
        self.entry.name = name.to_string();
        Ok(())
    }

    /// Delete the file, consuming the handle.
    pub async fn delete(self) -> Result<()> {
        self.http
            .post(
                &format!("/servers/{}/files/delete", self.identifier),
                &DeleteFilesRequest {
                    root: self.root(),
                    files: vec![self.entry.name.clone()],
                },
            )
            .await?;
        Ok(())
    }
}

fn normalize(root: &str) -> String {
    if root.is_empty() {
        return "/".to_string();
    }
    if root == "/" {
        return root.to_string();
    }
    root.trim_end_matches('/').to_string()
}

fn join(root: &str, name: &str) -> String {
    if root == "/" {
        format!("/{name}")
    } else {
        format!("{root}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/logs/"), "/logs");
        assert_eq!(normalize("/logs"), "/logs");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join("/", "server.log"), "/server.log");
        assert_eq!(join("/logs", "server.log"), "/logs/server.log");
    }
}
