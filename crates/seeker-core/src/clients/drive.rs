//! Google Drive `files.list` search.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{FileItem, compose_query};
use crate::error::ClientError;
use crate::ports::SearchProvider;

const FIELDS: &str = "files(id,name,webViewLink,mimeType)";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    web_view_link: Option<String>,
    mime_type: Option<String>,
}

impl DriveFile {
    fn into_item(self) -> FileItem {
        let link = self
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", self.id));
        let item = FileItem::new(self.name, link);
        match self.mime_type {
            Some(mime) => item.with_mime_type(mime),
            None => item,
        }
    }
}

pub struct DriveSearch {
    access_token: Secret<String>,
    base_url: String,
    page_size: usize,
    client: reqwest::Client,
}

impl DriveSearch {
    pub fn new(
        access_token: Secret<String>,
        base_url: impl Into<String>,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            access_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl SearchProvider for DriveSearch {
    async fn search(
        &self,
        predicate: &str,
        scope: Option<&str>,
    ) -> Result<Vec<FileItem>, ClientError> {
        let q = compose_query(predicate, scope);
        let page_size = self.page_size.to_string();
        debug!(%q, "drive search");

        let http_resp = self
            .client
            .get(format!("{}/files", self.base_url))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[
                ("q", q.as_str()),
                ("pageSize", page_size.as_str()),
                ("fields", FIELDS),
            ])
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body = http_resp.text().await.unwrap_or_default();
            warn!(%status, %body, "drive API error");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let list = http_resp.json::<FileList>().await?;
        Ok(list.files.into_iter().map(DriveFile::into_item).collect())
    }
}
