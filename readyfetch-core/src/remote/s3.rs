use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use super::{ObjectListing, ObjectStore, PrefixDownloader};
use crate::error::DownloadError;

/// Mirrors an S3 folder into a local directory.
pub type S3FolderDownloader = PrefixDownloader<S3ObjectStore>;

/// Connection settings for [`S3ObjectStore::from_settings`]. Credentials come
/// from the standard AWS provider chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Settings {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (MinIO, localstack, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    #[tracing::instrument(level = "debug")]
    pub async fn from_settings(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style)
            .build();

        Self::new(Client::from_conf(s3_config), settings.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn target(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

impl S3FolderDownloader {
    /// Downloader for `folder` of the store's bucket.
    pub fn s3(store: S3ObjectStore, folder: &str) -> Self {
        Self::new(store, folder)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectListing, DownloadError> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .delimiter(delimiter);
        if let Some(token) = continuation {
            req = req.continuation_token(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| DownloadError::remote("list_objects_v2", self.target(prefix), e))?;

        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_owned))
            .collect();
        let keys = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_owned))
            .collect();
        let next_continuation = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_owned)
        } else {
            None
        };

        Ok(ObjectListing {
            common_prefixes,
            keys,
            next_continuation,
        })
    }

    async fn fetch(&self, key: &str, local_path: &Path) -> Result<(), DownloadError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| DownloadError::remote("get_object", self.target(key), e))?;

        let mut body = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| DownloadError::io("create_file", local_path, e))?;
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| DownloadError::io("write_object", local_path, e))?;
        file.flush()
            .await
            .map_err(|e| DownloadError::io("flush", local_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io("sync", local_path, e))?;
        Ok(())
    }
}
