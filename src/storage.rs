use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::BucketConfig;

/// Where uploaded avatars and documents live.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// URL a client can fetch the object from.
    async fn public_url(&self, key: &str) -> anyhow::Result<String>;
}

/// Files on local disk, served by the app under `/files`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

pub const LOCAL_FILES_ROUTE: &str = "/files";

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        Ok(self.root.join(checked_key(key)?))
    }
}

/// Keys are flat file names; anything that could climb out of the upload
/// directory or nest under a bucket prefix is refused.
fn checked_key(key: &str) -> anyhow::Result<&str> {
    anyhow::ensure!(
        !key.is_empty() && !key.contains(['/', '\\']) && key != "." && key != "..",
        "invalid storage key {key:?}"
    );
    Ok(key)
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create upload dir {}", self.root.display()))?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(key, bytes = body.len(), "stored file");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }

    async fn public_url(&self, key: &str) -> anyhow::Result<String> {
        Ok(format!("{}{}/{}", self.base_url, LOCAL_FILES_ROUTE, key))
    }
}

/// S3-compatible object store (MinIO in development). Objects sit at the
/// bucket root under the same flat keys the local backend uses; avatars are
/// handed out as presigned GET links.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    link_ttl: Duration,
}

impl S3Storage {
    pub async fn connect(cfg: &BucketConfig) -> Self {
        let creds = Credentials::new(
            &cfg.access_key,
            &cfg.secret_key,
            None,
            None,
            "userhub-env",
        );
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(creds)
            .load()
            .await;
        let client = Client::from_conf(
            S3ConfigBuilder::from(&shared)
                .endpoint_url(&cfg.endpoint)
                .force_path_style(true)
                .build(),
        );
        debug!(endpoint = %cfg.endpoint, bucket = %cfg.bucket, "s3 storage ready");
        Self {
            client,
            bucket: cfg.bucket.clone(),
            link_ttl: Duration::from_secs(cfg.link_ttl_secs),
        }
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let key = checked_key(key)?;
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("upload {key} to bucket {}", self.bucket))?;
        debug!(key, bytes = size, "stored object");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let key = checked_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("remove {key} from bucket {}", self.bucket))?;
        Ok(())
    }

    async fn public_url(&self, key: &str) -> anyhow::Result<String> {
        let key = checked_key(key)?;
        let link = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(self.link_ttl)?)
            .await
            .with_context(|| format!("presign link for {key}"))?;
        Ok(link.uri().to_string())
    }
}
