//! Object storage uploader
//!
//! Stages local source files under the bucket layout the COPY statements read
//! from: `<data_dir>/raw/<path>` goes to `s3://<bucket>/raw/<path>` and
//! `<data_dir>/lookup/<path>` to `s3://<bucket>/lookup/<path>`. File-set
//! sources (Parquet) are directories uploaded file by file.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::load::CopySpec;

/// One local file and the object key it is uploaded to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub local: PathBuf,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub checksum: String,
    pub size: u64,
}

/// Map every source to the local files that back it
pub fn plan_uploads<'a>(
    data_dir: &Path,
    specs: impl IntoIterator<Item = &'a CopySpec>,
) -> Result<Vec<UploadItem>> {
    let mut items = Vec::new();

    for spec in specs {
        let local = data_dir.join(spec.prefix.as_str()).join(spec.path);

        if !spec.is_file_set() {
            if !local.is_file() {
                return Err(EtlError::storage(format!(
                    "source file for '{}' not found at {}",
                    spec.table,
                    local.display()
                )));
            }
            items.push(UploadItem {
                local,
                key: spec.object_key(),
            });
            continue;
        }

        if !local.is_dir() {
            return Err(EtlError::storage(format!(
                "source directory for '{}' not found at {}",
                spec.table,
                local.display()
            )));
        }

        let before = items.len();
        let walker = WalkDir::new(&local)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_marker_file(e.path()));
        for entry in walker {
            let entry = entry.map_err(|e| EtlError::storage(format!("failed to read {}: {}", local.display(), e)))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&local)
                .map_err(|e| EtlError::storage(e.to_string()))?;
            let suffix: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();

            items.push(UploadItem {
                local: entry.path().to_path_buf(),
                key: format!("{}/{}", spec.object_key(), suffix.join("/")),
            });
        }

        if items.len() == before {
            return Err(EtlError::storage(format!(
                "source directory for '{}' at {} holds no data files",
                spec.table,
                local.display()
            )));
        }
    }

    Ok(items)
}

/// Spark bookkeeping entries (`_SUCCESS`, `.part-0000.crc`, `_temporary/`) are not data
fn is_marker_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || n.starts_with('_'))
}

/// Uploads source files into the configured bucket
#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    bucket: String,
}

impl S3Uploader {
    /// Build a client from `[S3]`, with `[AWS]` keys when present and the
    /// default credential chain otherwise
    pub async fn new(config: &EtlConfig) -> Self {
        let region = Region::new(config.s3.region.clone());

        let mut builder = match &config.aws {
            Some(aws) => {
                let credentials = Credentials::new(&aws.key, &aws.secret, None, None, "dwh-etl");
                aws_sdk_s3::Config::builder()
                    .credentials_provider(credentials)
                    .region(region)
            },
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        if let Some(endpoint) = &config.s3.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        info!(bucket = %config.s3.bucket, region = %config.s3.region, "Storage client initialized");

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.s3.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self, item), fields(key = %item.key))]
    pub async fn upload(&self, item: &UploadItem) -> Result<UploadResult> {
        let path = item.local.clone();
        let checksum = tokio::task::spawn_blocking(move || dwh_common::checksum::sha256_file(path))
            .await
            .map_err(|e| EtlError::storage(format!("checksum task failed: {}", e)))??;
        let size = tokio::fs::metadata(&item.local).await?.len();

        debug!(size, "Uploading {} to s3://{}/{}", item.local.display(), self.bucket, item.key);

        let body = ByteStream::from_path(&item.local)
            .await
            .map_err(|e| EtlError::storage(format!("failed to read {}: {}", item.local.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&item.key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                EtlError::storage(format!(
                    "failed to upload to s3://{}/{}: {}",
                    self.bucket,
                    item.key,
                    DisplayErrorContext(&e)
                ))
            })?;

        info!(size, sha256 = %checksum, "Uploaded s3://{}/{}", self.bucket, item.key);

        Ok(UploadResult {
            key: item.key.clone(),
            checksum,
            size,
        })
    }

    /// Upload items one after another, stopping at the first failure
    pub async fn upload_all(&self, items: &[UploadItem]) -> Result<Vec<UploadResult>> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.upload(item).await?);
        }
        Ok(results)
    }
}
