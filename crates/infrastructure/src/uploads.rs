//! 磁盘上传存储
//!
//! 图片附件落盘到本地目录，文件名统一为 `{uuid}-{原名}`，
//! 原名先做字符清洗，避免路径分隔符和控制字符进入文件系统。

use std::path::PathBuf;

use application::{StoredUpload, UploadError, UploadStorage};
use async_trait::async_trait;
use uuid::Uuid;

pub struct DiskUploadStorage {
    root: PathBuf,
    public_base_url: String,
}

impl DiskUploadStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let public_base_url: String = public_base_url.into();
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// 清洗上传文件名，只保留字母数字和 `.`、`-`、`_`。
fn sanitize(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "upload".to_string()
    } else {
        safe
    }
}

#[async_trait]
impl UploadStorage for DiskUploadStorage {
    async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<StoredUpload, UploadError> {
        let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize(filename));
        let path = self.root.join(&stored_name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| UploadError::storage(err.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| UploadError::storage(err.to_string()))?;

        Ok(StoredUpload {
            url: format!("{}/{}", self.public_base_url, stored_name),
            storage_ref: stored_name,
        })
    }
}
