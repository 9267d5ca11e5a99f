//! 上传存储端口

use async_trait::async_trait;
use domain::Attachment;
use thiserror::Error;

/// 上传完成后的存储结果。
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUpload {
    /// 对外可访问的地址
    pub url: String,
    /// 存储侧的定位标识
    pub storage_ref: String,
}

impl StoredUpload {
    pub fn into_attachment(self) -> Attachment {
        Attachment {
            url: self.url,
            storage_ref: self.storage_ref,
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload storage failed: {0}")]
    Storage(String),
}

impl UploadError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

#[async_trait]
pub trait UploadStorage: Send + Sync {
    async fn store(&self, filename: &str, bytes: Vec<u8>) -> Result<StoredUpload, UploadError>;
}
