//! 用户目录的 HTTP 客户端
//!
//! 用户资料由独立的用户服务维护，这里通过其公开接口只读查询。
//! 任何传输失败、非成功状态或无法解析的响应都作为目录错误返回，
//! 由调用方降级处理。

use application::{DirectoryError, UserDirectory, UserProfile};
use async_trait::async_trait;
use domain::UserId;
use serde::Deserialize;
use uuid::Uuid;

/// 用户服务返回的资料记录。
#[derive(Debug, Deserialize)]
struct DirectoryUserRecord {
    id: Uuid,
    name: String,
}

pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn fetch_profile(&self, id: UserId) -> Result<UserProfile, DirectoryError> {
        let url = format!("{}/api/v1/user/{}", self.base_url, id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| DirectoryError::unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::unavailable(format!(
                "directory returned {}",
                response.status()
            )));
        }

        let record: DirectoryUserRecord = response
            .json()
            .await
            .map_err(|err| DirectoryError::malformed(err.to_string()))?;

        Ok(UserProfile {
            id: UserId::from(record.id),
            display_name: record.name,
        })
    }
}
