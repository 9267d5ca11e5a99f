//! 用户目录端口
//!
//! 用户资料由独立的用户服务维护，这里只读。目录故障时调用方
//! 降级为占位资料，消息流程绝不因目录不可用而失败。

use async_trait::async_trait;
use domain::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 用户目录中的公开资料。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
}

impl UserProfile {
    /// 目录不可用时的占位资料。
    pub fn placeholder(id: UserId) -> Self {
        Self {
            id,
            display_name: "unknown user".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("malformed directory response: {0}")]
    Malformed(String),
}

impl DirectoryError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_profile(&self, id: UserId) -> Result<UserProfile, DirectoryError>;
}

/// 查询资料，目录故障时记录告警并返回占位资料。
pub async fn profile_or_placeholder(directory: &dyn UserDirectory, id: UserId) -> UserProfile {
    match directory.fetch_profile(id).await {
        Ok(profile) => profile,
        Err(err) => {
            tracing::warn!(user_id = %id, error = %err, "用户目录查询失败，使用占位资料");
            UserProfile::placeholder(id)
        }
    }
}
