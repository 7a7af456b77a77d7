//! 提示词模板来源
//!
//! 每次运行只在开始时读取一次，所有处理单元共用。

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{AppResult, PromptError};

#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn load(&self) -> AppResult<String>;
}

/// 按 URI 读取模板
///
/// - `http://` / `https://`：对象存储直链（含 SAS 等查询参数时原样携带）
/// - `file://` 前缀或普通路径：本地文件
pub struct UriPromptSource {
    uri: String,
    http: reqwest::Client,
}

impl UriPromptSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            http: reqwest::Client::new(),
        }
    }

    fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }

    async fn download(&self) -> Result<String, PromptError> {
        let response = self
            .http
            .get(&self.uri)
            .send()
            .await
            .map_err(|e| PromptError::FetchFailed {
                uri: self.uri.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PromptError::BadStatus {
                uri: self.uri.clone(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| PromptError::FetchFailed {
            uri: self.uri.clone(),
            source: Box::new(e),
        })
    }

    async fn read_local(&self) -> Result<String, PromptError> {
        let path = self.uri.strip_prefix("file://").unwrap_or(&self.uri);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::ReadFailed {
                uri: self.uri.clone(),
                source: Box::new(e),
            })
    }
}

#[async_trait]
impl PromptSource for UriPromptSource {
    async fn load(&self) -> AppResult<String> {
        debug!("读取提示词模板: {}", self.uri);
        let text = if self.is_remote() {
            self.download().await?
        } else {
            self.read_local().await?
        };

        if text.trim().is_empty() {
            return Err(PromptError::Empty {
                uri: self.uri.clone(),
            }
            .into());
        }

        info!("📝 提示词模板已加载 ({} 字符)", text.chars().count());
        Ok(text)
    }
}
