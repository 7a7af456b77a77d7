//! LLM 补全客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

/// 系统消息
const SYSTEM_MESSAGE: &str = "You are an expert at analyzing customer service call transcripts.";

const TRANSCRIPT_START: &str = "=== TRANSCRIPT START ===";
const TRANSCRIPT_END: &str = "=== TRANSCRIPT END ===";

/// 拼接模板与转写文本，转写用分隔标记包住
pub fn compose_prompt(template: &str, transcript_text: &str) -> String {
    format!("{template}\n\n{TRANSCRIPT_START}\n{transcript_text}\n{TRANSCRIPT_END}")
}

/// 文本进、文本出的补全能力
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 返回第一个候选的文本内容
    async fn complete(&self, template: &str, transcript_text: &str) -> AppResult<String>;

    fn model_name(&self) -> &str;
}

/// OpenAI 兼容接口的实现
pub struct OpenAiCompletionClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompletionClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }

    fn build_failed(&self, e: impl std::error::Error + Send + Sync + 'static) -> AppError {
        AppError::Llm(LlmError::RequestBuildFailed {
            model: self.model_name.clone(),
            source: Box::new(e),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, template: &str, transcript_text: &str) -> AppResult<String> {
        let user_message = compose_prompt(template, transcript_text);
        debug!(
            "调用 LLM API，模型: {}，用户消息长度: {} 字符",
            self.model_name,
            user_message.len()
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_MESSAGE)
            .build()
            .map_err(|e| self.build_failed(e))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.build_failed(e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| self.build_failed(e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        // 只取第一个候选
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: self.model_name.clone(),
                })
            })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
