//! LLM 服务 - 业务能力层
//!
//! 只负责"把提示词和图片发给模型、拿回文本"，不解析答案、不关心流程。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（默认 Gemini 的 OpenAI 兼容端点）
//! - 主密钥请求数达到上限后单向切换到备用密钥

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::InferenceError;
use crate::services::image_service::EncodedImage;

/// 推理边界：提示词 + 有序图片 → 原始文本
///
/// 调用可能很慢、可能失败，调用方不做自动重试。
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, prompt: &str, images: &[EncodedImage])
        -> Result<String, InferenceError>;
}

/// 当前使用的密钥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    Primary,
    Secondary,
}

/// 一次请求领取到的凭据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// 第几次请求（从 1 开始）
    pub request_number: u64,
    pub credential: Credential,
    /// 本次请求之后发生了切换
    pub rotated: bool,
}

/// 请求计数与密钥切换
///
/// 计数和当前密钥由同一把锁保护，作为一个整体更新。
/// 切换只会从主密钥到备用密钥，且只发生一次。
pub struct CredentialRotator {
    state: Mutex<RotationState>,
    threshold: u64,
    has_secondary: bool,
}

struct RotationState {
    count: u64,
    active: Credential,
}

impl CredentialRotator {
    pub fn new(threshold: u64, has_secondary: bool) -> Self {
        Self {
            state: Mutex::new(RotationState {
                count: 0,
                active: Credential::Primary,
            }),
            threshold,
            has_secondary,
        }
    }

    /// 计数 +1，返回本次请求使用的密钥
    ///
    /// 第 N 次请求（N = 阈值）仍使用主密钥，之后的请求使用备用密钥。
    /// 阈值为 0 时不切换。
    pub fn acquire(&self) -> Ticket {
        let mut state = self.state.lock();
        state.count += 1;
        let credential = state.active;
        let mut rotated = false;

        info!("📊 API 请求计数: {}/{}", state.count, self.threshold);

        if self.threshold > 0
            && state.count >= self.threshold
            && state.active == Credential::Primary
        {
            if self.has_secondary {
                state.active = Credential::Secondary;
                rotated = true;
                warn!("⚠️ 已达到请求上限 ({} 次)", self.threshold);
                warn!("🔄 后续请求切换到备用 API 密钥");
            } else if state.count == self.threshold {
                warn!("⚠️ 已达到请求上限，但未配置备用 API 密钥，继续使用主密钥");
            }
        }

        Ticket {
            request_number: state.count,
            credential,
            rotated,
        }
    }

    pub fn active(&self) -> Credential {
        self.state.lock().active
    }

    pub fn request_count(&self) -> u64 {
        self.state.lock().count
    }
}

/// 基于 OpenAI 兼容接口的推理服务
pub struct LlmService {
    primary: Client<OpenAIConfig>,
    secondary: Option<Client<OpenAIConfig>>,
    model_name: String,
    rotator: CredentialRotator,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        let build = |key: &str| {
            Client::with_config(
                OpenAIConfig::new()
                    .with_api_key(key)
                    .with_api_base(&config.llm_api_base_url),
            )
        };

        let secondary = if config.llm_api_key_secondary.trim().is_empty() {
            None
        } else {
            Some(build(&config.llm_api_key_secondary))
        };

        Self {
            primary: build(&config.llm_api_key_primary),
            rotator: CredentialRotator::new(
                config.request_limit_before_switch,
                secondary.is_some(),
            ),
            secondary,
            model_name: config.llm_model_name.clone(),
        }
    }

    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    fn client_for(&self, credential: Credential) -> &Client<OpenAIConfig> {
        match (credential, &self.secondary) {
            (Credential::Secondary, Some(client)) => client,
            _ => &self.primary,
        }
    }

    fn build_messages(
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, InferenceError> {
        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();

        content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: prompt.to_string(),
            },
        ));

        for image in images {
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: image.to_data_url(),
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| InferenceError::RequestBuildFailed {
                source: Box::new(e),
            })?;

        Ok(vec![ChatCompletionRequestMessage::User(user_msg)])
    }
}

#[async_trait]
impl InferenceClient for LlmService {
    async fn complete(
        &self,
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<String, InferenceError> {
        let ticket = self.rotator.acquire();
        debug!(
            "调用 LLM API，模型: {}，第 {} 次请求，密钥: {:?}，图片 {} 张",
            self.model_name,
            ticket.request_number,
            ticket.credential,
            images.len()
        );

        let messages = Self::build_messages(prompt, images)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.2)
            .build()
            .map_err(|e| InferenceError::RequestBuildFailed {
                source: Box::new(e),
            })?;

        let response = self
            .client_for(ticket.credential)
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                InferenceError::api_failed(&self.model_name, e)
            })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| InferenceError::EmptyContent {
                model: self.model_name.clone(),
            })
    }
}
