//! 答案解析 - 业务能力层
//!
//! 负责：
//! 1. 根据解答模式构造提示词
//! 2. 压缩图片（阻塞线程池）并调用推理服务
//! 3. 严格校验选项序号，或规整主观题文本
//!
//! 不做任何自动重试；失败原样返回给调用方。

use std::sync::{Arc, LazyLock};

use image::RgbaImage;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::ResolveError;
use crate::models::{Answer, InferenceRequest, ResolveMode};
use crate::services::image_service::ImageCompressor;
use crate::services::llm_service::InferenceClient;
use crate::utils::logging::truncate_text;

static TRAILING_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[^\S\n]+$").expect("静态正则表达式无效"));
static REPEATED_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("静态正则表达式无效"));

impl InferenceRequest {
    /// 按模式构造请求
    ///
    /// 选择题模式下 `option_count` 即答案上限 N；主观题模式忽略它。
    pub fn for_mode(
        mode: ResolveMode,
        images: Vec<Arc<RgbaImage>>,
        option_count: usize,
        language: &str,
    ) -> Self {
        let prompt = match mode {
            ResolveMode::SingleImage => format!(
                "The image shows a question with {n} vertically listed options, numbered 1 to {n} from top to bottom.\n\
                 Return ONLY the number (1, 2, ..., {n}) of the correct option.\n\
                 Do not explain. Do not add any other text.",
                n = option_count
            ),
            ResolveMode::ContextPlusQuestion => format!(
                "The FIRST image contains a passage or other reference material.\n\
                 The SECOND image contains a question with {n} vertically listed options, numbered 1 to {n} from top to bottom.\n\
                 Read the reference material, then answer the question.\n\
                 Return ONLY the number (1, 2, ..., {n}) of the correct option.\n\
                 Do not explain. Do not add any other text.",
                n = option_count
            ),
            ResolveMode::FreeformMultiImage => format!(
                "The {count} images are consecutive screenshots of a single question, in order.\n\
                 Answer the question exactly in the format it asks for.\n\
                 If the question asks for code, write it in {language} with normal indentation and no comments.\n\
                 Use plain text only: no markdown, no code fences, no introduction or closing remarks.",
                count = images.len(),
                language = language
            ),
        };

        Self {
            mode,
            prompt,
            images,
            expected_range: mode.expects_index().then_some(option_count),
        }
    }
}

/// 严格解析选项序号：去掉首尾空白后必须是 [1, max] 内的整数
pub fn parse_index(raw: &str, max: usize) -> Result<usize, ResolveError> {
    let trimmed = raw.trim();
    match trimmed.parse::<usize>() {
        Ok(index) if (1..=max).contains(&index) => Ok(index),
        _ => Err(ResolveError::InvalidAnswer {
            raw: trimmed.to_string(),
            max,
        }),
    }
}

/// 规整主观题文本
///
/// 去掉每行行尾空白，把连续空行合并为单个换行，再去掉首尾空白。
/// 对已规整的文本再执行一次结果不变。
pub fn normalize_freeform(text: &str) -> String {
    let stripped = TRAILING_WHITESPACE.replace_all(text, "");
    let collapsed = REPEATED_NEWLINES.replace_all(&stripped, "\n");
    collapsed.trim().to_string()
}

/// 答案解析器
pub struct AnswerResolver {
    client: Arc<dyn InferenceClient>,
    compressor: ImageCompressor,
}

impl AnswerResolver {
    pub fn new(client: Arc<dyn InferenceClient>, compressor: ImageCompressor) -> Self {
        Self { client, compressor }
    }

    /// 在后台任务中解析，调用方立即返回
    pub fn spawn_resolve(
        self: &Arc<Self>,
        request: InferenceRequest,
    ) -> JoinHandle<Result<Answer, ResolveError>> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move { resolver.resolve(request).await })
    }

    pub async fn resolve(&self, request: InferenceRequest) -> Result<Answer, ResolveError> {
        if request.images.is_empty() {
            return Err(ResolveError::NoImages);
        }

        info!(
            "🤖 正在请求模型 ({:?}，{} 张图片)...",
            request.mode,
            request.images.len()
        );

        let compressor = self.compressor;
        let images = request.images.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            images
                .iter()
                .map(|image| compressor.compress(image))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ResolveError::WorkerPanicked(e.to_string()))??;

        let raw = self.client.complete(&request.prompt, &encoded).await?;
        info!("🤖 模型返回: {}", truncate_text(&raw, 80));

        match request.expected_range {
            Some(max) => {
                let index = parse_index(&raw, max).inspect_err(|e| error!("❌ {}", e))?;
                info!("✅ 解析出选项序号: {}", index);
                Ok(Answer::Index(index))
            }
            None => {
                let text = normalize_freeform(&raw);
                info!("✅ 主观题答案已就绪，共 {} 个字符", text.chars().count());
                Ok(Answer::Text(text))
            }
        }
    }
}
