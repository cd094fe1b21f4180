//! 推理请求与答案

use std::sync::Arc;

use image::RgbaImage;

/// 解答模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// 仅题目截图
    SingleImage,
    /// 阅读材料 + 题目截图
    ContextPlusQuestion,
    /// 主观题/代码题，多张截图
    FreeformMultiImage,
}

impl ResolveMode {
    pub fn expects_index(&self) -> bool {
        !matches!(self, ResolveMode::FreeformMultiImage)
    }
}

/// 一次性推理请求
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub mode: ResolveMode,
    pub prompt: String,
    pub images: Vec<Arc<RgbaImage>>,
    /// 选择题时为选项数 N，答案必须在 [1, N]
    pub expected_range: Option<usize>,
}

/// 校验后的答案
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// 选项序号（从 1 开始）
    Index(usize),
    /// 规整后的主观题文本
    Text(String),
}

/// 主观题答案的发布状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PayloadState {
    #[default]
    Empty,
    Pending,
    Ready(Arc<str>),
    Failed,
}

impl PayloadState {
    /// 是否已有结论（成功或失败）
    pub fn is_settled(&self) -> bool {
        matches!(self, PayloadState::Ready(_) | PayloadState::Failed)
    }
}
