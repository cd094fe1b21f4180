use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 区域/选项捕获错误
    #[error("捕获错误: {0}")]
    Capture(#[from] CaptureError),
    /// 推理调用错误
    #[error("推理错误: {0}")]
    Inference(#[from] InferenceError),
    /// 答案解析错误
    #[error("答案解析错误: {0}")]
    Resolve(#[from] ResolveError),
    /// 自动输入错误
    #[error("自动输入错误: {0}")]
    Replay(#[from] ReplayError),
    /// 输入驱动错误
    #[error("输入驱动错误: {0}")]
    Driver(#[from] DriverError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 同类操作正在进行中
    #[error("操作 {operation} 正在进行中，忽略本次触发")]
    Busy { operation: String },
    /// 尚未截取任何主观题截图
    #[error("尚未截取任何截图，请先截图")]
    NoScreenshots,
    /// 后台任务异常退出
    #[error("后台任务异常退出: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// 失败分类（统一上报通道使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UserCancelled,
    InvalidRegion,
    InsufficientOptions,
    InferenceFailure,
    PayloadUnavailable,
    Busy,
    InvalidInput,
    Io,
}

impl AppError {
    /// 归类为统一的失败类型
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Capture(CaptureError::UserCancelled { .. }) => FailureKind::UserCancelled,
            AppError::Capture(CaptureError::InvalidRegion { .. }) => FailureKind::InvalidRegion,
            AppError::Capture(CaptureError::InsufficientOptions { .. }) => {
                FailureKind::InsufficientOptions
            }
            AppError::Capture(CaptureError::ScreenCaptureFailed { .. })
            | AppError::Capture(CaptureError::NoMonitor) => FailureKind::Io,
            AppError::Inference(_) | AppError::Resolve(_) => FailureKind::InferenceFailure,
            AppError::Replay(ReplayError::PayloadUnavailable { .. }) => {
                FailureKind::PayloadUnavailable
            }
            AppError::Replay(ReplayError::AlreadyActive) | AppError::Busy { .. } => {
                FailureKind::Busy
            }
            AppError::Replay(ReplayError::Driver(_)) | AppError::Driver(_) => FailureKind::Io,
            AppError::Replay(_) | AppError::NoScreenshots | AppError::Config(_) => {
                FailureKind::InvalidInput
            }
            AppError::File(_) | AppError::TaskFailed(_) => FailureKind::Io,
        }
    }
}

/// 区域/选项捕获错误
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 等待超时或用户按下取消键
    #[error("用户取消: {reason}")]
    UserCancelled { reason: String },
    /// 区域宽高不为正
    #[error("无效区域: 宽 {width}, 高 {height}")]
    InvalidRegion { width: i32, height: i32 },
    /// 选项数量不足
    #[error("只记录了 {count} 个选项，至少需要 2 个")]
    InsufficientOptions { count: usize },
    /// 截图失败
    #[error("截图失败: {source}")]
    ScreenCaptureFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 没有可用的显示器
    #[error("没有找到可用的显示器")]
    NoMonitor,
}

impl CaptureError {
    pub fn timed_out(waited: Duration) -> Self {
        CaptureError::UserCancelled {
            reason: format!("等待 {:.0} 秒无点击", waited.as_secs_f64()),
        }
    }
}

/// 推理调用错误
#[derive(Debug, Error)]
pub enum InferenceError {
    /// API 调用失败（网络、限流等）
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 构建请求失败
    #[error("构建 LLM 请求失败: {source}")]
    RequestBuildFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 图片压缩或编码失败
    #[error("图片编码失败: {source}")]
    ImageEncodeFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 答案解析错误
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    /// 返回内容无法解析为整数，或超出 [1, max]
    #[error("无效答案 '{raw}'，应为 1 到 {max} 之间的整数")]
    InvalidAnswer { raw: String, max: usize },
    /// 请求中没有图片
    #[error("推理请求中没有图片")]
    NoImages,
    /// 后台推理任务异常退出
    #[error("推理任务异常退出: {0}")]
    WorkerPanicked(String),
}

/// 自动输入错误
#[derive(Debug, Error)]
pub enum ReplayError {
    /// 已有输入会话在进行（输入中或已暂停）
    #[error("已有自动输入会话在进行中")]
    AlreadyActive,
    /// 等待答案超时
    #[error("等待 {:.0} 秒后答案仍不可用", .waited.as_secs_f64())]
    PayloadUnavailable { waited: Duration },
    /// 会话未处于暂停状态
    #[error("输入未处于暂停状态")]
    NotPaused,
    /// 没有进行中的会话
    #[error("没有进行中的自动输入会话")]
    NoSession,
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// 输入驱动错误
#[derive(Debug, Error)]
pub enum DriverError {
    /// 初始化失败
    #[error("输入模拟器初始化失败: {0}")]
    Unavailable(String),
    /// 驱动线程已退出
    #[error("输入模拟线程已退出")]
    Disconnected,
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("删除文件失败 ({path}): {source}")]
    DeleteFailed {
        path: String,
        source: std::io::Error,
    },
    #[error("创建目录失败 ({path}): {source}")]
    CreateDirFailed {
        path: String,
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        source: toml::de::Error,
    },
    /// 快捷键格式无效
    #[error("无效的快捷键: {binding}")]
    InvalidHotkey { binding: String },
    /// 未知的枚举取值
    #[error("配置项 {field} 的取值 '{value}' 无效")]
    InvalidValue { field: String, value: String },
}

// ========== 便捷构造函数 ==========

impl InferenceError {
    /// 创建 API 调用错误
    pub fn api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        InferenceError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }
}

impl CaptureError {
    /// 创建截图失败错误
    pub fn screen_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        CaptureError::ScreenCaptureFailed {
            source: Box::new(source),
        }
    }
}

impl FileError {
    /// 创建文件写入错误
    pub fn write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_map_to_their_failure_kind() {
        let err: AppError = CaptureError::InvalidRegion {
            width: 0,
            height: 5,
        }
        .into();
        assert_eq!(err.kind(), FailureKind::InvalidRegion);

        let err: AppError = CaptureError::timed_out(Duration::from_secs(60)).into();
        assert_eq!(err.kind(), FailureKind::UserCancelled);
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn invalid_answer_is_an_inference_failure() {
        let err: AppError = ResolveError::InvalidAnswer {
            raw: "five".to_string(),
            max: 4,
        }
        .into();
        assert_eq!(err.kind(), FailureKind::InferenceFailure);
    }

    #[test]
    fn busy_and_already_active_share_a_kind() {
        let busy = AppError::Busy {
            operation: "题目截图".to_string(),
        };
        let active: AppError = ReplayError::AlreadyActive.into();
        assert_eq!(busy.kind(), active.kind());
    }
}
