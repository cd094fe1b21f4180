use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 程序配置
///
/// 读取顺序：默认值 → TOML 文件（`MCQ_AUTOMATOR_CONFIG`）→ 环境变量
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key_primary: String,
    pub llm_api_key_secondary: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 主密钥请求次数达到该值后切换到备用密钥，0 表示一直使用主密钥
    pub request_limit_before_switch: u64,
    /// 主观题答案中代码题使用的语言
    pub freeform_language: String,

    // --- 图片压缩 ---
    pub max_image_width: u32,
    pub max_image_height: u32,
    /// JPEG 质量 (1-100)
    pub image_quality: u8,

    // --- 文件与日志 ---
    /// 截图临时目录，启动时清空，清除/退出时删除
    pub scratch_dir: PathBuf,
    pub log_file: String,
    pub verbose_logging: bool,

    // --- 捕获 ---
    pub click_timeout_ms: u64,
    pub options_timeout_ms: u64,
    /// 选择题流程顺序: "options_first" | "concurrent"
    pub solve_ordering: String,
    /// concurrent 模式下提示词使用的默认选项数
    pub expected_options: usize,
    pub click_move_ms: u64,

    // --- 自动输入 ---
    pub payload_wait_ms: u64,
    pub typing_start_delay_ms: u64,
    pub char_delay_min_ms: u64,
    pub char_delay_max_ms: u64,
    pub burst_every: usize,
    pub burst_pause_min_ms: u64,
    pub burst_pause_max_ms: u64,
    pub newline_settle_ms: u64,
    pub resume_settle_ms: u64,
    /// 换行后缩进处理: "lookahead" | "rescan" | "none"
    pub indent_strategy: String,
    pub indent_width: usize,

    pub hotkeys: HotkeyBindings,
}

/// 快捷键绑定，格式如 `<ctrl>+<alt>+c`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyBindings {
    pub capture_context: String,
    pub capture_question: String,
    pub capture_subjective: String,
    pub generate_answer: String,
    pub type_answer: String,
    pub resume_typing: String,
    pub clear_state: String,
    pub exit: String,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            capture_context: "<ctrl>+<alt>+c".to_string(),
            capture_question: "<ctrl>+<alt>+p".to_string(),
            capture_subjective: "<ctrl>+<alt>+s".to_string(),
            generate_answer: "<ctrl>+<alt>+g".to_string(),
            type_answer: "<ctrl>+<alt>+t".to_string(),
            resume_typing: "<ctrl>+<alt>+z".to_string(),
            clear_state: "<ctrl>+<alt>+r".to_string(),
            exit: "<ctrl>+<alt>+e".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key_primary: String::new(),
            llm_api_key_secondary: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-flash".to_string(),
            request_limit_before_switch: 20,
            freeform_language: "Java".to_string(),
            max_image_width: 1024,
            max_image_height: 1024,
            image_quality: 85,
            scratch_dir: PathBuf::from("screenshots"),
            log_file: "mcq_automator.log".to_string(),
            verbose_logging: false,
            click_timeout_ms: 60_000,
            options_timeout_ms: 120_000,
            solve_ordering: "options_first".to_string(),
            expected_options: 4,
            click_move_ms: 300,
            payload_wait_ms: 60_000,
            typing_start_delay_ms: 3_000,
            char_delay_min_ms: 30,
            char_delay_max_ms: 80,
            burst_every: 15,
            burst_pause_min_ms: 50,
            burst_pause_max_ms: 150,
            newline_settle_ms: 50,
            resume_settle_ms: 100,
            indent_strategy: "lookahead".to_string(),
            indent_width: 4,
            hotkeys: HotkeyBindings::default(),
        }
    }
}

impl Config {
    /// 完整加载：默认值 → 可选 TOML 文件 → 环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("MCQ_AUTOMATOR_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let d = self;
        Ok(Self {
            llm_api_key_primary: env_string("LLM_API_KEY_PRIMARY").unwrap_or(d.llm_api_key_primary),
            llm_api_key_secondary: env_string("LLM_API_KEY_SECONDARY").unwrap_or(d.llm_api_key_secondary),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(d.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(d.llm_model_name),
            request_limit_before_switch: env_parse("REQUEST_LIMIT_BEFORE_SWITCH")?.unwrap_or(d.request_limit_before_switch),
            freeform_language: env_string("FREEFORM_LANGUAGE").unwrap_or(d.freeform_language),
            max_image_width: env_parse("MAX_IMAGE_WIDTH")?.unwrap_or(d.max_image_width),
            max_image_height: env_parse("MAX_IMAGE_HEIGHT")?.unwrap_or(d.max_image_height),
            image_quality: env_parse("IMAGE_QUALITY")?.unwrap_or(d.image_quality),
            scratch_dir: env_string("SCRATCH_DIR").map(PathBuf::from).unwrap_or(d.scratch_dir),
            log_file: env_string("LOG_FILE").unwrap_or(d.log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING")?.unwrap_or(d.verbose_logging),
            click_timeout_ms: env_parse("CLICK_TIMEOUT_MS")?.unwrap_or(d.click_timeout_ms),
            options_timeout_ms: env_parse("OPTIONS_TIMEOUT_MS")?.unwrap_or(d.options_timeout_ms),
            solve_ordering: env_string("SOLVE_ORDERING").unwrap_or(d.solve_ordering),
            expected_options: env_parse("EXPECTED_OPTIONS")?.unwrap_or(d.expected_options),
            click_move_ms: env_parse("CLICK_MOVE_MS")?.unwrap_or(d.click_move_ms),
            payload_wait_ms: env_parse("PAYLOAD_WAIT_MS")?.unwrap_or(d.payload_wait_ms),
            typing_start_delay_ms: env_parse("TYPING_START_DELAY_MS")?.unwrap_or(d.typing_start_delay_ms),
            char_delay_min_ms: env_parse("CHAR_DELAY_MIN_MS")?.unwrap_or(d.char_delay_min_ms),
            char_delay_max_ms: env_parse("CHAR_DELAY_MAX_MS")?.unwrap_or(d.char_delay_max_ms),
            burst_every: env_parse("BURST_EVERY")?.unwrap_or(d.burst_every),
            burst_pause_min_ms: env_parse("BURST_PAUSE_MIN_MS")?.unwrap_or(d.burst_pause_min_ms),
            burst_pause_max_ms: env_parse("BURST_PAUSE_MAX_MS")?.unwrap_or(d.burst_pause_max_ms),
            newline_settle_ms: env_parse("NEWLINE_SETTLE_MS")?.unwrap_or(d.newline_settle_ms),
            resume_settle_ms: env_parse("RESUME_SETTLE_MS")?.unwrap_or(d.resume_settle_ms),
            indent_strategy: env_string("INDENT_STRATEGY").unwrap_or(d.indent_strategy),
            indent_width: env_parse("INDENT_WIDTH")?.unwrap_or(d.indent_width),
            hotkeys: d.hotkeys,
        })
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }

    pub fn options_timeout(&self) -> Duration {
        Duration::from_millis(self.options_timeout_ms)
    }

    pub fn payload_wait(&self) -> Duration {
        Duration::from_millis(self.payload_wait_ms)
    }

    pub fn click_move_duration(&self) -> Duration {
        Duration::from_millis(self.click_move_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        Err(_) => Ok(None),
    }
}
