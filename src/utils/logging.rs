//! 日志工具模块
//!
//! 提供日志初始化、启动横幅和文本截断等辅助函数

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, HotkeyBindings};

/// 初始化日志：控制台 + 日志文件
///
/// 默认级别为 `info`，`verbose_logging` 时为 `debug`；`RUST_LOG` 优先。
pub fn init(config: &Config) -> Result<()> {
    init_log_file(&config.log_file)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    let default_level = if config.verbose_logging { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()?;

    Ok(())
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n自动答题日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 截图答题模式");
    info!("🤖 模型: {}", config.llm_model_name);
    info!(
        "📊 主密钥请求上限: {} 次{}",
        config.request_limit_before_switch,
        if config.llm_api_key_secondary.trim().is_empty() {
            "（未配置备用密钥）"
        } else {
            ""
        }
    );
    info!("📁 截图目录: {}", config.scratch_dir.display());
    info!("🔀 选择题流程: {}", config.solve_ordering);
    info!("{}", "=".repeat(60));

    if config.llm_api_key_primary.trim().is_empty() {
        warn!("⚠️ 未设置 LLM_API_KEY_PRIMARY，模型请求将会失败");
    }
}

/// 打印快捷键说明
pub fn log_hotkeys(hotkeys: &HotkeyBindings) {
    info!("⌨️ 快捷键:");
    info!("  {:<18} 截取阅读材料", hotkeys.capture_context);
    info!("  {:<18} 截取选择题并自动作答", hotkeys.capture_question);
    info!("  {:<18} 截取主观题截图", hotkeys.capture_subjective);
    info!("  {:<18} 生成主观题答案", hotkeys.generate_answer);
    info!("  {:<18} 自动输入答案", hotkeys.type_answer);
    info!("  {:<18} 恢复暂停的输入", hotkeys.resume_typing);
    info!("  {:<18} 清除所有状态", hotkeys.clear_state);
    info!("  {:<18} 退出", hotkeys.exit);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
