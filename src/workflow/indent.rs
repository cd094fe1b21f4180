//! 换行后的缩进处理
//!
//! 代码编辑器在回车后会自动缩进，如果再原样输入答案里的缩进就会重复。
//! 换行之后由 [`IndentStrategy`] 决定跳过下一行开头的多少个字符。

use std::sync::Arc;

use crate::config::Config;
use crate::error::ConfigError;

pub trait IndentStrategy: Send + Sync {
    /// `line_start` 是换行符之后第一个字符的位置，返回要跳过的字符数
    fn skip_after_newline(&self, payload: &[char], line_start: usize) -> usize;
}

fn leading_indent(payload: &[char], line_start: usize) -> usize {
    payload
        .iter()
        .skip(line_start)
        .take_while(|c| **c == ' ' || **c == '\t')
        .count()
}

/// 跳过下一行开头的全部空格和制表符（默认）
#[derive(Debug, Default, Clone, Copy)]
pub struct LookaheadSkip;

impl IndentStrategy for LookaheadSkip {
    fn skip_after_newline(&self, payload: &[char], line_start: usize) -> usize {
        leading_indent(payload, line_start)
    }
}

/// 按大括号深度估算编辑器会补的缩进，只跳过这一部分
#[derive(Debug, Clone, Copy)]
pub struct RescanSkip {
    pub width: usize,
}

impl IndentStrategy for RescanSkip {
    fn skip_after_newline(&self, payload: &[char], line_start: usize) -> usize {
        let end = line_start.min(payload.len());
        let depth = payload[..end].iter().fold(0usize, |depth, c| match c {
            '{' => depth + 1,
            '}' => depth.saturating_sub(1),
            _ => depth,
        });

        let indent = leading_indent(payload, line_start);
        let closes_block = payload.get(line_start + indent) == Some(&'}');
        let levels = if closes_block {
            depth.saturating_sub(1)
        } else {
            depth
        };

        indent.min(levels * self.width)
    }
}

/// 原样输入
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSkip;

impl IndentStrategy for NoSkip {
    fn skip_after_newline(&self, _payload: &[char], _line_start: usize) -> usize {
        0
    }
}

/// 根据配置项 `indent_strategy` 选择实现
pub fn from_config(config: &Config) -> Result<Arc<dyn IndentStrategy>, ConfigError> {
    match config.indent_strategy.trim().to_ascii_lowercase().as_str() {
        "lookahead" => Ok(Arc::new(LookaheadSkip)),
        "rescan" => Ok(Arc::new(RescanSkip {
            width: config.indent_width,
        })),
        "none" => Ok(Arc::new(NoSkip)),
        other => Err(ConfigError::InvalidValue {
            field: "indent_strategy".to_string(),
            value: other.to_string(),
        }),
    }
}
