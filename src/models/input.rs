//! 全局输入事件与热键命令

use super::geometry::Point;

/// 鼠标按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
    Other,
}

/// 逻辑按键（只区分本程序关心的键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Escape,
    Ctrl,
    Alt,
    Shift,
    /// 字母统一为小写
    Char(char),
    Other,
}

/// 监听到的输入事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pointer {
        point: Point,
        button: PointerButton,
        pressed: bool,
    },
    Key {
        key: Key,
        pressed: bool,
    },
}

impl InputEvent {
    /// 是否为左键按下
    pub fn left_press(&self) -> Option<Point> {
        match *self {
            InputEvent::Pointer {
                point,
                button: PointerButton::Left,
                pressed: true,
            } => Some(point),
            _ => None,
        }
    }

    pub fn key_press(&self) -> Option<Key> {
        match *self {
            InputEvent::Key { key, pressed: true } => Some(key),
            _ => None,
        }
    }
}

/// 模拟输入时使用的按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKey {
    Enter,
    Ctrl,
    Alt,
    Shift,
}

/// 热键命令，与热键一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    CaptureContext,
    CaptureQuestion,
    CaptureSubjective,
    Generate,
    TypeAnswer,
    ResumeTyping,
    ClearState,
    Exit,
}
