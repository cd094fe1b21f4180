//! 输入模拟 - 基础设施层
//!
//! [`InputDriver`] 只暴露"移动、点击、按键、输入字符"的能力，全部尽力而为、没有确认通道。
//! 生产实现 [`EnigoDriver`] 把 enigo 放在专用线程上，按提交顺序执行命令。

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use tracing::{debug, warn};

use crate::error::DriverError;
use crate::models::{OutputKey, Point, PointerButton};

/// 输入模拟能力
pub trait InputDriver: Send + Sync {
    /// 在 `duration` 内把鼠标移动到 `point`
    fn move_to(&self, point: Point, duration: Duration) -> Result<(), DriverError>;

    fn click(&self, button: PointerButton) -> Result<(), DriverError>;

    /// 按下并松开
    fn press_key(&self, key: OutputKey) -> Result<(), DriverError>;

    fn release_key(&self, key: OutputKey) -> Result<(), DriverError>;

    fn type_char(&self, ch: char) -> Result<(), DriverError>;

    /// 松开可能残留的修饰键
    fn release_modifiers(&self) -> Result<(), DriverError> {
        for key in [OutputKey::Ctrl, OutputKey::Alt, OutputKey::Shift] {
            self.release_key(key)?;
        }
        Ok(())
    }
}

enum DriverCommand {
    MoveTo { to: Point, duration: Duration },
    Click(PointerButton),
    PressKey(OutputKey),
    ReleaseKey(OutputKey),
    TypeChar(char),
}

/// 基于 enigo 的输入驱动
pub struct EnigoDriver {
    tx: mpsc::Sender<DriverCommand>,
}

impl EnigoDriver {
    /// 启动驱动线程，等待 enigo 初始化完成
    pub fn spawn() -> Result<Self, DriverError> {
        let (tx, rx) = mpsc::channel::<DriverCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        thread::Builder::new()
            .name("input-driver".to_string())
            .spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ready_tx.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                for command in rx {
                    if let Err(e) = execute(&mut enigo, command) {
                        warn!("⚠️ 模拟输入失败: {}", e);
                    }
                }
                debug!("输入模拟线程退出");
            })
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(message)) => Err(DriverError::Unavailable(message)),
            Err(_) => Err(DriverError::Disconnected),
        }
    }

    fn send(&self, command: DriverCommand) -> Result<(), DriverError> {
        self.tx.send(command).map_err(|_| DriverError::Disconnected)
    }
}

impl InputDriver for EnigoDriver {
    fn move_to(&self, point: Point, duration: Duration) -> Result<(), DriverError> {
        self.send(DriverCommand::MoveTo {
            to: point,
            duration,
        })
    }

    fn click(&self, button: PointerButton) -> Result<(), DriverError> {
        self.send(DriverCommand::Click(button))
    }

    fn press_key(&self, key: OutputKey) -> Result<(), DriverError> {
        self.send(DriverCommand::PressKey(key))
    }

    fn release_key(&self, key: OutputKey) -> Result<(), DriverError> {
        self.send(DriverCommand::ReleaseKey(key))
    }

    fn type_char(&self, ch: char) -> Result<(), DriverError> {
        self.send(DriverCommand::TypeChar(ch))
    }
}

fn execute(enigo: &mut Enigo, command: DriverCommand) -> enigo::InputResult<()> {
    match command {
        DriverCommand::MoveTo { to, duration } => glide(enigo, to, duration),
        DriverCommand::Click(button) => enigo.button(enigo_button(button), Direction::Click),
        DriverCommand::PressKey(key) => enigo.key(enigo_key(key), Direction::Click),
        DriverCommand::ReleaseKey(key) => enigo.key(enigo_key(key), Direction::Release),
        DriverCommand::TypeChar(ch) => enigo.key(enigo::Key::Unicode(ch), Direction::Click),
    }
}

/// 线性插值移动，步长约 10ms
fn glide(enigo: &mut Enigo, to: Point, duration: Duration) -> enigo::InputResult<()> {
    let steps = (duration.as_millis() / 10).max(1) as i32;
    let (from_x, from_y) = enigo.location()?;
    let pause = duration / steps as u32;
    for step in 1..=steps {
        let x = from_x + (to.x - from_x) * step / steps;
        let y = from_y + (to.y - from_y) * step / steps;
        enigo.move_mouse(x, y, Coordinate::Abs)?;
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
    Ok(())
}

fn enigo_button(button: PointerButton) -> enigo::Button {
    match button {
        PointerButton::Left | PointerButton::Other => enigo::Button::Left,
        PointerButton::Right => enigo::Button::Right,
        PointerButton::Middle => enigo::Button::Middle,
    }
}

fn enigo_key(key: OutputKey) -> enigo::Key {
    match key {
        OutputKey::Enter => enigo::Key::Return,
        OutputKey::Ctrl => enigo::Key::Control,
        OutputKey::Alt => enigo::Key::Alt,
        OutputKey::Shift => enigo::Key::Shift,
    }
}
