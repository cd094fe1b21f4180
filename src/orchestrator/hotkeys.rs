//! 全局热键
//!
//! 绑定写法形如 `<ctrl>+<alt>+p`。
//! 修饰键必须完全一致才触发；按住不放产生的重复按下事件只触发一次。

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::HotkeyBindings;
use crate::error::ConfigError;
use crate::infrastructure::InputHub;
use crate::models::{Command, InputEvent, Key};
use crate::orchestrator::hub::CoordinationHub;

/// 修饰键状态
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    /// 更新修饰键状态，返回该键是否为修饰键
    fn update(&mut self, key: Key, pressed: bool) -> bool {
        match key {
            Key::Ctrl => self.ctrl = pressed,
            Key::Alt => self.alt = pressed,
            Key::Shift => self.shift = pressed,
            _ => return false,
        }
        true
    }
}

/// 一个组合键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chord {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl FromStr for Chord {
    type Err = ConfigError;

    fn from_str(binding: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidHotkey {
            binding: binding.to_string(),
        };

        let mut modifiers = Modifiers::default();
        let mut key = None;

        for token in binding.split('+').map(|t| t.trim().to_ascii_lowercase()) {
            match token.as_str() {
                "<ctrl>" | "<ctrl_l>" | "<ctrl_r>" => modifiers.ctrl = true,
                "<alt>" | "<alt_l>" | "<alt_r>" | "<alt_gr>" => modifiers.alt = true,
                "<shift>" | "<shift_l>" | "<shift_r>" => modifiers.shift = true,
                other => {
                    let parsed = match other {
                        "<enter>" => Key::Enter,
                        "<esc>" => Key::Escape,
                        single if single.chars().count() == 1 => {
                            let ch = single.chars().next().ok_or_else(invalid)?;
                            if !ch.is_ascii_alphanumeric() {
                                return Err(invalid());
                            }
                            Key::Char(ch)
                        }
                        _ => return Err(invalid()),
                    };
                    if key.replace(parsed).is_some() {
                        return Err(invalid());
                    }
                }
            }
        }

        Ok(Chord {
            modifiers,
            key: key.ok_or_else(invalid)?,
        })
    }
}

/// 把输入事件流匹配成热键命令
#[derive(Debug)]
pub struct HotkeyMatcher {
    bindings: Vec<(Chord, Command)>,
    modifiers: Modifiers,
    held: HashSet<Key>,
}

impl HotkeyMatcher {
    pub fn from_bindings(bindings: &HotkeyBindings) -> Result<Self, ConfigError> {
        let table = [
            (&bindings.capture_context, Command::CaptureContext),
            (&bindings.capture_question, Command::CaptureQuestion),
            (&bindings.capture_subjective, Command::CaptureSubjective),
            (&bindings.generate_answer, Command::Generate),
            (&bindings.type_answer, Command::TypeAnswer),
            (&bindings.resume_typing, Command::ResumeTyping),
            (&bindings.clear_state, Command::ClearState),
            (&bindings.exit, Command::Exit),
        ];

        let mut parsed: Vec<(Chord, Command)> = Vec::with_capacity(table.len());
        for (binding, command) in table {
            let chord: Chord = binding.parse()?;
            if parsed.iter().any(|(existing, _)| *existing == chord) {
                return Err(ConfigError::InvalidHotkey {
                    binding: format!("{} (重复绑定)", binding),
                });
            }
            parsed.push((chord, command));
        }

        Ok(Self {
            bindings: parsed,
            modifiers: Modifiers::default(),
            held: HashSet::new(),
        })
    }

    /// 处理一个输入事件，命中热键时返回命令
    pub fn feed(&mut self, event: InputEvent) -> Option<Command> {
        let InputEvent::Key { key, pressed } = event else {
            return None;
        };

        if self.modifiers.update(key, pressed) {
            return None;
        }

        if !pressed {
            self.held.remove(&key);
            return None;
        }
        // 按住不放的重复事件
        if !self.held.insert(key) {
            return None;
        }

        let chord = Chord {
            modifiers: self.modifiers,
            key,
        };
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == chord)
            .map(|(_, command)| *command)
    }
}

/// 热键分发循环
pub struct HotkeyDispatcher {
    matcher: HotkeyMatcher,
}

impl HotkeyDispatcher {
    pub fn from_bindings(bindings: &HotkeyBindings) -> Result<Self, ConfigError> {
        Ok(Self {
            matcher: HotkeyMatcher::from_bindings(bindings)?,
        })
    }

    /// 持续监听直到 `shutdown` 被取消
    pub async fn run(
        mut self,
        input: InputHub,
        hub: Arc<CoordinationHub>,
        shutdown: CancellationToken,
    ) {
        let mut listener = input.subscribe();
        info!("⌨️ 热键监听已启动");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = listener.recv() => match event {
                    Some(event) => {
                        if let Some(command) = self.matcher.feed(event) {
                            debug!("命中热键: {:?}", command);
                            hub.dispatch(command);
                        }
                    }
                    None => break,
                },
            }
        }

        info!("⌨️ 热键监听已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: Key) -> InputEvent {
        InputEvent::Key { key, pressed: true }
    }

    fn release(key: Key) -> InputEvent {
        InputEvent::Key {
            key,
            pressed: false,
        }
    }

    #[test]
    fn chords_parse_modifier_and_key_tokens() {
        let chord: Chord = "<ctrl>+<alt>+P".parse().unwrap();
        assert_eq!(chord.key, Key::Char('p'));
        assert!(chord.modifiers.ctrl && chord.modifiers.alt && !chord.modifiers.shift);

        for bad in ["<ctrl>+<alt>", "<ctrl>+ab", "<ctrl>+a+b", "<hyper>+a", "<ctrl>+?"] {
            assert!(bad.parse::<Chord>().is_err(), "{} 应被拒绝", bad);
        }
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let mut bindings = HotkeyBindings::default();
        bindings.exit = bindings.clear_state.clone();
        assert!(HotkeyMatcher::from_bindings(&bindings).is_err());
    }

    #[test]
    fn default_bindings_dispatch_with_exact_modifiers() {
        let mut matcher = HotkeyMatcher::from_bindings(&HotkeyBindings::default()).unwrap();

        assert_eq!(matcher.feed(press(Key::Char('p'))), None);
        matcher.feed(release(Key::Char('p')));

        matcher.feed(press(Key::Ctrl));
        matcher.feed(press(Key::Alt));
        assert_eq!(
            matcher.feed(press(Key::Char('p'))),
            Some(Command::CaptureQuestion)
        );
        // 自动重复
        assert_eq!(matcher.feed(press(Key::Char('p'))), None);
        matcher.feed(release(Key::Char('p')));
        assert_eq!(
            matcher.feed(press(Key::Char('z'))),
            Some(Command::ResumeTyping)
        );
        matcher.feed(release(Key::Char('z')));

        matcher.feed(press(Key::Shift));
        assert_eq!(matcher.feed(press(Key::Char('e'))), None);
    }
}
