//! 全局输入监听 - 基础设施层
//!
//! 在独立线程上运行 `rdev::listen`，把原始事件转换为 [`InputEvent`] 发布到总线。
//! rdev 的按键事件不带坐标，这里用最近一次移动事件的位置补齐。

use std::thread;

use rdev::{Button, EventType};
use tracing::{error, info};

use crate::infrastructure::InputHub;
use crate::models::{InputEvent, Key, Point, PointerButton};

/// 启动全局监听线程
///
/// 线程在进程退出前一直存在，`rdev::listen` 返回即表示系统钩子失效。
pub fn spawn_input_listener(hub: InputHub) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("input-listener".to_string())
        .spawn(move || {
            info!("🎧 全局输入监听已启动");
            let mut cursor = Point::default();
            let callback = move |event: rdev::Event| {
                if let Some(mapped) = map_event(&event.event_type, &mut cursor) {
                    hub.publish(mapped);
                }
            };
            if let Err(e) = rdev::listen(callback) {
                error!("❌ 全局输入监听失败: {:?}", e);
            }
        })
}

fn map_event(event: &EventType, cursor: &mut Point) -> Option<InputEvent> {
    match *event {
        EventType::MouseMove { x, y } => {
            *cursor = Point::new(x.round() as i32, y.round() as i32);
            None
        }
        EventType::ButtonPress(button) => Some(InputEvent::Pointer {
            point: *cursor,
            button: map_button(button),
            pressed: true,
        }),
        EventType::ButtonRelease(button) => Some(InputEvent::Pointer {
            point: *cursor,
            button: map_button(button),
            pressed: false,
        }),
        EventType::KeyPress(key) => Some(InputEvent::Key {
            key: map_key(key),
            pressed: true,
        }),
        EventType::KeyRelease(key) => Some(InputEvent::Key {
            key: map_key(key),
            pressed: false,
        }),
        EventType::Wheel { .. } => None,
    }
}

fn map_button(button: Button) -> PointerButton {
    match button {
        Button::Left => PointerButton::Left,
        Button::Right => PointerButton::Right,
        Button::Middle => PointerButton::Middle,
        _ => PointerButton::Other,
    }
}

fn map_key(key: rdev::Key) -> Key {
    use rdev::Key as K;
    match key {
        K::Return | K::KpReturn => Key::Enter,
        K::Escape => Key::Escape,
        K::ControlLeft | K::ControlRight => Key::Ctrl,
        K::Alt | K::AltGr => Key::Alt,
        K::ShiftLeft | K::ShiftRight => Key::Shift,
        K::KeyA => Key::Char('a'),
        K::KeyB => Key::Char('b'),
        K::KeyC => Key::Char('c'),
        K::KeyD => Key::Char('d'),
        K::KeyE => Key::Char('e'),
        K::KeyF => Key::Char('f'),
        K::KeyG => Key::Char('g'),
        K::KeyH => Key::Char('h'),
        K::KeyI => Key::Char('i'),
        K::KeyJ => Key::Char('j'),
        K::KeyK => Key::Char('k'),
        K::KeyL => Key::Char('l'),
        K::KeyM => Key::Char('m'),
        K::KeyN => Key::Char('n'),
        K::KeyO => Key::Char('o'),
        K::KeyP => Key::Char('p'),
        K::KeyQ => Key::Char('q'),
        K::KeyR => Key::Char('r'),
        K::KeyS => Key::Char('s'),
        K::KeyT => Key::Char('t'),
        K::KeyU => Key::Char('u'),
        K::KeyV => Key::Char('v'),
        K::KeyW => Key::Char('w'),
        K::KeyX => Key::Char('x'),
        K::KeyY => Key::Char('y'),
        K::KeyZ => Key::Char('z'),
        K::Num0 => Key::Char('0'),
        K::Num1 => Key::Char('1'),
        K::Num2 => Key::Char('2'),
        K::Num3 => Key::Char('3'),
        K::Num4 => Key::Char('4'),
        K::Num5 => Key::Char('5'),
        K::Num6 => Key::Char('6'),
        K::Num7 => Key::Char('7'),
        K::Num8 => Key::Char('8'),
        K::Num9 => Key::Char('9'),
        _ => Key::Other,
    }
}
