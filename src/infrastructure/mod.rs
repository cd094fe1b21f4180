pub mod input_driver;
pub mod input_hub;
pub mod input_listener;
pub mod scratch;
pub mod screen;

pub use input_driver::{EnigoDriver, InputDriver};
pub use input_hub::{InputHub, ListenerGuard};
pub use input_listener::spawn_input_listener;
pub use scratch::ScratchDir;
pub use screen::{ScreenCapturer, XcapCapturer};
