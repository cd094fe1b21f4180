pub mod answer;
pub mod geometry;
pub mod input;

pub use answer::{Answer, InferenceRequest, PayloadState, ResolveMode};
pub use geometry::{CapturedRegion, OptionSet, Point};
pub use input::{Command, InputEvent, Key, OutputKey, PointerButton};
