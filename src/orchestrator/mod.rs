//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责热键分发和共享状态，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行、退出）
//! - 持有全局输入监听线程和输入模拟线程
//!
//! ### `hub` - 协调中心
//! - 唯一持有阅读材料、主观题截图、答案、输入会话的地方
//! - 把热键命令分发成后台任务，控制 single-flight
//! - 统一上报结果和失败
//!
//! ### `hotkeys` - 热键
//! - 解析 `<ctrl>+<alt>+p` 形式的绑定
//! - 从输入总线匹配命令并交给协调中心
//!
//! ## 层次关系
//!
//! ```text
//! app (生命周期)
//!     ↓
//! hotkeys → hub (共享状态 + 分发)
//!     ↓
//! workflow (solve_flow / replay / capture)
//!     ↓
//! services (能力层：prompter / resolver / llm / image)
//!     ↓
//! infrastructure (输入总线、输入模拟、截屏、临时目录)
//! ```

pub mod app;
pub mod hotkeys;
pub mod hub;

// 重新导出主要类型
pub use app::App;
pub use hotkeys::{Chord, HotkeyDispatcher, HotkeyMatcher};
pub use hub::{CoordinationHub, FlightGuard, HubDeps, HubEvent, OperationKind};
