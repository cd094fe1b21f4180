//! # MCQ Automator
//!
//! 通过全局热键截取屏幕上的题目，交给多模态模型作答，
//! 再以模拟点击或模拟键盘输入的方式把答案填回去。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有系统资源，只暴露能力
//! - `InputHub` - 全局输入事件总线，临时订阅以 guard 形式存在
//! - `EnigoDriver` / `XcapCapturer` - 输入模拟与截屏
//! - `ScratchDir` - 截图临时目录
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `RegionPrompter` - 等待点击，得到区域或选项位置
//! - `LlmService` - 调用模型（带密钥切换）
//! - `AnswerResolver` - 构造提示词、校验答案
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次操作"的完整流程
//! - `SolveFlow` - 截题 → 选项/推理会合 → 点击
//! - `ReplayEngine` - 可暂停、可恢复、可中止的自动输入
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/hub` - 协调中心，持有共享状态并分发热键命令
//! - `orchestrator/app` - 应用生命周期
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, FailureKind};
pub use models::{Answer, Command, InputEvent, PayloadState, Point};
pub use orchestrator::{App, CoordinationHub, HubDeps, HubEvent};
