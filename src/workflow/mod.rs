//! 流程层（Workflow Layer）
//!
//! 定义"一次操作"的完整流程，不持有全局状态：
//! - `capture` - 两次点击 + 截屏
//! - `solve_flow` - 选择题：截题 → 选项/推理会合 → 点击
//! - `replay` - 主观题答案的自动输入
//! - `rendezvous` / `indent` - 上面两个流程用到的小部件

pub mod capture;
pub mod indent;
pub mod rendezvous;
pub mod replay;
pub mod solve_flow;

pub use capture::RegionShooter;
pub use indent::{IndentStrategy, LookaheadSkip, NoSkip, RescanSkip};
pub use rendezvous::{rendezvous, Abandoned, Rendezvous, Signal};
pub use replay::{ReplayEngine, ReplayOutcome, ReplaySession, ReplayStatus, TypingPace};
pub use solve_flow::{SolveFlow, SolveOrdering, SolvePhase, SolveReport};
