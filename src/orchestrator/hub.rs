//! 协调中心 - 编排层
//!
//! 持有所有跨操作共享的状态（阅读材料、主观题截图、答案、输入会话、阶段），
//! 热键命令在这里被分发成独立的后台任务。
//!
//! ## 并发约定
//!
//! - `dispatch` 从不阻塞：耗时操作全部 `tokio::spawn`，恢复/清除/退出直接执行
//! - 同类操作同一时间只能有一个（single-flight），需要等待鼠标点击的操作之间互斥
//! - 所有结果和失败都通过 [`HubEvent`] 统一上报：写 tracing 日志并广播给观察者

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, FailureKind};
use crate::infrastructure::{InputDriver, InputHub, ScratchDir, ScreenCapturer};
use crate::models::{Answer, Command, InferenceRequest, PayloadState, ResolveMode};
use crate::services::{AnswerResolver, ImageCompressor, InferenceClient, RegionPrompter};
use crate::workflow::{
    indent, RegionShooter, ReplayEngine, ReplayOutcome, ReplaySession, SolveFlow, SolvePhase,
    SolveReport, TypingPace,
};

const EVENT_CAPACITY: usize = 64;

/// 外部依赖
pub struct HubDeps {
    pub input: InputHub,
    pub driver: Arc<dyn InputDriver>,
    pub capturer: Arc<dyn ScreenCapturer>,
    pub inference: Arc<dyn InferenceClient>,
}

/// 需要单飞控制的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ContextCapture,
    Solve,
    SubjectiveCapture,
    Generate,
}

impl OperationKind {
    /// 是否需要等待用户点击屏幕
    pub fn uses_pointer(&self) -> bool {
        !matches!(self, OperationKind::Generate)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::ContextCapture => "阅读材料截图",
            OperationKind::Solve => "选择题作答",
            OperationKind::SubjectiveCapture => "主观题截图",
            OperationKind::Generate => "生成答案",
        }
    }
}

/// 单飞凭证，drop 时释放
#[derive(Debug)]
pub struct FlightGuard {
    in_flight: Arc<Mutex<HashSet<OperationKind>>>,
    kind: OperationKind,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.kind);
    }
}

/// 阅读材料状态，清除前一直有效
#[derive(Debug, Default, Clone)]
pub struct ContextState {
    pub image: Option<Arc<RgbaImage>>,
    /// 下一次选择题是否附带阅读材料
    pub include_next: bool,
}

impl ContextState {
    fn active_image(&self) -> Option<Arc<RgbaImage>> {
        self.image.clone().filter(|_| self.include_next)
    }
}

/// 对外广播的事件
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    ContextCaptured,
    SolveCompleted(SolveReport),
    SubjectiveCaptured { count: usize },
    AnswerReady { chars: usize },
    TypingFinished(ReplayOutcome),
    TypingResumed { at: usize },
    StateCleared,
    Shutdown,
    Failed {
        operation: &'static str,
        kind: FailureKind,
        message: String,
    },
}

/// 主观题答案及其代数
///
/// 代数的检查和答案的写入都在 watch 的写锁内完成，清除与发布不会交错。
struct AnswerSlot {
    payload: watch::Sender<PayloadState>,
    /// 每次清除 +1，晚到的答案不会覆盖清除后的状态
    epoch: AtomicU64,
}

impl AnswerSlot {
    fn new() -> Self {
        Self {
            payload: watch::Sender::new(PayloadState::Empty),
            epoch: AtomicU64::new(0),
        }
    }

    /// 标记为生成中，返回本次生成所属的代数
    fn begin(&self) -> u64 {
        let mut epoch = 0;
        self.payload.send_modify(|state| {
            epoch = self.epoch.load(Ordering::SeqCst);
            *state = PayloadState::Pending;
        });
        epoch
    }

    /// 期间没有清除才写入，返回是否写入
    fn publish(&self, epoch: u64, next: PayloadState) -> bool {
        self.payload.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            *state = next;
            true
        })
    }

    /// 进入新的代数并清空答案
    fn reset(&self) {
        self.payload.send_modify(|state| {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            *state = PayloadState::Empty;
        });
    }

    fn state(&self) -> PayloadState {
        self.payload.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<PayloadState> {
        self.payload.subscribe()
    }
}

pub struct CoordinationHub {
    shooter: RegionShooter,
    resolver: Arc<AnswerResolver>,
    solve: SolveFlow,
    replay: ReplayEngine,
    session: Arc<ReplaySession>,
    scratch: ScratchDir,
    language: String,

    context: Mutex<ContextState>,
    shots: Mutex<Vec<Arc<RgbaImage>>>,
    answer: AnswerSlot,
    phase: watch::Sender<SolvePhase>,
    in_flight: Arc<Mutex<HashSet<OperationKind>>>,
    events: broadcast::Sender<HubEvent>,
    shutdown: CancellationToken,
}

impl CoordinationHub {
    pub fn new(config: &Config, deps: HubDeps) -> Result<Arc<Self>, AppError> {
        let scratch = ScratchDir::new(&config.scratch_dir);
        let prompter = RegionPrompter::new(
            deps.input.clone(),
            config.click_timeout(),
            config.options_timeout(),
        );
        let shooter = RegionShooter::new(prompter, deps.capturer);
        let resolver = Arc::new(AnswerResolver::new(
            deps.inference,
            ImageCompressor::from_config(config),
        ));
        let solve = SolveFlow::new(
            config,
            shooter.clone(),
            Arc::clone(&resolver),
            Arc::clone(&deps.driver),
            scratch.clone(),
        )?;
        let replay = ReplayEngine::new(
            deps.driver,
            deps.input,
            indent::from_config(config)?,
            TypingPace::from_config(config),
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Arc::new(Self {
            shooter,
            resolver,
            solve,
            replay,
            session: Arc::new(ReplaySession::new()),
            scratch,
            language: config.freeform_language.clone(),
            context: Mutex::new(ContextState::default()),
            shots: Mutex::new(Vec::new()),
            answer: AnswerSlot::new(),
            phase: watch::Sender::new(SolvePhase::Idle),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            events,
            shutdown: CancellationToken::new(),
        }))
    }

    /// 清空截图目录并建立目录结构
    pub fn prepare(&self) -> Result<(), AppError> {
        self.scratch.prepare()?;
        info!("📁 截图目录已就绪: {}", self.scratch.root().display());
        Ok(())
    }

    // ========== 状态查询 ==========

    pub fn subscribe_events(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    pub fn payload_state(&self) -> PayloadState {
        self.answer.state()
    }

    pub fn solve_phase(&self) -> SolvePhase {
        *self.phase.borrow()
    }

    pub fn context_active(&self) -> bool {
        self.context.lock().active_image().is_some()
    }

    pub fn screenshot_count(&self) -> usize {
        self.shots.lock().len()
    }

    pub fn session(&self) -> &Arc<ReplaySession> {
        &self.session
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // ========== 分发 ==========

    /// 处理一个热键命令，立即返回
    ///
    /// 后台任务的句柄仅供需要等待结果的调用方使用。
    pub fn dispatch(self: &Arc<Self>, command: Command) -> Option<JoinHandle<()>> {
        info!("⌨️ 热键命令: {:?}", command);
        match command {
            Command::CaptureContext => {
                self.spawn_guarded(OperationKind::ContextCapture, |hub| async move {
                    hub.capture_context().await
                })
            }
            Command::CaptureQuestion => {
                self.spawn_guarded(OperationKind::Solve, |hub| async move {
                    hub.solve_question().await
                })
            }
            Command::CaptureSubjective => {
                self.spawn_guarded(OperationKind::SubjectiveCapture, |hub| async move {
                    hub.capture_subjective().await
                })
            }
            Command::Generate => self.spawn_guarded(OperationKind::Generate, |hub| async move {
                hub.generate_answer().await
            }),
            Command::TypeAnswer => {
                let hub = Arc::clone(self);
                Some(tokio::spawn(async move {
                    if let Err(e) = hub.type_answer().await {
                        hub.report("自动输入", e);
                    }
                }))
            }
            Command::ResumeTyping => {
                self.resume_typing();
                None
            }
            Command::ClearState => {
                self.clear_state();
                None
            }
            Command::Exit => {
                self.exit();
                None
            }
        }
    }

    /// 占用单飞位置，失败时返回 `Busy`
    pub fn try_begin(&self, kind: OperationKind) -> Result<FlightGuard, AppError> {
        let mut in_flight = self.in_flight.lock();
        let conflict = in_flight.contains(&kind)
            || (kind.uses_pointer() && in_flight.iter().any(|k| k.uses_pointer()));
        if conflict {
            return Err(AppError::Busy {
                operation: kind.label().to_string(),
            });
        }
        in_flight.insert(kind);
        Ok(FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            kind,
        })
    }

    fn spawn_guarded<F, Fut>(self: &Arc<Self>, kind: OperationKind, op: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let guard = match self.try_begin(kind) {
            Ok(guard) => guard,
            Err(e) => {
                self.report(kind.label(), e);
                return None;
            }
        };

        let hub = Arc::clone(self);
        let operation = op(Arc::clone(self));
        Some(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = operation.await {
                hub.report(kind.label(), e);
            }
        }))
    }

    // ========== 耗时操作 ==========

    async fn capture_context(&self) -> Result<(), AppError> {
        info!("📘 请截取阅读材料区域");
        let image = self.shooter.shoot().await?;
        self.scratch.save_png(&self.scratch.context_path(), &image)?;

        {
            let mut context = self.context.lock();
            context.image = Some(image);
            context.include_next = true;
        }
        self.emit(HubEvent::ContextCaptured);
        Ok(())
    }

    async fn solve_question(&self) -> Result<(), AppError> {
        let context = self.context.lock().active_image();
        let report = self.solve.run(context, &self.phase).await?;
        self.emit(HubEvent::SolveCompleted(report));
        Ok(())
    }

    async fn capture_subjective(&self) -> Result<(), AppError> {
        info!("🖼️ 请截取主观题区域");
        let image = self.shooter.shoot().await?;

        // 同一时间只有一个主观题截图任务，序号不会冲突
        let number = self.shots.lock().len() + 1;
        self.scratch
            .save_png(&self.scratch.subjective_path(number), &image)?;
        self.shots.lock().push(image);

        self.emit(HubEvent::SubjectiveCaptured { count: number });
        Ok(())
    }

    async fn generate_answer(&self) -> Result<(), AppError> {
        let images = self.shots.lock().clone();
        if images.is_empty() {
            return Err(AppError::NoScreenshots);
        }

        let epoch = self.answer.begin();
        info!("🧠 正在根据 {} 张截图生成答案...", images.len());

        let request = InferenceRequest::for_mode(
            ResolveMode::FreeformMultiImage,
            images,
            0,
            &self.language,
        );
        let outcome = match self.resolver.spawn_resolve(request).await {
            Ok(Ok(Answer::Text(text))) => Ok(text),
            Ok(Ok(Answer::Index(index))) => Ok(index.to_string()),
            Ok(Err(e)) => Err(AppError::from(e)),
            Err(e) => Err(AppError::from(e)),
        };

        let (next, result) = match outcome {
            Ok(text) => {
                info!("✅ 答案已生成:");
                info!("{}", "=".repeat(50));
                info!("\n{}", text);
                info!("{}", "=".repeat(50));
                let chars = text.chars().count();
                (PayloadState::Ready(Arc::from(text)), Ok(chars))
            }
            Err(e) => (PayloadState::Failed, Err(e)),
        };
        if !self.answer.publish(epoch, next) {
            warn!("⚠️ 生成期间状态已被清除，丢弃本次结果");
            return Ok(());
        }

        let chars = result?;
        self.emit(HubEvent::AnswerReady { chars });
        Ok(())
    }

    async fn type_answer(&self) -> Result<(), AppError> {
        let outcome = self
            .replay
            .run(&self.session, self.answer.subscribe())
            .await?;
        self.emit(HubEvent::TypingFinished(outcome));
        Ok(())
    }

    // ========== 即时操作 ==========

    pub fn resume_typing(&self) {
        match self.session.resume() {
            Ok(at) => self.emit(HubEvent::TypingResumed { at }),
            Err(e) => self.report("恢复输入", e.into()),
        }
    }

    /// 清除阅读材料、截图和答案，并中止正在进行的输入
    pub fn clear_state(&self) {
        if self.session.abort() {
            info!("⏹️ 已中止正在进行的输入");
        }
        self.answer.reset();
        *self.context.lock() = ContextState::default();
        self.shots.lock().clear();
        self.phase.send_replace(SolvePhase::Idle);

        if let Err(e) = self.scratch.clear() {
            self.report("清除状态", e.into());
        }
        self.emit(HubEvent::StateCleared);
    }

    pub fn exit(&self) {
        self.session.abort();
        if let Err(e) = self.scratch.remove_all() {
            self.report("退出", e.into());
        }
        self.emit(HubEvent::Shutdown);
        self.shutdown.cancel();
    }

    // ========== 上报 ==========

    fn emit(&self, event: HubEvent) {
        match &event {
            HubEvent::ContextCaptured => {
                info!("✅ 阅读材料已保存，后续选择题将附带阅读材料，清除状态后失效")
            }
            HubEvent::SolveCompleted(report) => info!(
                "✅ 已点击第 {}/{} 个选项 {}",
                report.index, report.option_count, report.point
            ),
            HubEvent::SubjectiveCaptured { count } => {
                info!("✅ 已保存第 {} 张主观题截图", count)
            }
            HubEvent::AnswerReady { chars } => {
                info!("✅ 答案已就绪（{} 个字符），按输入热键开始输入", chars)
            }
            HubEvent::TypingFinished(ReplayOutcome::Finished { length }) => {
                info!("✅ 自动输入完成（{} 个字符）", length)
            }
            HubEvent::TypingFinished(ReplayOutcome::Aborted { at }) => {
                info!("⏹️ 自动输入已中止，停在位置 {}", at)
            }
            HubEvent::TypingResumed { at } => info!("▶️ 从位置 {} 恢复输入", at),
            HubEvent::StateCleared => info!("🧹 已清除阅读材料、截图和答案"),
            HubEvent::Shutdown => info!("👋 正在退出..."),
            HubEvent::Failed {
                operation,
                kind,
                message,
            } => match kind {
                FailureKind::UserCancelled | FailureKind::Busy | FailureKind::InvalidInput => {
                    warn!("⚠️ [{}] {}", operation, message)
                }
                _ => error!("❌ [{}] {}", operation, message),
            },
        }
        // 没有观察者时丢弃
        let _ = self.events.send(event);
    }

    fn report(&self, operation: &'static str, err: AppError) {
        self.emit(HubEvent::Failed {
            operation,
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}
