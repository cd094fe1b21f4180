//! 选择题流程 - 流程层
//!
//! 流程顺序：
//! 1. 两次点击截取题目区域 → `question.png`
//! 2. 收集选项位置 与 模型推理 两路并行，在会合点汇合
//! 3. 校验序号后移动鼠标并点击对应选项
//!
//! 失败时不点击、不重试：汇合前失败回到 `Idle`，汇合后失败停在 `Resolved`。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, ConfigError, ResolveError};
use crate::infrastructure::{InputDriver, ScratchDir};
use crate::models::{Answer, InferenceRequest, OptionSet, Point, PointerButton, ResolveMode};
use crate::services::AnswerResolver;
use crate::workflow::capture::RegionShooter;
use crate::workflow::rendezvous::{rendezvous, Signal};

/// 选择题流程所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolvePhase {
    #[default]
    Idle,
    QuestionCaptured,
    OptionsAndInferenceRacing,
    Resolved,
    Acted,
}

/// 选项收集与推理的先后关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveOrdering {
    /// 先收集选项，再以实际选项数发起推理
    #[default]
    OptionsFirst,
    /// 截图后立即推理，同时收集选项，最后按实际选项数复核
    Concurrent,
}

impl FromStr for SolveOrdering {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "options_first" => Ok(SolveOrdering::OptionsFirst),
            "concurrent" => Ok(SolveOrdering::Concurrent),
            other => Err(ConfigError::InvalidValue {
                field: "solve_ordering".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// 一次成功的解答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveReport {
    pub index: usize,
    pub point: Point,
    pub option_count: usize,
}

type InferenceOutcome = Result<Answer, ResolveError>;

pub struct SolveFlow {
    shooter: RegionShooter,
    resolver: Arc<AnswerResolver>,
    driver: Arc<dyn InputDriver>,
    scratch: ScratchDir,
    ordering: SolveOrdering,
    expected_options: usize,
    click_move: Duration,
    language: String,
}

impl SolveFlow {
    pub fn new(
        config: &Config,
        shooter: RegionShooter,
        resolver: Arc<AnswerResolver>,
        driver: Arc<dyn InputDriver>,
        scratch: ScratchDir,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            shooter,
            resolver,
            driver,
            scratch,
            ordering: config.solve_ordering.parse()?,
            expected_options: config.expected_options,
            click_move: config.click_move_duration(),
            language: config.freeform_language.clone(),
        })
    }

    pub fn ordering(&self) -> SolveOrdering {
        self.ordering
    }

    /// 完整执行一次选择题流程
    ///
    /// `context` 存在时使用"阅读材料 + 题目"模式。
    pub async fn run(
        &self,
        context: Option<Arc<RgbaImage>>,
        phase: &watch::Sender<SolvePhase>,
    ) -> Result<SolveReport, AppError> {
        phase.send_replace(SolvePhase::Idle);

        let result = self.attempt(context, phase).await;
        if result.is_err() {
            fall_back_to_idle(phase);
        }
        result
    }

    async fn attempt(
        &self,
        context: Option<Arc<RgbaImage>>,
        phase: &watch::Sender<SolvePhase>,
    ) -> Result<SolveReport, AppError> {
        info!("📸 请截取题目区域");
        let question = self.shooter.shoot().await?;
        let question_path = self.scratch.question_path();
        self.scratch.save_png(&question_path, &question)?;
        enter(phase, SolvePhase::QuestionCaptured);

        let result = self.solve_captured(question, context, phase).await;

        if let Err(e) = self.scratch.remove_file(&question_path) {
            warn!("⚠️ 清理题目截图失败: {}", e);
        }
        result
    }

    async fn solve_captured(
        &self,
        question: Arc<RgbaImage>,
        context: Option<Arc<RgbaImage>>,
        phase: &watch::Sender<SolvePhase>,
    ) -> Result<SolveReport, AppError> {
        let (mode, images) = match context {
            Some(context) => {
                info!("📘 使用阅读材料 + 题目模式");
                (ResolveMode::ContextPlusQuestion, vec![context, question])
            }
            None => (ResolveMode::SingleImage, vec![question]),
        };

        let (options_ready, answer_ready, meeting) =
            rendezvous::<OptionSet, InferenceOutcome>();
        enter(phase, SolvePhase::OptionsAndInferenceRacing);

        match self.ordering {
            SolveOrdering::OptionsFirst => {
                let options = self.shooter.prompter().await_clicks_until_confirm().await?;
                let request =
                    InferenceRequest::for_mode(mode, images, options.len(), &self.language);
                options_ready.fire(options);
                self.spawn_inference(request, answer_ready);
            }
            SolveOrdering::Concurrent => {
                let request = InferenceRequest::for_mode(
                    mode,
                    images,
                    self.expected_options,
                    &self.language,
                );
                let inference = self.spawn_inference(request, answer_ready);
                match self.shooter.prompter().await_clicks_until_confirm().await {
                    Ok(options) => options_ready.fire(options),
                    Err(e) => {
                        inference.abort();
                        return Err(e.into());
                    }
                }
            }
        }

        let (options, outcome) = meeting
            .await_both()
            .await
            .map_err(|e| ResolveError::WorkerPanicked(e.to_string()))?;
        enter(phase, SolvePhase::Resolved);

        let index = match outcome {
            Ok(Answer::Index(index)) => index,
            Ok(Answer::Text(raw)) => {
                return Err(ResolveError::InvalidAnswer {
                    raw,
                    max: options.len(),
                }
                .into())
            }
            Err(e) => {
                error!("❌ 未能得到有效答案，不执行点击: {}", e);
                return Err(e.into());
            }
        };

        // Concurrent 模式下推理时使用的 N 可能与实际选项数不同
        let point = options.point_for(index).ok_or_else(|| {
            error!("❌ 选项 {} 超出已记录的 {} 个选项", index, options.len());
            ResolveError::InvalidAnswer {
                raw: index.to_string(),
                max: options.len(),
            }
        })?;

        info!("🖱️ 点击选项 {} {}", index, point);
        self.driver.move_to(point, self.click_move)?;
        self.driver.click(PointerButton::Left)?;
        enter(phase, SolvePhase::Acted);

        Ok(SolveReport {
            index,
            point,
            option_count: options.len(),
        })
    }

    fn spawn_inference(
        &self,
        request: InferenceRequest,
        answer_ready: Signal<InferenceOutcome>,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(&self.resolver);
        tokio::spawn(async move {
            answer_ready.fire(resolver.resolve(request).await);
        })
    }
}

fn enter(phase: &watch::Sender<SolvePhase>, next: SolvePhase) {
    info!("🔁 选择题阶段: {:?}", next);
    phase.send_replace(next);
}

/// 汇合前失败的流程回到 Idle；Resolved 之后的失败保留在 Resolved
fn fall_back_to_idle(phase: &watch::Sender<SolvePhase>) {
    let reset = phase.send_if_modified(|current| match current {
        SolvePhase::QuestionCaptured | SolvePhase::OptionsAndInferenceRacing => {
            *current = SolvePhase::Idle;
            true
        }
        _ => false,
    });
    if reset {
        info!("🔁 选择题阶段: {:?}（未完成，已复位）", SolvePhase::Idle);
    }
}
