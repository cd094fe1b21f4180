//! 集成测试共用的替身实现与辅助函数
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::broadcast;

use mcq_automator::error::{CaptureError, DriverError, InferenceError};
use mcq_automator::infrastructure::{InputDriver, InputHub, ScreenCapturer};
use mcq_automator::models::{
    CapturedRegion, Command, InputEvent, Key, OutputKey, Point, PointerButton,
};
use mcq_automator::orchestrator::{CoordinationHub, HubDeps, HubEvent};
use mcq_automator::services::{EncodedImage, InferenceClient};
use mcq_automator::Config;

pub const WAIT: Duration = Duration::from_secs(5);

// ========== 输入模拟替身 ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverAction {
    MoveTo(Point),
    Click(PointerButton),
    Press(OutputKey),
    Release(OutputKey),
    Char(char),
}

#[derive(Default)]
pub struct MockDriver {
    actions: Mutex<Vec<(Instant, DriverAction)>>,
}

impl MockDriver {
    fn record(&self, action: DriverAction) -> Result<(), DriverError> {
        self.actions.lock().push((Instant::now(), action));
        Ok(())
    }

    pub fn actions(&self) -> Vec<DriverAction> {
        self.actions.lock().iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn clicks(&self) -> Vec<(Instant, DriverAction)> {
        self.actions
            .lock()
            .iter()
            .filter(|(_, a)| matches!(a, DriverAction::Click(_)))
            .cloned()
            .collect()
    }

    /// 已输入的文本，回车记为换行
    pub fn typed(&self) -> String {
        self.actions
            .lock()
            .iter()
            .filter_map(|(_, a)| match a {
                DriverAction::Char(c) => Some(*c),
                DriverAction::Press(OutputKey::Enter) => Some('\n'),
                _ => None,
            })
            .collect()
    }
}

impl InputDriver for MockDriver {
    fn move_to(&self, point: Point, _duration: Duration) -> Result<(), DriverError> {
        self.record(DriverAction::MoveTo(point))
    }

    fn click(&self, button: PointerButton) -> Result<(), DriverError> {
        self.record(DriverAction::Click(button))
    }

    fn press_key(&self, key: OutputKey) -> Result<(), DriverError> {
        self.record(DriverAction::Press(key))
    }

    fn release_key(&self, key: OutputKey) -> Result<(), DriverError> {
        self.record(DriverAction::Release(key))
    }

    fn type_char(&self, ch: char) -> Result<(), DriverError> {
        self.record(DriverAction::Char(ch))
    }
}

// ========== 截屏替身 ==========

#[derive(Default)]
pub struct MockCapturer {
    captures: AtomicUsize,
}

impl MockCapturer {
    pub fn count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl ScreenCapturer for MockCapturer {
    fn capture(&self, region: &CapturedRegion) -> Result<RgbaImage, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(RgbaImage::new(region.width(), region.height()))
    }
}

// ========== 模型替身 ==========

#[derive(Debug, Clone)]
pub struct InferenceCall {
    pub at: Instant,
    pub prompt: String,
    pub images: usize,
}

pub struct MockInference {
    replies: Mutex<VecDeque<Result<String, String>>>,
    delay: Duration,
    calls: Mutex<Vec<InferenceCall>>,
}

impl MockInference {
    pub fn replying(replies: &[&str]) -> Self {
        Self::scripted(replies.iter().map(|r| Ok(r.to_string())).collect(), Duration::ZERO)
    }

    pub fn failing() -> Self {
        Self::scripted(vec![Err("模型不可用".to_string())], Duration::ZERO)
    }

    pub fn scripted(replies: Vec<Result<String, String>>, delay: Duration) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<InferenceCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn complete(
        &self,
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<String, InferenceError> {
        self.calls.lock().push(InferenceCall {
            at: Instant::now(),
            prompt: prompt.to_string(),
            images: images.len(),
        });
        tokio::time::sleep(self.delay).await;

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("没有预设回复".to_string()));
        reply.map_err(|message| {
            InferenceError::api_failed(
                "mock",
                std::io::Error::new(std::io::ErrorKind::Other, message),
            )
        })
    }
}

// ========== 测试环境 ==========

pub struct Harness {
    pub hub: Arc<CoordinationHub>,
    pub input: InputHub,
    pub driver: Arc<MockDriver>,
    pub capturer: Arc<MockCapturer>,
    pub inference: Arc<MockInference>,
    pub events: broadcast::Receiver<HubEvent>,
    pub tmp: TempDir,
}

/// 测试用配置：临时目录、较短的超时、没有输入延迟
pub fn test_config(tmp: &TempDir) -> Config {
    Config {
        scratch_dir: tmp.path().join("screenshots"),
        click_timeout_ms: 3_000,
        options_timeout_ms: 3_000,
        payload_wait_ms: 3_000,
        typing_start_delay_ms: 0,
        char_delay_min_ms: 0,
        char_delay_max_ms: 0,
        burst_every: 0,
        newline_settle_ms: 0,
        resume_settle_ms: 0,
        click_move_ms: 0,
        ..Config::default()
    }
}

pub fn harness(inference: MockInference) -> Harness {
    harness_with(inference, |_| {})
}

pub fn harness_with(inference: MockInference, tweak: impl FnOnce(&mut Config)) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(&tmp);
    tweak(&mut config);

    let input = InputHub::new();
    let driver = Arc::new(MockDriver::default());
    let capturer = Arc::new(MockCapturer::default());
    let inference = Arc::new(inference);

    let hub = CoordinationHub::new(
        &config,
        HubDeps {
            input: input.clone(),
            driver: Arc::clone(&driver) as Arc<dyn InputDriver>,
            capturer: Arc::clone(&capturer) as Arc<dyn ScreenCapturer>,
            inference: Arc::clone(&inference) as Arc<dyn InferenceClient>,
        },
    )
    .unwrap();
    hub.prepare().unwrap();
    let events = hub.subscribe_events();

    Harness {
        hub,
        input,
        driver,
        capturer,
        inference,
        events,
        tmp,
    }
}

impl Harness {
    pub fn dispatch(&self, command: Command) -> Option<tokio::task::JoinHandle<()>> {
        self.hub.dispatch(command)
    }

    pub fn click(&self, x: i32, y: i32) {
        self.input.publish(InputEvent::Pointer {
            point: Point::new(x, y),
            button: PointerButton::Left,
            pressed: true,
        });
        self.input.publish(InputEvent::Pointer {
            point: Point::new(x, y),
            button: PointerButton::Left,
            pressed: false,
        });
    }

    pub fn press(&self, key: Key) {
        self.input.publish(InputEvent::Key { key, pressed: true });
        self.input.publish(InputEvent::Key {
            key,
            pressed: false,
        });
    }

    /// 等到累计订阅数达到 `n`，之后发布的事件一定能被收到
    pub async fn wait_for_subscriptions(&self, n: usize) {
        wait_until(|| self.input.subscriptions_total() >= n).await;
    }

    /// 等待满足条件的事件，跳过其他事件
    pub async fn next_event(&mut self, matches: impl Fn(&HubEvent) -> bool) -> HubEvent {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .expect("等待事件超时")
                .expect("事件通道已关闭");
            if matches(&event) {
                return event;
            }
        }
    }

    /// 截取一个区域：等待订阅后点击左上角和右下角
    pub async fn draw_region(&self, subscriptions_before: usize, from: (i32, i32), to: (i32, i32)) {
        self.wait_for_subscriptions(subscriptions_before + 1).await;
        self.click(from.0, from.1);
        self.click(to.0, to.1);
    }

    /// 截一张主观题截图并生成答案，直到答案就绪
    pub async fn prepare_answer(&mut self) {
        let before = self.input.subscriptions_total();
        let capture = self.dispatch(Command::CaptureSubjective).unwrap();
        self.draw_region(before, (0, 0), (100, 100)).await;
        capture.await.unwrap();

        let generate = self.dispatch(Command::Generate).unwrap();
        generate.await.unwrap();
        self.next_event(|e| matches!(e, HubEvent::AnswerReady { .. }))
            .await;
    }
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "等待条件超时");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
