//! 自动输入 - 流程层
//!
//! 把主观题答案逐字输入到当前焦点窗口，支持暂停、恢复和中止。
//!
//! ## 状态机
//!
//! ```text
//! Idle/Finished/Aborted ──try_claim──▶ Typing ◀──resume── Paused
//!                                        │ └────pause(鼠标左键)───▲
//!                                        ├──完成──▶ Finished
//!                                        └──abort──▶ Aborted  (Paused 也可 abort)
//! ```
//!
//! 状态只通过 CAS 迁移；光标只由输入循环写入。

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ReplayError;
use crate::infrastructure::{InputDriver, InputHub};
use crate::models::{OutputKey, PayloadState};
use crate::workflow::indent::IndentStrategy;

/// 输入会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplayStatus {
    Idle = 0,
    Typing = 1,
    Paused = 2,
    Finished = 3,
    Aborted = 4,
}

impl ReplayStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ReplayStatus::Typing,
            2 => ReplayStatus::Paused,
            3 => ReplayStatus::Finished,
            4 => ReplayStatus::Aborted,
            _ => ReplayStatus::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReplayStatus::Typing | ReplayStatus::Paused)
    }
}

/// 唯一的输入会话，由协调中心持有
#[derive(Debug)]
pub struct ReplaySession {
    status: AtomicU8,
    cursor: AtomicUsize,
    wake: Notify,
}

impl Default for ReplaySession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplaySession {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ReplayStatus::Idle as u8),
            cursor: AtomicUsize::new(0),
            wake: Notify::new(),
        }
    }

    pub fn status(&self) -> ReplayStatus {
        ReplayStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// 下一个待输入字符的位置
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    fn transition(&self, from: ReplayStatus, to: ReplayStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// 开始新会话：只能从 Idle/Finished/Aborted 进入 Typing
    pub fn try_claim(&self) -> Result<(), ReplayError> {
        let mut current = self.status.load(Ordering::SeqCst);
        loop {
            if ReplayStatus::from_u8(current).is_active() {
                return Err(ReplayError::AlreadyActive);
            }
            match self.status.compare_exchange(
                current,
                ReplayStatus::Typing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.cursor.store(0, Ordering::SeqCst);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Typing → Paused，返回是否真的发生了迁移
    pub fn pause(&self) -> bool {
        self.transition(ReplayStatus::Typing, ReplayStatus::Paused)
    }

    /// Paused → Typing 并唤醒输入循环，返回恢复位置
    pub fn resume(&self) -> Result<usize, ReplayError> {
        if self.transition(ReplayStatus::Paused, ReplayStatus::Typing) {
            self.wake.notify_one();
            return Ok(self.cursor());
        }
        match self.status() {
            ReplayStatus::Typing => Err(ReplayError::NotPaused),
            _ => Err(ReplayError::NoSession),
        }
    }

    /// Typing/Paused → Aborted 并唤醒输入循环，返回是否有会话被中止
    pub fn abort(&self) -> bool {
        let aborted = self.transition(ReplayStatus::Typing, ReplayStatus::Aborted)
            || self.transition(ReplayStatus::Paused, ReplayStatus::Aborted);
        if aborted {
            self.wake.notify_one();
        }
        aborted
    }

    fn finish(&self) -> bool {
        self.transition(ReplayStatus::Typing, ReplayStatus::Finished)
            || self.transition(ReplayStatus::Paused, ReplayStatus::Finished)
    }

    fn set_cursor(&self, cursor: usize) {
        self.cursor.store(cursor, Ordering::SeqCst);
    }

    /// 等到不再是 Paused，返回新的状态
    async fn wait_while_paused(&self) -> ReplayStatus {
        loop {
            let status = self.status();
            if status != ReplayStatus::Paused {
                return status;
            }
            self.wake.notified().await;
        }
    }

    async fn until_aborted(&self) {
        loop {
            if self.status() == ReplayStatus::Aborted {
                return;
            }
            self.wake.notified().await;
        }
    }
}

/// 输入节奏
#[derive(Debug, Clone, Copy)]
pub struct TypingPace {
    pub payload_wait: Duration,
    pub start_delay: Duration,
    pub char_delay: (Duration, Duration),
    /// 每输入这么多个单位额外停顿一次，0 表示不停顿
    pub burst_every: usize,
    pub burst_pause: (Duration, Duration),
    pub newline_settle: Duration,
    pub resume_settle: Duration,
}

impl TypingPace {
    pub fn from_config(config: &Config) -> Self {
        let ms = Duration::from_millis;
        Self {
            payload_wait: config.payload_wait(),
            start_delay: ms(config.typing_start_delay_ms),
            char_delay: (ms(config.char_delay_min_ms), ms(config.char_delay_max_ms)),
            burst_every: config.burst_every,
            burst_pause: (ms(config.burst_pause_min_ms), ms(config.burst_pause_max_ms)),
            newline_settle: ms(config.newline_settle_ms),
            resume_settle: ms(config.resume_settle_ms),
        }
    }

    /// 没有任何延迟，只保留答案等待时间
    pub fn immediate(payload_wait: Duration) -> Self {
        Self {
            payload_wait,
            start_delay: Duration::ZERO,
            char_delay: (Duration::ZERO, Duration::ZERO),
            burst_every: 0,
            burst_pause: (Duration::ZERO, Duration::ZERO),
            newline_settle: Duration::ZERO,
            resume_settle: Duration::ZERO,
        }
    }
}

/// 在 [min, max] 内均匀取一个时长
fn jitter((min, max): (Duration, Duration)) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// 输入结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// 全部输入完成
    Finished { length: usize },
    /// 在 `at` 处被中止，已输入部分保留
    Aborted { at: usize },
}

/// 自动输入引擎
pub struct ReplayEngine {
    driver: Arc<dyn InputDriver>,
    hub: InputHub,
    strategy: Arc<dyn IndentStrategy>,
    pace: TypingPace,
}

impl ReplayEngine {
    pub fn new(
        driver: Arc<dyn InputDriver>,
        hub: InputHub,
        strategy: Arc<dyn IndentStrategy>,
        pace: TypingPace,
    ) -> Self {
        Self {
            driver,
            hub,
            strategy,
            pace,
        }
    }

    /// 占用会话、等待答案、逐字输入
    pub async fn run(
        &self,
        session: &Arc<ReplaySession>,
        mut payload: watch::Receiver<PayloadState>,
    ) -> Result<ReplayOutcome, ReplayError> {
        session.try_claim()?;

        let text = match self.wait_for_payload(session, &mut payload).await {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(ReplayOutcome::Aborted { at: 0 }),
            Err(e) => {
                session.abort();
                warn!("❌ {}", e);
                return Err(e);
            }
        };

        info!("⚠️ 自动输入期间请勿操作键盘，点击鼠标会暂停输入");
        info!(
            "⌨️ {:.1} 秒后开始输入，请现在点击目标输入框...",
            self.pace.start_delay.as_secs_f64()
        );
        if self.sleep_unless_aborted(session, self.pace.start_delay).await {
            return Ok(ReplayOutcome::Aborted { at: 0 });
        }

        let chars: Vec<char> = text.chars().collect();
        let watcher = self.spawn_pointer_watch(Arc::clone(session));
        let result = self.emit(session, &chars).await;
        // 等监听任务真正退出，返回前释放监听，也不会误暂停下一次会话
        watcher.abort();
        let _ = watcher.await;

        match result {
            Ok(ReplayOutcome::Finished { length }) if session.finish() => {
                info!("✅ 输入完成，共 {} 个字符", length);
                Ok(ReplayOutcome::Finished { length })
            }
            Ok(ReplayOutcome::Finished { length }) => Ok(ReplayOutcome::Aborted { at: length }),
            Ok(aborted) => Ok(aborted),
            Err(e) => {
                session.abort();
                warn!("❌ 输入失败: {}", e);
                Err(e)
            }
        }
    }

    /// `Ok(None)` 表示等待期间会话被中止
    async fn wait_for_payload(
        &self,
        session: &ReplaySession,
        payload: &mut watch::Receiver<PayloadState>,
    ) -> Result<Option<Arc<str>>, ReplayError> {
        if let PayloadState::Ready(text) = &*payload.borrow() {
            return Ok(Some(Arc::clone(text)));
        }

        info!("⏳ 答案尚未就绪，等待中...");
        let waited = self.pace.payload_wait;
        let settled = async {
            payload
                .wait_for(PayloadState::is_settled)
                .await
                .map(|state| state.clone())
        };

        tokio::select! {
            _ = session.until_aborted() => Ok(None),
            result = timeout(waited, settled) => match result {
                Ok(Ok(PayloadState::Ready(text))) => Ok(Some(text)),
                _ => Err(ReplayError::PayloadUnavailable { waited }),
            },
        }
    }

    /// 返回 true 表示睡眠期间会话被中止
    async fn sleep_unless_aborted(&self, session: &ReplaySession, duration: Duration) -> bool {
        tokio::select! {
            _ = sleep(duration) => false,
            _ = session.until_aborted() => true,
        }
    }

    fn spawn_pointer_watch(&self, session: Arc<ReplaySession>) -> JoinHandle<()> {
        // 先订阅再开始输入，不会漏掉第一下点击
        let mut listener = self.hub.subscribe();
        tokio::spawn(async move {
            while let Some(event) = listener.recv().await {
                if event.left_press().is_some() && session.pause() {
                    info!("⏸️ 检测到鼠标点击，暂停输入（焦点可能已离开）");
                }
            }
        })
    }

    async fn emit(
        &self,
        session: &ReplaySession,
        chars: &[char],
    ) -> Result<ReplayOutcome, ReplayError> {
        let mut cursor = session.cursor();
        let mut emitted = 0usize;

        while cursor < chars.len() {
            match session.status() {
                ReplayStatus::Aborted => {
                    info!("⏹️ 输入已中止，停在位置 {}", cursor);
                    return Ok(ReplayOutcome::Aborted { at: cursor });
                }
                ReplayStatus::Paused => {
                    info!("⏸️ 输入暂停在位置 {}，按恢复热键继续...", cursor);
                    if session.wait_while_paused().await == ReplayStatus::Typing {
                        self.driver.release_modifiers()?;
                        sleep(self.pace.resume_settle).await;
                        info!("▶️ 从位置 {} 继续输入", cursor);
                    }
                    continue;
                }
                _ => {}
            }

            let ch = chars[cursor];
            if ch == '\n' || ch == '\r' {
                self.driver.press_key(OutputKey::Enter)?;
                let mut next = cursor + 1;
                if ch == '\r' && chars.get(next) == Some(&'\n') {
                    next += 1;
                }
                sleep(self.pace.newline_settle).await;

                let skip = self.strategy.skip_after_newline(chars, next);
                if skip > 0 {
                    debug!("⏭️ 跳过 {} 个缩进字符", skip);
                }
                cursor = (next + skip).min(chars.len());
            } else {
                self.driver.type_char(ch)?;
                cursor += 1;
            }
            session.set_cursor(cursor);
            emitted += 1;

            sleep(jitter(self.pace.char_delay)).await;
            if self.pace.burst_every > 0 && emitted % self.pace.burst_every == 0 {
                sleep(jitter(self.pace.burst_pause)).await;
            }
        }

        Ok(ReplayOutcome::Finished {
            length: chars.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::models::{InputEvent, Point, PointerButton};
    use crate::workflow::indent::LookaheadSkip;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Action {
        Char(char),
        Key(OutputKey),
        Release(OutputKey),
    }

    #[derive(Default)]
    struct Recorder {
        actions: Mutex<Vec<Action>>,
    }

    impl Recorder {
        fn typed(&self) -> String {
            self.actions
                .lock()
                .iter()
                .map(|a| match a {
                    Action::Char(c) => c.to_string(),
                    Action::Key(OutputKey::Enter) => "\n".to_string(),
                    _ => String::new(),
                })
                .collect()
        }
    }

    impl InputDriver for Recorder {
        fn move_to(&self, _point: Point, _duration: Duration) -> Result<(), DriverError> {
            Ok(())
        }
        fn click(&self, _button: PointerButton) -> Result<(), DriverError> {
            Ok(())
        }
        fn press_key(&self, key: OutputKey) -> Result<(), DriverError> {
            self.actions.lock().push(Action::Key(key));
            Ok(())
        }
        fn release_key(&self, key: OutputKey) -> Result<(), DriverError> {
            self.actions.lock().push(Action::Release(key));
            Ok(())
        }
        fn type_char(&self, ch: char) -> Result<(), DriverError> {
            self.actions.lock().push(Action::Char(ch));
            Ok(())
        }
    }

    fn engine(recorder: &Arc<Recorder>, hub: &InputHub, pace: TypingPace) -> Arc<ReplayEngine> {
        Arc::new(ReplayEngine::new(
            Arc::clone(recorder) as Arc<dyn InputDriver>,
            hub.clone(),
            Arc::new(LookaheadSkip),
            pace,
        ))
    }

    fn ready(text: &str) -> watch::Receiver<PayloadState> {
        watch::channel(PayloadState::Ready(Arc::from(text))).1
    }

    #[test]
    fn session_transitions_follow_the_state_machine() {
        let session = ReplaySession::new();
        assert!(matches!(session.resume(), Err(ReplayError::NoSession)));
        assert!(!session.pause());

        session.try_claim().unwrap();
        assert!(matches!(session.try_claim(), Err(ReplayError::AlreadyActive)));
        assert!(matches!(session.resume(), Err(ReplayError::NotPaused)));

        assert!(session.pause());
        assert!(!session.pause());
        assert!(matches!(session.try_claim(), Err(ReplayError::AlreadyActive)));
        assert_eq!(session.resume().unwrap(), 0);

        assert!(session.abort());
        assert!(!session.abort());
        assert_eq!(session.status(), ReplayStatus::Aborted);
        assert!(session.try_claim().is_ok());
    }

    #[tokio::test]
    async fn newlines_press_enter_and_skip_indentation() {
        let recorder = Arc::new(Recorder::default());
        let hub = InputHub::new();
        let engine = engine(&recorder, &hub, TypingPace::immediate(Duration::from_secs(1)));
        let session = Arc::new(ReplaySession::new());

        let outcome = engine
            .run(&session, ready("if x {\n    y();\r\n}"))
            .await
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Finished { length: 18 });
        assert_eq!(recorder.typed(), "if x {\ny();\n}");
        assert_eq!(session.status(), ReplayStatus::Finished);
        assert_eq!(session.cursor(), 18);
        assert_eq!(hub.active_listeners(), 0);
    }

    #[tokio::test]
    async fn missing_payload_aborts_the_session() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine(
            &recorder,
            &InputHub::new(),
            TypingPace::immediate(Duration::from_millis(30)),
        );
        let session = Arc::new(ReplaySession::new());
        let (_tx, rx) = watch::channel(PayloadState::Pending);

        let err = engine.run(&session, rx).await.unwrap_err();
        assert!(matches!(err, ReplayError::PayloadUnavailable { .. }));
        assert_eq!(session.status(), ReplayStatus::Aborted);
        assert!(recorder.actions.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_payload_is_reported_without_waiting_out_the_timeout() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine(
            &recorder,
            &InputHub::new(),
            TypingPace::immediate(Duration::from_secs(30)),
        );
        let session = Arc::new(ReplaySession::new());
        let (tx, rx) = watch::channel(PayloadState::Pending);

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { engine.run(&session, rx).await }
        });
        tx.send_replace(PayloadState::Failed);

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ReplayError::PayloadUnavailable { .. })));
    }

    #[tokio::test]
    async fn payload_published_later_is_typed() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine(
            &recorder,
            &InputHub::new(),
            TypingPace::immediate(Duration::from_secs(5)),
        );
        let session = Arc::new(ReplaySession::new());
        let (tx, rx) = watch::channel(PayloadState::Pending);

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { engine.run(&session, rx).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_replace(PayloadState::Ready(Arc::from("ok")));

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, ReplayOutcome::Finished { length: 2 });
        assert_eq!(recorder.typed(), "ok");
    }

    #[tokio::test]
    async fn click_pauses_and_resume_continues_from_the_cursor() {
        let recorder = Arc::new(Recorder::default());
        let hub = InputHub::new();
        let mut pace = TypingPace::immediate(Duration::from_secs(1));
        pace.char_delay = (Duration::from_millis(5), Duration::from_millis(5));
        let engine = engine(&recorder, &hub, pace);
        let session = Arc::new(ReplaySession::new());
        let payload = "abcdefghijklmnopqrst";

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { engine.run(&session, ready(payload)).await }
        });

        while recorder.typed().len() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        hub.publish(InputEvent::Pointer {
            point: Point::new(0, 0),
            button: PointerButton::Left,
            pressed: true,
        });
        while session.status() != ReplayStatus::Paused {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        tokio::time::sleep(Duration::from_millis(30)).await;
        let typed_while_paused = recorder.typed();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(recorder.typed(), typed_while_paused);
        assert_eq!(session.cursor(), typed_while_paused.len());

        session.resume().unwrap();
        let outcome = task.await.unwrap().unwrap();

        assert_eq!(outcome, ReplayOutcome::Finished { length: 20 });
        assert_eq!(hub.active_listeners(), 0);
        assert_eq!(recorder.typed(), payload);
        assert!(recorder
            .actions
            .lock()
            .contains(&Action::Release(OutputKey::Ctrl)));
    }

    #[tokio::test]
    async fn abort_stops_before_the_next_unit() {
        let recorder = Arc::new(Recorder::default());
        let hub = InputHub::new();
        let mut pace = TypingPace::immediate(Duration::from_secs(1));
        pace.char_delay = (Duration::from_millis(5), Duration::from_millis(5));
        let engine = engine(&recorder, &hub, pace);
        let session = Arc::new(ReplaySession::new());

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { engine.run(&session, ready(&"x".repeat(200))).await }
        });
        while recorder.typed().len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(session.abort());

        let outcome = task.await.unwrap().unwrap();
        let ReplayOutcome::Aborted { at } = outcome else {
            panic!("应被中止: {:?}", outcome);
        };
        assert!(at < 200);
        assert_eq!(recorder.typed().len(), at);
        assert_eq!(session.status(), ReplayStatus::Aborted);
        assert_eq!(hub.active_listeners(), 0);
    }

    #[tokio::test]
    async fn finished_session_leaves_no_watch_behind_for_the_next_one() {
        let recorder = Arc::new(Recorder::default());
        let hub = InputHub::new();
        let engine = engine(&recorder, &hub, TypingPace::immediate(Duration::from_secs(1)));
        let session = Arc::new(ReplaySession::new());

        for round in 0..20 {
            engine.run(&session, ready("ab")).await.unwrap();
            assert_eq!(hub.active_listeners(), 0, "第 {} 轮", round);

            // 上一轮的监听已退出，这次点击不会落到新会话上
            session.try_claim().unwrap();
            hub.publish(InputEvent::Pointer {
                point: Point::new(0, 0),
                button: PointerButton::Left,
                pressed: true,
            });
            tokio::task::yield_now().await;
            assert_eq!(session.status(), ReplayStatus::Typing);
            assert!(session.abort());
        }
    }
}
