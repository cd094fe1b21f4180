//! 区域/选项捕获 - 业务能力层
//!
//! 只负责"等用户点几下"，不截图、不关心流程。
//! 每次等待都持有一个 [`ListenerGuard`]，任何退出路径都会注销监听。

use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::error::CaptureError;
use crate::infrastructure::{InputHub, ListenerGuard};
use crate::models::{CapturedRegion, Key, OptionSet, Point};

/// 区域捕获器
#[derive(Clone)]
pub struct RegionPrompter {
    hub: InputHub,
    click_timeout: Duration,
    options_timeout: Duration,
    confirm_key: Key,
    cancel_key: Key,
}

/// 单次等待的结果
enum Wait {
    Click(Point),
    Confirm,
}

impl RegionPrompter {
    pub fn new(hub: InputHub, click_timeout: Duration, options_timeout: Duration) -> Self {
        Self {
            hub,
            click_timeout,
            options_timeout,
            confirm_key: Key::Enter,
            cancel_key: Key::Escape,
        }
    }

    /// 等待一次左键点击
    pub async fn await_single_click(&self) -> Result<Point, CaptureError> {
        let mut listener = self.hub.subscribe();
        let deadline = Instant::now() + self.click_timeout;
        self.next_click(&mut listener, deadline).await
    }

    /// 依次等待左上角、右下角两次点击并校验区域
    ///
    /// 两次点击共用一个监听，第二次点击不会落在注销/重新注册的间隙里。
    pub async fn await_region(&self) -> Result<CapturedRegion, CaptureError> {
        let mut listener = self.hub.subscribe();

        info!("🖱️ 请点击区域的左上角...");
        let top_left = self
            .next_click(&mut listener, Instant::now() + self.click_timeout)
            .await?;
        debug!("左上角: {}", top_left);

        info!("🖱️ 请点击区域的右下角...");
        let bottom_right = self
            .next_click(&mut listener, Instant::now() + self.click_timeout)
            .await?;
        debug!("右下角: {}", bottom_right);

        CapturedRegion::from_corners(top_left, bottom_right)
    }

    /// 按顺序记录所有选项点击，直到按下确认键或超时
    ///
    /// 超时与确认等价：用已记录的点击结束收集。
    pub async fn await_clicks_until_confirm(&self) -> Result<OptionSet, CaptureError> {
        let mut listener = self.hub.subscribe();
        let deadline = Instant::now() + self.options_timeout;
        let mut points = Vec::new();

        info!("🖱️ 请依次点击每个选项，全部点完后按 Enter 确认");
        loop {
            match timeout_at(deadline, self.next_input(&mut listener)).await {
                Ok(Ok(Wait::Click(point))) => {
                    points.push(point);
                    info!("✅ 已记录选项 {} 位置 {}", points.len(), point);
                }
                Ok(Ok(Wait::Confirm)) => break,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    info!("⏱️ 选项收集超时，使用已记录的 {} 个选项", points.len());
                    break;
                }
            }
        }

        let options = OptionSet::new(points)?;
        info!("✅ 共记录 {} 个选项", options.len());
        Ok(options)
    }

    async fn next_click(
        &self,
        listener: &mut ListenerGuard,
        deadline: Instant,
    ) -> Result<Point, CaptureError> {
        loop {
            match timeout_at(deadline, self.next_input(listener)).await {
                Ok(Ok(Wait::Click(point))) => return Ok(point),
                // 单击等待时确认键没有意义
                Ok(Ok(Wait::Confirm)) => continue,
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(CaptureError::timed_out(self.click_timeout)),
            }
        }
    }

    /// 读取下一个有意义的输入：左键按下、确认键或取消键
    async fn next_input(&self, listener: &mut ListenerGuard) -> Result<Wait, CaptureError> {
        while let Some(event) = listener.recv().await {
            if let Some(point) = event.left_press() {
                return Ok(Wait::Click(point));
            }
            match event.key_press() {
                Some(key) if key == self.cancel_key => {
                    return Err(CaptureError::UserCancelled {
                        reason: "按下了取消键".to_string(),
                    })
                }
                Some(key) if key == self.confirm_key => return Ok(Wait::Confirm),
                _ => {}
            }
        }
        Err(CaptureError::UserCancelled {
            reason: "输入监听已关闭".to_string(),
        })
    }
}
