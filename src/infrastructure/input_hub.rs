//! 输入事件总线 - 基础设施层
//!
//! 全局输入监听线程把事件发布到这里，需要等待点击/按键的任务临时订阅。
//! 订阅以 [`ListenerGuard`] 的形式存在，drop 时自动注销，
//! 因此成功、超时、取消等所有退出路径都会释放监听。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

use crate::models::InputEvent;

const DEFAULT_CAPACITY: usize = 256;

/// 输入事件总线
#[derive(Clone)]
pub struct InputHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    tx: broadcast::Sender<InputEvent>,
    active: AtomicUsize,
    total: AtomicUsize,
}

impl InputHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(HubInner {
                tx,
                active: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
            }),
        }
    }

    /// 发布事件；没有订阅者时直接丢弃
    pub fn publish(&self, event: InputEvent) {
        let _ = self.inner.tx.send(event);
    }

    /// 注册一个临时监听
    pub fn subscribe(&self) -> ListenerGuard {
        let rx = self.inner.tx.subscribe();
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        ListenerGuard {
            rx,
            inner: Arc::clone(&self.inner),
        }
    }

    /// 当前存活的监听数量
    pub fn active_listeners(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// 累计注册过的监听数量（只增不减）
    pub fn subscriptions_total(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }
}

impl Default for InputHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 作用域内的输入监听
pub struct ListenerGuard {
    rx: broadcast::Receiver<InputEvent>,
    inner: Arc<HubInner>,
}

impl ListenerGuard {
    /// 等待下一个事件；总线关闭时返回 `None`
    pub async fn recv(&mut self) -> Option<InputEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("输入监听处理过慢，丢弃了 {} 个事件", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}
