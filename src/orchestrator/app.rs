//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：启动横幅、截图目录、全局输入监听、输入模拟线程、模型客户端
//! 2. **资源管理**：持有监听线程和协调中心，确保生命周期正确
//! 3. **运行**：热键循环，直到退出热键或 Ctrl+C

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::infrastructure::{spawn_input_listener, EnigoDriver, InputHub, XcapCapturer};
use crate::orchestrator::hotkeys::HotkeyDispatcher;
use crate::orchestrator::hub::{CoordinationHub, HubDeps};
use crate::services::LlmService;
use crate::utils::logging::{log_hotkeys, log_startup};

/// 应用主结构
pub struct App {
    input: InputHub,
    hub: Arc<CoordinationHub>,
    dispatcher: HotkeyDispatcher,
    _listener: thread::JoinHandle<()>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let dispatcher = HotkeyDispatcher::from_bindings(&config.hotkeys)?;

        let input = InputHub::new();
        let listener = spawn_input_listener(input.clone())?;
        let driver = EnigoDriver::spawn()?;

        let hub = CoordinationHub::new(
            &config,
            HubDeps {
                input: input.clone(),
                driver: Arc::new(driver),
                capturer: Arc::new(XcapCapturer::new()),
                inference: Arc::new(LlmService::new(&config)),
            },
        )?;
        hub.prepare()?;

        log_hotkeys(&config.hotkeys);
        info!("✅ 初始化完成，等待热键...");

        Ok(Self {
            input,
            hub,
            dispatcher,
            _listener: listener,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        let shutdown = self.hub.shutdown_token();
        let hotkeys = tokio::spawn(self.dispatcher.run(
            self.input.clone(),
            Arc::clone(&self.hub),
            shutdown.clone(),
        ));

        tokio::select! {
            _ = shutdown.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("收到 Ctrl+C");
                self.hub.exit();
            }
        }

        hotkeys.await?;
        info!("👋 程序已退出");
        Ok(())
    }
}
