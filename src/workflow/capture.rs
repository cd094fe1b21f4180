//! 区域截图：两次点击确定区域，再在阻塞线程池里截屏

use std::sync::Arc;

use image::RgbaImage;
use tracing::info;

use crate::error::AppError;
use crate::infrastructure::ScreenCapturer;
use crate::services::RegionPrompter;

#[derive(Clone)]
pub struct RegionShooter {
    prompter: RegionPrompter,
    capturer: Arc<dyn ScreenCapturer>,
}

impl RegionShooter {
    pub fn new(prompter: RegionPrompter, capturer: Arc<dyn ScreenCapturer>) -> Self {
        Self { prompter, capturer }
    }

    pub fn prompter(&self) -> &RegionPrompter {
        &self.prompter
    }

    pub async fn shoot(&self) -> Result<Arc<RgbaImage>, AppError> {
        let region = self.prompter.await_region().await?;
        info!("📐 截图区域: {}", region);

        let capturer = Arc::clone(&self.capturer);
        let image = tokio::task::spawn_blocking(move || capturer.capture(&region)).await??;
        Ok(Arc::new(image))
    }
}
