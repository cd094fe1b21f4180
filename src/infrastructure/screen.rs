//! 截屏 - 基础设施层

use image::RgbaImage;
use tracing::debug;
use xcap::Monitor;

use crate::error::CaptureError;
use crate::models::CapturedRegion;

/// 截屏能力：区域 → 图片
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self, region: &CapturedRegion) -> Result<RgbaImage, CaptureError>;
}

/// 基于 xcap 的主显示器截屏
#[derive(Debug, Default)]
pub struct XcapCapturer;

impl XcapCapturer {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCapturer for XcapCapturer {
    fn capture(&self, region: &CapturedRegion) -> Result<RgbaImage, CaptureError> {
        let monitors = Monitor::all().map_err(CaptureError::screen_failed)?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or(CaptureError::NoMonitor)?;

        let full = monitor.capture_image().map_err(CaptureError::screen_failed)?;

        // 点击坐标是逻辑坐标，截图是物理像素
        let scale = monitor.scale_factor().max(1.0) as f64;
        let origin = region.top_left();
        let x = (((origin.x - monitor.x()) as f64) * scale).max(0.0) as u32;
        let y = (((origin.y - monitor.y()) as f64) * scale).max(0.0) as u32;
        let width = (region.width() as f64 * scale) as u32;
        let height = (region.height() as f64 * scale) as u32;

        crop_within(&full, x, y, width, height)
    }
}

/// 按截图边界裁剪，起点越界时报错
pub fn crop_within(
    full: &RgbaImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<RgbaImage, CaptureError> {
    if x >= full.width() || y >= full.height() {
        return Err(CaptureError::InvalidRegion {
            width: width as i32,
            height: height as i32,
        });
    }
    let width = width.min(full.width() - x);
    let height = height.min(full.height() - y);
    debug!("裁剪截图: ({}, {}) {}x{}", x, y, width, height);
    Ok(image::imageops::crop_imm(full, x, y, width, height).to_image())
}
