//! 图片压缩 - 业务能力层
//!
//! 发送给模型前缩小尺寸、去掉透明通道并转成 JPEG，减少请求体积。

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use tracing::debug;

use crate::config::Config;
use crate::error::InferenceError;

/// 编码后的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// 转成 `data:` URL，供 Vision API 使用
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// 图片压缩器
#[derive(Debug, Clone, Copy)]
pub struct ImageCompressor {
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl ImageCompressor {
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Self {
        Self {
            max_width,
            max_height,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_image_width,
            config.max_image_height,
            config.image_quality,
        )
    }

    /// 保持宽高比缩放到上限以内
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }
        let ratio = f64::min(
            self.max_width as f64 / width as f64,
            self.max_height as f64 / height as f64,
        );
        (
            ((width as f64 * ratio) as u32).max(1),
            ((height as f64 * ratio) as u32).max(1),
        )
    }

    pub fn compress(&self, image: &RgbaImage) -> Result<EncodedImage, InferenceError> {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = self.target_size(width, height);

        let resized = if (new_width, new_height) != (width, height) {
            debug!(
                "🔧 图片尺寸调整 {}x{} → {}x{}",
                width, height, new_width, new_height
            );
            image::imageops::resize(image, new_width, new_height, FilterType::Lanczos3)
        } else {
            image.clone()
        };

        let flattened = flatten_on_white(&resized);

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), self.quality);
        DynamicImage::ImageRgb8(flattened)
            .write_with_encoder(encoder)
            .map_err(|e| InferenceError::ImageEncodeFailed {
                source: Box::new(e),
            })?;

        debug!(
            "📉 图片压缩: {} 字节 → {} 字节",
            width as usize * height as usize * 4,
            bytes.len()
        );

        Ok(EncodedImage {
            mime: "image/jpeg",
            bytes,
        })
    }
}

/// 透明像素按 alpha 混合到白色背景
fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
