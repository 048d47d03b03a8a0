use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::ReceiptImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

/// 压缩参数
#[derive(Debug, Clone, Copy)]
pub struct PreprocessOptions {
    /// 长边上限 (px)
    pub max_dimension: u32,
    /// JPEG 质量 1-100
    pub quality: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            quality: 70,
        }
    }
}

impl From<&PipelineConfig> for PreprocessOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            quality: config.jpeg_quality.clamp(1, 100),
        }
    }
}

/// 等比缩放后的尺寸，长边不超过 `max`
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scaled = |side: u32, long: u32| {
        ((side as f64 * max as f64 / long as f64).round() as u32).max(1)
    };
    if width > height {
        (max, scaled(height, width))
    } else {
        (scaled(width, height), max)
    }
}

/// 缩放并重新编码为 JPEG，便于 OCR
pub fn preprocess(image: &ReceiptImage, options: PreprocessOptions) -> Result<ReceiptImage, PipelineError> {
    let decoded = image::load_from_memory(&image.bytes).map_err(PipelineError::Decode)?;
    let (width, height) = (decoded.width(), decoded.height());
    let (target_w, target_h) = target_dimensions(width, height, options.max_dimension);

    let resized = if (target_w, target_h) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    // JPEG 不支持 alpha 通道
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, options.quality);
    rgb.write_with_encoder(encoder).map_err(PipelineError::Encode)?;

    tracing::debug!(
        "Preprocessed receipt {}x{} -> {}x{}, {} -> {} bytes",
        width, height, target_w, target_h, image.len(), bytes.len()
    );

    Ok(ReceiptImage::new(bytes, "image/jpeg"))
}
