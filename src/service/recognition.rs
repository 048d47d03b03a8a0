// 两种实现: 启用 `ocr` 特性时走 Tesseract (leptess)，否则返回错误的存根。
// 未安装 tesseract/leptonica 的机器也能编译和运行其余流程。
use crate::error::PipelineError;
use crate::models::{ReceiptImage, Recognition};
use async_trait::async_trait;

/// 文字识别接口，只负责返回文本和置信度
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &ReceiptImage) -> Result<Recognition, PipelineError>;
}

/// Tesseract OCR
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    language: String,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[cfg(feature = "ocr")]
mod real {
    use super::*;
    use leptess::LepTess;

    fn run(language: &str, bytes: &[u8]) -> Result<Recognition, PipelineError> {
        let mut lt = LepTess::new(None, language)
            .map_err(|e| PipelineError::Recognition(format!("tesseract init: {}", e)))?;
        lt.set_image_from_mem(bytes)
            .map_err(|e| PipelineError::Recognition(format!("tesseract image: {}", e)))?;
        let text = lt
            .get_utf8_text()
            .map_err(|e| PipelineError::Recognition(format!("tesseract run: {}", e)))?;
        let confidence = (lt.mean_text_conf() as f32).clamp(0.0, 100.0);
        Ok(Recognition { text, confidence })
    }

    #[async_trait]
    impl TextRecognizer for TesseractRecognizer {
        async fn recognize(&self, image: &ReceiptImage) -> Result<Recognition, PipelineError> {
            let language = self.language.clone();
            let bytes = image.bytes.clone();
            // Tesseract 是同步 CPU 密集调用
            tokio::task::spawn_blocking(move || run(&language, &bytes))
                .await
                .map_err(|e| PipelineError::Recognition(format!("recognition task: {}", e)))?
        }
    }
}

#[cfg(not(feature = "ocr"))]
mod stub {
    use super::*;

    #[async_trait]
    impl TextRecognizer for TesseractRecognizer {
        async fn recognize(&self, _image: &ReceiptImage) -> Result<Recognition, PipelineError> {
            Err(PipelineError::Recognition(
                "OCR feature not enabled; build with --features ocr and install Tesseract/Leptonica"
                    .to_string(),
            ))
        }
    }
}

#[cfg(all(test, not(feature = "ocr")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn without_ocr_feature_recognition_explains_how_to_enable() {
        let recognizer = TesseractRecognizer::new("eng");
        assert_eq!(recognizer.language(), "eng");

        let image = ReceiptImage::new(vec![1, 2, 3], "image/jpeg");
        let err = recognizer.recognize(&image).await.unwrap_err();

        assert!(matches!(err, PipelineError::Recognition(ref m) if m.contains("--features ocr")));
    }
}
