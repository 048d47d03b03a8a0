use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::models::{CandidateEdit, ConfidenceLevel, ExtractedCandidate, ReceiptImage};
use crate::service::directory::ResidentDirectory;
use crate::service::extractor::extract_fields;
use crate::service::matcher::ResidentMatch;
use crate::service::preprocess::{preprocess, PreprocessOptions};
use crate::service::recognition::TextRecognizer;
use crate::service::recorder::{PaymentRecorder, SaveOutcome, SaveRequest};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const STATUS_IDLE: &str = "Upload a receipt to begin";
const STATUS_IMAGE_READY: &str = "Image ready for processing";
const STATUS_PREPARING: &str = "Preparing image for processing...";
const STATUS_RECOGNIZING: &str = "Extracting text from image...";
const STATUS_ANALYZING: &str = "Analyzing extracted text...";
const STATUS_COMPLETE: &str = "Processing complete!";
const STATUS_FAILED: &str = "Processing failed. Please try again.";

/// 单个回执的处理会话
///
/// 每次上传新图片 generation 加一；处理中途被新上传取代的结果直接丢弃。
#[derive(Debug, Default)]
struct ReceiptSession {
    image: Option<ReceiptImage>,
    candidate: Option<ExtractedCandidate>,
    confidence: Option<f32>,
    suggestion: Option<ResidentMatch>,
    selected_resident: Option<Uuid>,
    selected_month: Option<String>,
    progress: u8,
    status: String,
    processing: bool,
    generation: u64,
}

impl ReceiptSession {
    fn new() -> Self {
        Self {
            status: STATUS_IDLE.to_string(),
            ..Default::default()
        }
    }

    /// 保存成功后清空，准备下一张回执
    fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new();
        self.generation = generation;
    }
}

/// 进行中的识别或保存，离开作用域时清除处理标记
///
/// 请求被取消 (future 被丢弃) 时同样清除；会话已被新上传取代则不动。
struct InFlight<'a> {
    sessions: &'a DashMap<Uuid, ReceiptSession>,
    id: Uuid,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(mut session) = self.sessions.get_mut(&self.id) {
            if session.generation == self.generation {
                session.processing = false;
            }
        }
    }
}

/// 会话对外视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub has_image: bool,
    pub image_size: Option<usize>,
    pub content_type: Option<String>,
    pub candidate: Option<ExtractedCandidate>,
    pub confidence: Option<f32>,
    pub confidence_level: Option<ConfidenceLevel>,
    pub confidence_advice: Option<&'static str>,
    pub suggestion: Option<ResidentMatch>,
    pub selected_resident: Option<Uuid>,
    pub selected_month: Option<String>,
    pub progress: u8,
    pub status: String,
    pub processing: bool,
    pub generation: u64,
}

/// 操作员在复核阶段的修改 (PATCH)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEdit {
    #[serde(default)]
    pub candidate: Option<CandidateEdit>,
    #[serde(default)]
    pub resident_id: Option<Uuid>,
    #[serde(default)]
    pub month_year: Option<String>,
}

/// 回执流水线: 预处理 → 识别 → 提取 → 匹配 → 复核 → 保存
pub struct ReceiptPipeline {
    sessions: DashMap<Uuid, ReceiptSession>,
    recognizer: Arc<dyn TextRecognizer>,
    directory: Arc<ResidentDirectory>,
    recorder: PaymentRecorder,
    preprocess_options: PreprocessOptions,
    max_upload_bytes: usize,
    low_confidence_threshold: f32,
}

impl ReceiptPipeline {
    pub fn new(
        config: &AppConfig,
        recognizer: Arc<dyn TextRecognizer>,
        directory: Arc<ResidentDirectory>,
        recorder: PaymentRecorder,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            recognizer,
            directory,
            recorder,
            preprocess_options: PreprocessOptions::from(&config.pipeline),
            max_upload_bytes: config.pipeline.max_upload_bytes,
            low_confidence_threshold: config.ocr.low_confidence_threshold,
        }
    }

    pub fn directory(&self) -> &Arc<ResidentDirectory> {
        &self.directory
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn create_session(&self) -> SessionView {
        let id = Uuid::new_v4();
        let session = ReceiptSession::new();
        let view = self.view(id, &session);
        self.sessions.insert(id, session);
        debug!("Receipt session {} opened", id);
        view
    }

    pub fn session(&self, id: Uuid) -> Result<SessionView, PipelineError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(PipelineError::SessionNotFound(id))?;
        Ok(self.view(id, &session))
    }

    pub fn discard_session(&self, id: Uuid) -> Result<(), PipelineError> {
        self.sessions
            .remove(&id)
            .map(|_| debug!("Receipt session {} discarded", id))
            .ok_or(PipelineError::SessionNotFound(id))
    }

    /// 接收新图片
    ///
    /// 只接受 image/* 且不超过上限；旧图片的候选结果和进度一并清空，
    /// 仍在处理中的旧任务结果会被丢弃。
    pub fn upload_image(&self, id: Uuid, image: ReceiptImage) -> Result<SessionView, PipelineError> {
        if !image.content_type.starts_with("image/") {
            return Err(PipelineError::InvalidFileType(image.content_type));
        }
        if image.len() > self.max_upload_bytes {
            return Err(PipelineError::FileTooLarge {
                size: image.len(),
                limit: self.max_upload_bytes,
            });
        }
        if image.is_empty() {
            return Err(PipelineError::NoImage);
        }

        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(PipelineError::SessionNotFound(id))?;
        info!(
            "Receipt session {}: received {} ({} bytes)",
            id,
            image.content_type,
            image.len()
        );
        session.image = Some(image);
        session.candidate = None;
        session.confidence = None;
        session.suggestion = None;
        session.progress = 0;
        session.status = STATUS_IMAGE_READY.to_string();
        session.processing = false;
        session.generation += 1;
        Ok(self.view(id, &session))
    }

    /// 预处理、识别、提取字段并匹配住户
    ///
    /// 同一会话已有识别或保存在进行时返回 [`PipelineError::Busy`]。
    pub async fn extract(&self, id: Uuid) -> Result<SessionView, PipelineError> {
        let (image, generation) = {
            let mut session = self
                .sessions
                .get_mut(&id)
                .ok_or(PipelineError::SessionNotFound(id))?;
            if session.processing {
                return Err(PipelineError::Busy);
            }
            let image = session.image.clone().ok_or(PipelineError::NoImage)?;
            session.processing = true;
            session.progress = 10;
            session.status = STATUS_PREPARING.to_string();
            (image, session.generation)
        };
        let _in_flight = self.in_flight(id, generation);

        match self.run_extraction(id, generation, image).await {
            Ok(view) => Ok(view),
            Err(PipelineError::Superseded) => {
                info!("Receipt session {}: result discarded, a newer image was uploaded", id);
                Err(PipelineError::Superseded)
            }
            Err(e) => {
                warn!("Receipt session {}: processing failed: {}", id, e);
                // 已被取代或已删除的会话不再更新
                let _ = self.update_if_current(id, generation, |session| {
                    session.processing = false;
                    session.progress = 0;
                    session.status = STATUS_FAILED.to_string();
                });
                Err(e)
            }
        }
    }

    async fn run_extraction(
        &self,
        id: Uuid,
        generation: u64,
        image: ReceiptImage,
    ) -> Result<SessionView, PipelineError> {
        let options = self.preprocess_options;
        let prepared = tokio::task::spawn_blocking(move || preprocess(&image, options))
            .await
            .map_err(|e| PipelineError::Recognition(format!("preprocess task: {}", e)))??;

        self.update_if_current(id, generation, |session| {
            session.progress = 30;
            session.status = STATUS_RECOGNIZING.to_string();
        })?;
        let recognition = self.recognizer.recognize(&prepared).await?;
        info!(
            "Receipt session {}: recognized {} chars, confidence {:.1}",
            id,
            recognition.text.len(),
            recognition.confidence
        );

        self.update_if_current(id, generation, |session| {
            session.progress = 80;
            session.status = STATUS_ANALYZING.to_string();
        })?;
        let candidate = extract_fields(&recognition.text);
        debug!("Receipt session {}: extracted {:?}", id, candidate);
        let suggestion = self.directory.best_match(&candidate).await;

        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(PipelineError::SessionNotFound(id))?;
        if session.generation != generation {
            return Err(PipelineError::Superseded);
        }
        if session.selected_resident.is_none() {
            session.selected_resident = suggestion.as_ref().map(|m| m.resident_id);
        }
        if session.selected_month.is_none() {
            session.selected_month = candidate.month.clone();
        }
        session.candidate = Some(candidate);
        session.confidence = Some(recognition.confidence);
        session.suggestion = suggestion;
        session.processing = false;
        session.progress = 100;
        session.status = STATUS_COMPLETE.to_string();
        Ok(self.view(id, &session))
    }

    /// 操作员修改候选字段或住户/月份选择
    ///
    /// 未提取过也可以修改，相当于手工录入。
    pub async fn edit(&self, id: Uuid, edit: SessionEdit) -> Result<SessionView, PipelineError> {
        if let Some(resident_id) = edit.resident_id {
            if self.directory.get(resident_id).await.is_none() {
                return Err(PipelineError::UnknownResident(resident_id));
            }
        }

        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(PipelineError::SessionNotFound(id))?;
        if let Some(changes) = edit.candidate {
            changes.apply(session.candidate.get_or_insert_with(ExtractedCandidate::default));
        }
        if let Some(resident_id) = edit.resident_id {
            session.selected_resident = Some(resident_id);
        }
        if let Some(month) = edit.month_year {
            session.selected_month = Some(month.trim().to_string()).filter(|m| !m.is_empty());
        }
        Ok(self.view(id, &session))
    }

    /// 保存复核后的付款，成功后重置会话
    ///
    /// 同一会话同时只允许一个识别或保存，重复提交返回 [`PipelineError::Busy`]。
    pub async fn save(&self, id: Uuid) -> Result<SaveOutcome, PipelineError> {
        let (candidate, resident_id, month_year, image, generation) = {
            let mut session = self
                .sessions
                .get_mut(&id)
                .ok_or(PipelineError::SessionNotFound(id))?;
            if session.processing {
                return Err(PipelineError::Busy);
            }
            let candidate = session
                .candidate
                .clone()
                .ok_or(PipelineError::MissingInformation("receipt details"))?;
            let resident_id = session
                .selected_resident
                .ok_or(PipelineError::MissingInformation("resident"))?;
            let month_year = session
                .selected_month
                .clone()
                .ok_or(PipelineError::MissingInformation("month"))?;
            session.processing = true;
            (candidate, resident_id, month_year, session.image.clone(), session.generation)
        };
        let _in_flight = self.in_flight(id, generation);
        let resident = self
            .directory
            .get(resident_id)
            .await
            .ok_or(PipelineError::UnknownResident(resident_id))?;

        let progress = |percent: u8, status: &str| {
            if let Some(mut session) = self.sessions.get_mut(&id) {
                if session.generation == generation {
                    session.progress = percent;
                    session.status = status.to_string();
                }
            }
        };
        let request = SaveRequest {
            resident: &resident,
            month_year: &month_year,
            candidate: &candidate,
            image: image.as_ref(),
        };

        match self.recorder.record(request, &progress).await {
            Ok(outcome) => {
                if let Some(mut session) = self.sessions.get_mut(&id) {
                    if session.generation == generation {
                        session.reset();
                    }
                }
                info!("Receipt session {}: payment {} saved", id, outcome.payment_id);
                Ok(outcome)
            }
            Err(e) => {
                if let Some(mut session) = self.sessions.get_mut(&id) {
                    if session.generation == generation {
                        session.progress = 0;
                        session.status = e.to_string();
                    }
                }
                Err(e)
            }
        }
    }

    fn in_flight(&self, id: Uuid, generation: u64) -> InFlight<'_> {
        InFlight {
            sessions: &self.sessions,
            id,
            generation,
        }
    }

    fn update_if_current<F>(&self, id: Uuid, generation: u64, apply: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut ReceiptSession),
    {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(PipelineError::SessionNotFound(id))?;
        if session.generation != generation {
            return Err(PipelineError::Superseded);
        }
        apply(&mut session);
        Ok(())
    }

    fn view(&self, id: Uuid, session: &ReceiptSession) -> SessionView {
        let level = session
            .confidence
            .map(|c| ConfidenceLevel::classify(c, self.low_confidence_threshold));
        SessionView {
            id,
            has_image: session.image.is_some(),
            image_size: session.image.as_ref().map(ReceiptImage::len),
            content_type: session.image.as_ref().map(|i| i.content_type.clone()),
            candidate: session.candidate.clone(),
            confidence: session.confidence,
            confidence_level: level,
            confidence_advice: level.map(|l| l.advice()),
            suggestion: session.suggestion.clone(),
            selected_resident: session.selected_resident,
            selected_month: session.selected_month.clone(),
            progress: session.progress,
            status: session.status.clone(),
            processing: session.processing,
            generation: session.generation,
        }
    }
}
