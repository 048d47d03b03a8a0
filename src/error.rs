use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// 操作员可见的提示 (toast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub level: NoticeLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, title, description)
    }

    fn with_level(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Please upload an image file (JPEG, PNG, etc.). Got {0}.")]
    InvalidFileType(String),

    #[error("Please upload an image smaller than {}MB.", .limit / (1024 * 1024))]
    FileTooLarge { size: usize, limit: usize },

    #[error("Invalid payment amount: {0:?}")]
    InvalidAmount(String),

    #[error("Please fill in all required fields ({0}).")]
    MissingInformation(&'static str),

    #[error("Resident {0} is not in the directory")]
    UnknownResident(Uuid),

    #[error("Please upload an image first.")]
    NoImage,

    #[error("Image loading failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image re-encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to extract text from the image: {0}")]
    Recognition(String),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("Receipt session {0} not found")]
    SessionNotFound(Uuid),

    #[error("A newer receipt was uploaded while this one was processing")]
    Superseded,

    #[error("This receipt is already being processed. Please wait.")]
    Busy,
}

impl PipelineError {
    /// toast 标题
    pub fn title(&self) -> &'static str {
        match self {
            PipelineError::InvalidFileType(_) => "Invalid file type",
            PipelineError::FileTooLarge { .. } => "File too large",
            PipelineError::InvalidAmount(_) => "Invalid amount",
            PipelineError::MissingInformation(_) | PipelineError::UnknownResident(_) => {
                "Missing information"
            }
            PipelineError::NoImage => "No image selected",
            PipelineError::Decode(_) | PipelineError::Encode(_) | PipelineError::Recognition(_) => {
                "Processing failed"
            }
            PipelineError::Database(_) => "Error",
            PipelineError::SessionNotFound(_) => "Session expired",
            PipelineError::Superseded => "Result discarded",
            PipelineError::Busy => "Please wait",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::InvalidFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PipelineError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::InvalidAmount(_)
            | PipelineError::MissingInformation(_)
            | PipelineError::UnknownResident(_)
            | PipelineError::NoImage => StatusCode::BAD_REQUEST,
            PipelineError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Encode(_) | PipelineError::Recognition(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Superseded | PipelineError::Busy => StatusCode::CONFLICT,
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.title(), self.to_string())
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "notice": self.notice(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_reports_limit_in_megabytes() {
        let err = PipelineError::FileTooLarge {
            size: 6 * 1024 * 1024,
            limit: 5 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "Please upload an image smaller than 5MB.");
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn database_errors_surface_underlying_message() {
        let err = PipelineError::from(sqlx::Error::Protocol("duplicate key".into()));
        let notice = err.notice();
        assert_eq!(notice.title, "Error");
        assert!(notice.description.contains("duplicate key"));
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[test]
    fn busy_session_is_a_conflict() {
        let err = PipelineError::Busy;
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.title(), "Please wait");
    }
}
