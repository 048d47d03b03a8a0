use serde::{Deserialize, Serialize};

/// 上传的回执图片 (原始字节 + MIME)
#[derive(Debug, Clone)]
pub struct ReceiptImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ReceiptImage {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 存储路径使用的扩展名
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            _ => "jpg",
        }
    }
}

/// 从回执文本中提取的候选付款记录
///
/// 所有字段都是尽力提取，空字符串表示未找到。`month` 始终有值：
/// 日期无法识别时取提取时刻的当前月份。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedCandidate {
    pub transaction_id: String,
    pub amount: String,
    pub date: String,
    pub payer_info: String,
    pub payee_name: String,
    pub upi_id: String,
    pub month: Option<String>,
}

impl ExtractedCandidate {
    /// 匹配住户至少需要付款方信息或 UPI 账号之一
    pub fn has_payer_signal(&self) -> bool {
        !self.payer_info.is_empty() || !self.upi_id.is_empty()
    }

    /// 没有交易号时用 UPI 账号和付款方拼出的描述
    pub fn transaction_reference(&self) -> String {
        if !self.transaction_id.is_empty() {
            return self.transaction_id.clone();
        }
        format!(
            "UPI: {} | {}",
            non_empty_or(&self.upi_id, "Unknown"),
            non_empty_or(&self.payer_info, "Unknown")
        )
    }
}

/// 操作员在复核阶段的修改，`None` 表示不改
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEdit {
    pub transaction_id: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    pub payer_info: Option<String>,
    pub payee_name: Option<String>,
    pub upi_id: Option<String>,
    pub month: Option<String>,
}

impl CandidateEdit {
    pub fn apply(self, candidate: &mut ExtractedCandidate) {
        if let Some(v) = self.transaction_id {
            candidate.transaction_id = v.trim().to_string();
        }
        if let Some(v) = self.amount {
            candidate.amount = v.trim().replace(',', "");
        }
        if let Some(v) = self.date {
            candidate.date = v.trim().to_string();
        }
        if let Some(v) = self.payer_info {
            candidate.payer_info = v.trim().to_string();
        }
        if let Some(v) = self.payee_name {
            candidate.payee_name = v.trim().to_string();
        }
        if let Some(v) = self.upi_id {
            candidate.upi_id = v.trim().to_lowercase();
        }
        if let Some(v) = self.month {
            candidate.month = Some(v.trim().to_string()).filter(|m| !m.is_empty());
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// OCR 引擎输出
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    pub text: String,
    /// 0-100
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Likely,
}

impl ConfidenceLevel {
    pub fn classify(confidence: f32, threshold: f32) -> Self {
        if confidence < threshold {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Likely
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "Low confidence - review carefully",
            ConfidenceLevel::Likely => "Likely correct - verify before saving",
        }
    }
}
