pub mod directory;
pub mod extractor;
pub mod matcher;
pub mod months;
pub mod notifier;
pub mod pipeline;
pub mod preprocess;
pub mod recognition;
pub mod recorder;
pub mod storage;

pub use directory::ResidentDirectory;
pub use extractor::{extract_fields, extract_fields_at};
pub use matcher::{best_match, score, ResidentMatch, MATCH_THRESHOLD};
pub use notifier::{HttpNotifier, NotificationReceipt, NotifyError, PaymentNotification, PaymentNotifier};
pub use pipeline::{ReceiptPipeline, SessionEdit, SessionView};
pub use preprocess::{preprocess, PreprocessOptions};
pub use recognition::{TesseractRecognizer, TextRecognizer};
pub use recorder::{ensure_billing_period, PaymentRecorder, SaveOutcome, SaveRequest};
pub use storage::{ContentStore, HttpContentStore, StorageError};
