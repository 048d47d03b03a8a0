pub mod billing;
pub mod candidate;
pub mod payment;
pub mod resident;

pub use billing::{BillingPeriod, NewBillingPeriod, STATUS_PAID};
pub use candidate::{CandidateEdit, ConfidenceLevel, ExtractedCandidate, ReceiptImage, Recognition};
pub use payment::{NewPayment, Payment, PaymentHistoryEntry, PAYMENT_MODE_UPI};
pub use resident::{Resident, ResidentRow, NO_UNIT};
