pub mod record;
pub mod taxonomy;

pub use record::{AiAnalysis, DiagnosisRecord, PatientRecord};
pub use taxonomy::{Region, Resolved, Severity};
