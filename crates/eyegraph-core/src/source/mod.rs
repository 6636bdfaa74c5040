//! Read-only access to the primary record store.

mod json;
mod memory;

pub use json::{DIAGNOSIS_FILE, JsonDirSource, PATIENTS_FILE};
pub use memory::MemorySource;

use crate::error::SourceError;
use crate::model::{DiagnosisRecord, PatientRecord};

/// Default cap on documents fetched per collection.
pub const DEFAULT_FETCH_LIMIT: usize = 1000;

/// Bounded, one-shot listing of the primary store's collections.
///
/// Implementations return at most `limit` documents, in store order.
pub trait RecordSource {
    fn list_patients(&self, limit: usize) -> Result<Vec<PatientRecord>, SourceError>;

    fn list_diagnoses(&self, limit: usize) -> Result<Vec<DiagnosisRecord>, SourceError>;
}

impl<S: RecordSource + ?Sized> RecordSource for &S {
    fn list_patients(&self, limit: usize) -> Result<Vec<PatientRecord>, SourceError> {
        (**self).list_patients(limit)
    }

    fn list_diagnoses(&self, limit: usize) -> Result<Vec<DiagnosisRecord>, SourceError> {
        (**self).list_diagnoses(limit)
    }
}
