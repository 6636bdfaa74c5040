use crate::error::SourceError;
use crate::model::{DiagnosisRecord, PatientRecord};

use super::RecordSource;

/// Records held in memory, listed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    patients: Vec<PatientRecord>,
    diagnoses: Vec<DiagnosisRecord>,
}

impl MemorySource {
    #[must_use]
    pub const fn new(patients: Vec<PatientRecord>, diagnoses: Vec<DiagnosisRecord>) -> Self {
        Self {
            patients,
            diagnoses,
        }
    }

    pub fn push_patient(&mut self, patient: PatientRecord) {
        self.patients.push(patient);
    }

    pub fn push_diagnosis(&mut self, diagnosis: DiagnosisRecord) {
        self.diagnoses.push(diagnosis);
    }

    /// Remove a patient and every diagnosis that references it.
    pub fn remove_patient(&mut self, id: &str) {
        self.patients.retain(|p| p.id != id);
        self.diagnoses.retain(|d| d.patient_id != id);
    }
}

impl RecordSource for MemorySource {
    fn list_patients(&self, limit: usize) -> Result<Vec<PatientRecord>, SourceError> {
        Ok(self.patients.iter().take(limit).cloned().collect())
    }

    fn list_diagnoses(&self, limit: usize) -> Result<Vec<DiagnosisRecord>, SourceError> {
        Ok(self.diagnoses.iter().take(limit).cloned().collect())
    }
}
