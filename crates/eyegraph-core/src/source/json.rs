use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::model::{DiagnosisRecord, PatientRecord};

use super::RecordSource;

/// Export file holding the `patients` collection.
pub const PATIENTS_FILE: &str = "patients.json";
/// Export file holding the `diagnosis` collection.
pub const DIAGNOSIS_FILE: &str = "diagnosis.json";

/// Reads collection exports from a directory.
///
/// Each file is either a JSON array or newline-delimited documents (the
/// `mongoexport` default). An empty file lists nothing.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_collection<T: DeserializeOwned>(
        &self,
        file: &str,
        limit: usize,
    ) -> Result<Vec<T>, SourceError> {
        let path = self.dir.join(file);
        let content = std::fs::read_to_string(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;

        let records = if content.trim_start().starts_with('[') {
            decode_array(&path, &content, limit)?
        } else {
            decode_stream(&path, &content, limit)?
        };

        tracing::debug!(
            path = %path.display(),
            count = records.len(),
            limit,
            "listed records"
        );
        Ok(records)
    }
}

impl RecordSource for JsonDirSource {
    fn list_patients(&self, limit: usize) -> Result<Vec<PatientRecord>, SourceError> {
        self.read_collection(PATIENTS_FILE, limit)
    }

    fn list_diagnoses(&self, limit: usize) -> Result<Vec<DiagnosisRecord>, SourceError> {
        self.read_collection(DIAGNOSIS_FILE, limit)
    }
}

/// Decode the first `limit` elements of a JSON array. A file that is not
/// valid JSON reports position 0.
fn decode_array<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    limit: usize,
) -> Result<Vec<T>, SourceError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(content).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            position: 0,
            source,
        })?;

    values
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                position: index + 1,
                source,
            })
        })
        .collect()
}

/// Decode up to `limit` whitespace-separated documents; parsing stops once
/// the limit is reached.
fn decode_stream<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    limit: usize,
) -> Result<Vec<T>, SourceError> {
    serde_json::Deserializer::from_str(content)
        .into_iter::<T>()
        .take(limit)
        .enumerate()
        .map(|(index, record)| {
            record.map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                position: index + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, content: &str) {
        std::fs::write(dir.path().join(file), content).expect("write export");
    }

    #[test]
    fn reads_newline_delimited_export() {
        let dir = TempDir::new().expect("tempdir");
        write(
            &dir,
            PATIENTS_FILE,
            concat!(
                r#"{"_id": {"$oid": "a1"}, "name": "Zhang", "location": "Dali"}"#,
                "\n",
                r#"{"_id": {"$oid": "a2"}, "name": "Li"}"#,
                "\n"
            ),
        );

        let source = JsonDirSource::new(dir.path());
        let patients = source.list_patients(10).expect("list patients");
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0].id, "a1");
        assert_eq!(patients[1].location, None);
    }

    #[test]
    fn reads_json_array_export() {
        let dir = TempDir::new().expect("tempdir");
        write(
            &dir,
            DIAGNOSIS_FILE,
            r#"[
                {"patient_id": "a1", "ai_analysis": {"severity": "Mild"}},
                {"patient_id": "a2"}
            ]"#,
        );

        let source = JsonDirSource::new(dir.path());
        let diagnoses = source.list_diagnoses(10).expect("list diagnoses");
        assert_eq!(diagnoses.len(), 2);
        assert_eq!(diagnoses[0].severity(), Some("Mild"));
    }

    #[test]
    fn listing_respects_limit() {
        let dir = TempDir::new().expect("tempdir");
        let lines: String = (0..20)
            .map(|i| format!("{{\"_id\": \"P{i}\"}}\n"))
            .collect();
        write(&dir, PATIENTS_FILE, &lines);

        let source = JsonDirSource::new(dir.path());
        assert_eq!(source.list_patients(5).expect("list").len(), 5);
    }

    #[test]
    fn malformed_document_reports_position() {
        let dir = TempDir::new().expect("tempdir");
        write(
            &dir,
            PATIENTS_FILE,
            "{\"_id\": \"P1\"}\n{\"name\": \"missing id\"}\n",
        );

        let source = JsonDirSource::new(dir.path());
        let err = source.list_patients(10).expect_err("second document is invalid");
        match err {
            SourceError::Parse { position, path, .. } => {
                assert_eq!(position, 2);
                assert!(path.ends_with(PATIENTS_FILE));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let source = JsonDirSource::new(dir.path());
        let err = source.list_diagnoses(10).expect_err("no export file");
        assert!(matches!(err, SourceError::Io { .. }));
        assert!(err.to_string().contains(DIAGNOSIS_FILE));
    }

    #[test]
    fn empty_file_lists_nothing() {
        let dir = TempDir::new().expect("tempdir");
        write(&dir, DIAGNOSIS_FILE, "");
        let source = JsonDirSource::new(dir.path());
        assert!(source.list_diagnoses(10).expect("list").is_empty());
    }
}
