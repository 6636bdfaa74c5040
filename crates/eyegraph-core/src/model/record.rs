//! Patient and diagnosis documents as read from the primary store.
//!
//! Documents are decoded from the JSON that `mongoexport` produces, so ids
//! may arrive either as plain strings or as extended-JSON `{"$oid": "..."}`.

use serde::{Deserialize, Deserializer, Serialize};

/// A patient document from the `patients` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "_id", alias = "id", deserialize_with = "deserialize_record_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl PatientRecord {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            age: None,
            gender: None,
            location: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn with_age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }

    #[must_use]
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// AI image-analysis result attached to a diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub atrophy_rate: Option<f64>,
    #[serde(default)]
    pub ai_confidence: Option<f64>,
}

/// A diagnosis document from the `diagnosis` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub patient_id: String,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

impl DiagnosisRecord {
    #[must_use]
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            ai_analysis: None,
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.ai_analysis = Some(AiAnalysis {
            severity: Some(severity.into()),
            ..AiAnalysis::default()
        });
        self
    }

    /// Severity reported by the analysis, if the analysis ran and set one.
    #[must_use]
    pub fn severity(&self) -> Option<&str> {
        self.ai_analysis
            .as_ref()
            .and_then(|analysis| analysis.severity.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    ObjectId {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

fn deserialize_record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Integer(n) => n.to_string(),
        RawId::ObjectId { oid } => oid,
    })
}
