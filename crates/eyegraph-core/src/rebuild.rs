//! Full, destructive rebuild of the derived knowledge graph.
//!
//! `eyegraph build` wipes the graph store and repopulates it from the record
//! source. The graph is a disposable index: anything in it can be recreated
//! from the patient and diagnosis collections.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::lock::RebuildLock;
use crate::model::{DiagnosisRecord, PatientRecord, Region, Severity};
use crate::source::{DEFAULT_FETCH_LIMIT, RecordSource};
use crate::store::{GraphSession, GraphStore, NodePattern, PropertyMap, PropertyValue, Statement};

pub const PATIENT_LABEL: &str = "Patient";
pub const REGION_LABEL: &str = "Region";
pub const DISEASE_LEVEL_LABEL: &str = "DiseaseLevel";
pub const LIVES_IN: &str = "LIVES_IN";
pub const HAS_DISEASE: &str = "HAS_DISEASE";

/// Message of the error outcome returned when no session can be obtained.
///
/// Kept byte-for-byte so existing consumers of the build payload keep
/// matching on it.
pub const STORE_UNAVAILABLE_MESSAGE: &str = "Neo4j not connected";

/// Name stored on patients that carry no name.
pub const UNKNOWN_NAME: &str = "Unknown";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Statistics for a completed rebuild.
///
/// Only `nodes_created` is part of the serialized outcome; the rest is for
/// logs and terminal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Patient nodes created.
    pub nodes_created: usize,
    #[serde(skip)]
    pub diagnoses_linked: usize,
    #[serde(skip)]
    pub region_fallbacks: usize,
    #[serde(skip)]
    pub severity_fallbacks: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Result payload of [`GraphRebuildEngine::build_full_graph`].
///
/// Serializes as `{"status":"success","nodes_created":N}` or
/// `{"status":"error","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RebuildOutcome {
    Success(RebuildReport),
    Error { message: String },
}

impl RebuildOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn report(&self) -> Option<&RebuildReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Error { .. } => None,
        }
    }

    fn store_unavailable() -> Self {
        Self::Error {
            message: STORE_UNAVAILABLE_MESSAGE.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Rebuilds the graph from a [`RecordSource`] into a [`GraphStore`].
#[derive(Debug)]
pub struct GraphRebuildEngine<'a, S> {
    store: &'a GraphStore,
    source: S,
    patient_limit: usize,
    diagnosis_limit: usize,
    write_lock: Option<Duration>,
}

impl<'a, S: RecordSource> GraphRebuildEngine<'a, S> {
    /// Engine with default fetch limits and no write lock.
    #[must_use]
    pub const fn new(store: &'a GraphStore, source: S) -> Self {
        Self {
            store,
            source,
            patient_limit: DEFAULT_FETCH_LIMIT,
            diagnosis_limit: DEFAULT_FETCH_LIMIT,
            write_lock: None,
        }
    }

    /// Engine configured from the `[records]` and `[rebuild]` sections.
    #[must_use]
    pub fn from_config(store: &'a GraphStore, source: S, config: &GraphConfig) -> Self {
        let engine = Self::new(store, source)
            .with_limits(config.records.patient_limit, config.records.diagnosis_limit);
        if config.rebuild.write_lock {
            engine.with_write_lock(config.rebuild.lock_timeout())
        } else {
            engine
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, patients: usize, diagnoses: usize) -> Self {
        self.patient_limit = patients;
        self.diagnosis_limit = diagnoses;
        self
    }

    /// Serialize against other rebuilds of the same store, waiting at most
    /// `timeout` for the lock.
    #[must_use]
    pub const fn with_write_lock(mut self, timeout: Duration) -> Self {
        self.write_lock = Some(timeout);
        self
    }

    /// Wipe the graph and rebuild it from the record source.
    ///
    /// 1. Fetch patients and diagnoses (bounded), first diagnosis per patient wins
    /// 2. Open a session, or return the error outcome if the store is down
    /// 3. Delete every node and relationship
    /// 4. Merge the 16 regions and 4 severity levels
    /// 5. Create each patient and link it to its region and severity
    ///
    /// Steps run one statement at a time with no enclosing transaction. A
    /// failure partway leaves the graph partially rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Source`] if the records cannot be read (the graph
    /// is left untouched), [`GraphError::Lock`] if the write lock times out,
    /// and [`GraphError::OperationFailure`] if any store write fails.
    pub fn build_full_graph(&self) -> Result<RebuildOutcome, GraphError> {
        let start = Instant::now();

        let patients = self.source.list_patients(self.patient_limit)?;
        let diagnoses = self.source.list_diagnoses(self.diagnosis_limit)?;
        let diagnosis_map = first_diagnosis_per_patient(&diagnoses);

        let session = match self.store.session() {
            Ok(session) => session,
            Err(err) if err.is_unavailable() => {
                tracing::warn!(error = %err, "graph store unavailable, skipping rebuild");
                return Ok(RebuildOutcome::store_unavailable());
            }
            Err(err) => return Err(err),
        };

        let _lock = match self.write_lock {
            Some(timeout) => Some(RebuildLock::acquire(
                &RebuildLock::path_for(self.store.path()),
                timeout,
            )?),
            None => None,
        };

        tracing::info!(
            patients = patients.len(),
            diagnoses = diagnoses.len(),
            "graph rebuild started"
        );

        let wiped = session.run(&Statement::DetachDeleteAll)?.counters();
        tracing::debug!(
            nodes_deleted = wiped.nodes_deleted,
            relationships_deleted = wiped.relationships_deleted,
            "graph wiped"
        );

        seed_taxonomy(&session)?;

        let mut report = RebuildReport {
            nodes_created: 0,
            diagnoses_linked: 0,
            region_fallbacks: 0,
            severity_fallbacks: 0,
            elapsed: Duration::ZERO,
        };
        for patient in &patients {
            write_patient(
                &session,
                patient,
                diagnosis_map.get(patient.id.as_str()).copied(),
                &mut report,
            )?;
            report.nodes_created += 1;
        }

        session.record_rebuild(Utc::now(), report.nodes_created)?;
        session.close();

        report.elapsed = start.elapsed();
        tracing::info!(
            nodes_created = report.nodes_created,
            diagnoses_linked = report.diagnoses_linked,
            region_fallbacks = report.region_fallbacks,
            severity_fallbacks = report.severity_fallbacks,
            elapsed_ms = report.elapsed.as_millis(),
            "graph rebuild complete"
        );

        Ok(RebuildOutcome::Success(report))
    }
}

fn first_diagnosis_per_patient(diagnoses: &[DiagnosisRecord]) -> HashMap<&str, &DiagnosisRecord> {
    let mut map = HashMap::with_capacity(diagnoses.len());
    for diagnosis in diagnoses {
        map.entry(diagnosis.patient_id.as_str()).or_insert(diagnosis);
    }
    map
}

fn seed_taxonomy(session: &GraphSession) -> Result<(), GraphError> {
    let mut created = 0;
    for region in Region::ALL {
        let properties = PropertyMap::from([("name".to_string(), region.name().into())]);
        created += session
            .run(&Statement::MergeNode {
                pattern: NodePattern::new(REGION_LABEL, region.name()),
                properties,
            })?
            .counters()
            .nodes_created;
    }
    for level in Severity::ALL {
        let properties = PropertyMap::from([
            ("name".to_string(), level.name().into()),
            ("type".to_string(), Severity::DISEASE_TYPE.into()),
            ("rank".to_string(), level.rank().into()),
        ]);
        created += session
            .run(&Statement::MergeNode {
                pattern: NodePattern::new(DISEASE_LEVEL_LABEL, level.name()),
                properties,
            })?
            .counters()
            .nodes_created;
    }
    tracing::debug!(created, "taxonomy seeded");
    Ok(())
}

fn patient_properties(patient: &PatientRecord) -> PropertyMap {
    let mut properties = PropertyMap::new();
    properties.insert("id".into(), patient.id.as_str().into());
    properties.insert(
        "name".into(),
        patient.name.as_deref().unwrap_or(UNKNOWN_NAME).into(),
    );
    if let Some(age) = patient.age {
        properties.insert("age".into(), PropertyValue::from(age));
    }
    if let Some(gender) = &patient.gender {
        properties.insert("gender".into(), gender.as_str().into());
    }
    properties
}

fn write_patient(
    session: &GraphSession,
    patient: &PatientRecord,
    diagnosis: Option<&DiagnosisRecord>,
    report: &mut RebuildReport,
) -> Result<(), GraphError> {
    session.run(&Statement::CreateNode {
        pattern: NodePattern::new(PATIENT_LABEL, patient.id.as_str()),
        properties: patient_properties(patient),
    })?;

    let region = Region::resolve(patient.location.as_deref());
    if region.is_fallback() {
        report.region_fallbacks += 1;
        tracing::warn!(
            patient = %patient.id,
            location = patient.location.as_deref().unwrap_or_default(),
            fallback = %region.value(),
            "unrecognized patient location"
        );
    }
    session.run(&Statement::MergeRelationship {
        source: NodePattern::new(PATIENT_LABEL, patient.id.as_str()),
        rel_type: LIVES_IN.into(),
        target: NodePattern::new(REGION_LABEL, region.value().name()),
    })?;

    let Some(diagnosis) = diagnosis else {
        return Ok(());
    };
    let severity = Severity::resolve(diagnosis.severity());
    if severity.is_fallback() {
        report.severity_fallbacks += 1;
        if let Some(raw) = diagnosis.severity() {
            tracing::warn!(
                patient = %patient.id,
                severity = raw,
                fallback = %severity.value(),
                "unrecognized diagnosis severity"
            );
        }
    }
    session.run(&Statement::MergeRelationship {
        source: NodePattern::new(PATIENT_LABEL, patient.id.as_str()),
        rel_type: HAS_DISEASE.into(),
        target: NodePattern::new(DISEASE_LEVEL_LABEL, severity.value().name()),
    })?;
    report.diagnoses_linked += 1;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
