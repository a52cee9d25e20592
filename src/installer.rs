//! Core data model for the discovery & enrichment pipeline.
//!
//! `InstallerCandidate` is the transient output of one discovery run;
//! `Installer` is the persisted record the reconciler creates or refreshes;
//! `ScanLogEntry` is the append-only audit trail every stage writes to.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinate tolerance used for "same place" checks, in degrees.
/// 0.001° is roughly 100 m at mid latitudes.
pub const COORD_TOLERANCE_DEG: f64 = 0.001;

/// An unreconciled discovery result. Lives only within one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallerCandidate {
    /// Stable identifier from the upstream source (e.g. "node/240512321"),
    /// when the source provides one.
    pub source_id: Option<String>,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// Parsed from the upstream `start_date` tag when present.
    #[serde(default)]
    pub founded_year: Option<i32>,
}

/// A historical project record attached to an installer. Size is optional
/// because portfolio imports are frequently incomplete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub size_kw: Option<f64>,
}

/// The persisted installer entity.
///
/// Invariants maintained by the reconciler: at most one record per external
/// source id, and at most one record per (normalized name, coordinates within
/// [`COORD_TOLERANCE_DEG`]). The pipeline never deletes installers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Installer {
    /// Store-assigned internal id. Zero until inserted.
    pub id: u64,
    pub source_id: Option<String>,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub founded_year: Option<i32>,
    /// Review volume, fed by the directory application outside this core.
    #[serde(default)]
    pub review_count: u32,
    /// Specialty slugs from the fixed vocabulary. Fully replaced on each
    /// successful enrichment.
    #[serde(default)]
    pub specialties: BTreeSet<String>,
    /// Outbound reference links, generated once at creation.
    #[serde(default)]
    pub reference_links: BTreeSet<String>,
    /// Structured portfolio evidence, when the record has been enriched with
    /// project history outside this core.
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub last_enriched: Option<DateTime<Utc>>,
    /// Last time discovery saw this installer (created or refreshed).
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Pipeline stage that produced a log entry or error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discovery,
    Reconcile,
    Crawl,
    Classify,
    Estimate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Discovery => "discovery",
            Stage::Reconcile => "reconcile",
            Stage::Crawl => "crawl",
            Stage::Classify => "classify",
            Stage::Estimate => "estimate",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Ok,
    Error,
}

/// Append-only audit record. Written by every pipeline stage on both success
/// and failure; never mutated or deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub installer_id: Option<u64>,
    pub source: Stage,
    pub status: ScanStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ScanLogEntry {
    pub fn ok(installer_id: Option<u64>, source: Stage, message: impl Into<String>) -> Self {
        Self {
            installer_id,
            source,
            status: ScanStatus::Ok,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(installer_id: Option<u64>, source: Stage, message: impl Into<String>) -> Self {
        Self {
            installer_id,
            source,
            status: ScanStatus::Error,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one specialty scan. Transient; its effect is applied to the
/// installer's specialty set (full replace) and last-enriched timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub specialties: BTreeSet<String>,
    pub success: bool,
    pub error: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// Normalize a business name for equality checks: lowercased, trimmed,
/// inner whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when two points are within [`COORD_TOLERANCE_DEG`] on both axes.
pub fn same_location(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> bool {
    (lat_a - lat_b).abs() <= COORD_TOLERANCE_DEG && (lon_a - lon_b).abs() <= COORD_TOLERANCE_DEG
}
