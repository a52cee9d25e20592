// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod classify;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod discovery;
pub mod estimate;
pub mod export;
pub mod geocode;
pub mod installer;
pub mod links;
pub mod logger;
pub mod pipeline;
pub mod rate_limit;
pub mod reconcile;
pub mod store;

pub use installer::{EnrichmentResult, Installer, InstallerCandidate, ScanLogEntry, ScanStatus, Stage};
pub use pipeline::{Pipeline, RunFailure, RunOptions, RunReport, RunTarget};
pub use store::{InstallerStore, JsonFileStore};
