//! Pipeline orchestrator
//!
//! Drives one discovery & enrichment run: Discovering -> Reconciling ->
//! (per-installer: Crawling -> Classifying -> Estimating) -> Done.
//!
//! The discovery phase is fatal-on-error for the whole run. The per-installer
//! phase is not: each installer runs to completion or failure independently
//! and contributes to an aggregate report, so one unreachable website cannot
//! abort the batch. Installers are processed strictly sequentially, which is
//! what lets the rate limiter enforce per-service spacing without any
//! cross-task coordination.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::classify;
use crate::config::{AppConfig, EstimatorConfig};
use crate::crawler::Crawler;
use crate::discovery::{DiscoveryClient, DiscoveryError, MAX_RADIUS_METERS};
use crate::estimate::{self, CapacityEstimate};
use crate::geocode::{GeocodeClient, GeocodeError};
use crate::installer::{EnrichmentResult, Installer, ScanLogEntry, Stage};
use crate::logger::PipelineLogger;
use crate::rate_limit::RateLimiter;
use crate::reconcile;
use crate::store::InstallerStore;

/// Where to center a run.
#[derive(Debug, Clone)]
pub enum RunTarget {
    Coordinates { lat: f64, lon: f64 },
    /// Free-text location, geocoded before discovery.
    Location(String),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target: RunTarget,
    pub radius_m: u32,
    /// When false, reconciliation still runs but websites are not crawled.
    pub enrich: bool,
    /// Checked between installers, never mid-fetch.
    pub max_runtime: Option<Duration>,
}

/// Whole-run fatal errors. Everything else lands in the report's error list.
#[derive(Error, Debug)]
pub enum RunFailure {
    #[error("configuration: {0}")]
    Config(String),

    #[error("geocoding service: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("discovery service: {0}")]
    Discovery(DiscoveryError),
}

impl From<DiscoveryError> for RunFailure {
    fn from(error: DiscoveryError) -> Self {
        match error {
            // The radius cap is a configuration problem, not an outage.
            DiscoveryError::RadiusExceedsCap { .. } => RunFailure::Config(error.to_string()),
            other => RunFailure::Discovery(other),
        }
    }
}

/// One per-candidate failure, with enough context to act on it from the
/// report alone.
#[derive(Debug, Clone, Serialize)]
pub struct RunErrorEntry {
    pub stage: Stage,
    pub subject: String,
    pub message: String,
}

/// An installer that completed the per-installer phase, with its enrichment
/// outcome and capacity estimate.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedInstaller {
    pub installer: Installer,
    pub enrichment: Option<EnrichmentResult>,
    pub estimate: CapacityEstimate,
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub discovered: usize,
    pub processed: usize,
    pub installers: Vec<ProcessedInstaller>,
    pub errors: Vec<RunErrorEntry>,
}

pub struct Pipeline {
    discovery: DiscoveryClient,
    geocoder: GeocodeClient,
    crawler: Crawler,
    limiter: RateLimiter,
    estimator: EstimatorConfig,
}

impl Pipeline {
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            discovery: DiscoveryClient::from_config(&config.discovery, &config.http.user_agent)?,
            geocoder: GeocodeClient::from_config(&config.geocoding, &config.http.user_agent)?,
            crawler: Crawler::from_config(&config.http)?,
            limiter: RateLimiter::from_config(&config.rate_limit),
            estimator: config.estimator.clone(),
        })
    }

    /// Execute one run. Returns `Err` only for whole-run fatal conditions;
    /// partial failure is reported through [`RunReport::errors`].
    pub async fn run(
        &mut self,
        store: &mut dyn InstallerStore,
        options: &RunOptions,
        logger: &PipelineLogger,
    ) -> Result<RunReport, RunFailure> {
        // Fail fast on configuration problems, before any network call.
        if options.radius_m > MAX_RADIUS_METERS {
            return Err(RunFailure::Config(format!(
                "radius {} m exceeds the fair-use cap of {} m",
                options.radius_m, MAX_RADIUS_METERS
            )));
        }

        let (lat, lon) = match &options.target {
            RunTarget::Coordinates { lat, lon } => (*lat, *lon),
            RunTarget::Location(query) => {
                logger.info(&format!("Resolving location '{}'", query));
                match self.geocoder.resolve(query).await? {
                    Some(coords) => coords,
                    None => {
                        return Err(RunFailure::Config(format!(
                            "could not resolve location '{}'",
                            query
                        )))
                    }
                }
            }
        };

        logger.info(&format!(
            "Discovering solar installers within {} m of ({:.4}, {:.4})",
            options.radius_m, lat, lon
        ));
        let candidates = match self
            .discovery
            .search(&mut self.limiter, lat, lon, options.radius_m)
            .await
        {
            Ok(candidates) => candidates,
            Err(error) => {
                store.append_log(ScanLogEntry::error(
                    None,
                    Stage::Discovery,
                    format!("discovery failed: {}", error),
                ));
                logger.error(&format!("Discovery failed: {}", error));
                return Err(error.into());
            }
        };

        let discovered = candidates.len();
        store.append_log(ScanLogEntry::ok(
            None,
            Stage::Discovery,
            format!("discovered {} candidates", discovered),
        ));
        logger.info(&format!("Discovered {} candidates", discovered));

        let deadline = options.max_runtime.map(|limit| Instant::now() + limit);
        let mut report = RunReport {
            discovered,
            processed: 0,
            installers: Vec::with_capacity(discovered),
            errors: Vec::new(),
        };

        logger.start_progress(discovered as u64);
        for candidate in &candidates {
            // Cancellation is only checked between installers so in-flight
            // fetches either finish or fail on their own timeout.
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!("Run deadline reached with candidates remaining");
                    report.errors.push(RunErrorEntry {
                        stage: Stage::Reconcile,
                        subject: candidate.name.clone(),
                        message: "run deadline reached before this candidate was processed".into(),
                    });
                    break;
                }
            }

            logger.advance(&candidate.name);
            let outcome = match reconcile::reconcile(store, candidate, Utc::now()) {
                Ok(outcome) => outcome,
                Err(error) => {
                    let message = format!("reconciliation failed: {:#}", error);
                    store.append_log(ScanLogEntry::error(None, Stage::Reconcile, message.clone()));
                    report.errors.push(RunErrorEntry {
                        stage: Stage::Reconcile,
                        subject: candidate.name.clone(),
                        message,
                    });
                    continue;
                }
            };

            let mut installer = outcome.into_installer();
            let enrichment = if options.enrich {
                self.enrich(store, &mut installer, &mut report.errors).await
            } else {
                None
            };

            let estimate = estimate::estimate(&installer, &self.estimator);
            store.append_log(ScanLogEntry::ok(
                Some(installer.id),
                Stage::Estimate,
                format!(
                    "estimated {:.0} kW over {} projects (confidence {:.1})",
                    estimate.total_kw, estimate.project_count, estimate.confidence
                ),
            ));

            report.processed += 1;
            report.installers.push(ProcessedInstaller {
                installer,
                enrichment,
                estimate,
            });
        }
        logger.finish_progress(&format!(
            "Processed {}/{} candidates ({} errors)",
            report.processed,
            discovered,
            report.errors.len()
        ));

        info!(
            "Run complete: {} discovered, {} processed, {} errors",
            report.discovered,
            report.processed,
            report.errors.len()
        );
        Ok(report)
    }

    /// Crawl and classify one installer's website, applying the result to the
    /// stored record. Failures are recorded and swallowed; they must not
    /// propagate past this installer.
    async fn enrich(
        &mut self,
        store: &mut dyn InstallerStore,
        installer: &mut Installer,
        errors: &mut Vec<RunErrorEntry>,
    ) -> Option<EnrichmentResult> {
        let website = match installer.website.as_deref() {
            Some(website) if !website.trim().is_empty() => website.to_string(),
            _ => {
                debug!("Installer {} has no website, skipping crawl", installer.id);
                store.append_log(ScanLogEntry::ok(
                    Some(installer.id),
                    Stage::Crawl,
                    "no website on record, crawl skipped",
                ));
                return None;
            }
        };

        match self.crawler.extract_text(&mut self.limiter, &website).await {
            Ok(text) => {
                store.append_log(ScanLogEntry::ok(
                    Some(installer.id),
                    Stage::Crawl,
                    format!("fetched homepage ({} chars of text)", text.len()),
                ));

                let specialties = classify::classify(&text);
                let now = Utc::now();
                // Full replace, not merge: a successful scan is the complete
                // current truth about the site's offerings.
                installer.specialties = specialties.clone();
                installer.last_enriched = Some(now);

                if let Err(error) = store.update(installer) {
                    let message = format!("failed to save enrichment: {:#}", error);
                    store.append_log(ScanLogEntry::error(
                        Some(installer.id),
                        Stage::Classify,
                        message.clone(),
                    ));
                    errors.push(RunErrorEntry {
                        stage: Stage::Classify,
                        subject: installer.name.clone(),
                        message,
                    });
                    return Some(EnrichmentResult {
                        specialties,
                        success: false,
                        error: Some("failed to save enrichment".into()),
                        scanned_at: now,
                    });
                }

                store.append_log(ScanLogEntry::ok(
                    Some(installer.id),
                    Stage::Classify,
                    format!(
                        "matched {} specialties: {}",
                        specialties.len(),
                        specialties.iter().cloned().collect::<Vec<_>>().join(", ")
                    ),
                ));
                Some(EnrichmentResult {
                    specialties,
                    success: true,
                    error: None,
                    scanned_at: now,
                })
            }
            Err(error) => {
                // Includes PolicyDenied: a site declining crawlers is a
                // normal outcome, recorded like any other per-candidate
                // failure. The specialty set is left untouched.
                let message = format!("crawl of {} failed: {}", website, error);
                store.append_log(ScanLogEntry::error(Some(installer.id), Stage::Crawl, message.clone()));
                errors.push(RunErrorEntry {
                    stage: Stage::Crawl,
                    subject: installer.name.clone(),
                    message,
                });
                Some(EnrichmentResult {
                    specialties: Default::default(),
                    success: false,
                    error: Some(error.to_string()),
                    scanned_at: Utc::now(),
                })
            }
        }
    }
}
