//! Installed-capacity estimation
//!
//! Produces a rough installed-capacity figure with an explicit confidence
//! score. Structured portfolio evidence wins when present; otherwise a
//! heuristic from review volume and business age fills in. Anything below
//! 0.5 confidence is low-confidence by contract and must be presented as
//! such downstream.

use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::config::EstimatorConfig;
use crate::installer::Installer;

/// Phrases in an installer's locality fields that point at commercial work.
const COMMERCIAL_LOCALITY_HINTS: &[&str] = &["industrial", "business park", "commercial"];

/// A capacity estimate. `portfolio_backed` records which path produced it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CapacityEstimate {
    pub total_kw: f64,
    pub project_count: u32,
    pub confidence: f64,
    pub portfolio_backed: bool,
}

/// Estimate installed capacity for an installer. Never fails; the worst case
/// is the heuristic floor.
pub fn estimate(installer: &Installer, config: &EstimatorConfig) -> CapacityEstimate {
    let known_sizes: Vec<f64> = installer
        .projects
        .iter()
        .filter_map(|project| project.size_kw)
        .collect();

    if !known_sizes.is_empty() {
        return CapacityEstimate {
            total_kw: known_sizes.iter().sum(),
            project_count: known_sizes.len() as u32,
            confidence: config.portfolio_confidence,
            portfolio_backed: true,
        };
    }

    let years = years_in_business(installer, Utc::now().year());
    estimate_heuristic(installer.review_count, years, looks_commercial(installer), config)
}

/// The heuristic path: project count from review volume and business age,
/// multiplied by an assumed average unit size.
pub fn estimate_heuristic(
    review_count: u32,
    years_in_business: u32,
    commercial: bool,
    config: &EstimatorConfig,
) -> CapacityEstimate {
    let project_count = (review_count / 2 + years_in_business * 5).max(10);
    let unit_kw = if commercial {
        config.commercial_unit_kw
    } else {
        config.residential_unit_kw
    };
    let confidence = if review_count > 0 || years_in_business > 0 {
        config.heuristic_confidence
    } else {
        config.floor_confidence
    };

    CapacityEstimate {
        total_kw: project_count as f64 * unit_kw,
        project_count,
        confidence,
        portfolio_backed: false,
    }
}

fn years_in_business(installer: &Installer, current_year: i32) -> u32 {
    installer
        .founded_year
        .map(|year| (current_year - year).max(0) as u32)
        .unwrap_or(0)
}

/// Whether any signal on the record suggests commercial-scale work: a
/// commercial specialty slug, or locality text mentioning industrial or
/// commercial districts.
fn looks_commercial(installer: &Installer) -> bool {
    if installer.specialties.iter().any(|slug| slug.contains("commercial")) {
        return true;
    }

    let locality = [installer.street.as_deref(), installer.city.as_deref()]
        .iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    COMMERCIAL_LOCALITY_HINTS.iter().any(|hint| locality.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::ProjectRecord;

    fn test_config() -> EstimatorConfig {
        EstimatorConfig {
            portfolio_confidence: 0.8,
            heuristic_confidence: 0.4,
            floor_confidence: 0.3,
            commercial_unit_kw: 50.0,
            residential_unit_kw: 8.0,
        }
    }

    fn bare_installer() -> Installer {
        Installer {
            id: 1,
            source_id: None,
            name: "Test Solar".to_string(),
            lat: 0.0,
            lon: 0.0,
            street: None,
            city: None,
            state: None,
            postcode: None,
            phone: None,
            website: None,
            founded_year: None,
            review_count: 0,
            specialties: Default::default(),
            reference_links: Default::default(),
            projects: Vec::new(),
            last_enriched: None,
            last_seen: None,
        }
    }

    #[test]
    fn test_portfolio_evidence_wins() {
        let mut installer = bare_installer();
        installer.projects = vec![
            ProjectRecord { size_kw: Some(5.0) },
            ProjectRecord { size_kw: Some(7.0) },
        ];

        let estimate = estimate(&installer, &test_config());
        assert_eq!(estimate.total_kw, 12.0);
        assert_eq!(estimate.project_count, 2);
        assert_eq!(estimate.confidence, 0.8);
        assert!(estimate.portfolio_backed);
    }

    #[test]
    fn test_sizeless_projects_do_not_count_as_evidence() {
        let mut installer = bare_installer();
        installer.projects = vec![
            ProjectRecord { size_kw: None },
            ProjectRecord { size_kw: Some(7.0) },
        ];

        let estimate = estimate(&installer, &test_config());
        assert_eq!(estimate.total_kw, 7.0);
        assert_eq!(estimate.project_count, 1);
    }

    #[test]
    fn test_heuristic_project_count_formula() {
        // 20 reviews, 4 years: max(10, 20/2 + 4*5) = 30
        let estimate = estimate_heuristic(20, 4, false, &test_config());
        assert_eq!(estimate.project_count, 30);
        assert_eq!(estimate.total_kw, 30.0 * 8.0);
        assert_eq!(estimate.confidence, 0.4);
        assert!(!estimate.portfolio_backed);
    }

    #[test]
    fn test_heuristic_floor_of_ten_projects() {
        let estimate = estimate_heuristic(2, 1, false, &test_config());
        assert_eq!(estimate.project_count, 10);
        assert_eq!(estimate.confidence, 0.4);
    }

    #[test]
    fn test_no_evidence_gets_floor_confidence() {
        let estimate = estimate_heuristic(0, 0, false, &test_config());
        assert_eq!(estimate.project_count, 10);
        assert_eq!(estimate.confidence, 0.3);
    }

    #[test]
    fn test_commercial_signal_changes_unit_size() {
        let residential = estimate_heuristic(0, 2, false, &test_config());
        let commercial = estimate_heuristic(0, 2, true, &test_config());
        assert_eq!(residential.total_kw, 10.0 * 8.0);
        assert_eq!(commercial.total_kw, 10.0 * 50.0);
    }

    #[test]
    fn test_commercial_detected_from_specialty_slug() {
        let mut installer = bare_installer();
        installer.specialties.insert("commercial_pv".to_string());
        assert!(looks_commercial(&installer));
    }

    #[test]
    fn test_commercial_detected_from_locality_text() {
        let mut installer = bare_installer();
        installer.street = Some("4200 Industrial Blvd".to_string());
        assert!(looks_commercial(&installer));

        let plain = bare_installer();
        assert!(!looks_commercial(&plain));
    }

    #[test]
    fn test_future_founding_year_clamps_to_zero() {
        let mut installer = bare_installer();
        installer.founded_year = Some(2999);
        let estimate = estimate(&installer, &test_config());
        // No usable age or reviews: floor path
        assert_eq!(estimate.project_count, 10);
        assert_eq!(estimate.confidence, 0.3);
    }
}
