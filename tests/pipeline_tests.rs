//! End-to-end pipeline tests: discovery through reconciliation, enrichment,
//! and estimation against mock services, with the per-candidate
//! failure-tolerance guarantees the batch depends on.

mod common;

use solarscout::config::AppConfig;
use solarscout::installer::{ScanStatus, Stage};
use solarscout::logger::{PipelineLogger, VerbosityLevel};
use solarscout::pipeline::{Pipeline, RunFailure, RunOptions, RunTarget};
use solarscout::store::{InstallerStore, JsonFileStore};

use common::{mock_geocoder, mock_overpass, mock_overpass_error, mock_site, node, test_config};

fn pipeline_for(config: &AppConfig) -> Pipeline {
    Pipeline::from_config(config).expect("pipeline should build")
}

fn logger() -> PipelineLogger {
    PipelineLogger::new(VerbosityLevel::Silent)
}

fn options_at(lat: f64, lon: f64, radius_m: u32) -> RunOptions {
    RunOptions {
        target: RunTarget::Coordinates { lat, lon },
        radius_m,
        enrich: true,
        max_runtime: None,
    }
}

#[tokio::test]
async fn happy_path_discovers_enriches_and_estimates() {
    let site = mock_site(
        "<html><body>We install Tesla Powerwall systems and offer commercial solar.</body></html>",
    )
    .await;
    let overpass = mock_overpass(vec![
        node(1, "Sunrise Solar", 44.98, -93.26, Some(&site.uri())),
        node(2, "Solar Depot", 44.90, -93.30, None),
    ])
    .await;

    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let report = pipeline
        .run(&mut store, &options_at(44.98, -93.26, 30_000), &logger())
        .await
        .unwrap();

    assert_eq!(report.discovered, 2);
    assert_eq!(report.processed, 2);
    assert!(report.errors.is_empty());

    // First installer was crawled and classified; set is fully replaced
    let enriched = &report.installers[0];
    let enrichment = enriched.enrichment.as_ref().unwrap();
    assert!(enrichment.success);
    assert!(enrichment.specialties.contains("battery_backup"));
    assert!(enrichment.specialties.contains("commercial_pv"));
    assert!(enriched.installer.last_enriched.is_some());

    // Second has no website: crawl skipped, no enrichment result
    assert!(report.installers[1].enrichment.is_none());
    assert!(report.installers[1].installer.last_enriched.is_none());

    // Estimates always present; the commercial signal raises the unit size
    assert!(enriched.estimate.total_kw > 0.0);
    assert!(!enriched.estimate.portfolio_backed);
    assert_eq!(enriched.estimate.confidence, 0.3);

    // Store reflects both records and an audit trail from every stage
    assert_eq!(store.installer_count(), 2);
    let log = store.scan_log();
    assert!(log.iter().any(|e| e.source == Stage::Discovery && e.status == ScanStatus::Ok));
    assert!(log.iter().any(|e| e.source == Stage::Reconcile));
    assert!(log.iter().any(|e| e.source == Stage::Crawl));
    assert!(log.iter().any(|e| e.source == Stage::Classify));
    assert!(log.iter().any(|e| e.source == Stage::Estimate));
}

#[tokio::test]
async fn rerunning_discovery_does_not_duplicate_installers() {
    let overpass = mock_overpass(vec![
        node(1, "Sunrise Solar", 44.98, -93.26, None),
        node(2, "Solar Depot", 44.90, -93.30, None),
    ])
    .await;

    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();
    let options = options_at(44.98, -93.26, 30_000);

    pipeline.run(&mut store, &options, &logger()).await.unwrap();
    let first_count = store.installer_count();
    pipeline.run(&mut store, &options, &logger()).await.unwrap();

    assert_eq!(store.installer_count(), first_count, "second run must update, not create");
}

#[tokio::test]
async fn one_bad_website_does_not_abort_the_batch() {
    let good_site = mock_site(
        "<html><body>Residential solar and battery storage system installs.</body></html>",
    )
    .await;

    // Candidate #3 points at a port nothing listens on
    let elements = vec![
        node(1, "Installer One", 44.9000, -93.2000, Some(&good_site.uri())),
        node(2, "Installer Two", 44.9100, -93.2100, Some(&good_site.uri())),
        node(3, "Installer Three", 44.9200, -93.2200, Some("http://127.0.0.1:1")),
        node(4, "Installer Four", 44.9300, -93.2300, Some(&good_site.uri())),
        node(5, "Installer Five", 44.9400, -93.2400, Some(&good_site.uri())),
    ];
    let overpass = mock_overpass(elements).await;

    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let report = pipeline
        .run(&mut store, &options_at(44.9, -93.2, 40_000), &logger())
        .await
        .unwrap();

    assert_eq!(report.discovered, 5);
    assert_eq!(report.processed, 5, "a failed crawl still counts as processed");

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, Stage::Crawl);
    assert_eq!(report.errors[0].subject, "Installer Three");

    // The four reachable sites were classified
    let successes: Vec<_> = report
        .installers
        .iter()
        .filter(|p| p.enrichment.as_ref().map(|e| e.success).unwrap_or(false))
        .collect();
    assert_eq!(successes.len(), 4);
    for processed in &successes {
        assert!(processed.enrichment.as_ref().unwrap().specialties.contains("battery_backup"));
    }

    // The failed one kept an empty specialty set and an error audit entry
    let failed = report
        .installers
        .iter()
        .find(|p| p.installer.name == "Installer Three")
        .unwrap();
    assert!(failed.installer.specialties.is_empty());
    let log = store.scan_log();
    assert!(log
        .iter()
        .any(|e| e.source == Stage::Crawl && e.status == ScanStatus::Error && e.installer_id == Some(failed.installer.id)));
}

#[tokio::test]
async fn radius_over_cap_fails_before_discovery() {
    let overpass = mock_overpass(vec![]).await;
    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let result = pipeline
        .run(&mut store, &options_at(44.98, -93.26, 50_001), &logger())
        .await;

    assert!(matches!(result, Err(RunFailure::Config(_))));
    let requests = overpass.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn discovery_outage_is_fatal_and_logged() {
    let overpass = mock_overpass_error(502).await;
    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let result = pipeline
        .run(&mut store, &options_at(44.98, -93.26, 30_000), &logger())
        .await;

    assert!(matches!(result, Err(RunFailure::Discovery(_))));
    assert_eq!(store.installer_count(), 0);
    let log = store.scan_log();
    assert!(log.iter().any(|e| e.source == Stage::Discovery && e.status == ScanStatus::Error));
}

#[tokio::test]
async fn location_string_is_geocoded_before_discovery() {
    let overpass = mock_overpass(vec![node(1, "Sunrise Solar", 44.98, -93.26, None)]).await;
    let geocoder =
        mock_geocoder(serde_json::json!([{ "lat": "44.98", "lon": "-93.26" }])).await;

    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    config.geocoding.endpoint = geocoder.uri();
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let options = RunOptions {
        target: RunTarget::Location("Minneapolis, MN".to_string()),
        radius_m: 30_000,
        enrich: false,
        max_runtime: None,
    };
    let report = pipeline.run(&mut store, &options, &logger()).await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(geocoder.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unresolvable_location_fails_before_discovery() {
    let overpass = mock_overpass(vec![]).await;
    let geocoder = mock_geocoder(serde_json::json!([])).await;

    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    config.geocoding.endpoint = geocoder.uri();
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let options = RunOptions {
        target: RunTarget::Location("Nowhereville Qxzy".to_string()),
        radius_m: 30_000,
        enrich: true,
        max_runtime: None,
    };
    let result = pipeline.run(&mut store, &options, &logger()).await;

    match result {
        Err(RunFailure::Config(message)) => {
            assert!(message.contains("could not resolve location"));
        }
        other => panic!("expected Config failure, got {:?}", other.map(|r| r.processed)),
    }
    assert!(overpass.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn no_enrich_run_skips_all_website_traffic() {
    let site = mock_site("<html><body>battery storage</body></html>").await;
    let overpass =
        mock_overpass(vec![node(1, "Sunrise Solar", 44.98, -93.26, Some(&site.uri()))]).await;

    let mut config = test_config();
    config.discovery.endpoint = format!("{}/api/interpreter", overpass.uri());
    let mut pipeline = pipeline_for(&config);
    let mut store = JsonFileStore::in_memory();

    let options = RunOptions {
        target: RunTarget::Coordinates { lat: 44.98, lon: -93.26 },
        radius_m: 30_000,
        enrich: false,
        max_runtime: None,
    };
    let report = pipeline.run(&mut store, &options, &logger()).await.unwrap();

    assert_eq!(report.processed, 1);
    assert!(report.installers[0].enrichment.is_none());
    assert!(site.received_requests().await.unwrap().is_empty());
}
