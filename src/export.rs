//! Run report export
//!
//! Writes the aggregate run report to JSON or CSV. JSON carries the full
//! report; CSV is one row per processed installer for spreadsheet use.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use csv::Writer;
use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::RunReport;

#[derive(Serialize)]
struct JsonExport<'a> {
    generated_at: String,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Export a report, picking the format from the file extension.
pub fn export_report(report: &RunReport, output_path: &Path) -> Result<()> {
    match output_path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
        Some("json") => export_json(report, output_path),
        Some("csv") => export_csv(report, output_path),
        _ => bail!(
            "Cannot determine output format from file extension. Expected .json or .csv: {}",
            output_path.display()
        ),
    }
}

pub fn export_json(report: &RunReport, output_path: &Path) -> Result<()> {
    debug!("Exporting run report to JSON: {}", output_path.display());

    let export = JsonExport {
        generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        report,
    };
    let json = serde_json::to_string_pretty(&export).context("Failed to serialize run report")?;
    std::fs::write(output_path, json)
        .context(format!("Failed to write report to: {}", output_path.display()))?;

    info!("Exported run report to {}", output_path.display());
    Ok(())
}

pub fn export_csv(report: &RunReport, output_path: &Path) -> Result<()> {
    debug!("Exporting run report to CSV: {}", output_path.display());

    let file = File::create(output_path)
        .context(format!("Failed to create report file: {}", output_path.display()))?;
    let mut writer = Writer::from_writer(file);

    writer.write_record([
        "Id",
        "Name",
        "Latitude",
        "Longitude",
        "City",
        "State",
        "Phone",
        "Website",
        "Specialties",
        "Estimated kW",
        "Projects",
        "Confidence",
        "Last Enriched",
    ])?;

    for processed in &report.installers {
        let installer = &processed.installer;
        writer.write_record([
            installer.id.to_string(),
            installer.name.clone(),
            format!("{:.6}", installer.lat),
            format!("{:.6}", installer.lon),
            installer.city.clone().unwrap_or_default(),
            installer.state.clone().unwrap_or_default(),
            installer.phone.clone().unwrap_or_default(),
            installer.website.clone().unwrap_or_default(),
            installer.specialties.iter().cloned().collect::<Vec<_>>().join("; "),
            format!("{:.0}", processed.estimate.total_kw),
            processed.estimate.project_count.to_string(),
            format!("{:.1}", processed.estimate.confidence),
            installer
                .last_enriched
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    info!(
        "Exported {} installers to {}",
        report.installers.len(),
        output_path.display()
    );
    Ok(())
}
