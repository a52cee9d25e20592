//! Candidate reconciliation
//!
//! Decides create vs. update for each discovered candidate. Matching is by
//! stable external source id first, then by approximate name+location
//! equality. Updates carry forward stored values for fields the candidate is
//! missing - re-discovery must never blank out data a previous run captured.
//! Reference links are generated once, at creation only.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::installer::{Installer, InstallerCandidate, ScanLogEntry, Stage};
use crate::links;
use crate::store::InstallerStore;

/// What the reconciler did with a candidate.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    Created(Installer),
    Updated(Installer),
}

impl ReconcileOutcome {
    pub fn installer(&self) -> &Installer {
        match self {
            ReconcileOutcome::Created(installer) | ReconcileOutcome::Updated(installer) => installer,
        }
    }

    pub fn into_installer(self) -> Installer {
        match self {
            ReconcileOutcome::Created(installer) | ReconcileOutcome::Updated(installer) => installer,
        }
    }
}

/// Reconcile one candidate against the store. Writes one scan-log entry for
/// the outcome. Errors are returned to the caller, which records them and
/// moves on to the next candidate.
pub fn reconcile(
    store: &mut dyn InstallerStore,
    candidate: &InstallerCandidate,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome> {
    let existing = candidate
        .source_id
        .as_deref()
        .and_then(|source_id| store.find_by_source_id(source_id))
        .or_else(|| store.find_by_name_near(&candidate.name, candidate.lat, candidate.lon));

    match existing {
        Some(mut installer) => {
            apply_candidate(&mut installer, candidate, now);
            store.update(&installer)?;
            debug!("Refreshed installer {} '{}'", installer.id, installer.name);
            store.append_log(ScanLogEntry::ok(
                Some(installer.id),
                Stage::Reconcile,
                format!("updated '{}' from discovery", installer.name),
            ));
            Ok(ReconcileOutcome::Updated(installer))
        }
        None => {
            let installer = store.insert(new_installer(candidate, now))?;
            debug!("Created installer {} '{}'", installer.id, installer.name);
            store.append_log(ScanLogEntry::ok(
                Some(installer.id),
                Stage::Reconcile,
                format!("created '{}' from discovery", installer.name),
            ));
            Ok(ReconcileOutcome::Created(installer))
        }
    }
}

/// Refresh an existing record from a candidate. Update, not merge: fields the
/// candidate carries replace the stored value; fields it is missing keep the
/// stored value.
fn apply_candidate(installer: &mut Installer, candidate: &InstallerCandidate, now: DateTime<Utc>) {
    installer.name = candidate.name.clone();
    installer.lat = candidate.lat;
    installer.lon = candidate.lon;
    if candidate.source_id.is_some() {
        installer.source_id = candidate.source_id.clone();
    }
    if candidate.street.is_some() {
        installer.street = candidate.street.clone();
    }
    if candidate.city.is_some() {
        installer.city = candidate.city.clone();
    }
    if candidate.state.is_some() {
        installer.state = candidate.state.clone();
    }
    if candidate.postcode.is_some() {
        installer.postcode = candidate.postcode.clone();
    }
    if candidate.phone.is_some() {
        installer.phone = candidate.phone.clone();
    }
    if candidate.website.is_some() {
        installer.website = candidate.website.clone();
    }
    if candidate.founded_year.is_some() {
        installer.founded_year = candidate.founded_year;
    }
    installer.last_seen = Some(now);
}

fn new_installer(candidate: &InstallerCandidate, now: DateTime<Utc>) -> Installer {
    Installer {
        id: 0,
        source_id: candidate.source_id.clone(),
        name: candidate.name.clone(),
        lat: candidate.lat,
        lon: candidate.lon,
        street: candidate.street.clone(),
        city: candidate.city.clone(),
        state: candidate.state.clone(),
        postcode: candidate.postcode.clone(),
        phone: candidate.phone.clone(),
        website: candidate.website.clone(),
        founded_year: candidate.founded_year,
        review_count: 0,
        specialties: Default::default(),
        // One-time side effect of creation; updates never regenerate these.
        reference_links: links::reference_links(
            &candidate.name,
            candidate.city.as_deref(),
            candidate.state.as_deref(),
        ),
        projects: Vec::new(),
        last_enriched: None,
        last_seen: Some(now),
    }
}
