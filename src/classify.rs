//! Specialty classification from website text
//!
//! A fixed vocabulary of specialty categories, each with a handful of keyword
//! variants, matched by plain substring presence against the lowercased text
//! the crawler extracts. No scoring, no ranking - a category is either
//! mentioned or it is not. The table is reference data shipped with the tool;
//! editing it is a content change, not a logic change.

use std::collections::BTreeSet;

/// One specialty category and the phrases that indicate it.
pub struct SpecialtyFamily {
    pub slug: &'static str,
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

/// The specialty vocabulary. Keywords are lowercase; matching is substring
/// based, so prefer phrases specific enough not to fire on boilerplate.
pub const SPECIALTY_FAMILIES: &[SpecialtyFamily] = &[
    SpecialtyFamily {
        slug: "residential_pv",
        label: "Residential solar",
        keywords: &["residential solar", "home solar", "rooftop solar", "house solar", "homeowner"],
    },
    SpecialtyFamily {
        slug: "commercial_pv",
        label: "Commercial & industrial solar",
        keywords: &[
            "commercial solar",
            "commercial pv",
            "business solar",
            "industrial solar",
            "warehouse roof",
            "office building",
        ],
    },
    SpecialtyFamily {
        slug: "battery_backup",
        label: "Battery & backup storage",
        keywords: &[
            "battery",
            "powerwall",
            "energy storage",
            "backup power",
            "storage system",
            "enphase iq",
        ],
    },
    SpecialtyFamily {
        slug: "ev_charger",
        label: "EV charger installation",
        keywords: &[
            "ev charger",
            "ev charging",
            "electric vehicle",
            "car charger",
            "chargepoint",
            "wallbox",
            "level 2 charger",
        ],
    },
    SpecialtyFamily {
        slug: "solar_thermal",
        label: "Solar water heating",
        keywords: &["solar thermal", "solar hot water", "solar water heating", "evacuated tube"],
    },
    SpecialtyFamily {
        slug: "ground_mount",
        label: "Ground-mounted arrays",
        keywords: &["ground mount", "ground-mount", "ground mounted", "pole mount"],
    },
    SpecialtyFamily {
        slug: "roofing",
        label: "Roofing & re-roof",
        keywords: &["roof replacement", "re-roof", "reroof", "roofing", "shingle"],
    },
    SpecialtyFamily {
        slug: "off_grid",
        label: "Off-grid systems",
        keywords: &["off grid", "off-grid", "standalone power", "remote power", "cabin system"],
    },
    SpecialtyFamily {
        slug: "maintenance_repair",
        label: "Maintenance & repair",
        keywords: &["maintenance", "repair", "service plan", "troubleshoot", "tune-up"],
    },
    SpecialtyFamily {
        slug: "monitoring",
        label: "System monitoring",
        keywords: &["monitoring", "performance tracking", "production data"],
    },
    SpecialtyFamily {
        slug: "panel_cleaning",
        label: "Panel cleaning",
        keywords: &["panel cleaning", "panel wash", "bird proofing"],
    },
    SpecialtyFamily {
        slug: "energy_audit",
        label: "Energy audits",
        keywords: &["energy audit", "energy assessment", "efficiency audit", "home energy score"],
    },
    SpecialtyFamily {
        slug: "carport",
        label: "Solar carports & canopies",
        keywords: &["carport", "solar canopy", "parking structure"],
    },
    SpecialtyFamily {
        slug: "community_solar",
        label: "Community & utility solar",
        keywords: &["community solar", "solar farm", "solar garden", "utility scale", "utility-scale"],
    },
    SpecialtyFamily {
        slug: "inverter_service",
        label: "Inverter service",
        keywords: &[
            "inverter replacement",
            "inverter repair",
            "inverter upgrade",
            "microinverter",
            "string inverter",
        ],
    },
    SpecialtyFamily {
        slug: "heat_pump",
        label: "Heat pumps & electrification",
        keywords: &["heat pump", "mini split", "mini-split", "electrification"],
    },
];

/// Classify text into the set of specialty slugs it mentions.
///
/// Deterministic by construction: substring presence per family, collected
/// into an ordered set, so the result is independent of table iteration
/// order. The crawler hands over lowercased text already; lowercasing again
/// here keeps the function total on arbitrary input.
pub fn classify(text: &str) -> BTreeSet<String> {
    let text = text.to_lowercase();
    SPECIALTY_FAMILIES
        .iter()
        .filter(|family| family.keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|family| family.slug.to_string())
        .collect()
}

/// Human label for a specialty slug.
pub fn label_for(slug: &str) -> Option<&'static str> {
    SPECIALTY_FAMILIES
        .iter()
        .find(|family| family.slug == slug)
        .map(|family| family.label)
}
