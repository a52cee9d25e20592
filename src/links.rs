//! Outbound reference-link generation
//!
//! Pure string templating of review-site, directory, and map-search URLs for
//! a newly created installer. Invoked once at creation time only; no network
//! calls are made here.

use std::collections::BTreeSet;

use url::Url;

/// Build the initial set of outbound reference links for an installer.
///
/// Links that need a locality are skipped when neither city nor state is
/// known rather than emitted half-formed.
pub fn reference_links(name: &str, city: Option<&str>, state: Option<&str>) -> BTreeSet<String> {
    let mut links = BTreeSet::new();

    let locality = match (city, state) {
        (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
        (Some(city), None) => Some(city.to_string()),
        (None, Some(state)) => Some(state.to_string()),
        (None, None) => None,
    };

    let maps_query = match &locality {
        Some(locality) => format!("{} {}", name, locality),
        None => name.to_string(),
    };
    links.insert(build_url(
        "https://www.google.com/maps/search/",
        &[("api", "1"), ("query", &maps_query)],
    ));

    links.insert(build_url("https://www.solarreviews.com/search", &[("q", name)]));
    links.insert(build_url("https://www.energysage.com/installers/search", &[("q", name)]));

    if let Some(locality) = &locality {
        links.insert(build_url(
            "https://www.yelp.com/search",
            &[("find_desc", name), ("find_loc", locality)],
        ));
        links.insert(build_url(
            "https://www.bbb.org/search",
            &[("find_text", name), ("find_loc", locality)],
        ));
    }

    links
}

// Safety: the base URLs are compile-time constants; Url::parse_with_params
// only fails on a malformed base.
fn build_url(base: &str, params: &[(&str, &str)]) -> String {
    Url::parse_with_params(base, params)
        .expect("static base URL must parse")
        .into()
}
