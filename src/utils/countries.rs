//! ISO 3166-1 alpha-2 country names

use std::collections::BTreeMap;
use std::sync::LazyLock;

static ISO_3166_1: &str = include_str!("../../data/iso_3166-1.csv");

static COUNTRIES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    ISO_3166_1
        .lines()
        .filter_map(|line| {
            let (code, name) = line.split_once(',')?;
            let name = name.trim().trim_matches('"');
            Some((code.trim(), name))
        })
        .collect()
});

/// Map of two-letter country code to English country name
pub fn get_countries() -> &'static BTreeMap<&'static str, &'static str> {
    &COUNTRIES
}

/// Looks up the English name for a two-letter country code (case-insensitive)
pub fn country_name(code: &str) -> Option<&'static str> {
    COUNTRIES.get(code.trim().to_uppercase().as_str()).copied()
}
