use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::domain::Transmission;
use crate::workflows::normalizer::normalize_text;

/// Below this a "<n> hk" hit is a displacement or trim number, not engine power.
const MIN_PLAUSIBLE_HORSEPOWER: u32 = 50;

static TRANSMISSION_LABELS: OnceLock<HashMap<String, Transmission>> = OnceLock::new();
static HORSEPOWER: OnceLock<Regex> = OnceLock::new();
static ALL_WHEEL_DRIVE: OnceLock<Regex> = OnceLock::new();
static AUTOMATIC_MARKER: OnceLock<Regex> = OnceLock::new();
static MANUAL_MARKER: OnceLock<Regex> = OnceLock::new();

/// Technical specs recovered from free-text variant strings such as
/// `"Active 1.0 Benzin 72 Hk Automatgear"` or `"Executive 71,4 kWh 343 hk AWD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariantSpecs {
    pub horsepower: Option<u32>,
    pub all_wheel_drive: bool,
    pub transmission: Option<Transmission>,
}

impl VariantSpecs {
    pub fn parse(variant: &str) -> Self {
        Self {
            horsepower: parse_horsepower(variant),
            all_wheel_drive: all_wheel_drive_pattern().is_match(variant),
            transmission: detect_transmission(variant),
        }
    }
}

/// Map an explicit transmission label ("automatgear", "manuel", "auto", ...) to the enum.
pub fn transmission_from_label(label: &str) -> Option<Transmission> {
    transmission_labels().get(&normalize_text(label)).copied()
}

fn parse_horsepower(variant: &str) -> Option<u32> {
    horsepower_pattern()
        .captures_iter(variant)
        .filter_map(|captures| captures.get(1))
        .filter_map(|value| value.as_str().parse::<u32>().ok())
        .find(|hp| *hp >= MIN_PLAUSIBLE_HORSEPOWER)
}

fn detect_transmission(variant: &str) -> Option<Transmission> {
    if automatic_marker().is_match(variant) {
        return Some(Transmission::Automatic);
    }
    if manual_marker().is_match(variant) {
        return Some(Transmission::Manual);
    }
    // Petrol variants are listed without a gearbox marker unless they are automatic.
    if normalize_text(variant).contains("benzin") {
        return Some(Transmission::Manual);
    }
    None
}

fn horsepower_pattern() -> &'static Regex {
    HORSEPOWER.get_or_init(|| Regex::new(r"(?i)(\d{2,4})\s*(?:hk|hp)\b").expect("valid pattern"))
}

fn all_wheel_drive_pattern() -> &'static Regex {
    ALL_WHEEL_DRIVE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:awd|4wd|4x4|all[- ]wheel[- ]drive|firehjulstræk)\b")
            .expect("valid pattern")
    })
}

fn automatic_marker() -> &'static Regex {
    AUTOMATIC_MARKER.get_or_init(|| {
        Regex::new(r"(?i)\b(?:automatgear|automatisk|automatic|aut\.)").expect("valid pattern")
    })
}

fn manual_marker() -> &'static Regex {
    MANUAL_MARKER
        .get_or_init(|| Regex::new(r"(?i)\b(?:manuel|manual|manuelt)\b").expect("valid pattern"))
}

fn transmission_labels() -> &'static HashMap<String, Transmission> {
    TRANSMISSION_LABELS.get_or_init(|| {
        const LABELS: &[(&str, Transmission)] = &[
            ("automatic", Transmission::Automatic),
            ("automatisk", Transmission::Automatic),
            ("automatgear", Transmission::Automatic),
            ("auto", Transmission::Automatic),
            ("aut.", Transmission::Automatic),
            ("at", Transmission::Automatic),
            ("manual", Transmission::Manual),
            ("manuel", Transmission::Manual),
            ("manuelt gear", Transmission::Manual),
            ("mt", Transmission::Manual),
        ];

        let mut map = HashMap::with_capacity(LABELS.len());
        for (label, transmission) in LABELS {
            map.insert(normalize_text(label), *transmission);
        }
        map
    })
}
