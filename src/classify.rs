// src/classify.rs

//! Keyword-based trade classification for permit descriptions.

/// Phrases that qualify a roofing permit as storm/emergency-repair work.
pub const STORM_WORDS: &[&str] = &[
    "leak",
    "roof leak",
    "water damage",
    "storm",
    "wind damage",
    "emergency",
    "temporary repair",
    "tarp",
    "tarps",
    "dry out",
    "dry-out",
    "repair existing roof",
];

const ROOF_WORDS: &[&str] = &["roof", "reroof", "re-roof", "re roof"];
const SOLAR_WORDS: &[&str] = &["solar", "pv", "photovoltaic", "photovoltaics"];
const HVAC_WORDS: &[&str] = &["hvac", "furnace", "air conditioning", "a/c", "heat pump"];
const ADDITION_WORDS: &[&str] = &["addition", "addn", "adu", "garage conversion"];
const ELECTRICAL_WORDS: &[&str] = &[
    "electrical",
    "service upgrade",
    "panel",
    "main switchboard",
];

/// Check whether a work description matches a trade category.
///
/// Unknown trade strings match everything. That default is deliberate: a
/// new trade category added by a caller degrades to "no filtering" instead
/// of silently returning nothing. An empty description never matches.
pub fn matches_trade(description: &str, trade: &str, mode: &str) -> bool {
    let description = description.to_lowercase();
    let trade = trade.to_lowercase();
    let mode = mode.to_lowercase();

    if description.is_empty() {
        return false;
    }

    match trade.as_str() {
        "roof" => {
            if !contains_any(&description, ROOF_WORDS) {
                return false;
            }
            if mode == "storm" {
                return contains_any(&description, STORM_WORDS);
            }
            true
        }
        "solar" => contains_any(&description, SOLAR_WORDS),
        "hvac" => contains_any(&description, HVAC_WORDS),
        "addition" => contains_any(&description, ADDITION_WORDS),
        "electrical" => contains_any(&description, ELECTRICAL_WORDS),
        _ => true,
    }
}

/// Roofing vocabulary check used independently of any requested trade.
pub fn mentions_roofing(description: &str) -> bool {
    contains_any(description, ROOF_WORDS)
}

/// Solar vocabulary check used independently of any requested trade.
pub fn mentions_solar(description: &str) -> bool {
    contains_any(description, SOLAR_WORDS)
}

/// Upstream keyword terms per trade for the radar view's `$where` clause.
///
/// These are matched server-side with `upper(...) LIKE`, so they stay
/// uppercase and shorter than the local vocabulary. Unknown trades fall
/// back to the roofing terms.
pub fn radar_keywords(trade: &str) -> &'static [&'static str] {
    match trade {
        "roof" => &["ROOF", "REROOF", "RE-ROOF"],
        "solar" => &["SOLAR", "PHOTOVOLTAIC", "PV"],
        "hvac" => &["HVAC", "MECHANICAL", "A/C", "AC"],
        "general" => &[],
        _ => &["ROOF", "REROOF", "RE-ROOF"],
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
