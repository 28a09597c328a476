//! Geo normalizer (component H): location-string canonicalization.

use std::collections::HashMap;

/// A canonical location record: its canonical name and, when known, its
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalLocation {
    /// Canonical display name.
    pub canonical: String,
    /// Coordinates, if this canonical form resolves to a known point.
    pub coordinates: Option<(f64, f64)>,
}

/// A handful of major cities shipped as a built-in alias base, so a fresh
/// table doesn't start with zero geo knowledge. Deliberately small — user
/// mappings are expected to cover anything domain-specific.
fn builtin_cities() -> Vec<(&'static str, &'static [&'static str], (f64, f64))> {
    vec![
        ("New York", &["nyc", "new york city", "big apple"], (40.7128, -74.0060)),
        ("London", &["londres"], (51.5074, -0.1278)),
        ("Paris", &[], (48.8566, 2.3522)),
        ("Tokyo", &[], (35.6762, 139.6503)),
        ("Los Angeles", &["la", "los angeles ca"], (34.0522, -118.2437)),
    ]
}

/// Resolves free-text location strings to a canonical form, with exact,
/// alias, and Dice-coefficient fuzzy matching.
#[derive(Debug, Clone)]
pub struct GeoNormalizer {
    canonical: HashMap<String, CanonicalLocation>,
    alias_to_canonical: HashMap<String, String>,
}

impl GeoNormalizer {
    /// Build a normalizer from built-in city data plus `user_mappings`
    /// (alias → canonical display name), which override built-ins on key
    /// collision.
    #[must_use]
    pub fn new(user_mappings: &HashMap<String, String>) -> Self {
        let mut canonical = HashMap::new();
        let mut alias_to_canonical = HashMap::new();

        for (name, aliases, coords) in builtin_cities() {
            let key = normalize_key(name);
            canonical.insert(key.clone(), CanonicalLocation { canonical: name.to_string(), coordinates: Some(coords) });
            for alias in aliases {
                alias_to_canonical.insert(normalize_key(alias), key.clone());
            }
        }

        for (alias, target) in user_mappings {
            let target_key = normalize_key(target);
            canonical.entry(target_key.clone()).or_insert_with(|| CanonicalLocation { canonical: target.clone(), coordinates: None });
            alias_to_canonical.insert(normalize_key(alias), target_key);
        }

        Self { canonical, alias_to_canonical }
    }

    /// Normalize `input`: exact match, then alias match, then Dice fuzzy
    /// match (threshold 0.8) against every canonical/alias key. Falls back
    /// to `input` as its own canonical form — normalization never fails.
    #[must_use]
    pub fn normalize(&self, input: &str) -> CanonicalLocation {
        let key = normalize_key(input);

        if let Some(location) = self.canonical.get(&key) {
            return location.clone();
        }
        if let Some(target_key) = self.alias_to_canonical.get(&key) {
            if let Some(location) = self.canonical.get(target_key) {
                return location.clone();
            }
        }

        if let Some(location) = self.fuzzy_match(&key) {
            return location;
        }

        CanonicalLocation { canonical: input.to_string(), coordinates: None }
    }

    fn fuzzy_match(&self, key: &str) -> Option<CanonicalLocation> {
        const THRESHOLD: f64 = 0.8;
        let mut best: Option<(f64, CanonicalLocation)> = None;

        for (candidate_key, location) in &self.canonical {
            let score = dice_coefficient(key, candidate_key);
            if score >= THRESHOLD && best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
                best = Some((score, location.clone()));
            }
        }
        for (alias_key, target_key) in &self.alias_to_canonical {
            let score = dice_coefficient(key, alias_key);
            if score >= THRESHOLD && best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
                if let Some(location) = self.canonical.get(target_key) {
                    best = Some((score, location.clone()));
                }
            }
        }

        best.map(|(_, location)| location)
    }
}

/// Case-fold, strip non-word characters, and collapse whitespace.
fn normalize_key(input: &str) -> String {
    let folded = input.to_lowercase();
    let stripped: String =
        folded.chars().map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' }).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bigrams(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 2 {
        return Vec::new();
    }
    (0..chars.len() - 1).map(|i| chars[i..=i + 1].iter().collect()).collect()
}

/// Sørensen–Dice coefficient over character bigrams: `2*|A∩B| / (|A|+|B|)`.
/// Strings shorter than 2 characters produce no bigrams and are treated as
/// non-matching (score 0) unless identical.
#[must_use]
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let bigrams_a = bigrams(a);
    let bigrams_b = bigrams(b);
    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return 0.0;
    }

    let mut remaining = bigrams_b.clone();
    let mut matches = 0;
    for bigram in &bigrams_a {
        if let Some(pos) = remaining.iter().position(|b| b == bigram) {
            remaining.remove(pos);
            matches += 1;
        }
    }

    (2 * matches) as f64 / (bigrams_a.len() + bigrams_b.len()) as f64
}
