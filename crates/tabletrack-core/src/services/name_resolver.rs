//! Organization name resolution.
//!
//! Free-text organization names arrive with inconsistent punctuation,
//! campus qualifiers ("UT", "at Texas"), organizational suffixes ("Club",
//! "Society"), and acronyms. The resolver normalizes an input name,
//! generates its common variations, and scores it against every known
//! organization's canonical name, stored aliases, and generated
//! variations using three similarity measures: whole-string, substring
//! window, and order-insensitive token set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use tabletrack_db::models::Organization;

/// Organizational suffix words stripped to form a variation.
const ORGANIZATIONAL_SUFFIXES: &[&str] = &[
    "club",
    "society",
    "organization",
    "association",
    "team",
    "group",
    "at ut",
    "at texas",
    "university",
];

/// Campus qualifier phrases stripped to form a variation. Longer phrases
/// first so "university of texas" is consumed before "university".
const CAMPUS_QUALIFIERS: &[&str] = &[
    "university of texas",
    "at ut",
    "at texas",
    "university",
    "texas",
    "ut",
];

/// Words that never contribute a letter to an acronym.
const ACRONYM_STOPWORDS: &[&str] = &[
    "the", "of", "and", "for", "at", "in", "on", "by", "to", "from",
];

/// Configuration for match score thresholds (0-100 scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Minimum score for a candidate to appear in results at all.
    pub similarity_threshold: u8,
    /// Minimum score to classify a candidate as an exact match.
    pub exact_match_threshold: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 80,
            exact_match_threshold: 95,
        }
    }
}

/// How a candidate matched the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// A normalized input variation equals a normalized candidate name.
    ExactVariation,
    /// Similarity score at or above the exact-match threshold.
    Exact,
    /// Similarity score at or above the similarity threshold.
    Similar,
}

/// A scored candidate for an input name.
#[derive(Debug, Clone, Serialize)]
pub struct NameMatch {
    /// The candidate organization.
    pub organization: Organization,
    /// Best similarity score across all name pairs (0-100).
    pub score: u8,
    /// Classification of the best-scoring pair.
    pub match_type: MatchType,
    /// The candidate-side name that produced the best score.
    pub matched_text: String,
}

impl NameMatch {
    /// Whether this match clears the exact threshold.
    #[must_use]
    pub fn is_exact(&self, config: &MatcherConfig) -> bool {
        self.score >= config.exact_match_threshold
    }
}

/// Fuzzy matcher for organization names.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    config: MatcherConfig,
}

impl NameResolver {
    /// Create a resolver with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with custom thresholds.
    #[must_use]
    pub fn with_config(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// The active threshold configuration.
    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score an input name against a candidate pool.
    ///
    /// Returns candidates at or above the similarity threshold, sorted by
    /// descending score. The sort is stable, so candidates with equal
    /// scores keep the pool's order and results are deterministic.
    #[must_use]
    pub fn match_candidates(&self, input: &str, candidates: &[Organization]) -> Vec<NameMatch> {
        let variations = self.variations(input);
        let normalized_input = self.normalize(input);

        let mut matches: Vec<NameMatch> = Vec::new();

        for organization in candidates {
            let mut names: Vec<String> = vec![organization.official_name.clone()];
            names.extend(organization.aliases.iter().cloned());
            names.extend(self.variations(&organization.official_name));

            let mut best_score = 0u8;
            let mut matched_text = String::new();
            let mut exact_variation = false;

            for name in &names {
                let normalized_name = self.normalize(name);
                if normalized_name.is_empty() {
                    continue;
                }

                if variations.iter().any(|v| *v == normalized_name) {
                    best_score = 100;
                    matched_text = name.clone();
                    exact_variation = true;
                    break;
                }

                let score = self.similarity(&normalized_input, &normalized_name);
                if score > best_score {
                    best_score = score;
                    matched_text = name.clone();
                }
            }

            if best_score >= self.config.similarity_threshold {
                let match_type = if exact_variation {
                    MatchType::ExactVariation
                } else if best_score >= self.config.exact_match_threshold {
                    MatchType::Exact
                } else {
                    MatchType::Similar
                };
                matches.push(NameMatch {
                    organization: organization.clone(),
                    score: best_score,
                    match_type,
                    matched_text,
                });
            }
        }

        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }

    /// Normalize a name: lowercase, punctuation to whitespace, collapsed.
    #[must_use]
    pub fn normalize(&self, name: &str) -> String {
        let mapped: String = name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '_' {
                    c
                } else {
                    ' '
                }
            })
            .collect();
        mapped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Generate the common variations of a name.
    ///
    /// Includes the normalized form, the raw lowercased form, the form with
    /// organizational suffixes stripped, the form with campus qualifiers
    /// stripped, Texas/UT abbreviation swaps, and a stopword-aware acronym.
    /// Variations of length one or less are discarded.
    #[must_use]
    pub fn variations(&self, name: &str) -> Vec<String> {
        let normalized = self.normalize(name);
        let mut variations: Vec<String> = Vec::new();

        push_unique(&mut variations, normalized.clone());
        push_unique(&mut variations, name.trim().to_lowercase());

        push_unique(
            &mut variations,
            strip_phrases(&normalized, ORGANIZATIONAL_SUFFIXES),
        );
        push_unique(&mut variations, strip_phrases(&normalized, CAMPUS_QUALIFIERS));

        push_unique(&mut variations, swap_phrase(&normalized, "texas", "tx"));
        push_unique(&mut variations, swap_phrase(&normalized, "tx", "texas"));
        push_unique(
            &mut variations,
            swap_phrase(&normalized, "ut", "university of texas"),
        );
        push_unique(
            &mut variations,
            swap_phrase(&normalized, "university of texas", "ut"),
        );

        push_unique(&mut variations, acronym(name));

        variations
    }

    /// Best of the three similarity measures, rounded to 0-100.
    fn similarity(&self, a: &str, b: &str) -> u8 {
        if a.is_empty() || b.is_empty() {
            return 0;
        }
        let best = whole_similarity(a, b)
            .max(partial_similarity(a, b))
            .max(token_set_similarity(a, b));
        best.round().clamp(0.0, 100.0) as u8
    }
}

/// Append a variation unless it is trivial or already present.
fn push_unique(variations: &mut Vec<String>, variation: String) {
    if variation.chars().count() > 1 && !variations.contains(&variation) {
        variations.push(variation);
    }
}

/// Remove every occurrence of the given phrases from a normalized name.
fn strip_phrases(normalized: &str, phrases: &[&str]) -> String {
    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
    for phrase in phrases {
        let phrase_tokens: Vec<&str> = phrase.split_whitespace().collect();
        if phrase_tokens.is_empty() {
            continue;
        }
        let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            if i + phrase_tokens.len() <= tokens.len()
                && tokens[i..i + phrase_tokens.len()] == phrase_tokens[..]
            {
                i += phrase_tokens.len();
            } else {
                kept.push(tokens[i]);
                i += 1;
            }
        }
        tokens = kept;
    }
    tokens.join(" ")
}

/// Replace every occurrence of a word or phrase in a normalized name.
fn swap_phrase(normalized: &str, from: &str, to: &str) -> String {
    let from_tokens: Vec<&str> = from.split_whitespace().collect();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if from_tokens.is_empty() {
        return normalized.to_string();
    }

    let mut result: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if i + from_tokens.len() <= tokens.len()
            && tokens[i..i + from_tokens.len()] == from_tokens[..]
        {
            result.push(to);
            i += from_tokens.len();
        } else {
            result.push(tokens[i]);
            i += 1;
        }
    }
    result.join(" ")
}

/// Build an acronym from the first letter of each significant word.
///
/// Words of two characters or fewer and stopwords contribute nothing.
fn acronym(name: &str) -> String {
    name.split_whitespace()
        .filter(|word| {
            word.chars().count() > 2 && !ACRONYM_STOPWORDS.contains(&word.to_lowercase().as_str())
        })
        .filter_map(|word| word.chars().next())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Whole-string similarity on the 0-100 scale.
fn whole_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Best similarity of the shorter string against any equal-length window
/// of the longer string, on the 0-100 scale.
fn partial_similarity(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if shorter.is_empty() {
        return 0.0;
    }
    let needle: String = shorter.iter().collect();
    if shorter.len() == longer.len() {
        let haystack: String = longer.iter().collect();
        return strsim::normalized_levenshtein(&needle, &haystack) * 100.0;
    }

    let mut best = 0.0f64;
    for window in longer.windows(shorter.len()) {
        let candidate: String = window.iter().collect();
        let score = strsim::normalized_levenshtein(&needle, &candidate);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    best * 100.0
}

/// Order- and duplicate-insensitive token overlap similarity, 0-100.
///
/// Compares the sorted common tokens against the sorted common tokens plus
/// each side's remainder, taking the best pairwise whole-string score.
fn token_set_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let base = common.join(" ");
    let combined_a = join_tokens(&base, &only_a.join(" "));
    let combined_b = join_tokens(&base, &only_b.join(" "));

    [
        (&base, &combined_a),
        (&base, &combined_b),
        (&combined_a, &combined_b),
    ]
    .iter()
    .map(|(x, y)| strsim::normalized_levenshtein(x, y))
    .fold(0.0, f64::max)
        * 100.0
}

fn join_tokens(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left} {right}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tabletrack_db::models::OrganizationStatus;
    use uuid::Uuid;

    fn org(official_name: &str, aliases: &[&str]) -> Organization {
        let now = Utc::now();
        Organization {
            id: Uuid::new_v4(),
            official_name: official_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            category: Some("Student Organization".to_string()),
            status: OrganizationStatus::Active,
            ban_reason: None,
            ban_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        let resolver = NameResolver::new();
        assert_eq!(
            resolver.normalize("  The Chess-Club, at UT!  "),
            "the chess club at ut"
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let resolver = NameResolver::new();
        assert_eq!(resolver.normalize("a    b\t c"), "a b c");
    }

    #[test]
    fn test_variations_cover_expected_forms() {
        let resolver = NameResolver::new();
        let variations = resolver.variations("UT Programming Club");

        assert!(variations.contains(&"ut programming club".to_string()));
        // Organizational suffix stripped.
        assert!(variations.contains(&"ut programming".to_string()));
        // Campus qualifier stripped.
        assert!(variations.contains(&"programming club".to_string()));
        // Abbreviation expansion.
        assert!(variations.contains(&"university of texas programming club".to_string()));
        // Acronym of words longer than two characters.
        assert!(variations.contains(&"pc".to_string()));
    }

    #[test]
    fn test_variations_discard_trivial_forms() {
        let resolver = NameResolver::new();
        for variation in resolver.variations("A") {
            assert!(variation.chars().count() > 1);
        }
    }

    #[test]
    fn test_acronym_skips_stopwords_and_short_words() {
        assert_eq!(acronym("The University of Texas Chess Society"), "utcs");
        assert_eq!(acronym("Society for Creative Anachronism"), "sca");
        // Too short to be useful.
        assert_eq!(acronym("Go"), "");
    }

    #[test]
    fn test_swap_phrase_multi_word() {
        assert_eq!(
            swap_phrase("university of texas rocket team", "university of texas", "ut"),
            "ut rocket team"
        );
        assert_eq!(
            swap_phrase("ut rocket team", "ut", "university of texas"),
            "university of texas rocket team"
        );
    }

    #[test]
    fn test_strip_phrases_removes_every_occurrence() {
        assert_eq!(
            strip_phrases("robotics club at ut", ORGANIZATIONAL_SUFFIXES),
            "robotics"
        );
    }

    #[test]
    fn test_alias_produces_exact_variation_match() {
        let resolver = NameResolver::new();
        let candidates = vec![org(
            "Texas Longhorns Programming Club",
            &["Programming Club"],
        )];

        let matches = resolver.match_candidates("UT Programming Club", &candidates);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 100);
        assert_eq!(matches[0].match_type, MatchType::ExactVariation);
        assert_eq!(matches[0].matched_text, "Programming Club");
    }

    #[test]
    fn test_without_alias_token_overlap_gives_similar_match() {
        let resolver = NameResolver::new();
        let candidates = vec![org("Texas Longhorns Programming Club", &[])];

        let matches = resolver.match_candidates("UT Programming Club", &candidates);

        assert_eq!(matches.len(), 1);
        assert!(matches[0].score >= 80);
        assert!(matches[0].score < 95);
        assert_eq!(matches[0].match_type, MatchType::Similar);
    }

    #[test]
    fn test_acronym_input_matches_candidate_acronym() {
        let resolver = NameResolver::new();
        let candidates = vec![org("Texas Longhorns Programming Club", &[])];

        let matches = resolver.match_candidates("TLPC", &candidates);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::ExactVariation);
    }

    #[test]
    fn test_abbreviation_swap_matches_exactly() {
        let resolver = NameResolver::new();
        let candidates = vec![org("TX Robotics Club", &[])];

        let matches = resolver.match_candidates("Texas Robotics Club", &candidates);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 100);
        assert_eq!(matches[0].match_type, MatchType::ExactVariation);
    }

    #[test]
    fn test_unrelated_names_are_excluded() {
        let resolver = NameResolver::new();
        let candidates = vec![org("Ballroom Dance Society", &[])];

        let matches = resolver.match_candidates("Quantum Computing Collective", &candidates);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_results_sorted_descending_with_stable_ties() {
        let resolver = NameResolver::new();
        let exact = org("Chess Club", &[]);
        let tied_first = org("UT Chess Club", &[]);
        let tied_second = org("Chess Club at Texas", &[]);
        let candidates = vec![tied_first.clone(), exact.clone(), tied_second.clone()];

        let matches = resolver.match_candidates("Chess Club", &candidates);

        assert!(matches.len() >= 2);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
        // Candidates with equal scores keep pool order.
        let tied: Vec<&NameMatch> = matches.iter().filter(|m| m.score == 100).collect();
        if tied.len() > 1 {
            let first_pos = candidates
                .iter()
                .position(|c| c.id == tied[0].organization.id)
                .unwrap();
            let second_pos = candidates
                .iter()
                .position(|c| c.id == tied[1].organization.id)
                .unwrap();
            assert!(first_pos < second_pos);
        }
    }

    #[test]
    fn test_token_set_similarity_ignores_order_and_duplicates() {
        let score = token_set_similarity("ut programming club", "club programming ut");
        assert!((score - 100.0).abs() < f64::EPSILON);

        let dup = token_set_similarity("chess chess club", "chess club");
        assert!((dup - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_similarity_finds_substring() {
        let score = partial_similarity("programming club", "ut programming club");
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_thresholds_widen_results() {
        let candidates = vec![org("Aeronautics Club", &[])];

        // Excluded at the default similarity threshold...
        let default_resolver = NameResolver::new();
        assert!(default_resolver
            .match_candidates("Robotics Club", &candidates)
            .is_empty());

        // ...but included once the threshold is lowered.
        let loose_resolver = NameResolver::with_config(MatcherConfig {
            similarity_threshold: 50,
            exact_match_threshold: 95,
        });
        let matches = loose_resolver.match_candidates("Robotics Club", &candidates);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Similar);
    }
}
