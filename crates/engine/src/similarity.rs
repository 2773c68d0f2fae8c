use crate::util::levenshtein_distance;

/// Score returned when `text` contains `pattern` outright.
pub const CONTAINMENT_SCORE: f64 = 0.9;

/// Normalized similarity in `[0.0, 1.0]` between a piece of observed text and
/// a reference name.
///
/// Both sides are lowercased and trimmed. Identical strings score 1.0. When
/// `text` contains `pattern` the score is [`CONTAINMENT_SCORE`]; the check is
/// one-way, so callers pass the noisier string (transaction text) first and
/// `similarity("NETFLIX.COM", "Netflix")` scores 0.9. Anything else falls back
/// to `(max_len - edit_distance) / max_len`. An empty side scores 0.0.
pub fn similarity(text: &str, pattern: &str) -> f64 {
    let a = text.trim().to_lowercase();
    let b = pattern.trim().to_lowercase();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) {
        return CONTAINMENT_SCORE;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = levenshtein_distance(&a, &b);
    (max_len - distance.min(max_len)) as f64 / max_len as f64
}

/// Best similarity of `text` against any of `patterns`.
pub fn best_similarity<'a, I>(text: &str, patterns: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    patterns
        .into_iter()
        .map(|p| similarity(text, p))
        .fold(0.0, f64::max)
}
