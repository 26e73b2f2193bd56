//! Word-overlap similarity between test titles and TestRail case titles.

use std::collections::HashSet;

/// Minimum similarity for a case to be considered a match.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Lowercase, replace non-alphanumerics with spaces and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn words(text: &str) -> HashSet<String> {
    normalize(text)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the normalized word sets: shared words over all
/// distinct words. Symmetric, 1.0 for identical normalized strings and 0.0
/// for disjoint word sets.
pub fn calculate_similarity(a: &str, b: &str) -> f64 {
    let (wa, wb) = (words(a), words(b));
    if wa.is_empty() && wb.is_empty() {
        return 1.0;
    }
    let shared = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    shared as f64 / union as f64
}

/// Best-scoring candidate for `title`, if any reaches `threshold`.
/// Ties keep the earliest candidate.
pub fn best_match<'a, T>(
    title: &str,
    candidates: &'a [T],
    candidate_title: impl Fn(&T) -> &str,
    threshold: f64,
) -> (Option<&'a T>, f64) {
    let mut best: Option<&T> = None;
    let mut best_score = 0.0;
    for candidate in candidates {
        let score = calculate_similarity(title, candidate_title(candidate));
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }
    if best_score >= threshold {
        (best, best_score)
    } else {
        (None, best_score)
    }
}
