//! # Fuzzy String Scoring
//!
//! Partial-ratio similarity used to line up a catalog drug name against
//! noisy OCR output. Scores are integers in `0..=100`.
//!
//! The shorter string is slid across the longer one; every full-length
//! window is scored, and so are the prefixes and suffixes of the longer
//! string that are shorter than the needle, so a name cut off at the edge
//! of the label still gets credit. Each window is scored with the
//! normalized Indel similarity `2 * LCS / (len_a + len_b)` from `rapidfuzz`.

use rapidfuzz::distance::indel;

/// Partial-ratio similarity between `a` and `b`, in `0..=100`.
///
/// Comparison is by `char`, case-sensitive; callers lowercase first.
///
/// # Examples
///
/// ```rust
/// use medication_victory_plan::fuzzy::partial_ratio;
///
/// assert_eq!(partial_ratio("take metformin daily", "metformin"), 100);
/// assert_eq!(partial_ratio("metfromin tablet", "metformin"), 89);
/// assert_eq!(partial_ratio("", "metformin"), 0);
/// ```
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (needle, haystack) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let m = needle.len();
    let n = haystack.len();

    let mut best = 0.0_f64;

    let full_windows = (0..=n - m).map(|start| &haystack[start..start + m]);
    let prefixes = (1..m).map(|len| &haystack[..len]);
    let suffixes = (1..m).map(|len| &haystack[n - len..]);

    for window in full_windows.chain(prefixes).chain(suffixes) {
        let similarity = indel::normalized_similarity(needle.iter().copied(), window.iter().copied());
        if similarity >= 1.0 {
            return 100;
        }
        if similarity > best {
            best = similarity;
        }
    }

    (best * 100.0).round() as u8
}
