//! Maven version ordering and pre-release detection.
//!
//! A best-effort approximation of Maven's `ComparableVersion`: versions are
//! split on `.`, `-` and digit/letter transitions; numeric segments compare
//! numerically and known qualifiers compare by rank
//! (`alpha < beta < milestone < rc < snapshot < release < sp`). Unknown
//! qualifiers sort after releases, lexicographically.

use std::cmp::Ordering;

const RELEASE_RANK: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Qualifier(u8, String),
}

fn qualifier_rank(q: &str) -> u8 {
    match q {
        "alpha" | "a" | "dev" | "preview" | "ea" | "eap" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => RELEASE_RANK,
        "sp" => 6,
        _ => 7,
    }
}

fn tokenize(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in version.split(['.', '-', '_', '+']) {
        let mut start = 0;
        let chars: Vec<(usize, char)> = part.char_indices().collect();
        for window in chars.windows(2) {
            let ((_, a), (i, b)) = (window[0], window[1]);
            if a.is_ascii_digit() != b.is_ascii_digit() {
                segments.push(segment(&part[start..i]));
                start = i;
            }
        }
        if start < part.len() {
            segments.push(segment(&part[start..]));
        }
    }
    segments
}

fn segment(token: &str) -> Segment {
    match token.parse::<u64>() {
        Ok(n) => Segment::Number(n),
        Err(_) => {
            let lower = token.to_ascii_lowercase();
            Segment::Qualifier(qualifier_rank(&lower), lower)
        }
    }
}

fn compare_segments(a: Option<&Segment>, b: Option<&Segment>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(Segment::Number(x)), Some(Segment::Number(y))) => x.cmp(y),
        (Some(Segment::Number(_)), Some(Segment::Qualifier(..))) => Ordering::Greater,
        (Some(Segment::Qualifier(..)), Some(Segment::Number(_))) => Ordering::Less,
        (Some(Segment::Qualifier(ra, qa)), Some(Segment::Qualifier(rb, qb))) => {
            ra.cmp(rb).then_with(|| qa.cmp(qb))
        }
        // A missing segment behaves like `0` against numbers and like a plain
        // release against qualifiers.
        (Some(Segment::Number(n)), None) => n.cmp(&0),
        (None, Some(Segment::Number(n))) => 0.cmp(n),
        (Some(Segment::Qualifier(r, _)), None) => r.cmp(&RELEASE_RANK),
        (None, Some(Segment::Qualifier(r, _))) => RELEASE_RANK.cmp(r),
    }
}

/// Compares two Maven version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = tokenize(a);
    let b = tokenize(b);
    (0..a.len().max(b.len()))
        .map(|i| compare_segments(a.get(i), b.get(i)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Detects if a Maven version string is a pre-release.
///
/// SNAPSHOT, alpha, beta, milestone (`M1`), release candidates and
/// early-access builds all count.
pub fn is_prerelease(version: &str) -> bool {
    tokenize(version)
        .iter()
        .any(|s| matches!(s, Segment::Qualifier(rank, _) if *rank < RELEASE_RANK))
}

/// Whether `version` is a Maven version range such as `[1.0,2.0)`.
pub fn is_range(version: &str) -> bool {
    version.starts_with(['[', '(']) || version.ends_with([']', ')'])
}

/// Highest version, preferring stable releases unless `allow_prerelease`
/// is set or nothing stable exists.
pub fn latest_version<'a, I>(versions: I, allow_prerelease: bool) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best_stable: Option<&str> = None;
    let mut best_any: Option<&str> = None;
    for v in versions {
        if best_any.is_none_or(|b| compare_versions(v, b).is_gt()) {
            best_any = Some(v);
        }
        if !is_prerelease(v) && best_stable.is_none_or(|b| compare_versions(v, b).is_gt()) {
            best_stable = Some(v);
        }
    }
    if allow_prerelease {
        best_any
    } else {
        best_stable.or(best_any)
    }
}
