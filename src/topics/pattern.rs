//! # Topic names and wildcard patterns.
//!
//! Names and patterns are dot-separated segments. Subscription patterns may use:
//! - `*`: exactly one segment;
//! - `**`: zero or more segments, at any position.
//!
//! Published names must be concrete (no wildcards).
//!
//! ## Matching table
//! ```text
//! pattern            event.some.thing.run   event.some.thing.do   event.some.thing   event.some
//! event.some.*.*          ✓                      ✓                     ✗                  ✗
//! event.some.*.run        ✓                      ✗                     ✗                  ✗
//! event.some.**           ✓                      ✓                     ✓                  ✓
//! **.thing.run            ✓                      ✗                     ✗                  ✗
//! ```
//!
//! ## Validation rules
//! - names are trimmed before use;
//! - no empty name and no empty segment (`a..b`, `.a`, `a.`);
//! - segment characters: ASCII alphanumerics, `_`, `-`, `:`;
//! - `*` / `**` only as whole segments, and `**.**` is rejected.

use std::cmp::Ordering;

use crate::error::EmitterError;

pub(crate) const SINGLE_WILDCARD: &str = "*";
pub(crate) const MULTI_WILDCARD: &str = "**";
const SEPARATOR: char = '.';

/// Trims surrounding whitespace.
#[inline]
pub fn normalize(name: &str) -> &str {
    name.trim()
}

/// Validates a subscription pattern (wildcards allowed).
pub fn validate_pattern(pattern: &str) -> Result<(), EmitterError> {
    validate(pattern, true)
}

/// Validates a published name (wildcards rejected).
pub fn validate_name(name: &str) -> Result<(), EmitterError> {
    validate(name, false)
}

fn validate(name: &str, wildcards: bool) -> Result<(), EmitterError> {
    let invalid = |reason| EmitterError::InvalidTopicName {
        topic: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }

    let mut prev_multi = false;
    for segment in name.split(SEPARATOR) {
        match segment {
            "" => return Err(invalid("empty segment")),
            SINGLE_WILDCARD | MULTI_WILDCARD if !wildcards => {
                return Err(invalid("wildcards are not allowed in published names"))
            }
            MULTI_WILDCARD if prev_multi => return Err(invalid("repeated `**` segment")),
            SINGLE_WILDCARD | MULTI_WILDCARD => {}
            lit if lit.contains('*') => return Err(invalid("wildcard must be a whole segment")),
            lit if !lit.chars().all(is_segment_char) => {
                return Err(invalid("unsupported character"))
            }
            _ => {}
        }
        prev_multi = segment == MULTI_WILDCARD;
    }

    Ok(())
}

#[inline]
fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':')
}

/// Returns `true` if the pattern contains a wildcard segment.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern
        .split(SEPARATOR)
        .any(|s| s == SINGLE_WILDCARD || s == MULTI_WILDCARD)
}

/// Reports whether `pattern` matches the concrete `name`.
///
/// Both inputs are expected to be normalized. A pattern without wildcards
/// matches only the identical name.
pub fn matches(pattern: &str, name: &str) -> bool {
    if pattern == name {
        return true;
    }
    if !is_wildcard(pattern) {
        return false;
    }

    let pat: Vec<&str> = pattern.split(SEPARATOR).collect();
    let segs: Vec<&str> = name.split(SEPARATOR).collect();
    match_segments(&pat, &segs)
}

/// Segment matcher with `**` backtracking.
///
/// `star` remembers the latest `**` (pattern index, name index it started at),
/// so a mismatch later on retries with `**` swallowing one more segment.
fn match_segments(pat: &[&str], segs: &[&str]) -> bool {
    let (mut p, mut s) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while s < segs.len() {
        match pat.get(p) {
            Some(&MULTI_WILDCARD) => {
                star = Some((p, s));
                p += 1;
            }
            Some(&seg) if seg == SINGLE_WILDCARD || seg == segs[s] => {
                p += 1;
                s += 1;
            }
            _ => match star {
                Some((sp, ss)) => {
                    star = Some((sp, ss + 1));
                    p = sp + 1;
                    s = ss + 1;
                }
                None => return false,
            },
        }
    }

    pat[p..].iter().all(|seg| *seg == MULTI_WILDCARD)
}

/// Wildcard and segment counts used for ordering matched patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Specificity {
    multi: usize,
    single: usize,
    segments: usize,
    len: usize,
}

impl Specificity {
    fn of(pattern: &str) -> Self {
        let mut key = Specificity {
            multi: 0,
            single: 0,
            segments: 0,
            len: pattern.len(),
        };
        for seg in pattern.split(SEPARATOR) {
            key.segments += 1;
            match seg {
                MULTI_WILDCARD => key.multi += 1,
                SINGLE_WILDCARD => key.single += 1,
                _ => {}
            }
        }
        key
    }
}

/// Orders patterns most-specific first.
///
/// Fewer `**`, then fewer `*`, then more segments, then longer, then lexical.
pub fn compare_specificity(a: &str, b: &str) -> Ordering {
    let (ka, kb) = (Specificity::of(a), Specificity::of(b));
    ka.multi
        .cmp(&kb.multi)
        .then(ka.single.cmp(&kb.single))
        .then(kb.segments.cmp(&ka.segments))
        .then(kb.len.cmp(&ka.len))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERNS: [&str; 4] = [
        "event.some.*.*",
        "event.some.*.run",
        "event.some.**",
        "**.thing.run",
    ];

    fn matching(name: &str) -> Vec<&'static str> {
        PATTERNS.iter().copied().filter(|p| matches(p, name)).collect()
    }

    #[test]
    fn test_wildcard_table() {
        assert_eq!(matching("event.some.thing.run"), PATTERNS.to_vec());
        assert_eq!(
            matching("event.some.thing.do"),
            vec!["event.some.*.*", "event.some.**"]
        );
        assert_eq!(matching("event.some.thing"), vec!["event.some.**"]);
    }

    #[test]
    fn test_multi_wildcard_zero_segments() {
        assert!(matches("event.some.**", "event.some"));
        assert!(matches("**.run", "run"));
        assert!(matches("**", "anything.at.all"));
        assert!(!matches("event.some.*", "event.some"));
    }

    #[test]
    fn test_multi_wildcard_in_the_middle() {
        assert!(matches("a.**.z", "a.z"));
        assert!(matches("a.**.z", "a.b.c.z"));
        assert!(matches("a.**.*.z", "a.b.z"));
        assert!(!matches("a.**.*.z", "a.z"));
        assert!(matches("a.**.b.**.c", "a.x.b.y.b.c"));
        assert!(!matches("a.**.z", "a.b.c"));
    }

    #[test]
    fn test_literal_and_single() {
        assert!(matches("a.b", "a.b"));
        assert!(!matches("a.b", "a.b.c"));
        assert!(matches("*.b", "x.b"));
        assert!(!matches("*.b", "b"));
        assert!(!matches("*.b", "x.y.b"));
    }

    #[test]
    fn test_validation() {
        assert!(validate_pattern("event.some.**").is_ok());
        assert!(validate_pattern("**.thing.run").is_ok());
        assert!(validate_pattern("user_created:v2.a-b").is_ok());
        for bad in ["", "a..b", ".a", "a.", "a*.b", "bad?[topic", "a.**.**", "a b"] {
            assert!(validate_pattern(bad).is_err(), "{bad:?} should be rejected");
        }

        assert!(validate_name("event.some.thing").is_ok());
        assert!(matches!(
            validate_name("event.*"),
            Err(EmitterError::InvalidTopicName { .. })
        ));
        assert_eq!(normalize("  a.b "), "a.b");
    }

    #[test]
    fn test_specificity_order() {
        let mut pats = vec![
            "**.thing.run",
            "event.some.**",
            "event.some.*.*",
            "event.some.*.run",
            "event.some.thing.run",
        ];
        pats.sort_by(|a, b| compare_specificity(a, b));
        assert_eq!(
            pats,
            vec![
                "event.some.thing.run",
                "event.some.*.run",
                "event.some.*.*",
                "event.some.**",
                "**.thing.run",
            ]
        );
    }
}
