//! Keyword matching against generated prose.
//!
//! Keywords form a closed vocabulary but appear in open-ended text in
//! inflected form ("berries" for "berry", "clustered" for "cluster").
//! The matcher generates simple morphological variants for each
//! keyword, finds whole-word case-insensitive occurrences, resolves
//! overlaps by keeping the longest match at the earliest position, and
//! emits the text as alternating keyword/non-keyword segments. The
//! matched surface text is preserved; each keyword segment is tagged
//! with the canonical (non-inflected) keyword for downstream lookup.
//!
//! Results are deterministic for a fixed input: matches are ordered by
//! position, length, then canonical keyword, never by map iteration.

/// One run of text, tagged if it matched a keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The surface text, exactly as it appeared.
    pub text: String,
    /// The canonical keyword this run matched, if any.
    pub keyword: Option<String>,
}

impl Segment {
    pub fn is_keyword(&self) -> bool {
        self.keyword.is_some()
    }
}

/// Morphological variants of a keyword: the keyword itself, a regular
/// plural (or singular back-form), and -ing/-ed forms.
///
/// Suffix rules only: s/x/z/ch/sh pluralize with "es", consonant+y
/// becomes "ies", a trailing silent "e" drops before "ing", and a
/// consonant-vowel-consonant ending doubles the final consonant before
/// "ing"/"ed" (the undoubled form is kept as well, since English does
/// not double consistently).
pub fn variants(keyword: &str) -> Vec<String> {
    let k = keyword.trim().to_ascii_lowercase();
    let mut out: Vec<String> = Vec::new();
    if k.len() < 2 {
        return out;
    }
    out.push(k.clone());

    // Plural.
    if ends_with_any(&k, &["s", "x", "z", "ch", "sh"]) {
        out.push(format!("{k}es"));
    } else if k.ends_with('y') && ends_consonant_y(&k) {
        out.push(format!("{}ies", &k[..k.len() - 1]));
    } else {
        out.push(format!("{k}s"));
    }

    // Singular back-form, in case the keyword was authored plural.
    if k.ends_with("ies") && k.len() > 4 {
        out.push(format!("{}y", &k[..k.len() - 3]));
    } else if k.ends_with("es") && k.len() > 3 {
        // Either suffix may be the plural marker: boxes -> box,
        // stones -> stone.
        out.push(k[..k.len() - 2].to_string());
        out.push(k[..k.len() - 1].to_string());
    } else if k.ends_with('s') && k.len() > 3 {
        out.push(k[..k.len() - 1].to_string());
    }

    // Verb forms.
    if k.ends_with('e') && !k.ends_with("ee") && k.len() >= 3 {
        out.push(format!("{}ing", &k[..k.len() - 1]));
        out.push(format!("{k}d"));
    } else if k.ends_with('y') && ends_consonant_y(&k) {
        out.push(format!("{k}ing"));
        out.push(format!("{}ied", &k[..k.len() - 1]));
    } else {
        out.push(format!("{k}ing"));
        out.push(format!("{k}ed"));
        if let Some(doubled) = cvc_doubled(&k) {
            out.push(format!("{doubled}ing"));
            out.push(format!("{doubled}ed"));
        }
    }

    out.sort();
    out.dedup();
    out.retain(|v| v.len() >= 2);
    out
}

/// Segment `text` against a keyword set. Returns alternating
/// keyword/non-keyword runs covering the whole input.
pub fn segment(text: &str, keywords: &[String]) -> Vec<Segment> {
    let matches = resolve_matches(text, keywords);

    let mut segments = Vec::new();
    let mut cursor = 0usize;
    for m in matches {
        if m.start > cursor {
            segments.push(Segment {
                text: text[cursor..m.start].to_string(),
                keyword: None,
            });
        }
        segments.push(Segment {
            text: text[m.start..m.end].to_string(),
            keyword: Some(m.canonical),
        });
        cursor = m.end;
    }
    if cursor < text.len() {
        segments.push(Segment {
            text: text[cursor..].to_string(),
            keyword: None,
        });
    }
    segments
}

/// Canonical keywords found in `text`, deduplicated, in order of first
/// occurrence.
pub fn matched_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    let mut found = Vec::new();
    for m in resolve_matches(text, keywords) {
        if !found.contains(&m.canonical) {
            found.push(m.canonical);
        }
    }
    found
}

/// The canonical keyword covering the given byte offset, if any.
/// Used for hit-testing rendered text.
pub fn owner_at(text: &str, offset: usize, keywords: &[String]) -> Option<String> {
    resolve_matches(text, keywords)
        .into_iter()
        .find(|m| m.start <= offset && offset < m.end)
        .map(|m| m.canonical)
}

#[derive(Debug, Clone)]
struct Match {
    start: usize,
    end: usize,
    canonical: String,
}

/// All non-overlapping matches, longest-at-earliest-position wins.
fn resolve_matches(text: &str, keywords: &[String]) -> Vec<Match> {
    let mut candidates: Vec<Match> = Vec::new();
    for keyword in keywords {
        let canonical = keyword.trim().to_ascii_lowercase();
        if canonical.is_empty() {
            continue;
        }
        for variant in variants(&canonical) {
            for (start, end) in find_word_occurrences(text, &variant) {
                candidates.push(Match {
                    start,
                    end,
                    canonical: canonical.clone(),
                });
            }
        }
    }

    // Position, then longest first, then canonical for full
    // determinism when two keywords share a variant.
    candidates.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.canonical.cmp(&b.canonical))
    });

    let mut kept: Vec<Match> = Vec::new();
    let mut last_end = 0usize;
    for m in candidates {
        if m.start >= last_end {
            last_end = m.end;
            kept.push(m);
        }
    }
    kept
}

/// Whole-word, ASCII-case-insensitive occurrences of `needle` in
/// `text`, as byte ranges. Word boundaries are non-alphanumeric.
fn find_word_occurrences(text: &str, needle: &str) -> Vec<(usize, usize)> {
    let t = text.as_bytes();
    let n = needle.as_bytes();
    let mut out = Vec::new();
    if n.is_empty() || n.len() > t.len() {
        return out;
    }
    let mut i = 0;
    while i + n.len() <= t.len() {
        if t[i..i + n.len()].eq_ignore_ascii_case(n) {
            let before_ok = i == 0 || !t[i - 1].is_ascii_alphanumeric();
            let after = i + n.len();
            let after_ok = after == t.len() || !t[after].is_ascii_alphanumeric();
            if before_ok && after_ok {
                out.push((i, after));
            }
        }
        i += 1;
    }
    out
}

fn ends_with_any(word: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| word.ends_with(s))
}

fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

/// True if the word ends in 'y' preceded by a consonant.
fn ends_consonant_y(word: &str) -> bool {
    let bytes = word.as_bytes();
    bytes.len() >= 2
        && bytes[bytes.len() - 1] == b'y'
        && bytes[bytes.len() - 2].is_ascii_alphabetic()
        && !is_vowel(bytes[bytes.len() - 2])
}

/// If the word ends consonant-vowel-consonant (final not w/x/y),
/// return it with the final consonant doubled.
fn cvc_doubled(word: &str) -> Option<String> {
    let bytes = word.as_bytes();
    if bytes.len() < 3 {
        return None;
    }
    let (a, b, c) = (
        bytes[bytes.len() - 3],
        bytes[bytes.len() - 2],
        bytes[bytes.len() - 1],
    );
    let consonant = |x: u8| x.is_ascii_alphabetic() && !is_vowel(x);
    if consonant(a) && is_vowel(b) && consonant(c) && !matches!(c, b'w' | b'x' | b'y') {
        Some(format!("{}{}", word, c as char))
    } else {
        None
    }
}
