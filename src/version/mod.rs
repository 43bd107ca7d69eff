// src/version/mod.rs

//! Version handling for Gentoo-style package versions
//!
//! Versions follow the ebuild grammar: dotted numeric components, an optional
//! trailing letter, a chain of `_alpha`, `_beta`, `_pre`, `_rc` and `_p`
//! suffixes, and an optional `-rN` revision. A [`VersionTriple`] layers a
//! free-form tag and a package revision on top of the base version and is
//! what the resolver compares when choosing between candidates.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)((?:\.\d+)*)([a-z]?)((?:_(?:alpha|beta|pre|rc|p)\d*)*)(?:-r(\d+))?$")
        .unwrap()
});

/// Release suffix kinds, ordered `alpha < beta < pre < rc < (none) < p`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl SuffixKind {
    fn rank(self) -> i8 {
        match self {
            SuffixKind::Alpha => -4,
            SuffixKind::Beta => -3,
            SuffixKind::Pre => -2,
            SuffixKind::Rc => -1,
            SuffixKind::P => 0,
        }
    }

    /// Split a suffix body such as `pre1` into its kind and the numeric rest
    fn split(s: &str) -> Option<(Self, &str)> {
        // Longest names first so that "pre" is not read as "p" + "re"
        [
            ("alpha", SuffixKind::Alpha),
            ("beta", SuffixKind::Beta),
            ("pre", SuffixKind::Pre),
            ("rc", SuffixKind::Rc),
            ("p", SuffixKind::P),
        ]
        .into_iter()
        .find_map(|(name, kind)| s.strip_prefix(name).map(|rest| (kind, rest)))
    }

    fn as_str(self) -> &'static str {
        match self {
            SuffixKind::Alpha => "alpha",
            SuffixKind::Beta => "beta",
            SuffixKind::Pre => "pre",
            SuffixKind::Rc => "rc",
            SuffixKind::P => "p",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Suffix {
    kind: SuffixKind,
    number: u64,
}

/// The implicit suffix of a version without one, and of missing chain elements
const NO_SUFFIX: Suffix = Suffix {
    kind: SuffixKind::P,
    number: 0,
};

/// A parsed Gentoo version string
///
/// Equality follows the ordering, so `1.0` and `1.00` are equal even though
/// their textual forms differ. The raw text is kept for display and
/// for prefix globbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    components: Vec<String>,
    letter: Option<char>,
    suffixes: Vec<Suffix>,
    revision: u64,
}

impl Version {
    /// Parse a version string
    ///
    /// Examples:
    /// - "1.2.3" → components [1, 2, 3]
    /// - "1.0b" → components [1, 0], letter 'b'
    /// - "2.4_rc1_p2" → suffix chain rc1, p2
    /// - "1.0-r3" → ebuild revision 3
    pub fn parse(s: &str) -> Result<Self> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::InvalidVersion(s.to_string()))?;

        let mut components = vec![caps[1].to_string()];
        if let Some(rest) = caps.get(2) {
            components.extend(
                rest.as_str()
                    .split('.')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            );
        }

        let letter = caps.get(3).and_then(|m| m.as_str().chars().next());

        let mut suffixes = Vec::new();
        if let Some(chain) = caps.get(4) {
            for body in chain.as_str().split('_').filter(|b| !b.is_empty()) {
                let (kind, digits) =
                    SuffixKind::split(body).ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
                let number = if digits.is_empty() {
                    0
                } else {
                    digits
                        .parse()
                        .map_err(|_| Error::InvalidVersion(s.to_string()))?
                };
                suffixes.push(Suffix { kind, number });
            }
        }

        let revision = match caps.get(5) {
            Some(r) => r
                .as_str()
                .parse()
                .map_err(|_| Error::InvalidVersion(s.to_string()))?,
            None => 0,
        };

        Ok(Self {
            raw: s.to_string(),
            components,
            letter,
            suffixes,
            revision,
        })
    }

    /// The version text as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The ebuild `-rN` revision, 0 when absent
    pub fn ebuild_revision(&self) -> u64 {
        self.revision
    }

    /// Whether this version's text starts with `prefix` (used by `=foo-1.2*`)
    pub fn has_prefix(&self, prefix: &Version) -> bool {
        self.raw.starts_with(prefix.as_str())
    }

    /// Compare ignoring the `-rN` revision
    pub fn compare_base(&self, other: &Version) -> Ordering {
        match compare_integers(&self.components[0], &other.components[0]) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let parts = self.components.len().max(other.components.len());
        for i in 1..parts {
            let ord = match (self.components.get(i), other.components.get(i)) {
                (None, None) => Ordering::Equal,
                // A missing component sorts below any present one: 1.0 < 1.0.0
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => compare_components(a, b),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        // Letters only count once the numeric lists agree: 1.0a < 1.0.0
        match self.letter.cmp(&other.letter) {
            Ordering::Equal => {}
            ord => return ord,
        }

        let chain = self.suffixes.len().max(other.suffixes.len());
        for i in 0..chain {
            let a = self.suffixes.get(i).copied().unwrap_or(NO_SUFFIX);
            let b = other.suffixes.get(i).copied().unwrap_or(NO_SUFFIX);
            match a
                .kind
                .rank()
                .cmp(&b.kind.rank())
                .then(a.number.cmp(&b.number))
            {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        Ordering::Equal
    }

    /// Compare two versions including the `-rN` revision
    pub fn compare(&self, other: &Version) -> Ordering {
        self.compare_base(other)
            .then(self.revision.cmp(&other.revision))
    }
}

fn compare_components(a: &str, b: &str) -> Ordering {
    // A leading zero switches to fractional comparison: 1.01 < 1.1
    if a.starts_with('0') || b.starts_with('0') {
        compare_fractions(a, b)
    } else {
        compare_integers(a, b)
    }
}

/// Numeric comparison of digit strings of any length
fn compare_integers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare digit strings as the fractional parts `.a` and `.b`
fn compare_fractions(a: &str, b: &str) -> Ordering {
    a.trim_end_matches('0').cmp(b.trim_end_matches('0'))
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Version::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.raw
    }
}

impl fmt::Display for SuffixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A package's (version, tag, revision) triple
///
/// `tag` is empty for untagged packages. `revision` is the repository
/// revision of the package record, not the ebuild `-rN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionTriple {
    pub version: Version,
    pub tag: String,
    pub revision: u32,
}

impl VersionTriple {
    pub fn new(version: Version, tag: impl Into<String>, revision: u32) -> Self {
        Self {
            version,
            tag: tag.into(),
            revision,
        }
    }

    /// Parse the version component and build a triple
    pub fn parse(version: &str, tag: &str, revision: u32) -> Result<Self> {
        Ok(Self::new(Version::parse(version)?, tag, revision))
    }

    /// Compare two triples
    ///
    /// When both carry a tag the tags are compared before the versions; the
    /// tags are compared again after an equal version, and the revision
    /// settles what remains. The ordering is only transitive within a set of
    /// triples that are either all tagged or all untagged.
    pub fn compare(&self, other: &VersionTriple) -> Ordering {
        if !self.tag.is_empty() && !other.tag.is_empty() {
            match compare_tags(&self.tag, &other.tag) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match self.version.compare(&other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match compare_tags(&self.tag, &other.tag) {
            Ordering::Equal => {}
            ord => return ord,
        }

        self.revision.cmp(&other.revision)
    }

    /// True when version and tag agree and only the revision differs
    pub fn differs_only_in_revision(&self, other: &VersionTriple) -> bool {
        self.version == other.version && self.tag == other.tag && self.revision != other.revision
    }
}

impl PartialOrd for VersionTriple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)?;
        if !self.tag.is_empty() {
            write!(f, "#{}", self.tag)?;
        }
        write!(f, "~{}", self.revision)
    }
}

/// Parse and compare two version strings
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(Version::parse(a)?.compare(&Version::parse(b)?))
}

enum Chunk<'a> {
    Number(&'a str),
    Text(String),
}

fn natural_chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    while start < bytes.len() {
        let digit = bytes[start].is_ascii_digit();
        let end = bytes[start..]
            .iter()
            .position(|b| b.is_ascii_digit() != digit)
            .map_or(bytes.len(), |p| start + p);
        let run = &s[start..end];
        chunks.push(if digit {
            Chunk::Number(run)
        } else {
            Chunk::Text(run.to_lowercase())
        });
        start = end;
    }
    chunks
}

/// Natural ordering of tags and branch names
///
/// Digit runs compare as numbers and other runs compare case-insensitively,
/// so `"2" < "10"` and `"r5" < "R10"`. Distinct strings never compare equal.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    let left = natural_chunks(a);
    let right = natural_chunks(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ord = match (x, y) {
            (Chunk::Number(m), Chunk::Number(n)) => compare_integers(m, n),
            (Chunk::Text(m), Chunk::Text(n)) => m.cmp(n),
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Order items newest first by their triples
///
/// This is a stable insertion sort. `slice::sort_by` requires a total order,
/// which [`VersionTriple::compare`] does not provide for mixed tagged and
/// untagged input.
pub fn sort_newest_first<T>(items: &mut [T], triple: impl Fn(&T) -> &VersionTriple) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && triple(&items[j - 1]).compare(triple(&items[j])) == Ordering::Less {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn t(version: &str, tag: &str, revision: u32) -> VersionTriple {
        VersionTriple::parse(version, tag, revision).unwrap()
    }

    #[test]
    fn test_version_parse_components() {
        let version = v("1.2.3b_rc1_p2-r4");
        assert_eq!(version.components, vec!["1", "2", "3"]);
        assert_eq!(version.letter, Some('b'));
        assert_eq!(version.suffixes.len(), 2);
        assert_eq!(version.suffixes[0].kind, SuffixKind::Rc);
        assert_eq!(version.suffixes[1].number, 2);
        assert_eq!(version.ebuild_revision(), 4);
        assert_eq!(version.to_string(), "1.2.3b_rc1_p2-r4");
    }

    #[test]
    fn test_version_parse_rejects_invalid() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1.2-").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.0_gamma").is_err());
    }

    #[test]
    fn test_version_missing_component_sorts_lower() {
        assert!(v("1.0") < v("1.0.0"));
        assert!(v("1.2") < v("1.10"));
    }

    #[test]
    fn test_version_leading_zero_is_fractional() {
        assert!(v("1.01") < v("1.1"));
        assert!(v("1.001") < v("1.01"));
        assert_eq!(v("1.010"), v("1.01"));
    }

    #[test]
    fn test_version_letter() {
        assert!(v("1.0") < v("1.0a"));
        assert!(v("1.0a") < v("1.0b"));
        assert!(v("1.0a") < v("1.0.1"));
        assert!(v("1.0a") < v("1.0.0"));
        assert!(v("1.0.0") < v("1.0.0a"));
        assert!(v("1a") < v("1.0"));
    }

    #[test]
    fn test_version_suffix_ranking() {
        let ordered = ["1.0_alpha", "1.0_beta", "1.0_pre", "1.0_rc", "1.0", "1.0_p1"];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
        assert!(v("1.0_pre1") < v("1.0_pre2"));
        assert!(v("1.0_pre1") < v("1.0_pre1_p1"));
    }

    #[test]
    fn test_version_ebuild_revision() {
        assert!(v("1.0") < v("1.0-r1"));
        assert_eq!(v("1.0-r1").compare_base(&v("1.0-r7")), Ordering::Equal);
    }

    #[test]
    fn test_triple_revision_orders_last() {
        assert_eq!(t("1.2", "", 0).compare(&t("1.2", "", 1)), Ordering::Less);
    }

    #[test]
    fn test_triple_tag_beats_untagged() {
        assert_eq!(t("1.2", "a", 0).compare(&t("1.2", "", 0)), Ordering::Greater);
        assert_eq!(t("1.2", "", 0).compare(&t("1.2", "a", 0)), Ordering::Less);
    }

    #[test]
    fn test_triple_suffix_examples() {
        assert_eq!(t("1.2_pre1", "", 0).compare(&t("1.2", "", 0)), Ordering::Less);
        assert_eq!(t("1.2", "", 0).compare(&t("1.2_p1", "", 0)), Ordering::Less);
    }

    #[test]
    fn test_triple_tags_compared_before_version() {
        // Both tagged: the tag decides even against a newer version
        assert_eq!(t("1.0", "b", 0).compare(&t("2.0", "a", 0)), Ordering::Greater);
        // One side untagged: version decides
        assert_eq!(t("1.0", "b", 0).compare(&t("2.0", "", 0)), Ordering::Less);
    }

    #[test]
    fn test_compare_tags_natural() {
        assert_eq!(compare_tags("2", "10"), Ordering::Less);
        assert_eq!(compare_tags("r5", "R10"), Ordering::Less);
        assert_eq!(compare_tags("", "a"), Ordering::Less);
        assert_ne!(compare_tags("A", "a"), Ordering::Equal);
        assert_eq!(compare_tags("5.2", "5.2"), Ordering::Equal);
    }

    #[test]
    fn test_compare_versions_propagates_errors() {
        assert_eq!(compare_versions("1.0", "1.1").unwrap(), Ordering::Less);
        assert!(matches!(
            compare_versions("", "1.0"),
            Err(Error::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_sort_newest_first_is_stable() {
        let mut items = vec![
            (1, t("1.0", "", 0)),
            (2, t("2.0", "", 0)),
            (3, t("1.0", "", 0)),
            (4, t("1.5", "", 0)),
        ];
        sort_newest_first(&mut items, |(_, triple)| triple);
        let ids: Vec<_> = items.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_triple_display() {
        assert_eq!(t("1.2", "", 3).to_string(), "1.2~3");
        assert_eq!(t("1.2", "5.10", 0).to_string(), "1.2#5.10~0");
    }
}
