// src/atom.rs

//! Dependency specifiers ("atoms")
//!
//! An atom names a package key and optionally narrows it:
//!
//! ```text
//! [!][op]category/name[-version[*]][:slot][#tag][~revision][@repo,repo...]
//! ```
//!
//! `op` is one of `>=`, `<=`, `>`, `<`, `=`, `~`. A leading `!` turns the atom
//! into a conflict. `~-1` as revision asks for the latest revision to be
//! pulled even when an installed package already satisfies the atom.
//!
//! Everything downstream works on the parsed [`Specifier`]; the raw string is
//! only kept for display.

use crate::error::{Error, Result};
use crate::repository::RepositoryId;
use crate::version::{Version, VersionTriple};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version comparison operator of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    /// Same base version, any ebuild revision
    Approximate,
}

impl Operator {
    /// Strip an operator prefix from `s`
    fn strip(s: &str) -> (Option<Self>, &str) {
        // Two-character operators first
        for (token, op) in [
            (">=", Operator::GreaterOrEqual),
            ("<=", Operator::LessOrEqual),
            (">", Operator::Greater),
            ("<", Operator::Less),
            ("=", Operator::Equal),
            ("~", Operator::Approximate),
        ] {
            if let Some(rest) = s.strip_prefix(token) {
                return (Some(op), rest);
            }
        }
        (None, s)
    }

    fn as_str(self) -> &'static str {
        match self {
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Equal => "=",
            Operator::Approximate => "~",
        }
    }
}

/// Package revision restriction carried by an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Revision {
    Exact(u32),
    /// `~-1`: always re-check against the newest available revision
    AlwaysLatest,
}

/// A parsed dependency specifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Specifier {
    /// Conflict marker (`!atom`)
    pub negated: bool,
    pub operator: Option<Operator>,
    /// `category/name`, or a bare name matching any category
    pub key: String,
    pub version: Option<Version>,
    /// Trailing `*`: the version is a prefix
    pub glob: bool,
    pub slot: Option<String>,
    pub tag: Option<String>,
    pub revision: Option<Revision>,
    /// `@repo,...` restriction, in the order written
    pub repositories: Option<Vec<RepositoryId>>,
}

fn invalid(spec: &str, reason: impl Into<String>) -> Error {
    Error::InvalidSpecifier {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '/' | '-' | '_' | '+' | '.')
}

impl Specifier {
    /// Parse an atom string
    ///
    /// Examples:
    /// - "app/foo" → key only
    /// - ">=app/foo-1.2:0" → operator, version and slot
    /// - "app/foo-1.2" → implicit `=` operator
    /// - "!app/bar" → conflict
    /// - "app/foo#5.10~-1@main,extra" → tag, always-latest, repository restriction
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() {
            return Err(invalid(input, "empty specifier"));
        }

        let (negated, s) = match s.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (s, repositories) = match s.split_once('@') {
            Some((atom, repos)) => {
                let ids: Vec<RepositoryId> = repos
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(RepositoryId::from)
                    .collect();
                if ids.is_empty() {
                    return Err(invalid(input, "empty repository restriction"));
                }
                (atom, Some(ids))
            }
            None => (s, None),
        };

        let (operator, s) = Operator::strip(s);

        let (s, revision) = match s.rsplit_once('~') {
            Some((atom, rev)) => {
                let revision = if rev == "-1" {
                    Revision::AlwaysLatest
                } else {
                    Revision::Exact(
                        rev.parse()
                            .map_err(|_| invalid(input, format!("bad revision '{}'", rev)))?,
                    )
                };
                (atom, Some(revision))
            }
            None => (s, None),
        };

        let (s, tag) = match s.split_once('#') {
            Some((_, "")) => return Err(invalid(input, "empty tag")),
            Some((atom, tag)) => (atom, Some(tag.to_string())),
            None => (s, None),
        };

        let (s, slot) = match s.split_once(':') {
            Some((_, "")) => return Err(invalid(input, "empty slot")),
            Some((atom, slot)) => (atom, Some(slot.to_string())),
            None => (s, None),
        };

        let (s, glob) = match s.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (s, false),
        };

        let (key, version) = split_key_version(s);

        if key.is_empty() || !key.chars().all(is_key_char) || key.matches('/').count() > 1 {
            return Err(invalid(input, format!("bad package key '{}'", key)));
        }

        let operator = match (operator, &version) {
            (Some(_), None) => return Err(invalid(input, "operator without version")),
            (None, Some(_)) => Some(Operator::Equal),
            (op, _) => op,
        };

        if glob && (version.is_none() || operator != Some(Operator::Equal)) {
            return Err(invalid(input, "'*' needs an '=' version"));
        }

        Ok(Self {
            negated,
            operator,
            key: key.to_string(),
            version,
            glob,
            slot,
            tag,
            revision,
            repositories,
        })
    }

    /// A plain specifier for a package key
    pub fn from_key(key: &str) -> Self {
        Self {
            negated: false,
            operator: None,
            key: key.to_string(),
            version: None,
            glob: false,
            slot: None,
            tag: None,
            revision: None,
            repositories: None,
        }
    }

    pub fn with_slot(mut self, slot: &str) -> Self {
        self.slot = Some(slot.to_string());
        self
    }

    /// The same atom without the conflict marker
    pub fn positive(&self) -> Self {
        Self {
            negated: false,
            ..self.clone()
        }
    }

    /// True when the atom names nothing beyond a key (and maybe a slot)
    pub fn is_just_name(&self) -> bool {
        self.version.is_none() && self.tag.is_none() && self.revision.is_none()
    }

    pub fn wants_latest(&self) -> bool {
        self.revision == Some(Revision::AlwaysLatest)
    }

    /// Whether `key` is the package this atom names
    ///
    /// A bare name without category matches any category.
    pub fn matches_key(&self, key: &str, case_sensitive: bool) -> bool {
        let candidate = if self.key.contains('/') {
            key
        } else {
            key.rsplit_once('/').map_or(key, |(_, name)| name)
        };
        if case_sensitive {
            candidate == self.key
        } else {
            candidate.eq_ignore_ascii_case(&self.key)
        }
    }

    /// Whether a package with this triple satisfies the version, tag and
    /// revision parts of the atom
    pub fn matches_version(&self, triple: &VersionTriple) -> bool {
        if let Some(tag) = &self.tag {
            if &triple.tag != tag {
                return false;
            }
        }

        if let Some(Revision::Exact(rev)) = self.revision {
            if triple.revision != rev {
                return false;
            }
        }

        let Some(wanted) = &self.version else {
            return true;
        };

        if self.glob {
            return triple.version.has_prefix(wanted);
        }

        let have = &triple.version;
        match self.operator.unwrap_or(Operator::Equal) {
            Operator::Equal => have == wanted,
            Operator::Approximate => have.compare_base(wanted).is_eq(),
            Operator::Greater => have > wanted,
            Operator::GreaterOrEqual => have >= wanted,
            Operator::Less => have < wanted,
            Operator::LessOrEqual => have <= wanted,
        }
    }

    /// Full check of a concrete package against this atom
    pub fn accepts(&self, key: &str, slot: &str, triple: &VersionTriple) -> bool {
        self.matches_key(key, true)
            && self.slot.as_deref().is_none_or(|s| s == slot)
            && self.matches_version(triple)
    }
}

/// Split `name-1.2-r1` into key and version
///
/// The version starts at the first `-` followed by a digit whose remainder
/// parses as a version, so names such as `foo-2bar` stay intact.
fn split_key_version(s: &str) -> (&str, Option<Version>) {
    for (pos, _) in s.match_indices('-') {
        let rest = &s[pos + 1..];
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        if let Ok(version) = Version::parse(rest) {
            return (&s[..pos], Some(version));
        }
    }
    (s, None)
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!")?;
        }
        if let (Some(op), Some(_)) = (self.operator, &self.version) {
            write!(f, "{}", op.as_str())?;
        }
        write!(f, "{}", self.key)?;
        if let Some(version) = &self.version {
            write!(f, "-{}", version)?;
            if self.glob {
                write!(f, "*")?;
            }
        }
        if let Some(slot) = &self.slot {
            write!(f, ":{}", slot)?;
        }
        if let Some(tag) = &self.tag {
            write!(f, "#{}", tag)?;
        }
        match self.revision {
            Some(Revision::Exact(rev)) => write!(f, "~{}", rev)?,
            Some(Revision::AlwaysLatest) => write!(f, "~-1")?,
            None => {}
        }
        if let Some(repos) = &self.repositories {
            let ids: Vec<&str> = repos.iter().map(RepositoryId::as_str).collect();
            write!(f, "@{}", ids.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for Specifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Specifier::parse(s)
    }
}

impl TryFrom<String> for Specifier {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Specifier::parse(&s)
    }
}

impl From<Specifier> for String {
    fn from(spec: Specifier) -> Self {
        spec.to_string()
    }
}
