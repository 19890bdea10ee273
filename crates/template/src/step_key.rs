//! Step key grammar.
//!
//! A standard key is `Step <n>` followed by an optional tail: a dotted
//! sub-step (`.2`), a free-text suffix (` - Intro`), or both. Numbers carry no
//! leading zeros and the tail never starts with a digit, so every standard
//! key parses to exactly one `(number, tail)` pair and renumbering can never
//! merge two keys. Keys outside the grammar are non-standard and are left
//! alone by renumbering.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn step_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^Step (0|[1-9][0-9]*)([^0-9].*)?$").expect("valid step key pattern")
    })
}

fn sub_step_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\.[0-9]+").expect("valid sub-step pattern")
    })
}

/// A parsed standard step key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepKey {
    /// Leading step number
    pub number: u32,

    /// Everything after the number, verbatim
    pub tail: String,
}

impl StepKey {
    /// Parse a key; `None` for non-standard keys.
    pub fn parse(key: &str) -> Option<Self> {
        let caps = step_key_pattern().captures(key)?;
        let number = caps.get(1)?.as_str().parse().ok()?;
        let tail = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        Some(Self {
            number,
            tail: tail.to_string(),
        })
    }

    /// `Step <number>` with no tail.
    pub fn plain(number: u32) -> Self {
        Self {
            number,
            tail: String::new(),
        }
    }

    /// True for `Step <n>.<m>...` keys.
    pub fn is_sub_step(&self) -> bool {
        sub_step_pattern().is_match(&self.tail)
    }

    /// Same tail, different number.
    pub fn renumbered(&self, number: u32) -> Self {
        Self {
            number,
            tail: self.tail.clone(),
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}{}", self.number, self.tail)
    }
}
