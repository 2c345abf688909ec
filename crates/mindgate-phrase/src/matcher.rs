//! Bounded edit-distance matcher

use serde::{Deserialize, Serialize};

use crate::DEFAULT_MAX_DISTANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact reproduction (after whitespace and case folding)
    Exact,
    /// Up to `max_distance` edits
    #[default]
    Fuzzy,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Fuzzy => "fuzzy",
        }
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchMode::Exact),
            "fuzzy" => Ok(MatchMode::Fuzzy),
            _ => Err(format!("Unknown match mode: {}", s)),
        }
    }
}

/// Configured matching policy for the confirmation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseMatcher {
    pub mode: MatchMode,
    pub max_distance: usize,
}

impl PhraseMatcher {
    pub fn new(mode: MatchMode, max_distance: usize) -> Self {
        Self { mode, max_distance }
    }

    fn bound(&self) -> usize {
        match self.mode {
            MatchMode::Exact => 0,
            MatchMode::Fuzzy => self.max_distance,
        }
    }

    /// Whether `input` is an accepted reproduction of `expected`
    pub fn accepts(&self, input: &str, expected: &str) -> bool {
        accepts(input, expected, self.bound())
    }

    /// Whether `input` is on track to reproduce `expected`, for live feedback
    pub fn partially_accepts(&self, input: &str, expected: &str) -> bool {
        partially_accepts(input, expected, self.bound())
    }
}

impl Default for PhraseMatcher {
    fn default() -> Self {
        Self::new(MatchMode::Fuzzy, DEFAULT_MAX_DISTANCE)
    }
}

/// Full match: the whole input against the whole phrase
pub fn accepts(input: &str, expected: &str, max_distance: usize) -> bool {
    let input = fold(input);
    let expected = fold(expected);
    within(&input, &expected, max_distance)
}

/// Partial match: the input against the same-length prefix of the phrase
pub fn partially_accepts(input: &str, expected: &str, max_distance: usize) -> bool {
    let input = fold(input);
    let expected = fold(expected);
    let prefix_len = input.len().min(expected.len());
    within(&input, &expected[..prefix_len], max_distance)
}

/// Levenshtein distance over `char`s, without any folding
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    levenshtein(&a, &b, usize::MAX)
}

fn within(a: &[char], b: &[char], max_distance: usize) -> bool {
    if max_distance == 0 {
        return a == b;
    }
    if a.len().abs_diff(b.len()) > max_distance {
        return false;
    }
    levenshtein(a, b, max_distance) <= max_distance
}

fn fold(s: &str) -> Vec<char> {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .collect()
}

/// Two-row DP; stops as soon as every cell of a row exceeds `bound`.
fn levenshtein(a: &[char], b: &[char], bound: usize) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];

        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }

        if row_min > bound {
            return row_min;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
