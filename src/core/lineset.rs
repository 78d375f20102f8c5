//! Sorted-unique sets of 1-based line numbers.
//!
//! The canonical textual form is `"3,5-7,12"`: single lines and closed
//! ranges, comma-joined, ascending, non-overlapping. Deserialization also
//! accepts the legacy two-element `[start, end]` tuple that older record
//! writers emitted for dense ranges.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Error for malformed line specs such as `"3,5-"` or `"7-4"`.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid line spec `{spec}`: {detail}")]
pub struct LineSpecError {
    pub spec: String,
    pub detail: String,
}

impl LineSpecError {
    fn new(spec: &str, detail: impl Into<String>) -> Self {
        Self {
            spec: spec.to_string(),
            detail: detail.into(),
        }
    }
}

/// Immutable set of positive line numbers. All operations return new sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LineSet {
    // Sorted ascending, no duplicates, no zeros.
    lines: Vec<u32>,
}

impl LineSet {
    /// Build from arbitrary line numbers; zeros are dropped, duplicates folded.
    pub fn new<I: IntoIterator<Item = u32>>(lines: I) -> Self {
        let mut v: Vec<u32> = lines.into_iter().filter(|&l| l > 0).collect();
        v.sort_unstable();
        v.dedup();
        Self { lines: v }
    }

    /// Dense closed range `[start, end]`. Empty when `start` is 0 or `start > end`.
    pub fn from_range(start: u32, end: u32) -> Self {
        if start == 0 || start > end {
            return Self::default();
        }
        Self {
            lines: (start..=end).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// The member lines, ascending.
    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter().copied()
    }

    pub fn min(&self) -> Option<u32> {
        self.lines.first().copied()
    }

    pub fn max(&self) -> Option<u32> {
        self.lines.last().copied()
    }

    pub fn contains(&self, line: u32) -> bool {
        self.lines.binary_search(&line).is_ok()
    }

    /// True when any member falls within the closed range `[start, end]`.
    /// Binary-searches for the first member >= `start`.
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        if start > end {
            return false;
        }
        let idx = self.lines.partition_point(|&l| l < start);
        self.lines.get(idx).is_some_and(|&l| l <= end)
    }

    /// Members common to both sets.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let (mut a, mut b) = (0usize, 0usize);
        while a < self.lines.len() && b < other.lines.len() {
            match self.lines[a].cmp(&other.lines[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    out.push(self.lines[a]);
                    a += 1;
                    b += 1;
                }
            }
        }
        Self { lines: out }
    }

    /// Members of `self` not present in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            lines: self
                .lines
                .iter()
                .copied()
                .filter(|&l| !other.contains(l))
                .collect(),
        }
    }

    /// Union of both sets.
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.iter().chain(other.iter()))
    }

    /// Canonical textual form, e.g. `"3,5-7,12"`. Empty set renders as `""`.
    pub fn to_spec(&self) -> String {
        self.to_string()
    }

    // Collapse the sorted members into (start, end) runs.
    fn runs(&self) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for &l in &self.lines {
            match runs.last_mut() {
                Some((_, end)) if *end + 1 == l => *end = l,
                _ => runs.push((l, l)),
            }
        }
        runs
    }
}

impl fmt::Display for LineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (start, end) in self.runs() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for LineSet {
    type Err = LineSpecError;

    /// Accepts `""`, a single integer, or a comma-separated list of `n` and
    /// `a-b` items with `a <= b`. Whitespace around separators is allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let mut lines = Vec::new();
        for item in trimmed.split(',') {
            let item = item.trim();
            if item.is_empty() {
                return Err(LineSpecError::new(s, "empty item"));
            }
            match item.split_once('-') {
                Some((a, b)) => {
                    let start = parse_line(s, a)?;
                    let end = parse_line(s, b)?;
                    if start > end {
                        return Err(LineSpecError::new(
                            s,
                            format!("descending range {start}-{end}"),
                        ));
                    }
                    lines.extend(start..=end);
                }
                None => lines.push(parse_line(s, item)?),
            }
        }
        Ok(Self::new(lines))
    }
}

fn parse_line(spec: &str, item: &str) -> Result<u32, LineSpecError> {
    let item = item.trim();
    let n: u32 = item
        .parse()
        .map_err(|_| LineSpecError::new(spec, format!("not a line number: `{item}`")))?;
    if n == 0 {
        return Err(LineSpecError::new(spec, "line numbers are 1-based"));
    }
    Ok(n)
}

impl Serialize for LineSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// Wire forms: the canonical spec string, or the legacy dense [start, end] pair.
#[derive(Deserialize)]
#[serde(untagged)]
enum LineSetRepr {
    Text(String),
    Legacy([u32; 2]),
}

impl<'de> Deserialize<'de> for LineSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match LineSetRepr::deserialize(deserializer)? {
            LineSetRepr::Text(s) => s.parse().map_err(de::Error::custom),
            LineSetRepr::Legacy([start, end]) => {
                if start == 0 || start > end {
                    return Err(de::Error::custom(format!(
                        "invalid legacy line range [{start}, {end}]"
                    )));
                }
                Ok(LineSet::from_range(start, end))
            }
        }
    }
}
