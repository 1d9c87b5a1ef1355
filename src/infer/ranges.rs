//! Column ranges and nominal label specs.
//!
//! Ranges are 1-based comma lists such as `1,3-5,last`. A label spec binds a
//! range (or a list of column names) to an explicit label order, written
//! `<range-or-names>:<label,label,...>`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use foldhash::{HashSet, HashSetExt};
use regex::Regex;
use tracing::warn;

use crate::error::ConvertError;

/// One element of a range list: `n`, `first`, `last` or a span of two of them.
static RANGE_PART_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(first|last|\d+)(?:\s*-\s*(first|last|\d+))?$")
        .expect("Invalid range pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    First,
    Last,
    /// 1-based position.
    Position(usize),
}

impl Bound {
    fn parse(s: &str) -> Result<Self, ConvertError> {
        if s.eq_ignore_ascii_case("first") {
            return Ok(Bound::First);
        }
        if s.eq_ignore_ascii_case("last") {
            return Ok(Bound::Last);
        }
        match s.parse::<usize>() {
            Ok(0) | Err(_) => Err(ConvertError::InvalidConfig(format!(
                "invalid column position '{s}', positions start at 1"
            ))),
            Ok(n) => Ok(Bound::Position(n)),
        }
    }

    /// Resolve to a 0-based index, `None` when past the last column.
    fn resolve(self, num_columns: usize) -> Option<usize> {
        match self {
            Bound::First if num_columns > 0 => Some(0),
            Bound::Last if num_columns > 0 => Some(num_columns - 1),
            Bound::Position(n) if n <= num_columns => Some(n - 1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangePart {
    Single(Bound),
    Span(Bound, Bound),
}

/// A set of columns given by 1-based positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnRange {
    spec: String,
    parts: Vec<RangePart>,
}

impl ColumnRange {
    /// A range selecting nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The textual form this range was parsed from.
    pub fn as_str(&self) -> &str {
        &self.spec
    }

    /// Sorted, de-duplicated 0-based indices this range selects among
    /// `num_columns` columns. Positions past the last column are skipped
    /// with a warning.
    pub fn resolve(&self, num_columns: usize) -> Vec<usize> {
        let mut selected = vec![false; num_columns];

        for part in &self.parts {
            match *part {
                RangePart::Single(bound) => match bound.resolve(num_columns) {
                    Some(idx) => selected[idx] = true,
                    None => warn!(
                        "range '{}' refers to a column past the last one ({} columns)",
                        self.spec, num_columns
                    ),
                },
                RangePart::Span(from, to) => {
                    let (Some(a), Some(b)) = (from.resolve(num_columns), to.resolve(num_columns))
                    else {
                        warn!(
                            "range '{}' refers to a column past the last one ({} columns)",
                            self.spec, num_columns
                        );
                        continue;
                    };
                    for flag in &mut selected[a.min(b)..=a.max(b)] {
                        *flag = true;
                    }
                }
            }
        }

        selected
            .iter()
            .enumerate()
            .filter_map(|(idx, &on)| on.then_some(idx))
            .collect()
    }
}

impl FromStr for ColumnRange {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Ok(Self::empty());
        }

        let mut parts = Vec::new();
        for token in spec.split(',').map(str::trim) {
            let caps = RANGE_PART_PATTERN.captures(token).ok_or_else(|| {
                ConvertError::InvalidConfig(format!("invalid range element '{token}' in '{spec}'"))
            })?;
            let from = Bound::parse(&caps[1])?;
            let part = match caps.get(2) {
                Some(to) => RangePart::Span(from, Bound::parse(to.as_str())?),
                None => RangePart::Single(from),
            };
            parts.push(part);
        }

        Ok(Self {
            spec: spec.to_string(),
            parts,
        })
    }
}

impl fmt::Display for ColumnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Which columns a label spec applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    Range(ColumnRange),
    Names(Vec<String>),
}

impl ColumnSelector {
    /// 0-based indices among the resolved column `names`.
    pub fn resolve(&self, names: &[String]) -> Vec<usize> {
        match self {
            ColumnSelector::Range(range) => range.resolve(names.len()),
            ColumnSelector::Names(wanted) => wanted
                .iter()
                .filter_map(|name| {
                    let idx = names.iter().position(|n| n == name);
                    if idx.is_none() {
                        warn!("label spec names unknown column '{}'", name);
                    }
                    idx
                })
                .collect(),
        }
    }
}

/// Forces columns to categorical with an explicit, ordered label list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    selector: ColumnSelector,
    labels: Vec<String>,
}

impl LabelSpec {
    /// Build a spec from parts. Duplicate labels keep their first position.
    pub fn new(selector: ColumnSelector, labels: Vec<String>) -> Result<Self, ConvertError> {
        let mut seen = HashSet::with_capacity(labels.len());
        let mut unique = Vec::with_capacity(labels.len());
        for label in labels {
            if seen.insert(label.clone()) {
                unique.push(label);
            } else {
                warn!("label spec repeats label '{}', keeping the first", label);
            }
        }
        if unique.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "label spec declares no labels".to_string(),
            ));
        }
        Ok(Self {
            selector,
            labels: unique,
        })
    }

    pub fn selector(&self) -> &ColumnSelector {
        &self.selector
    }

    /// Labels in declared order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl FromStr for LabelSpec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (selector, labels) = s.split_once(':').ok_or_else(|| {
            ConvertError::InvalidConfig(format!(
                "label spec '{s}' must look like <range-or-names>:<labels>"
            ))
        })?;

        let selector = match selector.parse::<ColumnRange>() {
            Ok(range) if !range.is_empty() => ColumnSelector::Range(range),
            Ok(_) => {
                return Err(ConvertError::InvalidConfig(format!(
                    "label spec '{s}' selects no columns"
                )));
            }
            Err(_) => ColumnSelector::Names(
                selector
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };

        let labels = labels
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        LabelSpec::new(selector, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        let range: ColumnRange = "1,3-4,last".parse().unwrap();
        assert_eq!(range.resolve(6), vec![0, 2, 3, 5]);
        assert_eq!(range.as_str(), "1,3-4,last");
    }

    #[test]
    fn test_first_last_span() {
        let range: ColumnRange = "first-last".parse().unwrap();
        assert_eq!(range.resolve(3), vec![0, 1, 2]);
        let reversed: ColumnRange = "3-1".parse().unwrap();
        assert_eq!(reversed.resolve(3), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_range() {
        let range: ColumnRange = "  ".parse().unwrap();
        assert!(range.is_empty());
        assert!(range.resolve(4).is_empty());
    }

    #[test]
    fn test_out_of_bounds_positions_are_skipped() {
        let range: ColumnRange = "2,7,5-9".parse().unwrap();
        assert_eq!(range.resolve(3), vec![1]);
        assert!(range.resolve(0).is_empty());
    }

    #[test]
    fn test_invalid_range() {
        assert!("0".parse::<ColumnRange>().is_err());
        assert!("1,x".parse::<ColumnRange>().is_err());
        assert!("1-".parse::<ColumnRange>().is_err());
    }

    #[test]
    fn test_label_spec_by_range() {
        let spec: LabelSpec = "1:x,y,z".parse().unwrap();
        assert_eq!(spec.labels(), ["x", "y", "z"]);
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(spec.selector().resolve(&names), vec![0]);
    }

    #[test]
    fn test_label_spec_by_names() {
        let spec: LabelSpec = "colour,size:small, large".parse().unwrap();
        assert_eq!(spec.labels(), ["small", "large"]);
        let names = vec!["size".to_string(), "x".to_string(), "colour".to_string()];
        assert_eq!(spec.selector().resolve(&names), vec![2, 0]);
    }

    #[test]
    fn test_label_spec_dedupes_labels() {
        let spec: LabelSpec = "2:b,a,b".parse().unwrap();
        assert_eq!(spec.labels(), ["b", "a"]);
    }

    #[test]
    fn test_invalid_label_spec() {
        assert!("1".parse::<LabelSpec>().is_err());
        assert!("1:".parse::<LabelSpec>().is_err());
        assert!(":a,b".parse::<LabelSpec>().is_err());
    }
}
