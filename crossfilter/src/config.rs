// ********* Input data structures ***********

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;

/// The name of the unit field attached to every record.
pub const COUNT_FIELD: &str = "count";

/// One survey response.
///
/// Answers are stored as strings, keyed by question code. A field that was
/// not present in the source reads as the empty string, so projections never
/// have to deal with missing values. Every record also carries the unit field
/// [COUNT_FIELD], set to "1" whatever the source contained under that name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new<K, V, I>(fields: I) -> Record
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut fields: BTreeMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        fields.insert(COUNT_FIELD.to_string(), "1".to_string());
        Record { fields }
    }

    /// The answer for the given field, or "" if the record has none.
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(|s| s.as_str()).unwrap_or("")
    }

    /// Numeric reading of a field, used by the sum reducers. Missing and
    /// non-numeric content counts as 0.
    pub fn numeric(&self, field: &str) -> f64 {
        self.get(field).trim().parse::<f64>().unwrap_or(0.0)
    }

    /// All the fields, the unit field included.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }
}

/// A handle on a dimension registered in a [crate::CrossFilter].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct DimensionId(pub(crate) u32);

/// A handle on a group registered in a [crate::CrossFilter].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct GroupId(pub(crate) u32);

/// A predicate on the key of a dimension.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Filter {
    /// Only the given key.
    Exact(String),
    /// Keys in the half-open range `[low, high)`.
    ///
    /// Keys are compared as numbers when both sides parse as numbers, and as
    /// strings otherwise.
    Range { low: String, high: String },
    /// Any of the given keys. This is how ordinal charts accumulate clicks.
    OneOf(BTreeSet<String>),
}

impl Filter {
    pub fn exact(key: impl Into<String>) -> Filter {
        Filter::Exact(key.into())
    }

    pub fn range(low: impl Into<String>, high: impl Into<String>) -> Filter {
        Filter::Range {
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn one_of<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Filter {
        Filter::OneOf(keys.into_iter().map(|s| s.into()).collect())
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Filter::Exact(k) => k == key,
            Filter::Range { low, high } => {
                compare_keys(key, low) != Ordering::Less
                    && compare_keys(key, high) == Ordering::Less
            }
            Filter::OneOf(keys) => keys.contains(key),
        }
    }
}

/// Natural ordering of dimension keys: numeric when both keys are numbers.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

// ******** Output data structures *********

/// One bucket of an aggregation.
#[derive(PartialEq, Debug, Clone)]
pub struct KeyValue {
    pub key: String,
    pub value: f64,
}

/// Passed to the filter listeners after a filter has been applied.
#[derive(PartialEq, Debug, Clone)]
pub struct FilterChange {
    pub dimension: DimensionId,
    /// The new filter, `None` if it was cleared.
    pub filter: Option<Filter>,
    /// Number of records passing all the filters after the change.
    pub filtered_count: usize,
}

/// Errors from the index. Filtering data never fails: only stale handles and
/// runaway filter cascades do.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CrossFilterError {
    UnknownDimension(DimensionId),
    UnknownGroup(GroupId),
    FilterCascade { limit: usize },
}

impl Error for CrossFilterError {}

impl Display for CrossFilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrossFilterError::UnknownDimension(d) => {
                write!(f, "unknown or disposed dimension {}", d.0)
            }
            CrossFilterError::UnknownGroup(g) => write!(f, "unknown or disposed group {}", g.0),
            CrossFilterError::FilterCascade { limit } => write!(
                f,
                "filter listeners requested more than {} consecutive filter changes",
                limit
            ),
        }
    }
}
