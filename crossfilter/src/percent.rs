use std::collections::HashMap;

use crate::{AggregateSource, CrossFilter, CrossFilterError, GroupId, KeyValue};

/// Prefix given to the labels that are not part of the configured ordering.
pub const UNORDERED_PREFIX: &str = " ";

/// One bar of a percentage chart.
#[derive(PartialEq, Debug, Clone)]
pub struct PercentEntry {
    /// Display order prefix, `_`, then the label. Sorting on this key gives
    /// the order of the answers in the survey.
    pub sort_key: String,
    /// The raw answer, as found in the data.
    pub label: String,
    /// Share of the currently filtered answers, between 0 and 100.
    pub value: f64,
}

/// The answers of a count group as percentages of the filtered total.
///
/// The empty answer is not an answer: it is dropped before the total is
/// computed. When nothing is left every value is 0.
#[derive(Debug, Clone)]
pub struct PercentGroup {
    raw: GroupId,
    sort_orders: HashMap<String, String>,
}

impl PercentGroup {
    /// Arguments:
    /// * `raw` a count group keyed by the answer labels
    /// * `ordering` the labels in survey order
    pub fn new(raw: GroupId, ordering: &[String]) -> PercentGroup {
        let mut sort_orders: HashMap<String, String> = HashMap::new();
        for (idx, label) in ordering.iter().enumerate() {
            // The last position wins for duplicated labels.
            sort_orders.insert(label.clone(), format!("{:02}", idx));
        }
        PercentGroup { raw, sort_orders }
    }

    pub fn sort_key(&self, label: &str) -> String {
        let prefix = self
            .sort_orders
            .get(label)
            .map(|s| s.as_str())
            .unwrap_or(UNORDERED_PREFIX);
        format!("{}_{}", prefix, label)
    }

    pub fn entries(&self, index: &CrossFilter) -> Result<Vec<PercentEntry>, CrossFilterError> {
        let data: Vec<KeyValue> = index
            .group_all(self.raw)?
            .into_iter()
            .filter(|kv| !kv.key.is_empty())
            .collect();
        let total: f64 = data.iter().map(|kv| kv.value).sum();
        let mut res: Vec<PercentEntry> = data
            .into_iter()
            .map(|kv| PercentEntry {
                sort_key: self.sort_key(&kv.key),
                value: if total > 0.0 {
                    kv.value / total * 100.0
                } else {
                    0.0
                },
                label: kv.key,
            })
            .collect();
        res.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
        Ok(res)
    }
}

impl AggregateSource for PercentGroup {
    fn all(&self, index: &CrossFilter) -> Result<Vec<KeyValue>, CrossFilterError> {
        Ok(self
            .entries(index)?
            .into_iter()
            .map(|e| KeyValue {
                key: e.sort_key,
                value: e.value,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pluck, Filter, Record};

    fn index() -> (CrossFilter, PercentGroup, crate::DimensionId) {
        let records = vec![
            Record::new([("vote", "Yes"), ("id", "1")]),
            Record::new([("vote", "No"), ("id", "2")]),
            Record::new([("vote", "Yes"), ("id", "3")]),
            Record::new([("vote", "Yes"), ("id", "4")]),
            Record::new([("vote", ""), ("id", "5")]),
        ];
        let mut index = CrossFilter::new(records);
        let vote = index.add_dimension(pluck("vote"));
        let id = index.add_dimension(pluck("id"));
        let raw = index.group_count(vote).unwrap();
        let pg = PercentGroup::new(raw, &["Yes".to_string(), "No".to_string()]);
        (index, pg, id)
    }

    fn rounded(index: &CrossFilter, pg: &PercentGroup) -> Vec<(String, f64)> {
        pg.all(index)
            .unwrap()
            .into_iter()
            .map(|kv| (kv.key, (kv.value * 10.0).round() / 10.0))
            .collect()
    }

    #[test]
    fn percentages_of_filtered_total() {
        let (mut index, pg, id) = index();
        assert_eq!(
            rounded(&index, &pg),
            vec![("00_Yes".to_string(), 75.0), ("01_No".to_string(), 25.0)]
        );
        index
            .filter(id, Some(Filter::one_of(["2", "3", "4"])))
            .unwrap();
        assert_eq!(
            rounded(&index, &pg),
            vec![("00_Yes".to_string(), 66.7), ("01_No".to_string(), 33.3)]
        );
    }

    #[test]
    fn empty_subset_gives_zero() {
        let (mut index, pg, id) = index();
        index.filter(id, Some(Filter::exact("5"))).unwrap();
        let entries = pg.entries(&index).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.value == 0.0));
    }

    #[test]
    fn unknown_labels_sort_first() {
        let pg = PercentGroup::new(GroupId(0), &["A".to_string(), "B".to_string()]);
        assert_eq!(pg.sort_key("B"), "01_B");
        assert_eq!(pg.sort_key("Z"), " _Z");
        assert!(pg.sort_key("Z") < pg.sort_key("A"));
    }
}
