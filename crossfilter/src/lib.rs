mod config;
mod percent;
mod reduce;
use log::{debug, info};

use std::collections::{BTreeMap, VecDeque};

pub use crate::config::*;
pub use crate::percent::*;
pub use crate::reduce::*;

/// Maximum number of filter changes applied in response to a single call,
/// including the ones requested by listeners.
pub const MAX_FILTER_CASCADE: usize = 1024;

pub type KeyFn = Box<dyn Fn(&str) -> String>;
type Listener = Box<dyn FnMut(&FilterChange, &mut FilterQueue)>;

/// Projection reading one field of the records.
pub fn pluck(field: &str) -> impl Fn(&Record) -> String + 'static {
    let field = field.to_string();
    move |r: &Record| r.get(&field).to_string()
}

// **** Private structures ****

struct DimensionSlot {
    // The projected key of every record, in record order.
    keys: Vec<String>,
    filter: Option<Filter>,
    // Whether each record passes the filter of this dimension.
    passes: Vec<bool>,
    groups: Vec<GroupId>,
}

struct GroupSlot {
    dimension: DimensionId,
    reducer: Reducer,
    // The bucket of every record, in record order.
    record_keys: Vec<String>,
    values: BTreeMap<String, f64>,
}

/// Filter changes waiting to be applied.
///
/// Listeners receive the queue instead of the index: a change requested while
/// another one is being notified is applied once the current notification
/// round is over, in the order it was requested.
#[derive(Debug, Default)]
pub struct FilterQueue {
    pending: VecDeque<(DimensionId, Option<Filter>)>,
}

impl FilterQueue {
    pub fn push(&mut self, dimension: DimensionId, filter: Option<Filter>) {
        self.pending.push_back((dimension, filter));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn pop(&mut self) -> Option<(DimensionId, Option<Filter>)> {
        self.pending.pop_front()
    }
}

/// Something that produces the current key/value pairs of an aggregation.
pub trait AggregateSource {
    fn all(&self, index: &CrossFilter) -> Result<Vec<KeyValue>, CrossFilterError>;
}

impl AggregateSource for GroupId {
    fn all(&self, index: &CrossFilter) -> Result<Vec<KeyValue>, CrossFilterError> {
        index.group_all(*self)
    }
}

/// A multi-dimensional index over a fixed set of records.
///
/// Every dimension may carry one filter. A record is visible when it passes
/// the filters of all the dimensions. The groups of a dimension aggregate the
/// records passing the filters of all the *other* dimensions, so that a chart
/// keeps showing the alternatives to its own selection.
///
/// ```
/// use survey_crossfilter::*;
///
/// let records: Vec<Record> = ["Yes", "No", "Yes"]
///     .iter()
///     .map(|v| Record::new([("vote", *v)]))
///     .collect();
/// let mut index = CrossFilter::new(records);
/// let vote = index.add_dimension(pluck("vote"));
/// let counts = index.group_count(vote)?;
/// index.filter(vote, Some(Filter::exact("No")))?;
///
/// assert_eq!(index.filtered_count(), 1);
/// // The dimension's own filter does not apply to its groups.
/// assert_eq!(index.group_value(counts, "Yes")?, Some(2.0));
/// # Ok::<(), CrossFilterError>(())
/// ```
pub struct CrossFilter {
    records: Vec<Record>,
    dimensions: Vec<Option<DimensionSlot>>,
    groups: Vec<Option<GroupSlot>>,
    // For each record, the number of dimensions whose filter rejects it.
    fail_counts: Vec<u32>,
    listeners: Vec<Listener>,
}

impl CrossFilter {
    pub fn new(records: Vec<Record>) -> CrossFilter {
        info!("CrossFilter: indexing {} records", records.len());
        let n = records.len();
        CrossFilter {
            records,
            dimensions: Vec::new(),
            groups: Vec::new(),
            fail_counts: vec![0; n],
            listeners: Vec::new(),
        }
    }

    /// Total number of records, regardless of the filters.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Registers a new dimension keyed by the given projection.
    pub fn add_dimension<P>(&mut self, projection: P) -> DimensionId
    where
        P: Fn(&Record) -> String,
    {
        let keys: Vec<String> = self.records.iter().map(projection).collect();
        let passes = vec![true; keys.len()];
        let id = DimensionId(self.dimensions.len() as u32);
        debug!("add_dimension: {:?}", id);
        self.dimensions.push(Some(DimensionSlot {
            keys,
            filter: None,
            passes,
            groups: Vec::new(),
        }));
        id
    }

    /// Declares an aggregation over a dimension.
    ///
    /// Arguments:
    /// * `dimension` the dimension providing the keys
    /// * `key_fn` an optional function mapping the dimension key to the
    ///   bucket key. By default the dimension key is the bucket key.
    /// * `reducer` the aggregation applied to each bucket
    pub fn group(
        &mut self,
        dimension: DimensionId,
        key_fn: Option<KeyFn>,
        reducer: Reducer,
    ) -> Result<GroupId, CrossFilterError> {
        let id = GroupId(self.groups.len() as u32);
        let CrossFilter {
            records,
            dimensions,
            fail_counts,
            groups,
            ..
        } = self;
        let dim = dimension_mut(dimensions, dimension)?;
        let record_keys: Vec<String> = match &key_fn {
            Some(f) => dim.keys.iter().map(|k| f(k.as_str())).collect(),
            None => dim.keys.clone(),
        };
        let mut values: BTreeMap<String, f64> = BTreeMap::new();
        for k in record_keys.iter() {
            values.entry(k.clone()).or_insert_with(|| reducer.init());
        }
        for (idx, record) in records.iter().enumerate() {
            let own_fail = !dim.passes[idx] as u32;
            if fail_counts[idx] - own_fail == 0 {
                if let Some(v) = values.get_mut(&record_keys[idx]) {
                    *v = reducer.add(*v, record);
                }
            }
        }
        debug!(
            "group: {:?} on {:?} with {:?}: {} buckets",
            id,
            dimension,
            reducer,
            values.len()
        );
        dim.groups.push(id);
        groups.push(Some(GroupSlot {
            dimension,
            reducer,
            record_keys,
            values,
        }));
        Ok(id)
    }

    /// Shorthand for a count group keyed by the dimension keys.
    pub fn group_count(&mut self, dimension: DimensionId) -> Result<GroupId, CrossFilterError> {
        self.group(dimension, None, Reducer::count())
    }

    /// Shorthand for a sum group keyed by the dimension keys.
    pub fn group_sum(
        &mut self,
        dimension: DimensionId,
        field: &str,
    ) -> Result<GroupId, CrossFilterError> {
        self.group(dimension, None, Reducer::sum(field))
    }

    /// The current buckets of a group, ordered by key. Empty buckets are kept.
    pub fn group_all(&self, group: GroupId) -> Result<Vec<KeyValue>, CrossFilterError> {
        let g = self.group_slot(group)?;
        Ok(g.values
            .iter()
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: *v,
            })
            .collect())
    }

    pub fn group_value(&self, group: GroupId, key: &str) -> Result<Option<f64>, CrossFilterError> {
        Ok(self.group_slot(group)?.values.get(key).cloned())
    }

    /// Sets (or clears with `None`) the filter of a dimension, then notifies
    /// the listeners and applies the changes they requested.
    pub fn filter(
        &mut self,
        dimension: DimensionId,
        filter: Option<Filter>,
    ) -> Result<(), CrossFilterError> {
        let mut queue = FilterQueue::default();
        queue.push(dimension, filter);
        self.drain(queue)
    }

    /// Clears the filters of all the dimensions.
    pub fn filter_all(&mut self) -> Result<(), CrossFilterError> {
        let mut queue = FilterQueue::default();
        for (idx, slot) in self.dimensions.iter().enumerate() {
            if matches!(slot, Some(d) if d.filter.is_some()) {
                queue.push(DimensionId(idx as u32), None);
            }
        }
        self.drain(queue)
    }

    pub fn current_filter(&self, dimension: DimensionId) -> Result<Option<&Filter>, CrossFilterError> {
        Ok(self.dimension_slot(dimension)?.filter.as_ref())
    }

    /// All the active filters, in dimension creation order.
    pub fn filters(&self) -> Vec<(DimensionId, &Filter)> {
        self.dimensions
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.as_ref()
                    .and_then(|d| d.filter.as_ref())
                    .map(|f| (DimensionId(idx as u32), f))
            })
            .collect()
    }

    pub fn has_filters(&self) -> bool {
        !self.filters().is_empty()
    }

    /// The records passing every filter.
    pub fn all_filtered(&self) -> Vec<&Record> {
        self.records
            .iter()
            .zip(self.fail_counts.iter())
            .filter_map(|(r, c)| if *c == 0 { Some(r) } else { None })
            .collect()
    }

    pub fn filtered_count(&self) -> usize {
        self.fail_counts.iter().filter(|c| **c == 0).count()
    }

    /// The records passing the filter of one dimension, ignoring the others.
    pub fn dimension_matches(&self, dimension: DimensionId) -> Result<Vec<&Record>, CrossFilterError> {
        let d = self.dimension_slot(dimension)?;
        Ok(self
            .records
            .iter()
            .zip(d.passes.iter())
            .filter_map(|(r, p)| if *p { Some(r) } else { None })
            .collect())
    }

    /// Removes a dimension and its groups. Its filter is cleared first so that
    /// the other groups get back the records it was hiding.
    pub fn dispose_dimension(&mut self, dimension: DimensionId) -> Result<(), CrossFilterError> {
        if self.dimension_slot(dimension)?.filter.is_some() {
            self.filter(dimension, None)?;
        }
        let slot = self.dimensions[dimension.0 as usize]
            .take()
            .ok_or(CrossFilterError::UnknownDimension(dimension))?;
        for g in slot.groups {
            self.groups[g.0 as usize] = None;
        }
        debug!("dispose_dimension: {:?}", dimension);
        Ok(())
    }

    /// Number of live dimensions.
    pub fn dimension_count(&self) -> usize {
        self.dimensions.iter().filter(|d| d.is_some()).count()
    }

    /// Registers a listener called after every applied filter change.
    ///
    /// Listeners request further changes through the queue they are given.
    pub fn on_filtered<L>(&mut self, listener: L)
    where
        L: FnMut(&FilterChange, &mut FilterQueue) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn drain(&mut self, mut queue: FilterQueue) -> Result<(), CrossFilterError> {
        let mut num_applied: usize = 0;
        while let Some((dimension, filter)) = queue.pop() {
            if num_applied >= MAX_FILTER_CASCADE {
                return Err(CrossFilterError::FilterCascade {
                    limit: MAX_FILTER_CASCADE,
                });
            }
            num_applied += 1;
            if !self.apply_filter(dimension, filter.clone())? {
                continue;
            }
            let change = FilterChange {
                dimension,
                filter,
                filtered_count: self.filtered_count(),
            };
            debug!("drain: applied {:?}", change);
            for listener in self.listeners.iter_mut() {
                listener(&change, &mut queue);
            }
        }
        Ok(())
    }

    // Returns false if the filter did not change.
    fn apply_filter(
        &mut self,
        dimension: DimensionId,
        filter: Option<Filter>,
    ) -> Result<bool, CrossFilterError> {
        let CrossFilter {
            records,
            dimensions,
            groups,
            fail_counts,
            ..
        } = self;

        let flipped: Vec<(usize, bool)> = {
            let dim = dimension_mut(dimensions, dimension)?;
            if dim.filter == filter {
                return Ok(false);
            }
            let mut flipped = Vec::new();
            for (idx, key) in dim.keys.iter().enumerate() {
                let now_passes = filter.as_ref().map_or(true, |f| f.matches(key));
                if now_passes != dim.passes[idx] {
                    dim.passes[idx] = now_passes;
                    flipped.push((idx, now_passes));
                }
            }
            dim.filter = filter;
            flipped
        };
        debug!(
            "apply_filter: {:?}: {} records changed state",
            dimension,
            flipped.len()
        );

        for (idx, now_passes) in flipped {
            let fail_before = fail_counts[idx];
            let fail_after = if now_passes {
                fail_before - 1
            } else {
                fail_before + 1
            };
            fail_counts[idx] = fail_after;
            for g in groups.iter_mut().flatten() {
                if g.dimension == dimension {
                    continue;
                }
                let other = match dimensions[g.dimension.0 as usize].as_ref() {
                    Some(d) => d,
                    None => continue,
                };
                let own_fail = !other.passes[idx] as u32;
                let visible_before = fail_before - own_fail == 0;
                let visible_after = fail_after - own_fail == 0;
                if visible_before == visible_after {
                    continue;
                }
                if let Some(v) = g.values.get_mut(&g.record_keys[idx]) {
                    *v = if visible_after {
                        g.reducer.add(*v, &records[idx])
                    } else {
                        g.reducer.remove(*v, &records[idx])
                    };
                }
            }
        }
        Ok(true)
    }

    fn dimension_slot(&self, dimension: DimensionId) -> Result<&DimensionSlot, CrossFilterError> {
        self.dimensions
            .get(dimension.0 as usize)
            .and_then(|d| d.as_ref())
            .ok_or(CrossFilterError::UnknownDimension(dimension))
    }

    fn group_slot(&self, group: GroupId) -> Result<&GroupSlot, CrossFilterError> {
        self.groups
            .get(group.0 as usize)
            .and_then(|g| g.as_ref())
            .ok_or(CrossFilterError::UnknownGroup(group))
    }
}

fn dimension_mut(
    dimensions: &mut [Option<DimensionSlot>],
    dimension: DimensionId,
) -> Result<&mut DimensionSlot, CrossFilterError> {
    dimensions
        .get_mut(dimension.0 as usize)
        .and_then(|d| d.as_mut())
        .ok_or(CrossFilterError::UnknownDimension(dimension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn votes() -> Vec<Record> {
        vec![
            Record::new([("vote", "Yes"), ("state", "Ohio"), ("age", "30")]),
            Record::new([("vote", "No"), ("state", "Utah"), ("age", "45")]),
            Record::new([("vote", "Yes"), ("state", "Utah"), ("age", "51")]),
            Record::new([("vote", "Yes"), ("state", "Utah"), ("age", "62")]),
        ]
    }

    fn values(index: &CrossFilter, g: GroupId) -> Vec<(String, f64)> {
        index
            .group_all(g)
            .unwrap()
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .collect()
    }

    #[test]
    fn no_filter_reflects_everything() {
        init();
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let g = index.group_count(vote).unwrap();
        assert_eq!(
            values(&index, g),
            vec![("No".to_string(), 1.0), ("Yes".to_string(), 3.0)]
        );
        assert_eq!(index.filtered_count(), 4);
        assert!(!index.has_filters());
    }

    #[test]
    fn other_dimension_filter_applies_to_group() {
        init();
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        let g = index.group_count(vote).unwrap();

        index.filter(state, Some(Filter::exact("Utah"))).unwrap();
        assert_eq!(
            values(&index, g),
            vec![("No".to_string(), 1.0), ("Yes".to_string(), 2.0)]
        );
        assert_eq!(index.filtered_count(), 3);

        index.filter(state, None).unwrap();
        assert_eq!(
            values(&index, g),
            vec![("No".to_string(), 1.0), ("Yes".to_string(), 3.0)]
        );
    }

    #[test]
    fn own_filter_is_ignored_by_own_group() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        let by_vote = index.group_count(vote).unwrap();
        let by_state = index.group_count(state).unwrap();

        index.filter(vote, Some(Filter::exact("Yes"))).unwrap();
        assert_eq!(index.group_value(by_vote, "No").unwrap(), Some(1.0));
        assert_eq!(index.group_value(by_state, "Utah").unwrap(), Some(2.0));
        assert_eq!(index.group_value(by_state, "Ohio").unwrap(), Some(1.0));
    }

    #[test]
    fn intersection_of_filters() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        let age = index.add_dimension(pluck("age"));
        let by_state = index.group_count(state).unwrap();

        index.filter(vote, Some(Filter::exact("Yes"))).unwrap();
        index.filter(age, Some(Filter::range("40", "60"))).unwrap();
        assert_eq!(index.filtered_count(), 1);
        assert_eq!(index.group_value(by_state, "Utah").unwrap(), Some(1.0));
        assert_eq!(index.group_value(by_state, "Ohio").unwrap(), Some(0.0));

        index.filter(vote, None).unwrap();
        assert_eq!(index.group_value(by_state, "Utah").unwrap(), Some(2.0));
        index.filter_all().unwrap();
        assert_eq!(
            values(&index, by_state),
            vec![("Ohio".to_string(), 1.0), ("Utah".to_string(), 3.0)]
        );
        assert_eq!(index.filtered_count(), 4);
    }

    #[test]
    fn unmatched_filter_gives_empty_buckets() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        let g = index.group_count(vote).unwrap();
        index.filter(state, Some(Filter::exact("Texas"))).unwrap();
        assert_eq!(
            values(&index, g),
            vec![("No".to_string(), 0.0), ("Yes".to_string(), 0.0)]
        );
        assert!(index.all_filtered().is_empty());
    }

    #[test]
    fn group_created_after_filter_sees_filter() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        index.filter(state, Some(Filter::exact("Ohio"))).unwrap();
        let g = index.group_count(vote).unwrap();
        assert_eq!(
            values(&index, g),
            vec![("No".to_string(), 0.0), ("Yes".to_string(), 1.0)]
        );
    }

    #[test]
    fn sum_group_and_key_function() {
        let mut index = CrossFilter::new(votes());
        let age = index.add_dimension(pluck("age"));
        let vote = index.add_dimension(pluck("vote"));
        let decades = index
            .group(
                age,
                Some(Box::new(|k: &str| format!("{}0s", &k[..1]))),
                Reducer::sum("age"),
            )
            .unwrap();
        assert_eq!(index.group_value(decades, "30s").unwrap(), Some(30.0));
        index.filter(vote, Some(Filter::exact("Yes"))).unwrap();
        assert_eq!(index.group_value(decades, "40s").unwrap(), Some(0.0));
        assert_eq!(index.group_value(decades, "50s").unwrap(), Some(51.0));
    }

    #[test]
    fn unit_field_replaces_source_count_column() {
        let records = vec![
            Record::new([("vote", "Yes"), ("count", "7")]),
            Record::new([("vote", "No"), ("count", "")]),
            Record::new([("vote", "No"), ("count", "many")]),
        ];
        let mut index = CrossFilter::new(records);
        let vote = index.add_dimension(pluck("vote"));
        let units = index.add_dimension(pluck(COUNT_FIELD));
        let totals = index.group_sum(vote, COUNT_FIELD).unwrap();
        assert_eq!(index.group_value(totals, "Yes").unwrap(), Some(1.0));
        assert_eq!(index.group_value(totals, "No").unwrap(), Some(2.0));
        assert!(index.records().iter().all(|r| r.get("count") == "1"));
        index.filter(units, Some(Filter::exact("1"))).unwrap();
        assert_eq!(index.filtered_count(), 3);
    }

    #[test]
    fn set_membership_filter() {
        let mut index = CrossFilter::new(votes());
        let age = index.add_dimension(pluck("age"));
        index
            .filter(age, Some(Filter::one_of(["30", "62"])))
            .unwrap();
        let states: Vec<&str> = index.all_filtered().iter().map(|r| r.get("state")).collect();
        assert_eq!(states, vec!["Ohio", "Utah"]);
        assert_eq!(index.dimension_matches(age).unwrap().len(), 2);
    }

    #[test]
    fn dispose_releases_filter_and_groups() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        let by_vote = index.group_count(vote).unwrap();
        let by_state = index.group_count(state).unwrap();
        index.filter(vote, Some(Filter::exact("No"))).unwrap();
        assert_eq!(index.group_value(by_state, "Ohio").unwrap(), Some(0.0));

        index.dispose_dimension(vote).unwrap();
        assert_eq!(index.filtered_count(), 4);
        assert_eq!(index.group_value(by_state, "Ohio").unwrap(), Some(1.0));
        assert_eq!(
            index.group_all(by_vote),
            Err(CrossFilterError::UnknownGroup(by_vote))
        );
        assert_eq!(
            index.filter(vote, None),
            Err(CrossFilterError::UnknownDimension(vote))
        );
        assert_eq!(index.dimension_count(), 1);
    }

    #[test]
    fn listener_requests_are_queued() {
        init();
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let state = index.add_dimension(pluck("state"));
        let seen: Rc<RefCell<Vec<(DimensionId, usize)>>> = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        index.on_filtered(move |change, queue| {
            seen2
                .borrow_mut()
                .push((change.dimension, change.filtered_count));
            // Selecting a vote also narrows down the state.
            if change.dimension == vote && change.filter.is_some() {
                queue.push(state, Some(Filter::exact("Utah")));
            }
        });
        index.filter(vote, Some(Filter::exact("Yes"))).unwrap();
        assert_eq!(*seen.borrow(), vec![(vote, 3), (state, 2)]);
        assert_eq!(index.filtered_count(), 2);
    }

    #[test]
    fn runaway_listener_is_stopped() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let mut flip = false;
        index.on_filtered(move |_, queue| {
            flip = !flip;
            let key = if flip { "No" } else { "Yes" };
            queue.push(vote, Some(Filter::exact(key)));
        });
        assert_eq!(
            index.filter(vote, Some(Filter::exact("Yes"))),
            Err(CrossFilterError::FilterCascade {
                limit: MAX_FILTER_CASCADE
            })
        );
    }

    #[test]
    fn unchanged_filter_does_not_notify() {
        let mut index = CrossFilter::new(votes());
        let vote = index.add_dimension(pluck("vote"));
        let calls = Rc::new(RefCell::new(0));
        let calls2 = calls.clone();
        index.on_filtered(move |_, _| *calls2.borrow_mut() += 1);
        index.filter(vote, None).unwrap();
        index.filter(vote, Some(Filter::exact("No"))).unwrap();
        index.filter(vote, Some(Filter::exact("No"))).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }
}
