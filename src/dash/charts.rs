// Chart views: each one owns a dimension and a group of the shared index.

use crate::dash::config_reader::DemoChartSpec;
use crate::dash::questions::Question;
use crate::dash::*;
use survey_crossfilter::*;

/// Options of the question bar charts.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Width of one bar, in pixels. Only used when the width cannot be
    /// derived from the answer labels.
    pub bar_width: u32,
    pub height: u32,
    /// One or several `#rrggbb` colors.
    pub colors: Vec<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            bar_width: 80,
            height: 180,
            colors: vec!["#83b4db".to_string()],
        }
    }
}

impl ChartConfig {
    pub fn validate(self) -> DashResult<ChartConfig> {
        ensure!(
            self.bar_width > 0 && self.height > 0,
            InvalidChartConfigSnafu {
                message: format!(
                    "bar width and height must be positive, got {} and {}",
                    self.bar_width, self.height
                )
            }
        );
        ensure!(
            !self.colors.is_empty(),
            InvalidChartConfigSnafu {
                message: "at least one color is required"
            }
        );
        for c in self.colors.iter() {
            ensure!(
                is_hex_color(c),
                InvalidChartConfigSnafu {
                    message: format!("{:?} is not a #rrggbb color", c)
                }
            );
        }
        Ok(self)
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s.chars().skip(1).all(|c| c.is_ascii_hexdigit())
}

/// Options of the demographic row charts.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RowChartConfig {
    pub width: u32,
}

impl Default for RowChartConfig {
    fn default() -> Self {
        RowChartConfig { width: 200 }
    }
}

impl RowChartConfig {
    pub fn validate(self) -> DashResult<RowChartConfig> {
        ensure!(
            self.width > 0,
            InvalidChartConfigSnafu {
                message: "row chart width must be positive"
            }
        );
        Ok(self)
    }
}

/// The chart types found in the question metadata.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ChartKind {
    StackedBinary,
    StackedLikert5,
    StackedLikert7,
    Row3Cat,
    RowMultiCat,
    // Not decided yet in the metadata, drawn as a bar chart.
    Tbd,
}

impl ChartKind {
    pub fn parse(s: &str) -> Option<ChartKind> {
        match s {
            "stackedBinary" => Some(ChartKind::StackedBinary),
            "stackedLikert5" => Some(ChartKind::StackedLikert5),
            "stackedLikert7" => Some(ChartKind::StackedLikert7),
            "row3Cat" => Some(ChartKind::Row3Cat),
            "rowMultiCat" => Some(ChartKind::RowMultiCat),
            "TBD" => Some(ChartKind::Tbd),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChartKind::StackedBinary => "stackedBinary",
            ChartKind::StackedLikert5 => "stackedLikert5",
            ChartKind::StackedLikert7 => "stackedLikert7",
            ChartKind::Row3Cat => "row3Cat",
            ChartKind::RowMultiCat => "rowMultiCat",
            ChartKind::Tbd => "TBD",
        }
    }
}

/// The keys clicked on an ordinal chart, in click order.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Selection {
    keys: Vec<String>,
}

impl Selection {
    /// Adds the key, or removes it if it was already selected.
    pub fn toggle(&mut self, key: &str) {
        if let Some(pos) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(pos);
        } else {
            self.keys.push(key.to_string());
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn to_filter(&self) -> Option<Filter> {
        if self.keys.is_empty() {
            None
        } else {
            Some(Filter::one_of(self.keys.iter().cloned()))
        }
    }
}

/// Width of one bar, from the longest answer label.
pub fn bar_width_for_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Option<u32> {
    labels.map(|l| l.chars().count() as u64).max().map(|max_len| {
        let width = (max_len.saturating_mul(2) + 64).saturating_sub(8).max(1);
        u32::try_from(width).unwrap_or(u32::MAX)
    })
}

/// Width of a chart with one bar per category. Saturates instead of wrapping.
pub fn chart_width(bar_width: u32, categories: usize) -> u32 {
    let categories = u32::try_from(categories).unwrap_or(u32::MAX);
    bar_width.saturating_mul(categories)
}

/// A bar chart for one question: the share of each answer among the
/// filtered responses.
#[derive(Debug)]
pub struct BarChart {
    pub code: String,
    pub title: String,
    pub kind: ChartKind,
    pub dimension: DimensionId,
    pub group: PercentGroup,
    pub bar_width: u32,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<String>,
    selection: Selection,
}

impl BarChart {
    /// Registers the dimension and the groups of the chart.
    ///
    /// Returns `None` (and registers nothing) when the chart type is unknown.
    pub fn new(
        index: &mut CrossFilter,
        question: &Question,
        config: &ChartConfig,
    ) -> DashResult<Option<BarChart>> {
        let kind = match ChartKind::parse(&question.chart_type) {
            Some(k) => k,
            None => {
                warn!(
                    "Unknown chart type for {}: {}",
                    question.code, question.chart_type
                );
                return Ok(None);
            }
        };

        let dimension = index.add_dimension(pluck(&question.code));
        let raw = index.group_count(dimension).context(IndexSnafu {})?;
        let ordering: Vec<String> = question.values.iter().map(|v| v.label.clone()).collect();
        let group = PercentGroup::new(raw, &ordering);

        let keys = index.group_all(raw).context(IndexSnafu {})?;
        let bar_width =
            bar_width_for_labels(keys.iter().map(|kv| kv.key.as_str())).unwrap_or(config.bar_width);
        let width = chart_width(bar_width, keys.len());
        debug!(
            "BarChart::new: {} kind: {:?} categories: {} width: {}",
            question.code,
            kind,
            keys.len(),
            width
        );

        Ok(Some(BarChart {
            code: question.code.clone(),
            title: question.text.clone(),
            kind,
            dimension,
            group,
            bar_width,
            width,
            height: config.height,
            colors: config.colors.clone(),
            selection: Selection::default(),
        }))
    }

    /// Clicks on the bar of an answer.
    pub fn toggle(&mut self, index: &mut CrossFilter, label: &str) -> DashResult<()> {
        let mut selection = self.selection.clone();
        selection.toggle(label);
        index
            .filter(self.dimension, selection.to_filter())
            .context(IndexSnafu {})?;
        self.selection = selection;
        Ok(())
    }

    pub fn filter_all(&mut self, index: &mut CrossFilter) -> DashResult<()> {
        index.filter(self.dimension, None).context(IndexSnafu {})?;
        self.selection.clear();
        Ok(())
    }

    pub fn filters(&self) -> &[String] {
        self.selection.keys()
    }

    pub fn bars(&self, index: &CrossFilter) -> DashResult<Vec<PercentEntry>> {
        self.group.entries(index).context(IndexSnafu {})
    }

    /// Clears the filter of the chart and releases its dimension.
    pub fn dispose(mut self, index: &mut CrossFilter) -> DashResult<()> {
        self.filter_all(index)?;
        index
            .dispose_dimension(self.dimension)
            .context(IndexSnafu {})
    }
}

/// A demographic breakdown: response counts per answer.
#[derive(Debug)]
pub struct RowChart {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub dimension: DimensionId,
    pub group: GroupId,
    selection: Selection,
}

impl RowChart {
    pub fn new(
        index: &mut CrossFilter,
        spec: &DemoChartSpec,
        config: &RowChartConfig,
    ) -> DashResult<RowChart> {
        let dimension = index.add_dimension(pluck(&spec.id));
        let group = index.group_count(dimension).context(IndexSnafu {})?;
        Ok(RowChart {
            id: spec.id.clone(),
            name: spec.name.clone(),
            width: config.width,
            dimension,
            group,
            selection: Selection::default(),
        })
    }

    pub fn toggle(&mut self, index: &mut CrossFilter, key: &str) -> DashResult<()> {
        let mut selection = self.selection.clone();
        selection.toggle(key);
        index
            .filter(self.dimension, selection.to_filter())
            .context(IndexSnafu {})?;
        self.selection = selection;
        Ok(())
    }

    pub fn filter_all(&mut self, index: &mut CrossFilter) -> DashResult<()> {
        index.filter(self.dimension, None).context(IndexSnafu {})?;
        self.selection.clear();
        Ok(())
    }

    pub fn filters(&self) -> &[String] {
        self.selection.keys()
    }

    /// The counts per answer, without the missing answers.
    pub fn rows(&self, index: &CrossFilter) -> DashResult<Vec<KeyValue>> {
        let all = self.group.all(index).context(IndexSnafu {})?;
        Ok(all.into_iter().filter(|kv| !kv.key.is_empty()).collect())
    }
}

/// The response count of one state on the map.
#[derive(PartialEq, Debug, Clone)]
pub struct StateShare {
    pub state: String,
    pub count: u64,
    pub percentage: f64,
}

/// The choropleth map: responses per state, at most one state checked.
#[derive(Debug)]
pub struct StateMap {
    pub field: String,
    pub dimension: DimensionId,
    pub group: GroupId,
    checked: Option<String>,
}

/// Label of the map when no state is checked.
pub const NATIONWIDE: &str = "Nationwide";

impl StateMap {
    pub fn new(index: &mut CrossFilter, field: &str) -> DashResult<StateMap> {
        let dimension = index.add_dimension(pluck(field));
        let group = index.group_count(dimension).context(IndexSnafu {})?;
        Ok(StateMap {
            field: field.to_string(),
            dimension,
            group,
            checked: None,
        })
    }

    /// Checks a state, or goes back to the whole country with `None`.
    pub fn select(&mut self, index: &mut CrossFilter, state: Option<&str>) -> DashResult<()> {
        let checked = state.map(|s| s.to_string());
        index
            .filter(self.dimension, checked.clone().map(Filter::Exact))
            .context(IndexSnafu {})?;
        self.checked = checked;
        Ok(())
    }

    /// Clicking on the checked state unchecks it.
    pub fn toggle(&mut self, index: &mut CrossFilter, state: &str) -> DashResult<()> {
        if self.checked.as_deref() == Some(state) {
            self.select(index, None)
        } else {
            self.select(index, Some(state))
        }
    }

    pub fn checked(&self) -> Option<&str> {
        self.checked.as_deref()
    }

    pub fn label(&self) -> &str {
        self.checked.as_deref().unwrap_or(NATIONWIDE)
    }

    pub fn shares(&self, index: &CrossFilter) -> DashResult<Vec<StateShare>> {
        let counts: Vec<KeyValue> = self
            .group
            .all(index)
            .context(IndexSnafu {})?
            .into_iter()
            .filter(|kv| !kv.key.is_empty())
            .collect();
        let total: f64 = counts.iter().map(|kv| kv.value).sum();
        Ok(counts
            .into_iter()
            .map(|kv| StateShare {
                percentage: if total > 0.0 {
                    kv.value / total * 100.0
                } else {
                    0.0
                },
                count: kv.value as u64,
                state: kv.key,
            })
            .collect())
    }
}
