use std::cell::Cell;
use std::rc::Rc;

use crate::dash::charts::*;
use crate::dash::config_reader::DemoChartSpec;
use crate::dash::questions::*;
use crate::dash::*;
use survey_crossfilter::*;

/// Everything needed to build a dashboard, validated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DashSettings {
    pub chart: ChartConfig,
    pub row_chart: RowChartConfig,
    pub demo_charts: Vec<DemoChartSpec>,
    pub state_field: String,
    pub strict_metadata: bool,
}

impl Default for DashSettings {
    fn default() -> Self {
        DashSettings {
            chart: ChartConfig::default(),
            row_chart: RowChartConfig::default(),
            demo_charts: config_reader::default_demo_charts(),
            state_field: config_reader::DEFAULT_STATE_FIELD.to_string(),
            strict_metadata: false,
        }
    }
}

#[derive(Debug)]
enum PanelState {
    Idle,
    GroupSelected { group: usize, charts: Vec<BarChart> },
}

/// The dashboard session. It owns the index and every chart bound to it.
///
/// The demographic charts and the map live for the whole session. The bar
/// charts belong to the selected question group and are replaced when
/// another group is selected.
pub struct Dashboard {
    index: CrossFilter,
    demo_charts: Vec<RowChart>,
    map: StateMap,
    groups: Vec<QuestionGroup>,
    state: PanelState,
    chart_config: ChartConfig,
    redraws: Rc<Cell<u64>>,
}

impl Dashboard {
    pub fn new(
        records: Vec<Record>,
        mut questions: Vec<Question>,
        settings: &DashSettings,
    ) -> DashResult<Dashboard> {
        let mut index = CrossFilter::new(records);

        // Called after every filter change, like the redraw of all the charts.
        let redraws = Rc::new(Cell::new(0u64));
        let redraws2 = redraws.clone();
        index.on_filtered(move |change, _| {
            redraws2.set(redraws2.get() + 1);
            debug!(
                "filtered: {:?} -> {:?}, responses: {}",
                change.dimension, change.filter, change.filtered_count
            );
        });

        let mut demo_charts: Vec<RowChart> = Vec::new();
        for spec in settings.demo_charts.iter() {
            demo_charts.push(RowChart::new(&mut index, spec, &settings.row_chart)?);
        }
        let map = StateMap::new(&mut index, &settings.state_field)?;

        add_question_percentages(&mut questions, index.records());
        let groups = create_question_groups(&questions);
        info!(
            "Dashboard: {} responses, {} question groups",
            index.size(),
            groups.len()
        );

        Ok(Dashboard {
            index,
            demo_charts,
            map,
            groups,
            state: PanelState::Idle,
            chart_config: settings.chart.clone(),
            redraws,
        })
    }

    pub fn index(&self) -> &CrossFilter {
        &self.index
    }

    pub fn groups(&self) -> &[QuestionGroup] {
        &self.groups
    }

    pub fn find_group(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    pub fn active_group(&self) -> Option<&QuestionGroup> {
        match &self.state {
            PanelState::Idle => None,
            PanelState::GroupSelected { group, .. } => self.groups.get(*group),
        }
    }

    pub fn bar_charts(&self) -> &[BarChart] {
        match &self.state {
            PanelState::Idle => &[],
            PanelState::GroupSelected { charts, .. } => charts.as_slice(),
        }
    }

    pub fn demo_charts(&self) -> &[RowChart] {
        &self.demo_charts
    }

    pub fn map(&self) -> &StateMap {
        &self.map
    }

    /// Replaces the bar charts by the ones of another question group.
    ///
    /// The charts of the previous group are released first, filters included,
    /// so that nothing selected in one group carries over to the next.
    pub fn switch_group(&mut self, group: usize) -> DashResult<()> {
        let qg = match self.groups.get(group) {
            Some(g) => g.clone(),
            None => {
                return UnknownGroupSnafu {
                    name: group.to_string(),
                }
                .fail()
            }
        };
        info!("switch_group: {} ({})", qg.name, qg.question);

        if let PanelState::GroupSelected { charts, .. } =
            std::mem::replace(&mut self.state, PanelState::Idle)
        {
            for chart in charts {
                debug!("switch_group: releasing chart {}", chart.code);
                chart.dispose(&mut self.index)?;
            }
        }

        let mut charts: Vec<BarChart> = Vec::new();
        for q in qg.questions.iter() {
            if let Some(chart) = BarChart::new(&mut self.index, q, &self.chart_config)? {
                charts.push(chart);
            }
        }
        self.state = PanelState::GroupSelected { group, charts };
        Ok(())
    }

    /// Clicks on a value of the chart identified by `code`: a question of the
    /// current group, a demographic chart, or the state map.
    pub fn toggle_filter(&mut self, code: &str, value: &str) -> DashResult<()> {
        if let PanelState::GroupSelected { charts, .. } = &mut self.state {
            if let Some(chart) = charts.iter_mut().find(|c| c.code == code) {
                return chart.toggle(&mut self.index, value);
            }
        }
        if let Some(chart) = self.demo_charts.iter_mut().find(|c| c.id == code) {
            return chart.toggle(&mut self.index, value);
        }
        if self.map.field == code {
            return self.map.toggle(&mut self.index, value);
        }
        UnknownFilterTargetSnafu { code }.fail()
    }

    pub fn select_state(&mut self, state: Option<&str>) -> DashResult<()> {
        self.map.select(&mut self.index, state)
    }

    /// Clears the filters of every chart and goes back to the whole country.
    pub fn clear_filters(&mut self) -> DashResult<()> {
        for chart in self.demo_charts.iter_mut() {
            chart.filter_all(&mut self.index)?;
        }
        if let PanelState::GroupSelected { charts, .. } = &mut self.state {
            for chart in charts.iter_mut() {
                chart.filter_all(&mut self.index)?;
            }
        }
        self.map.select(&mut self.index, None)
    }

    /// The location first, then the selected values of every chart.
    pub fn filter_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = vec![self.map.label().to_string()];
        for chart in self.demo_charts.iter() {
            tags.extend(chart.filters().iter().cloned());
        }
        for chart in self.bar_charts().iter() {
            tags.extend(chart.filters().iter().cloned());
        }
        tags
    }

    pub fn has_filters(&self) -> bool {
        self.filter_tags().iter().any(|t| t != NATIONWIDE)
    }

    /// Number of responses passing all the filters.
    pub fn responses(&self) -> usize {
        self.index.filtered_count()
    }

    pub fn total(&self) -> usize {
        self.index.size()
    }

    /// Number of filter changes since the dashboard was built.
    pub fn redraws(&self) -> u64 {
        self.redraws.get()
    }
}
