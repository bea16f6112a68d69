use crate::dash::charts::{ChartConfig, RowChartConfig};
use crate::dash::panel::DashSettings;
use crate::dash::*;

use std::path::{Path, PathBuf};

/// The field holding the state of each respondent.
pub const DEFAULT_STATE_FIELD: &str = "inputstate";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DemoChartSpec {
    pub id: String,
    pub name: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarChartSettings {
    #[serde(rename = "barWidth")]
    pub bar_width: Option<u32>,
    pub height: Option<u32>,
    pub colors: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowChartSettings {
    pub width: Option<u32>,
}

/// The content of the dashboard configuration file. Every entry is optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashConfig {
    #[serde(rename = "responsesPath")]
    pub responses_path: Option<String>,
    #[serde(rename = "questionsPath")]
    pub questions_path: Option<String>,
    #[serde(rename = "responsesType")]
    pub responses_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "stateField")]
    pub state_field: Option<String>,
    #[serde(rename = "demoCharts")]
    pub demo_charts: Option<Vec<DemoChartSpec>>,
    #[serde(rename = "barChart")]
    pub bar_chart: Option<BarChartSettings>,
    #[serde(rename = "rowChart")]
    pub row_chart: Option<RowChartSettings>,
    #[serde(rename = "strictMetadata")]
    pub strict_metadata: Option<bool>,
}

impl DashConfig {
    /// Fills in the defaults and validates the chart options.
    pub fn settings(&self) -> DashResult<DashSettings> {
        let bar = self.bar_chart.clone().unwrap_or_default();
        let default_chart = ChartConfig::default();
        let chart = ChartConfig {
            bar_width: bar.bar_width.unwrap_or(default_chart.bar_width),
            height: bar.height.unwrap_or(default_chart.height),
            colors: bar.colors.unwrap_or(default_chart.colors),
        }
        .validate()?;

        let row = self.row_chart.clone().unwrap_or_default();
        let row_chart = RowChartConfig {
            width: row.width.unwrap_or(RowChartConfig::default().width),
        }
        .validate()?;

        Ok(DashSettings {
            chart,
            row_chart,
            demo_charts: self
                .demo_charts
                .clone()
                .unwrap_or_else(default_demo_charts),
            state_field: self
                .state_field
                .clone()
                .unwrap_or_else(|| DEFAULT_STATE_FIELD.to_string()),
            strict_metadata: self.strict_metadata.unwrap_or(false),
        })
    }
}

/// The demographic breakdowns shown next to the question charts.
pub fn default_demo_charts() -> Vec<DemoChartSpec> {
    [
        ("educ", "Education"),
        ("race", "Race"),
        ("hispanic", "Hispanic"),
        ("votereg", "Voter Registration Status"),
        ("pid7", "7 Point Party ID"),
        ("CC24_309e", "General Health"),
        ("gender4", "Gender"),
    ]
    .iter()
    .map(|(id, name)| DemoChartSpec {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn resolve_path(root: &Path, p: &Option<String>) -> Option<String> {
    p.as_ref().map(|s| {
        let path = Path::new(s);
        if path.is_absolute() {
            s.clone()
        } else {
            let full: PathBuf = [root, path].iter().collect();
            full.display().to_string()
        }
    })
}

/// Reads the configuration. The input paths are relative to the directory of
/// the configuration file.
pub fn read_config(path: &str) -> BDashResult<DashConfig> {
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let mut config: DashConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    let root = Path::new(path).parent().context(MissingParentDirSnafu {})?;
    config.responses_path = resolve_path(root, &config.responses_path);
    config.questions_path = resolve_path(root, &config.questions_path);
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_reference(path: &str) -> BDashResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
