use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_crossfilter::*;

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::dash::config_reader::*;
use crate::dash::panel::*;
use crate::dash::questions::*;

pub mod charts;
pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod io_questions;
pub mod panel;
pub mod questions;
mod summary;

#[derive(Debug, Snafu)]
pub enum DashError {
    #[snafu(display("Error opening CSV file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet {name:?} in {path}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("The Excel file {path} has no header row"))]
    EmptyExcel { path: String },
    #[snafu(display("Error reading {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Question {code}: cannot parse the value ordering {content:?}"))]
    ValueOrdering {
        source: serde_json::Error,
        code: String,
        content: String,
    },
    #[snafu(display("Question {code}: the value ordering {content:?} is not an object"))]
    ValueOrderingShape { code: String, content: String },
    #[snafu(display("Question without a code on line {lineno}"))]
    MissingQuestionCode { lineno: usize },
    #[snafu(display("Invalid chart configuration: {message}"))]
    InvalidChartConfig { message: String },
    #[snafu(display("Unknown input type {input_type:?} (expected csv or xlsx)"))]
    UnknownInputType { input_type: String },
    #[snafu(display("Unknown question group {name:?}"))]
    UnknownGroup { name: String },
    #[snafu(display("No chart for {code:?} in the current view"))]
    UnknownFilterTarget { code: String },
    #[snafu(display("Cannot understand filter {arg:?}, expected CODE=VALUE"))]
    MalformedFilter { arg: String },
    #[snafu(display("Cross-filter error"))]
    Index { source: CrossFilterError },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The summary differs from the reference {path}"))]
    ReferenceMismatch { path: String },
    #[snafu(display("Cannot find the directory of the configuration file"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type DashResult<T> = Result<T, DashError>;
pub type BDashResult<T> = Result<T, Box<DashError>>;

/// The configuration once the file and the command line have been merged.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct ResolvedInputs {
    responses: String,
    questions: String,
    input_type: String,
    worksheet: Option<String>,
}

fn resolve_inputs(args: &Args, config: &DashConfig) -> DashResult<ResolvedInputs> {
    let responses = match args.input.clone().or_else(|| config.responses_path.clone()) {
        Some(p) => p,
        None => whatever!("No responses file: use --input or responsesPath in the configuration"),
    };
    let questions = match args
        .questions
        .clone()
        .or_else(|| config.questions_path.clone())
    {
        Some(p) => p,
        None => {
            whatever!("No questions file: use --questions or questionsPath in the configuration")
        }
    };
    let input_type = args
        .input_type
        .clone()
        .or_else(|| config.responses_type.clone())
        .unwrap_or_else(|| io_common::infer_input_type(&responses));
    let worksheet = args
        .excel_worksheet_name
        .clone()
        .or_else(|| config.excel_worksheet_name.clone());
    Ok(ResolvedInputs {
        responses,
        questions,
        input_type,
        worksheet,
    })
}

fn read_responses(inputs: &ResolvedInputs) -> BDashResult<Vec<Record>> {
    info!(
        "Attempting to read responses {:?} as {}",
        inputs.responses, inputs.input_type
    );
    match inputs.input_type.as_str() {
        "csv" => io_csv::read_csv_responses(&inputs.responses),
        "xlsx" | "excel" => {
            io_excel::read_excel_responses(&inputs.responses, inputs.worksheet.as_deref())
        }
        x => Err(Box::new(DashError::UnknownInputType {
            input_type: x.to_string(),
        })),
    }
}

/// Loads both inputs and builds the dashboard.
pub fn load_dashboard(args: &Args, config: &DashConfig) -> BDashResult<Dashboard> {
    let inputs = resolve_inputs(args, config)?;
    debug!("load_dashboard: inputs: {:?}", inputs);
    let settings = config.settings()?;

    let records = read_responses(&inputs)?;
    info!("Read {} responses", records.len());

    let rows = io_questions::read_questions(&inputs.questions)?;
    let questions = make_question_list(&rows, settings.strict_metadata)?;
    info!("Read {} questions", questions.len());

    let dashboard = Dashboard::new(records, questions, &settings)?;
    Ok(dashboard)
}

fn parse_filter_arg(arg: &str) -> DashResult<(String, String)> {
    match arg.split_once('=') {
        Some((code, value)) if !code.trim().is_empty() => {
            Ok((code.trim().to_string(), value.to_string()))
        }
        _ => MalformedFilterSnafu { arg }.fail(),
    }
}

fn write_output(out: &Option<String>, content: &str) -> BDashResult<()> {
    match out.as_deref() {
        None | Some("stdout") => {
            println!("{}", content);
        }
        Some(path) => {
            info!("Writing summary to {:?}", path);
            fs::write(path, content).context(WritingOutputSnafu { path })?;
        }
    }
    Ok(())
}

pub fn run_dashboard(args: &Args) -> BDashResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => DashConfig::default(),
    };
    info!("config: {:?}", config);

    let mut dashboard = load_dashboard(args, &config)?;

    if args.list_groups {
        for group in dashboard.groups() {
            println!("{}: {}", group.name, group.question);
            for q in group.questions.iter() {
                println!("    {} [{}] {}", q.code, q.chart_type, q.text);
            }
        }
        return Ok(());
    }

    match &args.group {
        Some(name) => {
            let idx = dashboard
                .find_group(name)
                .context(UnknownGroupSnafu { name })?;
            dashboard.switch_group(idx)?;
        }
        None if !dashboard.groups().is_empty() => {
            dashboard.switch_group(0)?;
        }
        None => {
            warn!("No question group found, only the demographic charts are available");
        }
    }

    for arg in args.filter.iter() {
        let (code, value) = parse_filter_arg(arg)?;
        dashboard.toggle_filter(&code, &value)?;
    }
    if let Some(state) = &args.state {
        dashboard.select_state(Some(state))?;
    }
    info!(
        "Responses: {} of {} ({:?})",
        dashboard.responses(),
        dashboard.total(),
        dashboard.filter_tags()
    );

    let summary_js = summary::build_summary_js(&dashboard)?;
    let pretty_js = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    write_output(&args.out, &pretty_js)?;

    // The reference summary, if provided for comparison
    if let Some(reference_p) = &args.reference {
        let reference = read_reference(reference_p)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js {
            warn!("Found differences with the reference summary");
            print_diff(pretty_js_reference.as_str(), pretty_js.as_str(), "\n");
            return Err(Box::new(DashError::ReferenceMismatch {
                path: reference_p.clone(),
            }));
        }
    }
    Ok(())
}

/// Directory holding the test inputs.
#[cfg(test)]
pub(crate) fn test_data(name: &str) -> String {
    let root = option_env!("SURVEYDASH_TEST_DIR")
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{}/tests/data", env!("CARGO_MANIFEST_DIR")));
    std::path::Path::new(&root)
        .join(name)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let config = test_data("dash_config.json");
        let mut all = vec!["surveydash", "--config", config.as_str()];
        all.extend_from_slice(extra);
        Args::parse_from(all)
    }

    #[test]
    fn filter_argument() {
        assert_eq!(
            parse_filter_arg("educ=High school").unwrap(),
            ("educ".to_string(), "High school".to_string())
        );
        assert_eq!(
            parse_filter_arg("CC24_301=").unwrap(),
            ("CC24_301".to_string(), "".to_string())
        );
        assert!(parse_filter_arg("educ").is_err());
        assert!(parse_filter_arg("=x").is_err());
    }

    #[test]
    fn inputs_from_config_and_flags() {
        let a = args(&["--input-type", "csv"]);
        let config = read_config(a.config.as_ref().unwrap()).unwrap();
        let inputs = resolve_inputs(&a, &config).unwrap();
        assert!(inputs.responses.ends_with("responses.csv"));
        assert!(inputs.questions.ends_with("questions.csv"));
        assert_eq!(inputs.input_type, "csv");

        let a = Args::parse_from(["surveydash"]);
        assert!(resolve_inputs(&a, &DashConfig::default()).is_err());
    }

    #[test]
    fn load_and_filter_end_to_end() {
        let a = args(&[]);
        let config = read_config(a.config.as_ref().unwrap()).unwrap();
        let mut dashboard = load_dashboard(&a, &config).unwrap();
        assert_eq!(dashboard.total(), 8);
        dashboard.switch_group(0).unwrap();
        dashboard.toggle_filter("educ", "College").unwrap();
        assert_eq!(dashboard.responses(), 4);
        assert!(dashboard.toggle_filter("nope", "x").is_err());
    }

    #[test]
    fn run_with_reference_mismatch_fails() {
        let out = std::env::temp_dir().join("surveydash_run_test.json");
        let out_s = out.display().to_string();
        let reference = test_data("dash_config.json");
        let a = args(&[
            "--group",
            "Policy",
            "--filter",
            "educ=College",
            "--out",
            out_s.as_str(),
            "--reference",
            reference.as_str(),
        ]);
        assert!(run_dashboard(&a).is_err());
        let written = fs::read_to_string(&out).unwrap();
        let js: JSValue = serde_json::from_str(&written).unwrap();
        assert_eq!(js["responses"], 4);
        assert_eq!(js["group"]["name"], "Policy");
    }

    #[test]
    fn run_with_matching_reference() {
        let out = std::env::temp_dir().join("surveydash_reference_test.json");
        let out_s = out.display().to_string();
        let a = args(&["--state", "Utah", "--out", out_s.as_str()]);
        run_dashboard(&a).unwrap();
        let a = args(&[
            "--state",
            "Utah",
            "--out",
            "stdout",
            "--reference",
            out_s.as_str(),
        ]);
        run_dashboard(&a).unwrap();
    }

    #[test]
    fn unknown_group_is_an_error() {
        let a = args(&["--group", "Nothing"]);
        assert!(run_dashboard(&a).is_err());
    }
}
