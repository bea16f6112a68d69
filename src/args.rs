use clap::Parser;

/// This program computes the cross-filtered results of a survey dashboard.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the dashboard. Paths in this file are relative
    /// to the directory of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing a summary in JSON format. If provided, surveydash will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to the given
    /// location. Otherwise it is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) The file of survey responses. Setting this option overrides the responsesPath
    /// that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default: from the file extension) The type of the responses file: csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (file path or empty) The question metadata file. Setting this option overrides the questionsPath
    /// that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub questions: Option<String>,

    /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (default: the first group) The name of the question group to display.
    #[clap(short, long, value_parser)]
    pub group: Option<String>,

    /// (CODE=VALUE, repeated) Clicks on the value of a chart: a question of the group, a demographic
    /// chart or the state field. Applied in order.
    #[clap(short, long, value_parser, multiple_occurrences = true)]
    pub filter: Vec<String>,

    /// (state name) Checks a state on the map.
    #[clap(short, long, value_parser)]
    pub state: Option<String>,

    /// If passed as an argument, prints the question groups and exits.
    #[clap(long, takes_value = false)]
    pub list_groups: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
