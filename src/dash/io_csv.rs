// Primitives for reading CSV files.

use crate::dash::{io_common::simplify_file_name, *};
use survey_crossfilter::Record;

/// Reads one response per line. The first line holds the question codes.
///
/// Short lines are padded with empty answers so that every record carries
/// every column.
pub fn read_csv_responses(path: &str) -> BDashResult<Vec<Record>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let headers: Vec<String> = rdr
        .headers()
        .context(OpeningCsvSnafu { path })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    debug!("read_csv_responses: headers: {:?}", headers);

    let mut res: Vec<Record> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if line.len() > headers.len() {
            warn!(
                "read_csv_responses: {}: line {} has {} cells for {} columns, ignoring the extra cells",
                simplify_file_name(path),
                lineno,
                line.len(),
                headers.len()
            );
        }
        let fields = headers
            .iter()
            .enumerate()
            .map(|(col, h)| (h.clone(), line.get(col).unwrap_or("").to_string()));
        res.push(Record::new(fields));
    }
    info!(
        "read_csv_responses: {}: {} responses",
        simplify_file_name(path),
        res.len()
    );
    Ok(res)
}
