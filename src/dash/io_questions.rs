// Reading the question metadata table.

use crate::dash::*;

/// One row of the question metadata, as found in the file.
/// Absent columns read as empty strings.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionRow {
    pub question_code: String,
    pub question_label: String,
    pub question: String,
    pub question_group_name: String,
    pub question_group_question: String,
    pub question_type: String,
    pub chart_type: String,
    pub dc_class: String,
    pub values: String,
    // Line of the row in the file, for the error messages.
    #[serde(skip)]
    pub lineno: usize,
}

pub fn read_questions(path: &str) -> BDashResult<Vec<QuestionRow>> {
    info!("Attempting to read questions {:?}", path);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    let mut res: Vec<QuestionRow> = Vec::new();
    for (idx, row_r) in rdr.deserialize::<QuestionRow>().enumerate() {
        // The header is on the first line.
        let lineno = idx + 2;
        let mut row = row_r.context(CsvLineParseSnafu { path, lineno })?;
        row.lineno = lineno;
        debug!("read_questions: {:?}", row);
        res.push(row);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixture() {
        let rows = read_questions(&test_data("questions.csv")).unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].question_code, "educ");
        assert_eq!(rows[0].question_type, "Demo");
        assert_eq!(rows[1].values, "{'1': 'Yes', '2': 'No'}");
        assert_eq!(rows[1].lineno, 3);
    }

    #[test]
    fn missing_columns_are_empty() {
        let path = std::env::temp_dir().join("surveydash_questions_short.csv");
        fs::write(&path, "question_code,question\nQ1,Anything?\n").unwrap();
        let rows = read_questions(&path.display().to_string()).unwrap();
        assert_eq!(rows[0].question_code, "Q1");
        assert_eq!(rows[0].chart_type, "");
        assert_eq!(rows[0].values, "");
    }
}
