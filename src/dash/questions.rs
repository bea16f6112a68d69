use std::collections::{HashMap, HashSet};

use crate::dash::io_questions::QuestionRow;
use crate::dash::*;
use survey_crossfilter::Record;

/// Question type of the demographic questions, shown as row charts.
pub const DEMO_QUESTION_TYPE: &str = "Demo";
/// Group name of the questions that belong to no panel.
pub const NO_GROUP: &str = "N/A";

/// One possible answer of a question.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswerValue {
    pub key: String,
    pub label: String,
    /// Share of this answer among the valid answers of the whole dataset.
    pub percentage: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub code: String,
    pub label: String,
    pub text: String,
    pub group_name: String,
    pub group_question: String,
    pub question_type: String,
    pub chart_type: String,
    pub dc_class: String,
    /// The answers, in survey order.
    pub values: Vec<AnswerValue>,
}

/// Questions displayed together, under a common prompt.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGroup {
    pub name: String,
    pub question: String,
    pub questions: Vec<Question>,
}

// Array index keys come first in the property order of a JSON object as
// produced by a browser.
fn array_index(key: &str) -> Option<u32> {
    key.parse::<u32>()
        .ok()
        .filter(|n| *n != u32::MAX && n.to_string() == key)
}

/// Parses the value ordering of a question, for example
/// `{'1': 'Yes', '2': 'No'}`, into `(key, label)` pairs.
pub fn parse_values(code: &str, raw: &str) -> DashResult<Vec<(String, String)>> {
    let js: JSValue = serde_json::from_str(&raw.replace('\'', "\"")).context(ValueOrderingSnafu {
        code,
        content: raw,
    })?;
    let obj = js.as_object().context(ValueOrderingShapeSnafu {
        code,
        content: raw,
    })?;
    let mut indexed: Vec<(u32, String, String)> = Vec::new();
    let mut named: Vec<(String, String)> = Vec::new();
    for (key, label) in obj.iter() {
        let label = match label {
            JSValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        match array_index(key) {
            Some(n) => indexed.push((n, key.clone(), label)),
            None => named.push((key.clone(), label)),
        }
    }
    indexed.sort_by_key(|(n, _, _)| *n);
    let mut res: Vec<(String, String)> = indexed.into_iter().map(|(_, k, l)| (k, l)).collect();
    res.extend(named);
    Ok(res)
}

fn make_question(row: &QuestionRow) -> DashResult<Question> {
    ensure!(
        !row.question_code.trim().is_empty(),
        MissingQuestionCodeSnafu { lineno: row.lineno }
    );
    let values = parse_values(&row.question_code, &row.values)?
        .into_iter()
        .map(|(key, label)| AnswerValue {
            key,
            label,
            percentage: 0.0,
        })
        .collect();
    Ok(Question {
        code: row.question_code.trim().to_string(),
        label: row.question_label.clone(),
        text: row.question.clone(),
        group_name: row.question_group_name.clone(),
        group_question: row.question_group_question.clone(),
        question_type: row.question_type.clone(),
        chart_type: row.chart_type.clone(),
        dc_class: row.dc_class.clone(),
        values,
    })
}

/// The questions shown in the question panels.
///
/// Demographic questions and questions without a group are left out. A
/// question with broken metadata is skipped with a warning, unless `strict`
/// is set, in which case the whole load fails.
pub fn make_question_list(rows: &[QuestionRow], strict: bool) -> DashResult<Vec<Question>> {
    let mut res: Vec<Question> = Vec::new();
    for row in rows.iter() {
        if row.question_type == DEMO_QUESTION_TYPE || row.question_group_name == NO_GROUP {
            debug!("make_question_list: skipping {}", row.question_code);
            continue;
        }
        match make_question(row) {
            Ok(q) => res.push(q),
            Err(e) if strict => return Err(e),
            Err(e) => {
                warn!("Skipping question on line {}: {}", row.lineno, e);
            }
        }
    }
    Ok(res)
}

/// Computes the share of each answer over the whole dataset.
///
/// Answers that are not one of the labels of the question are not counted,
/// so the percentages of a question add up to 100 (up to rounding) as soon as
/// it has one valid answer.
pub fn add_question_percentages(questions: &mut [Question], records: &[Record]) {
    for question in questions.iter_mut() {
        let valid_labels: HashSet<&str> =
            question.values.iter().map(|v| v.label.as_str()).collect();
        let mut counts: HashMap<&str, u64> = HashMap::new();
        let mut valid_response_count: u64 = 0;
        for record in records.iter() {
            let answer = record.get(&question.code);
            if valid_labels.contains(answer) {
                *counts.entry(answer).or_insert(0) += 1;
                valid_response_count += 1;
            }
        }
        let percentages: Vec<f64> = question
            .values
            .iter()
            .map(|v| {
                let count = counts.get(v.label.as_str()).cloned().unwrap_or(0);
                if valid_response_count > 0 {
                    round1(100.0 * count as f64 / valid_response_count as f64)
                } else {
                    0.0
                }
            })
            .collect();
        for (v, p) in question.values.iter_mut().zip(percentages) {
            v.percentage = p;
        }
        debug!(
            "add_question_percentages: {}: {} valid answers",
            question.code, valid_response_count
        );
    }
}

/// Rounds to one decimal, looking at the exact value of the float.
///
/// 0.15 is stored slightly below 0.15 and gives 0.1. Exact halves such as
/// 0.25 round away from zero.
pub fn round1(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    // 1074 fraction digits hold the full expansion of any f64, so nothing
    // gets rounded by the formatting.
    let exact = format!("{:.1074}", x.abs());
    let (int_part, frac) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut frac_digits = frac.chars();
    let tenths = frac_digits.next().unwrap_or('0');
    let round_up = frac_digits.next().map_or(false, |c| c >= '5');
    let scaled: f64 = format!("{}{}", int_part, tenths)
        .parse()
        .unwrap_or_else(|_| (x.abs() * 10.0).trunc());
    let scaled = if round_up { scaled + 1.0 } else { scaled };
    (scaled / 10.0).copysign(x)
}

/// Groups the questions by (group name, group prompt), in order of first
/// appearance.
pub fn create_question_groups(questions: &[Question]) -> Vec<QuestionGroup> {
    let mut positions: HashMap<(String, String), usize> = HashMap::new();
    let mut res: Vec<QuestionGroup> = Vec::new();
    for q in questions.iter() {
        let key = (q.group_name.clone(), q.group_question.clone());
        let pos = *positions.entry(key).or_insert_with(|| {
            res.push(QuestionGroup {
                name: q.group_name.clone(),
                question: q.group_question.clone(),
                questions: Vec::new(),
            });
            res.len() - 1
        });
        res[pos].questions.push(q.clone());
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, group: &str, question_type: &str, values: &str) -> QuestionRow {
        QuestionRow {
            question_code: code.to_string(),
            question: format!("Text of {}", code),
            question_group_name: group.to_string(),
            question_group_question: format!("Prompt of {}", group),
            question_type: question_type.to_string(),
            chart_type: "stackedBinary".to_string(),
            values: values.to_string(),
            lineno: 2,
            ..QuestionRow::default()
        }
    }

    #[test]
    fn values_follow_browser_property_order() {
        let v = parse_values("Q", "{'b': 'B', '2': 'Two', 'a': 'A', '1': 'One'}").unwrap();
        let keys: Vec<&str> = v.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "b", "a"]);
        assert_eq!(v[0].1, "One");
        let v = parse_values("Q", "{'01': 'x', '10': 'y', '9': 'z'}").unwrap();
        let keys: Vec<&str> = v.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["9", "10", "01"]);
    }

    #[test]
    fn malformed_values() {
        assert!(parse_values("Q", "{'1': 'Yes'").is_err());
        assert!(parse_values("Q", "['Yes', 'No']").is_err());
        assert!(parse_values("Q", "").is_err());
    }

    #[test]
    fn question_list_filters_and_skips() {
        let rows = vec![
            row("educ", "N/A", "Demo", "{'1': 'College'}"),
            row("Q1", "G1", "Policy", "{'1': 'Yes', '2': 'No'}"),
            row("Q2", "N/A", "Policy", "{'1': 'Yes'}"),
            row("Q3", "G1", "Policy", "{'1': 'Yes'"),
            row("", "G2", "Policy", "{'1': 'Yes'}"),
        ];
        let qs = make_question_list(&rows, false).unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].code, "Q1");
        assert_eq!(qs[0].values[1].label, "No");
        assert!(make_question_list(&rows, true).is_err());
    }

    #[test]
    fn percentages_over_valid_answers() {
        let rows = vec![row("vote", "G", "Policy", "{'1': 'Yes', '2': 'No', '3': 'Maybe'}")];
        let mut qs = make_question_list(&rows, false).unwrap();
        let records: Vec<Record> = ["Yes", "No", "Yes", "", "Dunno", "Yes"]
            .iter()
            .map(|v| Record::new([("vote", *v)]))
            .collect();
        add_question_percentages(&mut qs, &records);
        let p: Vec<f64> = qs[0].values.iter().map(|v| v.percentage).collect();
        assert_eq!(p, vec![75.0, 25.0, 0.0]);

        let mut qs2 = make_question_list(&rows, false).unwrap();
        add_question_percentages(&mut qs2, &[]);
        assert!(qs2[0].values.iter().all(|v| v.percentage == 0.0));
    }

    #[test]
    fn percentages_add_up() {
        let rows = vec![row("q", "G", "Policy", "{'1': 'A', '2': 'B', '3': 'C'}")];
        let mut qs = make_question_list(&rows, false).unwrap();
        let records: Vec<Record> = ["A", "B", "C", "A", "B", "C", "A"]
            .iter()
            .map(|v| Record::new([("q", *v)]))
            .collect();
        add_question_percentages(&mut qs, &records);
        let total: f64 = qs[0].values.iter().map(|v| v.percentage).sum();
        assert!((total - 100.0).abs() <= 0.5);
    }

    #[test]
    fn rounding_uses_the_exact_float() {
        assert_eq!(round1(100.0 * 3.0 / 2000.0), 0.1);
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(200.0 / 3.0), 66.7);
        assert_eq!(round1(100.0 / 3.0), 33.3);
        assert_eq!(round1(57.0), 57.0);
        assert_eq!(round1(0.0), 0.0);
        assert_eq!(round1(-0.25), -0.3);
    }

    #[test]
    fn groups_in_order_of_appearance() {
        let rows = vec![
            row("Q1", "B", "Policy", "{'1': 'Yes'}"),
            row("Q2", "A", "Policy", "{'1': 'Yes'}"),
            row("Q3", "B", "Policy", "{'1': 'Yes'}"),
        ];
        let qs = make_question_list(&rows, false).unwrap();
        let groups = create_question_groups(&qs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "B");
        assert_eq!(groups[0].question, "Prompt of B");
        let codes: Vec<&str> = groups[0].questions.iter().map(|q| q.code.as_str()).collect();
        assert_eq!(codes, vec!["Q1", "Q3"]);
        assert_eq!(groups[1].questions[0].code, "Q2");
    }
}
