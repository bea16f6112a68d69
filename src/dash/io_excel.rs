use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::dash::{io_common::format_number, *};
use survey_crossfilter::Record;

fn read_cell(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Float(f) => format_number(*f),
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(f) => format_number(*f),
        DataType::Empty => "".to_string(),
        other => {
            warn!("read_cell: unreadable cell {:?}, treated as missing", other);
            "".to_string()
        }
    }
}

fn get_range(path: &str, worksheet: Option<&str>) -> BDashResult<calamine::Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?,
    };
    Ok(wrange)
}

/// Reads one response per row of the worksheet. The first row holds the
/// question codes.
pub fn read_excel_responses(path: &str, worksheet: Option<&str>) -> BDashResult<Vec<Record>> {
    let wrange = get_range(path, worksheet)?;
    let mut rows = wrange.rows();
    let header: Vec<String> = rows
        .next()
        .context(EmptyExcelSnafu { path })?
        .iter()
        .map(|c| read_cell(c).trim().to_string())
        .collect();
    debug!("read_excel_responses: header: {:?}", header);

    let mut res: Vec<Record> = Vec::new();
    for row in rows {
        let fields = header.iter().enumerate().map(|(col, h)| {
            let value = row.get(col).map(read_cell).unwrap_or_default();
            (h.clone(), value)
        });
        res.push(Record::new(fields));
    }
    info!("read_excel_responses: {}: {} responses", path, res.len());
    Ok(res)
}
