use std::path::Path;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// The input type of a responses file, from its extension. Defaults to csv.
pub fn infer_input_type(path: &str) -> String {
    match Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("xlsx") | Some("xlsm") => "xlsx".to_string(),
        _ => "csv".to_string(),
    }
}

/// Formats a number the way it would be written in a text export: integral
/// values have no decimal part.
pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
