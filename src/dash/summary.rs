use serde_json::json;
use serde_json::Map as JSMap;

use crate::dash::panel::Dashboard;
use crate::dash::questions::round1;
use crate::dash::*;

/// Current values of every chart, as displayed.
pub fn build_summary_js(dashboard: &Dashboard) -> DashResult<JSValue> {
    let index = dashboard.index();

    let mut charts: Vec<JSValue> = Vec::new();
    for chart in dashboard.bar_charts() {
        let bars: Vec<JSValue> = chart
            .bars(index)?
            .iter()
            .map(|b| {
                json!({
                    "sortKey": b.sort_key,
                    "label": b.label,
                    "percentage": round1(b.value),
                })
            })
            .collect();
        charts.push(json!({
            "code": chart.code,
            "title": chart.title,
            "chartType": chart.kind.name(),
            "width": chart.width,
            "height": chart.height,
            "colors": chart.colors,
            "filters": chart.filters(),
            "bars": bars,
        }));
    }

    let mut demographics: Vec<JSValue> = Vec::new();
    for chart in dashboard.demo_charts() {
        let rows: Vec<JSValue> = chart
            .rows(index)?
            .iter()
            .map(|kv| json!({"key": kv.key, "count": kv.value as u64}))
            .collect();
        demographics.push(json!({
            "id": chart.id,
            "name": chart.name,
            "width": chart.width,
            "filters": chart.filters(),
            "rows": rows,
        }));
    }

    let states: Vec<JSValue> = dashboard
        .map()
        .shares(index)?
        .iter()
        .map(|s| {
            json!({
                "state": s.state,
                "count": s.count,
                "percentage": round1(s.percentage),
            })
        })
        .collect();

    let mut res: JSMap<String, JSValue> = JSMap::new();
    res.insert("responses".to_string(), json!(dashboard.responses()));
    res.insert("total".to_string(), json!(dashboard.total()));
    res.insert("filters".to_string(), json!(dashboard.filter_tags()));
    res.insert("hasFilters".to_string(), json!(dashboard.has_filters()));
    let group = match dashboard.active_group() {
        Some(g) => json!({"name": g.name, "question": g.question}),
        None => JSValue::Null,
    };
    res.insert("group".to_string(), group);
    res.insert("charts".to_string(), JSValue::Array(charts));
    res.insert("demographics".to_string(), JSValue::Array(demographics));
    res.insert("states".to_string(), JSValue::Array(states));
    res.insert("redraws".to_string(), json!(dashboard.redraws()));
    Ok(JSValue::Object(res))
}
