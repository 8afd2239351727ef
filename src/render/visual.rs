//! Turning result rows into a type-specific visual.
//!
//! Column order is the key order of the first row. Charts need a label column
//! plus at least one value column; pie-like charts accept both tall
//! (`label, value` per row) and wide (one row, one column per slice) results.

use serde::Serialize;
use serde_json::Value;

use super::palette::Palette;
use crate::backend::Row;
use crate::blueprint::WidgetType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiVisual {
    pub value: f64,
    pub column: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableVisual {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartVisual {
    pub kind: String,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieVisual {
    pub kind: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
}

/// What a widget shows. Never blank: every render ends in one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum Visual {
    Loading,
    NoData { message: String },
    Error { message: String },
    Kpi(KpiVisual),
    Table(TableVisual),
    Chart(ChartVisual),
    Pie(PieVisual),
}

impl Visual {
    pub fn no_data(message: impl Into<String>) -> Self {
        Visual::NoData {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Visual::Error {
            message: message.into(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Visual::Loading)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Visual::Loading => "loading",
            Visual::NoData { .. } => "noData",
            Visual::Error { .. } => "error",
            Visual::Kpi(_) => "kpi",
            Visual::Table(_) => "table",
            Visual::Chart(_) => "chart",
            Visual::Pie(_) => "pie",
        }
    }
}

/// Numbers, and strings that parse as numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Column names from the first row's key order.
pub fn columns_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

fn cell<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

pub fn build_visual(widget_type: &WidgetType, rows: &[Row], palette: &Palette) -> Visual {
    if rows.is_empty() {
        return Visual::no_data("No data");
    }
    match widget_type {
        WidgetType::Kpi => kpi(rows),
        t if t.is_cartesian() => chart(t.as_str(), rows, palette),
        t if t.is_radial() => pie(t.as_str(), rows, palette),
        _ => table(rows),
    }
}

fn kpi(rows: &[Row]) -> Visual {
    let row = &rows[0];
    let Some((column, value)) = row
        .iter()
        .find_map(|(k, v)| as_number(v).map(|n| (k.clone(), n)))
    else {
        return Visual::no_data("No numeric value");
    };
    let label = row
        .iter()
        .find(|(k, _)| **k != column)
        .map(|(_, v)| as_text(v));
    Visual::Kpi(KpiVisual {
        value,
        column,
        label,
    })
}

fn table(rows: &[Row]) -> Visual {
    let columns = columns_of(rows);
    let rows = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell(row, c).clone()).collect())
        .collect();
    Visual::Table(TableVisual { columns, rows })
}

fn chart(kind: &str, rows: &[Row], palette: &Palette) -> Visual {
    let columns = columns_of(rows);
    if columns.len() < 2 {
        return Visual::no_data("Chart needs a label column and a value column");
    }
    let labels = rows.iter().map(|row| as_text(cell(row, &columns[0]))).collect();
    let series = columns[1..]
        .iter()
        .enumerate()
        .map(|(i, name)| Series {
            name: name.clone(),
            values: rows
                .iter()
                .map(|row| as_number(cell(row, name)).unwrap_or(0.0))
                .collect(),
            color: palette.color(i).to_string(),
        })
        .collect();
    Visual::Chart(ChartVisual {
        kind: kind.to_string(),
        labels,
        series,
    })
}

fn pie(kind: &str, rows: &[Row], palette: &Palette) -> Visual {
    let columns = columns_of(rows);
    if columns.len() < 2 {
        return Visual::no_data("Chart needs a label column and a value column");
    }

    // column 0 always labels, even when it holds a number
    let value_columns: Vec<&String> = columns[1..]
        .iter()
        .filter(|c| as_number(cell(&rows[0], c)).is_some())
        .collect();

    let wide = rows.len() == 1 && value_columns.len() >= 2;
    let (labels, values): (Vec<String>, Vec<f64>) = if wide {
        // one slice per value column
        value_columns
            .iter()
            .map(|c| ((*c).clone(), as_number(cell(&rows[0], c)).unwrap_or(0.0)))
            .unzip()
    } else {
        // one slice per row
        rows.iter()
            .map(|row| {
                (
                    as_text(cell(row, &columns[0])),
                    as_number(cell(row, &columns[1])).unwrap_or(0.0),
                )
            })
            .unzip()
    };

    Visual::Pie(PieVisual {
        kind: kind.to_string(),
        colors: palette.take(labels.len()),
        labels,
        values,
    })
}
