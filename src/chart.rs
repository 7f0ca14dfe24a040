//! Chart-ready data shaping.
//!
//! [`shape`] turns a [`ChartRequest`] over a cleaned table into [`ChartData`], the structure a
//! front end renders directly:
//!
//! - bar: per-category sum of a numeric value column (or category counts), top 10 descending
//! - line: `(x, y)` rows without missing cells, sorted by `x`
//! - pie: counts per distinct value, top 8 descending
//! - scatter: the first 100 `(x, y)` rows without missing cells, as points
//!
//! Ties in every "top N" keep the order in which the group first appears in the table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cleaning::CleanedTable;
use crate::error::{IngestionError, IngestionResult};
use crate::frame;
use crate::summary::value_counts;
use crate::types::Value;

/// Groups kept by a bar chart.
pub const BAR_LIMIT: usize = 10;
/// Slices kept by a pie chart.
pub const PIE_LIMIT: usize = 8;
/// Points kept by a scatter chart.
pub const SCATTER_LIMIT: usize = 100;

/// Chart kinds understood by the shaper and the answer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    /// Explicitly no chart.
    None,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [Self::Bar, Self::Line, Self::Pie, Self::Scatter, Self::None];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Scatter => "scatter",
            Self::None => "none",
        }
    }

    /// Parse a kind name. Exact lower-case match only.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown chart kind '{s}'"))
    }
}

/// A fully specified chart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartRequest {
    Bar { category: String, value: String },
    Line { x: String, y: String },
    Pie { column: String },
    Scatter { x: String, y: String },
}

impl ChartRequest {
    /// Build a request from a kind name and column selection.
    ///
    /// `None` means "no chart": the kind is `none` or unrecognised, or a two-column kind is
    /// missing its second column. Pie ignores `y`.
    pub fn from_parts(kind: &str, x: &str, y: Option<&str>) -> Option<Self> {
        let x = x.to_string();
        let y = y.map(str::to_string);
        match ChartKind::parse(kind)? {
            ChartKind::Bar => Some(Self::Bar {
                category: x,
                value: y?,
            }),
            ChartKind::Line => Some(Self::Line { x, y: y? }),
            ChartKind::Pie => Some(Self::Pie { column: x }),
            ChartKind::Scatter => Some(Self::Scatter { x, y: y? }),
            ChartKind::None => None,
        }
    }

    pub fn kind(&self) -> ChartKind {
        match self {
            Self::Bar { .. } => ChartKind::Bar,
            Self::Line { .. } => ChartKind::Line,
            Self::Pie { .. } => ChartKind::Pie,
            Self::Scatter { .. } => ChartKind::Scatter,
        }
    }
}

/// One labelled data series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset<T> {
    pub label: String,
    pub data: Vec<T>,
}

/// One scatter point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: Value,
    pub y: Value,
}

/// Shaped chart data.
///
/// Serializes as `{labels, datasets}` for bar/line/pie and as `{x_column, y_column, datasets}`
/// for scatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartData {
    Series {
        labels: Vec<String>,
        datasets: Vec<Dataset<Value>>,
    },
    Points {
        x_column: String,
        y_column: String,
        datasets: Vec<Dataset<Point>>,
    },
}

impl ChartData {
    fn series(labels: Vec<String>, label: &str, data: Vec<Value>) -> Self {
        Self::Series {
            labels,
            datasets: vec![Dataset {
                label: label.to_string(),
                data,
            }],
        }
    }
}

/// Shape `request` over `table`. Fails with `UnknownColumn` when a named column does not exist.
pub fn shape(table: &CleanedTable, request: &ChartRequest) -> IngestionResult<ChartData> {
    match request {
        ChartRequest::Bar { category, value } => bar(table, category, value),
        ChartRequest::Line { x, y } => line(table, x, y),
        ChartRequest::Pie { column } => pie(table, column),
        ChartRequest::Scatter { x, y } => scatter(table, x, y),
    }
}

/// [`ChartRequest::from_parts`] followed by [`shape`]. `Ok(None)` when no chart was requested.
pub fn shape_chart(
    table: &CleanedTable,
    kind: &str,
    x: &str,
    y: Option<&str>,
) -> IngestionResult<Option<ChartData>> {
    ChartRequest::from_parts(kind, x, y)
        .map(|request| shape(table, &request))
        .transpose()
}

fn column_index(table: &CleanedTable, name: &str) -> IngestionResult<usize> {
    table
        .schema
        .index_of(name)
        .ok_or_else(|| IngestionError::UnknownColumn {
            column: name.to_string(),
        })
}

/// Rows where both cells are present, in table order.
fn complete_pairs<'a>(
    table: &'a CleanedTable,
    x: usize,
    y: usize,
) -> impl Iterator<Item = (&'a Value, &'a Value)> + 'a {
    table
        .column(x)
        .zip(table.column(y))
        .filter(|(a, b)| !a.is_missing() && !b.is_missing())
}

fn bar(table: &CleanedTable, category: &str, value: &str) -> IngestionResult<ChartData> {
    let cat_idx = column_index(table, category)?;
    let val_idx = column_index(table, value)?;
    let value_storage = table.schema.fields[val_idx].storage;

    let mut groups: Vec<(String, Value)> = if value_storage.is_numeric() {
        let pairs = table.column(cat_idx).zip(table.column(val_idx));
        frame::sum_by_key(pairs, value_storage)?
    } else {
        value_counts(table.column(cat_idx))?
            .into_iter()
            .map(|(label, n)| (label, count_value(n)))
            .collect()
    };
    // Stable, so equal aggregates keep first-appearance order.
    groups.sort_by(|a, b| b.1.sort_cmp(&a.1));
    groups.truncate(BAR_LIMIT);

    let (labels, data) = groups.into_iter().unzip();
    Ok(ChartData::series(labels, value, data))
}

fn count_value(n: u64) -> Value {
    Value::Int64(i64::try_from(n).unwrap_or(i64::MAX))
}

fn line(table: &CleanedTable, x: &str, y: &str) -> IngestionResult<ChartData> {
    let x_idx = column_index(table, x)?;
    let y_idx = column_index(table, y)?;

    let mut pairs: Vec<(&Value, &Value)> = complete_pairs(table, x_idx, y_idx).collect();
    pairs.sort_by(|a, b| a.0.sort_cmp(b.0));

    let labels = pairs.iter().map(|(xv, _)| xv.to_string()).collect();
    let data = pairs.into_iter().map(|(_, yv)| yv.clone()).collect();
    Ok(ChartData::series(labels, y, data))
}

fn pie(table: &CleanedTable, column: &str) -> IngestionResult<ChartData> {
    let idx = column_index(table, column)?;
    let (labels, data) = value_counts(table.column(idx))?
        .into_iter()
        .take(PIE_LIMIT)
        .map(|(label, n)| (label, count_value(n)))
        .unzip();
    Ok(ChartData::series(labels, column, data))
}

fn scatter(table: &CleanedTable, x: &str, y: &str) -> IngestionResult<ChartData> {
    let x_idx = column_index(table, x)?;
    let y_idx = column_index(table, y)?;

    let data = complete_pairs(table, x_idx, y_idx)
        .take(SCATTER_LIMIT)
        .map(|(xv, yv)| Point {
            x: xv.clone(),
            y: yv.clone(),
        })
        .collect();
    Ok(ChartData::Points {
        x_column: x.to_string(),
        y_column: y.to_string(),
        datasets: vec![Dataset {
            label: format!("{y} vs {x}"),
            data,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::{shape, shape_chart, ChartData, ChartKind, ChartRequest, SCATTER_LIMIT};
    use crate::cleaning::{clean, CleanedTable};
    use crate::error::IngestionError;
    use crate::types::{Field, Schema, StorageType, Table, Value};

    fn text(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    fn sales() -> CleanedTable {
        let schema = Schema::new(vec![
            Field::new("region", StorageType::Utf8),
            Field::new("units", StorageType::Int64),
            Field::new("price", StorageType::Float64),
            Field::new("rep", StorageType::Utf8),
        ]);
        let rows = vec![
            vec![text("a"), Value::Int64(5), Value::Float64(1.5), text("x")],
            vec![text("a"), Value::Int64(1), Value::Null, text("y")],
            vec![text("b"), Value::Int64(7), Value::Float64(0.5), text("x")],
            vec![text("c"), Value::Null, Value::Float64(2.0), text("z")],
            vec![text("c"), Value::Int64(2), Value::Float64(3.0), text("x")],
            vec![Value::Null, Value::Int64(100), Value::Float64(9.0), text("x")],
        ];
        clean(Table::new(schema, rows))
    }

    fn series(data: ChartData) -> (Vec<String>, String, Vec<Value>) {
        match data {
            ChartData::Series { labels, mut datasets } => {
                assert_eq!(datasets.len(), 1);
                let ds = datasets.remove(0);
                (labels, ds.label, ds.data)
            }
            other => panic!("expected a series chart, got {other:?}"),
        }
    }

    #[test]
    fn bar_counts_text_values_in_descending_order() {
        let schema = Schema::new(vec![Field::new("cat", StorageType::Utf8)]);
        let rows = ["a", "a", "b", "c", "c", "c"].iter().map(|s| vec![text(s)]).collect();
        let table = clean(Table::new(schema, rows));
        let request = ChartRequest::Bar {
            category: "cat".to_string(),
            value: "cat".to_string(),
        };
        let (labels, label, data) = series(shape(&table, &request).unwrap());
        assert_eq!(labels, vec!["c", "a", "b"]);
        assert_eq!(label, "cat");
        assert_eq!(data, vec![Value::Int64(3), Value::Int64(2), Value::Int64(1)]);
    }

    #[test]
    fn bar_sums_numeric_values_and_drops_missing_categories() {
        let request = ChartRequest::Bar {
            category: "region".to_string(),
            value: "units".to_string(),
        };
        let (labels, _, data) = series(shape(&sales(), &request).unwrap());
        assert_eq!(labels, vec!["b", "a", "c"]);
        assert_eq!(data, vec![Value::Int64(7), Value::Int64(6), Value::Int64(2)]);

        let request = ChartRequest::Bar {
            category: "region".to_string(),
            value: "price".to_string(),
        };
        let (labels, _, data) = series(shape(&sales(), &request).unwrap());
        assert_eq!(labels, vec!["c", "a", "b"]);
        assert_eq!(
            data,
            vec![Value::Float64(5.0), Value::Float64(1.5), Value::Float64(0.5)]
        );
    }

    #[test]
    fn line_drops_incomplete_rows_and_sorts_by_x() {
        let request = ChartRequest::Line {
            x: "price".to_string(),
            y: "units".to_string(),
        };
        let (labels, label, data) = series(shape(&sales(), &request).unwrap());
        assert_eq!(labels, vec!["0.5", "1.5", "3.0", "9.0"]);
        assert_eq!(label, "units");
        assert_eq!(
            data,
            vec![Value::Int64(7), Value::Int64(5), Value::Int64(2), Value::Int64(100)]
        );
    }

    #[test]
    fn pie_counts_values() {
        let request = ChartRequest::Pie {
            column: "rep".to_string(),
        };
        let (labels, label, data) = series(shape(&sales(), &request).unwrap());
        assert_eq!(labels, vec!["x", "y", "z"]);
        assert_eq!(label, "rep");
        assert_eq!(data, vec![Value::Int64(4), Value::Int64(1), Value::Int64(1)]);
    }

    #[test]
    fn scatter_keeps_the_first_hundred_complete_rows() {
        let schema = Schema::new(vec![
            Field::new("x", StorageType::Int64),
            Field::new("y", StorageType::Float64),
        ]);
        let rows = (0..150)
            .map(|i| vec![Value::Int64(i), Value::Float64(i as f64 * 2.0)])
            .collect();
        let table = clean(Table::new(schema, rows));
        let request = ChartRequest::Scatter {
            x: "x".to_string(),
            y: "y".to_string(),
        };
        match shape(&table, &request).unwrap() {
            ChartData::Points {
                x_column,
                y_column,
                datasets,
            } => {
                assert_eq!((x_column.as_str(), y_column.as_str()), ("x", "y"));
                assert_eq!(datasets[0].label, "y vs x");
                let points = &datasets[0].data;
                assert_eq!(points.len(), SCATTER_LIMIT);
                assert_eq!(points[0].x, Value::Int64(0));
                assert_eq!(points[99].x, Value::Int64(99));
                assert_eq!(points[99].y, Value::Float64(198.0));
            }
            other => panic!("expected points, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_or_missing_column_is_no_chart() {
        let table = sales();
        assert!(shape_chart(&table, "heatmap", "region", Some("units")).unwrap().is_none());
        assert!(shape_chart(&table, "none", "region", None).unwrap().is_none());
        assert!(shape_chart(&table, "bar", "region", None).unwrap().is_none());
        assert!(shape_chart(&table, "pie", "region", None).unwrap().is_some());
        assert_eq!(ChartKind::parse("Bar"), None);
    }

    #[test]
    fn unknown_column_is_an_error() {
        let err = shape_chart(&sales(), "line", "nope", Some("units")).unwrap_err();
        assert!(matches!(err, IngestionError::UnknownColumn { column } if column == "nope"));
    }

    #[test]
    fn serializes_in_the_rendering_shapes() {
        let table = sales();
        let pie = shape_chart(&table, "pie", "region", None).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&pie).unwrap(),
            serde_json::json!({
                "labels": ["a", "c", "b"],
                "datasets": [{"label": "region", "data": [2, 2, 1]}]
            })
        );

        let scatter = shape_chart(&table, "scatter", "units", Some("price")).unwrap().unwrap();
        let json = serde_json::to_value(&scatter).unwrap();
        assert_eq!(json["x_column"], "units");
        assert_eq!(json["datasets"][0]["data"][0], serde_json::json!({"x": 5, "y": 1.5}));
    }
}
