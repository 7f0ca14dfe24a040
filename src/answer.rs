//! The boundary to the question-answering collaborator.
//!
//! An [`InsightProvider`] receives a [`QueryContext`] (question, cleaned table, schema, summary)
//! and returns loosely structured JSON. [`QueryAnswer::parse`] is the only way that JSON enters
//! the crate:
//!
//! - `answer_text` must be a string
//! - `chart_type` outside `bar`/`line`/`pie`/`scatter`/`none` becomes `None`
//! - `recommendations` given as a string becomes a one-element list (none for `""`); any other
//!   non-list becomes an empty list; list items must be strings
//! - `chart_data`, when present, must be an object of the chart payload shape
//! - `sql_query`, when present, must be a string
//!
//! [`Copilot`] wires a [`TableStore`] and a provider together.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::warn;

use crate::chart::{shape_chart, ChartData, ChartKind};
use crate::cleaning::CleanedTable;
use crate::error::IngestionResult;
use crate::schema::SchemaMap;
use crate::store::metadata::sample_rows;
use crate::store::{TableId, TableStore};
use crate::summary::SummaryReport;

/// Sample rows included in [`QueryContext::prompt`].
pub const PROMPT_SAMPLE_ROWS: usize = 3;

/// Why a provider's output was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("answer must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("answer is missing '{0}'")]
    MissingField(&'static str),

    #[error("answer field '{field}' {message}")]
    InvalidField { field: &'static str, message: String },
}

impl AnswerError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

/// A provider failure (transport, quota, unparseable reply, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One series in a provider-supplied chart payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadDataset {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub data: Vec<JsonValue>,
}

/// Chart data as a provider supplies it. Same shape as [`ChartData`], every part optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasets: Option<Vec<PayloadDataset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_column: Option<String>,
}

/// A validated answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub answer_text: String,
    pub chart_type: Option<ChartKind>,
    pub chart_data: Option<ChartPayload>,
    pub recommendations: Vec<String>,
    /// Query the provider reports having run, for transparency.
    pub sql_query: Option<String>,
}

impl QueryAnswer {
    /// An answer carrying only an error message.
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            answer_text: format!("Error: {message}"),
            chart_type: None,
            chart_data: None,
            recommendations: Vec::new(),
            sql_query: None,
        }
    }

    /// Validate and normalize provider output.
    pub fn parse(value: JsonValue) -> Result<Self, AnswerError> {
        let mut obj = match value {
            JsonValue::Object(obj) => obj,
            other => return Err(AnswerError::NotAnObject(json_kind(&other))),
        };

        let answer_text = match obj.remove("answer_text") {
            Some(JsonValue::String(s)) => s,
            None | Some(JsonValue::Null) => return Err(AnswerError::MissingField("answer_text")),
            Some(other) => {
                return Err(AnswerError::invalid(
                    "answer_text",
                    format!("must be a string, got {}", json_kind(&other)),
                ));
            }
        };

        let chart_type = match obj.get("chart_type") {
            Some(JsonValue::String(s)) => ChartKind::parse(s),
            _ => None,
        };

        let chart_data = match obj.remove("chart_data") {
            None | Some(JsonValue::Null) => None,
            Some(v @ JsonValue::Object(_)) => Some(
                serde_json::from_value::<ChartPayload>(v)
                    .map_err(|e| AnswerError::invalid("chart_data", e.to_string()))?,
            ),
            Some(other) => {
                return Err(AnswerError::invalid(
                    "chart_data",
                    format!("must be an object, got {}", json_kind(&other)),
                ));
            }
        };

        let recommendations = match obj.remove("recommendations") {
            Some(JsonValue::String(s)) if s.is_empty() => Vec::new(),
            Some(JsonValue::String(s)) => vec![s],
            Some(JsonValue::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    JsonValue::String(s) => Ok(s),
                    other => Err(AnswerError::invalid(
                        "recommendations",
                        format!("item {i} must be a string, got {}", json_kind(&other)),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        let sql_query = match obj.remove("sql_query") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s),
            Some(other) => {
                return Err(AnswerError::invalid(
                    "sql_query",
                    format!("must be a string, got {}", json_kind(&other)),
                ));
            }
        };

        Ok(Self {
            answer_text,
            chart_type,
            chart_data,
            recommendations,
            sql_query,
        })
    }
}

fn json_kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Everything a provider may use to answer a question about one table.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub question: &'a str,
    pub table: &'a CleanedTable,
    pub schema: &'a SchemaMap,
    pub summary: &'a SummaryReport,
}

impl QueryContext<'_> {
    /// One `  - column: type` line per column.
    pub fn schema_lines(&self) -> String {
        self.schema
            .iter()
            .map(|(name, tag)| format!("  - {name}: {tag}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The first `n` rows as JSON objects.
    pub fn sample_rows(&self, n: usize) -> IngestionResult<Vec<Map<String, JsonValue>>> {
        sample_rows(self.table, n)
    }

    /// Schema, a few sample rows and the question as one prompt.
    pub fn prompt(&self) -> IngestionResult<String> {
        let rows = serde_json::to_string(&self.sample_rows(PROMPT_SAMPLE_ROWS)?)?;
        Ok(format!(
            "Schema:\n{}\n\nSample Data:\n{rows}\n\nQuestion: {}",
            self.schema_lines(),
            self.question
        ))
    }
}

/// Something that answers questions about a table.
pub trait InsightProvider: Send + Sync {
    fn answer(&self, ctx: &QueryContext<'_>) -> Result<JsonValue, ProviderError>;
}

impl<F> InsightProvider for F
where
    F: Fn(&QueryContext<'_>) -> Result<JsonValue, ProviderError> + Send + Sync,
{
    fn answer(&self, ctx: &QueryContext<'_>) -> Result<JsonValue, ProviderError> {
        self(ctx)
    }
}

/// Questions and charts over stored tables.
#[derive(Clone)]
pub struct Copilot {
    store: Arc<TableStore>,
    provider: Arc<dyn InsightProvider>,
}

impl fmt::Debug for Copilot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Copilot").field("store", &self.store).finish_non_exhaustive()
    }
}

impl Copilot {
    pub fn new(store: Arc<TableStore>, provider: Arc<dyn InsightProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    /// Answer `question` about table `id`.
    ///
    /// Store errors (`NotFound` in particular) are returned as errors. A failing provider or a
    /// rejected answer is not: it becomes an answer whose text starts with `Error:`.
    pub fn ask(&self, id: &TableId, question: &str) -> IngestionResult<QueryAnswer> {
        let table = self.store.get_table(id)?;
        let metadata = self.store.get_metadata(id)?;
        let ctx = QueryContext {
            question,
            table: &table,
            schema: &metadata.schema,
            summary: &metadata.summary,
        };

        let answer = match self.provider.answer(&ctx) {
            Ok(value) => QueryAnswer::parse(value).unwrap_or_else(|e| {
                warn!(table_id = %id, error = %e, "rejected provider answer");
                QueryAnswer::error(e)
            }),
            Err(e) => {
                warn!(table_id = %id, error = %e, "provider failed");
                QueryAnswer::error(e)
            }
        };
        Ok(answer)
    }

    /// Shape a chart for table `id`. `Ok(None)` when `kind` asks for no chart.
    pub fn chart(
        &self,
        id: &TableId,
        kind: &str,
        x: &str,
        y: Option<&str>,
    ) -> IngestionResult<Option<ChartData>> {
        let table = self.store.get_table(id)?;
        shape_chart(&table, kind, x, y)
    }
}
