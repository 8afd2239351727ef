//! Collaborator interface: the REST endpoints the designer consumes, as a
//! trait plus the payloads that cross it.

pub mod memory;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::blueprint::WidgetType;
use crate::model::{Cardinality, JoinEdge, JoinType, TableCardLayout};
use crate::schema::Table;
use crate::widget::{DashboardConfig, WidgetDataConfig};

pub use memory::MemoryBackend;

/// One result row; key order is the column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

/// Decode an HTTP `(status, body)` pair from the host's fetch layer.
pub fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, BackendError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().chars().take(200).collect());
        return Err(BackendError::Status { status, message });
    }
    Ok(serde_json::from_str(body)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLayout {
    pub table_name: String,
    pub x_pos: f64,
    pub y_pos: f64,
    #[serde(default)]
    pub collapsed: bool,
}

impl From<StoredLayout> for TableCardLayout {
    fn from(s: StoredLayout) -> Self {
        TableCardLayout {
            table_name: s.table_name,
            x: s.x_pos,
            y: s.y_pos,
            collapsed: s.collapsed,
        }
    }
}

/// Join row from the schema store. Type and cardinality arrive as loose strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredJoin {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    #[serde(default)]
    pub join_type: Option<String>,
    #[serde(default)]
    pub cardinality: Option<String>,
}

impl StoredJoin {
    /// Missing or unknown cardinality is inferred from `(left_pk, right_pk)`.
    pub fn to_edge(&self, left_pk: bool, right_pk: bool) -> JoinEdge {
        JoinEdge {
            left_table: self.left_table.clone(),
            left_column: self.left_column.clone(),
            right_table: self.right_table.clone(),
            right_column: self.right_column.clone(),
            join_type: self
                .join_type
                .as_deref()
                .and_then(JoinType::from_str)
                .unwrap_or_default(),
            cardinality: self
                .cardinality
                .as_deref()
                .and_then(Cardinality::from_str)
                .unwrap_or_else(|| Cardinality::infer(left_pk, right_pk)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaPayload {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub layout: Vec<StoredLayout>,
    #[serde(default)]
    pub joins: Vec<StoredJoin>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveModelRequest {
    pub layout: Vec<TableCardLayout>,
    pub joins: Vec<JoinEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveModelResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestJoinsRequest {
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Predefined,
    AutoFk,
    #[serde(other)]
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedEdge {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    #[serde(default)]
    pub join_type: Option<String>,
    pub source: SuggestionSource,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggestJoinsResponse {
    #[serde(default)]
    pub edges: Vec<SuggestedEdge>,
    #[serde(default)]
    pub chosen: Vec<SuggestedEdge>,
    #[serde(default)]
    pub needs_manual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchColumnsRequest {
    pub connection_id: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceColumn {
    pub source: String,
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
}

impl SourceColumn {
    pub fn new(source: &str, name: &str, typ: &str) -> Self {
        Self {
            source: source.to_string(),
            name: name.to_string(),
            typ: typ.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchColumnsResponse {
    #[serde(default)]
    pub columns: Vec<SourceColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDataRequest {
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    #[serde(rename = "dataConfig")]
    pub data_config: WidgetDataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDataResponse {
    pub success: bool,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The backend services the designer calls. Implementations own transport,
/// authentication and tenant scoping.
pub trait DesignerBackend {
    fn load_schema(&self, connection_id: &str, timeout: Duration)
    -> Result<SchemaPayload, BackendError>;

    fn save_model(
        &self,
        connection_id: &str,
        model: &SaveModelRequest,
    ) -> Result<SaveModelResponse, BackendError>;

    fn suggest_joins(
        &self,
        connection_id: &str,
        request: &SuggestJoinsRequest,
    ) -> Result<SuggestJoinsResponse, BackendError>;

    fn batch_columns(&self, request: &BatchColumnsRequest)
    -> Result<BatchColumnsResponse, BackendError>;

    fn widget_data(
        &self,
        widget_id: &str,
        request: &WidgetDataRequest,
    ) -> Result<WidgetDataResponse, BackendError>;

    fn load_dashboard(&self) -> Result<DashboardConfig, BackendError>;

    fn save_dashboard(&self, config: &DashboardConfig) -> Result<(), BackendError>;
}

impl<B: DesignerBackend + ?Sized> DesignerBackend for std::rc::Rc<B> {
    fn load_schema(
        &self,
        connection_id: &str,
        timeout: Duration,
    ) -> Result<SchemaPayload, BackendError> {
        (**self).load_schema(connection_id, timeout)
    }

    fn save_model(
        &self,
        connection_id: &str,
        model: &SaveModelRequest,
    ) -> Result<SaveModelResponse, BackendError> {
        (**self).save_model(connection_id, model)
    }

    fn suggest_joins(
        &self,
        connection_id: &str,
        request: &SuggestJoinsRequest,
    ) -> Result<SuggestJoinsResponse, BackendError> {
        (**self).suggest_joins(connection_id, request)
    }

    fn batch_columns(
        &self,
        request: &BatchColumnsRequest,
    ) -> Result<BatchColumnsResponse, BackendError> {
        (**self).batch_columns(request)
    }

    fn widget_data(
        &self,
        widget_id: &str,
        request: &WidgetDataRequest,
    ) -> Result<WidgetDataResponse, BackendError> {
        (**self).widget_data(widget_id, request)
    }

    fn load_dashboard(&self) -> Result<DashboardConfig, BackendError> {
        (**self).load_dashboard()
    }

    fn save_dashboard(&self, config: &DashboardConfig) -> Result<(), BackendError> {
        (**self).save_dashboard(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_status() {
        let err = decode_response::<SaveModelResponse>(500, r#"{"error":"db down"}"#).unwrap_err();
        assert_eq!(
            err,
            BackendError::Status {
                status: 500,
                message: "db down".into()
            }
        );
    }

    #[test]
    fn test_decode_malformed_body() {
        let err = decode_response::<SaveModelResponse>(200, "<html>").unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[test]
    fn test_schema_payload_wire_names() {
        let body = r#"{
            "tables": [{"name": "orders", "columns": [
                {"name": "id", "type": "int", "isPrimaryKey": true, "isNumeric": true}
            ]}],
            "layout": [{"table_name": "orders", "x_pos": 10, "y_pos": 20, "collapsed": true}],
            "joins": [{"left_table": "orders", "left_column": "customer_id",
                       "right_table": "customers", "right_column": "id",
                       "join_type": "left", "cardinality": "many-to-one"}]
        }"#;
        let payload: SchemaPayload = decode_response(200, body).unwrap();
        let layout: TableCardLayout = payload.layout[0].clone().into();
        assert_eq!(layout.x, 10.0);
        assert!(layout.collapsed);
        let edge = payload.joins[0].to_edge(false, true);
        assert_eq!(edge.join_type, JoinType::Left);
        assert_eq!(edge.cardinality, Cardinality::ManyToOne);
    }

    #[test]
    fn test_suggestion_tags() {
        let body = r#"{"edges": [{"left_table": "a", "left_column": "b_id",
            "right_table": "b", "right_column": "id", "join_type": "INNER",
            "source": "name_match", "confidence": "high"}], "needs_manual": true}"#;
        let resp: SuggestJoinsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.edges[0].source, SuggestionSource::Heuristic);
        assert_eq!(resp.edges[0].confidence, Confidence::High);
        assert!(resp.chosen.is_empty());
    }

    #[test]
    fn test_rows_keep_key_order() {
        let body = r#"{"success": true, "rows": [{"zeta": 1, "alpha": 2}]}"#;
        let resp: WidgetDataResponse = serde_json::from_str(body).unwrap();
        let keys: Vec<&String> = resp.rows[0].keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
