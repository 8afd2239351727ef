//! In-process backend for tests and offline use.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use super::{
    BackendError, BatchColumnsRequest, BatchColumnsResponse, DesignerBackend, Row,
    SaveModelRequest, SaveModelResponse, SchemaPayload, SourceColumn, StoredJoin, StoredLayout,
    SuggestJoinsRequest, SuggestJoinsResponse, WidgetDataRequest, WidgetDataResponse,
};
use crate::widget::DashboardConfig;

#[derive(Debug, Default)]
struct State {
    schemas: HashMap<String, SchemaPayload>,
    suggestions: HashMap<String, SuggestJoinsResponse>,
    rows: HashMap<String, Result<Vec<Row>, String>>,
    dashboard: Option<DashboardConfig>,
    saved_models: Vec<(String, SaveModelRequest)>,
    widget_requests: Vec<(String, WidgetDataRequest)>,
    save_failure: Option<BackendError>,
    load_latency: Duration,
}

/// Backend that serves canned payloads and records what it was sent.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RefCell<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(self, connection_id: &str, schema: SchemaPayload) -> Self {
        self.set_schema(connection_id, schema);
        self
    }

    pub fn with_suggestions(self, connection_id: &str, response: SuggestJoinsResponse) -> Self {
        self.state
            .borrow_mut()
            .suggestions
            .insert(connection_id.to_string(), response);
        self
    }

    pub fn with_dashboard(self, dashboard: DashboardConfig) -> Self {
        self.state.borrow_mut().dashboard = Some(dashboard);
        self
    }

    pub fn set_schema(&self, connection_id: &str, schema: SchemaPayload) {
        self.state
            .borrow_mut()
            .schemas
            .insert(connection_id.to_string(), schema);
    }

    pub fn set_rows(&self, widget_id: &str, rows: Vec<Row>) {
        self.state
            .borrow_mut()
            .rows
            .insert(widget_id.to_string(), Ok(rows));
    }

    pub fn set_widget_error(&self, widget_id: &str, message: &str) {
        self.state
            .borrow_mut()
            .rows
            .insert(widget_id.to_string(), Err(message.to_string()));
    }

    /// Every following save fails with `error` until cleared with `None`.
    pub fn fail_saves(&self, error: Option<BackendError>) {
        self.state.borrow_mut().save_failure = error;
    }

    /// Simulated time the schema load takes.
    pub fn set_load_latency(&self, latency: Duration) {
        self.state.borrow_mut().load_latency = latency;
    }

    pub fn saved_models(&self) -> Vec<(String, SaveModelRequest)> {
        self.state.borrow().saved_models.clone()
    }

    pub fn widget_requests(&self) -> Vec<(String, WidgetDataRequest)> {
        self.state.borrow().widget_requests.clone()
    }

    pub fn dashboard(&self) -> Option<DashboardConfig> {
        self.state.borrow().dashboard.clone()
    }
}

impl DesignerBackend for MemoryBackend {
    fn load_schema(
        &self,
        connection_id: &str,
        timeout: Duration,
    ) -> Result<SchemaPayload, BackendError> {
        let state = self.state.borrow();
        if state.load_latency > timeout {
            return Err(BackendError::Timeout(timeout));
        }
        state
            .schemas
            .get(connection_id)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                status: 404,
                message: format!("unknown connection {}", connection_id),
            })
    }

    fn save_model(
        &self,
        connection_id: &str,
        model: &SaveModelRequest,
    ) -> Result<SaveModelResponse, BackendError> {
        let mut state = self.state.borrow_mut();
        if let Some(err) = state.save_failure.clone() {
            return Err(err);
        }
        let schema = state
            .schemas
            .entry(connection_id.to_string())
            .or_default();
        schema.layout = model
            .layout
            .iter()
            .map(|l| StoredLayout {
                table_name: l.table_name.clone(),
                x_pos: l.x,
                y_pos: l.y,
                collapsed: l.collapsed,
            })
            .collect();
        schema.joins = model
            .joins
            .iter()
            .map(|j| StoredJoin {
                left_table: j.left_table.clone(),
                left_column: j.left_column.clone(),
                right_table: j.right_table.clone(),
                right_column: j.right_column.clone(),
                join_type: Some(j.join_type.as_str().to_string()),
                cardinality: serde_json::to_value(j.cardinality)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string)),
            })
            .collect();
        state
            .saved_models
            .push((connection_id.to_string(), model.clone()));
        Ok(SaveModelResponse {
            success: true,
            error: None,
        })
    }

    fn suggest_joins(
        &self,
        connection_id: &str,
        request: &SuggestJoinsRequest,
    ) -> Result<SuggestJoinsResponse, BackendError> {
        let state = self.state.borrow();
        let mut response = state
            .suggestions
            .get(connection_id)
            .cloned()
            .unwrap_or_default();
        let selected = |t: &str| request.tables.iter().any(|s| s == t);
        response
            .edges
            .retain(|e| selected(&e.left_table) && selected(&e.right_table));
        Ok(response)
    }

    fn batch_columns(
        &self,
        request: &BatchColumnsRequest,
    ) -> Result<BatchColumnsResponse, BackendError> {
        let state = self.state.borrow();
        let schema = state
            .schemas
            .get(&request.connection_id)
            .ok_or_else(|| BackendError::Status {
                status: 404,
                message: format!("unknown connection {}", request.connection_id),
            })?;
        let columns = schema
            .tables
            .iter()
            .filter(|t| request.tables.contains(&t.name))
            .flat_map(|t| {
                t.columns
                    .iter()
                    .map(move |c| SourceColumn::new(&t.name, &c.name, &c.typ))
            })
            .collect();
        Ok(BatchColumnsResponse { columns })
    }

    fn widget_data(
        &self,
        widget_id: &str,
        request: &WidgetDataRequest,
    ) -> Result<WidgetDataResponse, BackendError> {
        let mut state = self.state.borrow_mut();
        state
            .widget_requests
            .push((widget_id.to_string(), request.clone()));
        match state.rows.get(widget_id) {
            Some(Ok(rows)) => Ok(WidgetDataResponse {
                success: true,
                rows: rows.clone(),
                error: None,
            }),
            Some(Err(message)) => Ok(WidgetDataResponse {
                success: false,
                rows: Vec::new(),
                error: Some(message.clone()),
            }),
            None => Ok(WidgetDataResponse {
                success: true,
                rows: Vec::new(),
                error: None,
            }),
        }
    }

    fn load_dashboard(&self) -> Result<DashboardConfig, BackendError> {
        Ok(self.state.borrow().dashboard.clone().unwrap_or_default())
    }

    fn save_dashboard(&self, config: &DashboardConfig) -> Result<(), BackendError> {
        self.state.borrow_mut().dashboard = Some(config.clone());
        Ok(())
    }
}
