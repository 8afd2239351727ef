//! Browser bindings. The page owns transport: it asks for a request, performs
//! the fetch, then hands back the HTTP status and body.

use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;

use serde::Serialize;
use serde_json::json;
use wasm_bindgen::prelude::*;

use crate::backend::{
    BatchColumnsResponse, MemoryBackend, SchemaPayload, SuggestJoinsResponse, WidgetDataResponse,
    decode_response,
};
use crate::blueprint::WidgetType;
use crate::catalog::{RefreshOutcome, RefreshTicket};
use crate::config::DesignerConfig;
use crate::model::{Cardinality, ColumnRef, JoinType};
use crate::render::{RenderOutcome, RenderTicket};
use crate::session::DesignerSession;
use crate::widget::Aggregation;

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_error)
}

fn column_ref(s: &str) -> Result<ColumnRef, JsValue> {
    ColumnRef::parse(s).ok_or_else(|| js_error(format!("expected table.column, got '{}'", s)))
}

#[wasm_bindgen]
pub struct WasmDesigner {
    backend: Rc<MemoryBackend>,
    session: DesignerSession,
    catalog_tickets: HashMap<u64, RefreshTicket>,
    render_tickets: HashMap<u64, RenderTicket>,
}

#[wasm_bindgen]
impl WasmDesigner {
    /// `config` is optional TOML.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<WasmDesigner, JsValue> {
        let backend = Rc::new(MemoryBackend::new());
        let session = match config.as_deref() {
            Some(source) => {
                DesignerSession::from_toml(source, Box::new(backend.clone())).map_err(js_error)?
            }
            None => DesignerSession::new(DesignerConfig::default(), Box::new(backend.clone())),
        };
        Ok(Self {
            backend,
            session,
            catalog_tickets: HashMap::new(),
            render_tickets: HashMap::new(),
        })
    }

    /// Load a schema payload fetched by the page into the join graph canvas.
    #[wasm_bindgen(js_name = "loadSchema")]
    pub fn load_schema(&mut self, connection_id: &str, payload: &str) -> Result<String, JsValue> {
        let payload: SchemaPayload = serde_json::from_str(payload).map_err(js_error)?;
        self.backend.set_schema(connection_id, payload);
        self.session.set_source(Some(connection_id), Vec::new());
        let report = self.session.load_model().map_err(js_error)?;
        Ok(report.summary().unwrap_or_default())
    }

    #[wasm_bindgen(js_name = "exportModel")]
    pub fn export_model(&self) -> Result<String, JsValue> {
        to_json(&self.session.editor().export_model())
    }

    #[wasm_bindgen(js_name = "canvasSvg")]
    pub fn canvas_svg(&self) -> String {
        self.session.canvas_svg()
    }

    #[wasm_bindgen(js_name = "addTable")]
    pub fn add_table(&mut self, name: &str, x: f64, y: f64) -> Result<(), JsValue> {
        self.session
            .edit(|editor| editor.add_table(name, x, y))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "moveTable")]
    pub fn move_table(&mut self, name: &str, x: f64, y: f64) -> Result<(), JsValue> {
        self.session
            .edit(|editor| editor.move_table(name, x, y))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "setCollapsed")]
    pub fn set_collapsed(&mut self, table: &str, collapsed: bool) -> Result<(), JsValue> {
        self.session
            .edit(|editor| editor.set_collapsed(table, collapsed))
            .map_err(js_error)
    }

    /// Returns the new edge id.
    #[wasm_bindgen(js_name = "addJoin")]
    pub fn add_join(
        &mut self,
        left: &str,
        right: &str,
        join_type: Option<String>,
    ) -> Result<f64, JsValue> {
        let left = column_ref(left)?;
        let right = column_ref(right)?;
        let join_type = join_type
            .as_deref()
            .and_then(JoinType::from_str)
            .unwrap_or_default();
        self.session
            .edit(|editor| editor.add_join(&left, &right, join_type))
            .map(|id| id as f64)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "removeJoin")]
    pub fn remove_join(&mut self, edge_id: f64) -> Result<(), JsValue> {
        self.session
            .edit(|editor| editor.remove_join(edge_id as u64).map(|_| ()))
            .map_err(js_error)
    }

    /// Change join type and/or cardinality; `None` leaves that attribute alone.
    #[wasm_bindgen(js_name = "updateJoin")]
    pub fn update_join(
        &mut self,
        edge_id: f64,
        join_type: Option<String>,
        cardinality: Option<String>,
    ) -> Result<(), JsValue> {
        let join_type = match join_type.as_deref() {
            Some(s) => Some(
                JoinType::from_str(s)
                    .ok_or_else(|| js_error(format!("unknown join type '{}'", s)))?,
            ),
            None => None,
        };
        let cardinality = match cardinality.as_deref() {
            Some(s) => Some(
                Cardinality::from_str(s)
                    .ok_or_else(|| js_error(format!("unknown cardinality '{}'", s)))?,
            ),
            None => None,
        };
        self.session
            .edit(|editor| editor.update_join(edge_id as u64, join_type, cardinality))
            .map_err(js_error)
    }

    // Connector drag

    #[wasm_bindgen(js_name = "beginConnect")]
    pub fn begin_connect(&mut self, from: &str) -> Result<(), JsValue> {
        let from = column_ref(from)?;
        self.session
            .edit(|editor| editor.begin_connect(from))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "dragConnect")]
    pub fn drag_connect(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.session
            .edit(|editor| {
                editor.drag_connect(x, y);
                Ok(())
            })
            .map_err(js_error)
    }

    /// Drop the connector on a column; returns the new edge id.
    #[wasm_bindgen(js_name = "finishConnect")]
    pub fn finish_connect(&mut self, target: &str) -> Result<f64, JsValue> {
        let target = column_ref(target)?;
        self.session
            .edit(|editor| editor.finish_connect(target))
            .map(|id| id as f64)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "cancelConnect")]
    pub fn cancel_connect(&mut self) -> Result<(), JsValue> {
        self.session
            .edit(|editor| {
                editor.cancel_connect();
                Ok(())
            })
            .map_err(js_error)
    }

    // Join suggestions

    /// Body for the page's `suggest-joins` fetch.
    #[wasm_bindgen(js_name = "suggestionRequest")]
    pub fn suggestion_request(&self) -> Result<String, JsValue> {
        to_json(&self.session.editor().suggestion_request())
    }

    /// Apply a `suggest-joins` response. Returns `{"pending": n, "needsManual": bool}`.
    #[wasm_bindgen(js_name = "receiveSuggestions")]
    pub fn receive_suggestions(&mut self, status: u16, body: &str) -> Result<String, JsValue> {
        let response = decode_response::<SuggestJoinsResponse>(status, body);
        let batch = self.session.receive_suggestions(response).map_err(js_error)?;
        to_json(&json!({ "pending": batch.pending, "needsManual": batch.needs_manual }))
    }

    /// Pending suggestions as `[{"id", "edge"}]`.
    pub fn suggestions(&self) -> Result<String, JsValue> {
        let pending: Vec<_> = self
            .session
            .editor()
            .suggestions()
            .iter()
            .map(|s| json!({ "id": s.id, "edge": s.edge }))
            .collect();
        to_json(&pending)
    }

    /// Returns the new edge id.
    #[wasm_bindgen(js_name = "acceptSuggestion")]
    pub fn accept_suggestion(&mut self, id: f64) -> Result<f64, JsValue> {
        self.session
            .accept_suggestion(id as u64)
            .map(|edge| edge as f64)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "rejectSuggestion")]
    pub fn reject_suggestion(&mut self, id: f64) -> Result<(), JsValue> {
        self.session.reject_suggestion(id as u64).map_err(js_error)
    }

    /// Returns how many suggestions became joins; failures arrive as notices.
    #[wasm_bindgen(js_name = "acceptHighConfidence")]
    pub fn accept_high_confidence(&mut self) -> u32 {
        self.session.accept_high_confidence().accepted.len() as u32
    }

    #[wasm_bindgen(js_name = "autoArrange")]
    pub fn auto_arrange(&mut self) -> Result<(), JsValue> {
        self.session.auto_arrange().map_err(js_error)
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    #[wasm_bindgen(js_name = "setViewport")]
    pub fn set_viewport(&mut self, zoom: f64, scroll_x: f64, scroll_y: f64) -> Result<(), JsValue> {
        self.session
            .edit(|editor| {
                editor.set_viewport(zoom, scroll_x, scroll_y);
                Ok(())
            })
            .map_err(js_error)
    }

    // Field catalog

    /// Returns `{"ticket": n, "request": {...}}` when a fetch is needed,
    /// otherwise `{"state": "empty" | "unchanged", ...}`.
    #[wasm_bindgen(js_name = "beginCatalogRefresh")]
    pub fn begin_catalog_refresh(
        &mut self,
        connection_id: Option<String>,
        tables: &str,
    ) -> Result<String, JsValue> {
        let tables: Vec<String> = serde_json::from_str(tables).map_err(js_error)?;
        self.session.set_source(connection_id.as_deref(), tables);
        let value = match self.session.begin_catalog_refresh() {
            RefreshOutcome::Pending(ticket) => {
                let value = json!({ "ticket": ticket.generation, "request": ticket.request() });
                self.catalog_tickets.clear();
                self.catalog_tickets.insert(ticket.generation, ticket);
                value
            }
            RefreshOutcome::Empty(state) => json!({ "state": "empty", "message": state.message() }),
            _ => json!({ "state": "unchanged" }),
        };
        to_json(&value)
    }

    /// Apply a `batch-columns` response. Returns "applied", "stale" or "failed".
    #[wasm_bindgen(js_name = "completeCatalogRefresh")]
    pub fn complete_catalog_refresh(&mut self, ticket: f64, status: u16, body: &str) -> String {
        let Some(ticket) = self.catalog_tickets.remove(&(ticket as u64)) else {
            return "stale".to_string();
        };
        let response = decode_response::<BatchColumnsResponse>(status, body);
        match self.session.complete_catalog_refresh(ticket, response) {
            RefreshOutcome::Applied { .. } => "applied",
            RefreshOutcome::Failed(_) => "failed",
            _ => "stale",
        }
        .to_string()
    }

    #[wasm_bindgen(js_name = "searchFields")]
    pub fn search_fields(&self, term: &str) -> Result<String, JsValue> {
        to_json(&self.session.search_fields(term))
    }

    // Dashboard

    #[wasm_bindgen(js_name = "loadDashboard")]
    pub fn load_dashboard(&mut self, document: &str) -> Result<(), JsValue> {
        self.session.import_dashboard(document).map_err(js_error)?;
        self.render_tickets.clear();
        Ok(())
    }

    #[wasm_bindgen(js_name = "dashboardJson")]
    pub fn dashboard_json(&self) -> Result<String, JsValue> {
        to_json(self.session.dashboard())
    }

    #[wasm_bindgen(js_name = "addWidget")]
    pub fn add_widget(&mut self, widget_type: &str) -> Result<String, JsValue> {
        self.session
            .add_widget(WidgetType::parse(widget_type))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "removeWidget")]
    pub fn remove_widget(&mut self, widget_id: &str) -> Result<(), JsValue> {
        self.session.remove_widget(widget_id).map(|_| ()).map_err(js_error)
    }

    #[wasm_bindgen(js_name = "focusWidget")]
    pub fn focus_widget(&mut self, widget_id: &str) -> Result<(), JsValue> {
        self.session.focus_widget(widget_id).map_err(js_error)
    }

    /// Click-assign; returns the slot key.
    pub fn assign(&mut self, widget_id: &str, field_id: &str) -> Result<String, JsValue> {
        self.session.assign_field(widget_id, field_id).map_err(js_error)
    }

    #[wasm_bindgen(js_name = "assignToSlot")]
    pub fn assign_to_slot(
        &mut self,
        widget_id: &str,
        slot: &str,
        field_id: &str,
    ) -> Result<String, JsValue> {
        self.session
            .assign_field_to_slot(widget_id, slot, field_id)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "setAggregation")]
    pub fn set_aggregation(
        &mut self,
        widget_id: &str,
        field_id: &str,
        aggregation: &str,
    ) -> Result<(), JsValue> {
        let aggregation = Aggregation::from_str(aggregation)
            .ok_or_else(|| js_error(format!("unknown aggregation '{}'", aggregation)))?;
        self.session
            .set_aggregation(widget_id, field_id, aggregation)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "removeField")]
    pub fn remove_field(
        &mut self,
        widget_id: &str,
        slot: &str,
        field_id: &str,
    ) -> Result<(), JsValue> {
        self.session
            .remove_field(widget_id, slot, field_id)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "changeWidgetType")]
    pub fn change_widget_type(
        &mut self,
        widget_id: &str,
        widget_type: &str,
    ) -> Result<u32, JsValue> {
        self.session
            .change_widget_type(widget_id, WidgetType::parse(widget_type))
            .map(|dropped| dropped as u32)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = "validateWidget")]
    pub fn validate_widget(&self, widget_id: &str) -> Result<String, JsValue> {
        to_json(&self.session.validate_widget(widget_id))
    }

    // Rendering

    /// Returns `{"ticket": n, "request": {...}}`; the widget shows Loading.
    #[wasm_bindgen(js_name = "beginRender")]
    pub fn begin_render(&mut self, widget_id: &str) -> Result<String, JsValue> {
        let ticket = self.session.begin_render(widget_id).map_err(js_error)?;
        let value = json!({ "ticket": ticket.generation, "request": ticket.request });
        self.render_tickets
            .retain(|_, pending| pending.widget_id != ticket.widget_id);
        self.render_tickets.insert(ticket.generation, ticket);
        to_json(&value)
    }

    /// Apply a widget-data response. Returns the visual, or `null` if stale.
    #[wasm_bindgen(js_name = "completeRender")]
    pub fn complete_render(
        &mut self,
        ticket: f64,
        status: u16,
        body: &str,
    ) -> Result<String, JsValue> {
        let Some(ticket) = self.render_tickets.remove(&(ticket as u64)) else {
            return Ok("null".to_string());
        };
        let response = decode_response::<WidgetDataResponse>(status, body);
        match self.session.complete_render(&ticket, response) {
            RenderOutcome::Shown => to_json(&self.session.visual(&ticket.widget_id)),
            RenderOutcome::Stale => Ok("null".to_string()),
        }
    }

    #[wasm_bindgen(js_name = "resizeWidget")]
    pub fn resize_widget(&mut self, widget_id: &str, width: f64, height: f64) {
        self.session.resize_widget(widget_id, width, height);
    }

    #[wasm_bindgen(js_name = "setTheme")]
    pub fn set_theme(&mut self, theme: &str) {
        self.session.set_theme(theme);
    }

    /// Drain queued notices as `[{"level", "message"}]`.
    #[wasm_bindgen(js_name = "takeNotices")]
    pub fn take_notices(&mut self) -> Result<String, JsValue> {
        to_json(&self.session.take_notices())
    }
}
