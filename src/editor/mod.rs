//! Join graph editor: tables on a canvas, joins between their columns.
//!
//! The card layout store (`cards`) is the only source of positions; the SVG
//! view and the exporter both read it. Every structural mutation commits a
//! full [`ModelSnapshot`] to the history; undo/redo rebuild the canvas from
//! a snapshot, tables first, then joins resolved by `(table, column)`.

mod history;

pub use history::History;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{
    BackendError, Confidence, DesignerBackend, SaveModelRequest, SchemaPayload,
    SuggestJoinsRequest, SuggestJoinsResponse, SuggestedEdge,
};
use crate::layout::{ArrangeEdge, ArrangeEngine, ArrangeNode, LayoutError};
use crate::measure::TextMetrics;
use crate::model::{
    Cardinality, ColumnRef, JoinEdge, JoinType, ModelSnapshot, TableCardLayout, Viewport,
};
use crate::schema::{DataKind, Table};

pub type EdgeId = u64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("table '{0}' is not in the schema")]
    UnknownTable(String),
    #[error("table '{0}' is not on the canvas")]
    NotOnCanvas(String),
    #[error("table '{0}' is already on the canvas")]
    AlreadyOnCanvas(String),
    #[error("column '{0}' does not exist")]
    UnknownColumn(String),
    #[error("cannot join table '{0}' to itself")]
    SelfJoin(String),
    #[error("cannot join {left} ({left_kind:?}) to {right} ({right_kind:?}): incompatible types")]
    Incompatible {
        left: String,
        right: String,
        left_kind: DataKind,
        right_kind: DataKind,
    },
    #[error("{left} and {right} are already joined")]
    DuplicateJoin { left: String, right: String },
    #[error("columns of collapsed table '{0}' are hidden")]
    CollapsedTable(String),
    #[error("invalid position ({x}, {y})")]
    InvalidPosition { x: f64, y: f64 },
    #[error("no join with id {0}")]
    UnknownEdge(EdgeId),
    #[error("no pending suggestion with id {0}")]
    UnknownSuggestion(u64),
    #[error("no connector drag in progress")]
    NotConnecting,
    #[error("no table drag in progress")]
    NotMoving,
    #[error("auto-arrange failed: {0}")]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("save rejected: {0}")]
    SaveRejected(String),
}

/// Where an edge attaches to a card. A collapsed card hides its rows, so its
/// edges attach to the header and remember the column they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Column(String),
    Header { original_column: String },
}

impl Anchor {
    /// The join column this anchor stands for.
    pub fn column(&self) -> &str {
        match self {
            Anchor::Column(column) => column,
            Anchor::Header { original_column } => original_column,
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Anchor::Header { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeEnd {
    pub table: String,
    pub anchor: Anchor,
}

impl EdgeEnd {
    fn new(table: &str, column: &str, collapsed: bool) -> Self {
        let mut end = Self {
            table: table.to_string(),
            anchor: Anchor::Column(column.to_string()),
        };
        end.reroute(collapsed);
        end
    }

    fn reroute(&mut self, collapsed: bool) {
        let column = self.anchor.column().to_string();
        self.anchor = if collapsed {
            Anchor::Header {
                original_column: column,
            }
        } else {
            Anchor::Column(column)
        };
    }

    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(&self.table, self.anchor.column())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasEdge {
    pub id: EdgeId,
    pub left: EdgeEnd,
    pub right: EdgeEnd,
    pub join_type: JoinType,
    pub cardinality: Cardinality,
}

impl CanvasEdge {
    /// The persisted form, with header anchors resolved to original columns.
    pub fn to_join(&self) -> JoinEdge {
        JoinEdge {
            left_table: self.left.table.clone(),
            left_column: self.left.anchor.column().to_string(),
            right_table: self.right.table.clone(),
            right_column: self.right.anchor.column().to_string(),
            join_type: self.join_type,
            cardinality: self.cardinality,
        }
    }

    fn connects(&self, a: &ColumnRef, b: &ColumnRef) -> bool {
        let (left, right) = (self.left.column_ref(), self.right.column_ref());
        (left == *a && right == *b) || (left == *b && right == *a)
    }

    fn touches(&self, table: &str) -> bool {
        self.left.table == table || self.right.table == table
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorState {
    Idle,
    Dragging {
        from: ColumnRef,
        cursor: Option<(f64, f64)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSuggestion {
    pub id: u64,
    pub edge: SuggestedEdge,
}

impl PendingSuggestion {
    pub fn left(&self) -> ColumnRef {
        ColumnRef::new(&self.edge.left_table, &self.edge.left_column)
    }

    pub fn right(&self) -> ColumnRef {
        ColumnRef::new(&self.edge.right_table, &self.edge.right_column)
    }

    pub fn join_type(&self) -> JoinType {
        self.edge
            .join_type
            .as_deref()
            .and_then(JoinType::from_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionBatch {
    pub pending: usize,
    pub needs_manual: bool,
}

#[derive(Debug, Default)]
pub struct BulkAccept {
    pub accepted: Vec<EdgeId>,
    pub failed: Vec<EditorError>,
}

/// References dropped while rebuilding the canvas from stored state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub dropped_tables: Vec<String>,
    pub dropped_joins: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.dropped_tables.is_empty() && self.dropped_joins.is_empty()
    }

    /// One-line summary for the user, e.g. "3 joins removed due to schema changes".
    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.dropped_tables.is_empty() {
            parts.push(plural(self.dropped_tables.len(), "table"));
        }
        if !self.dropped_joins.is_empty() {
            parts.push(plural(self.dropped_joins.len(), "join"));
        }
        if parts.is_empty() {
            return None;
        }
        Some(format!("{} removed due to schema changes", parts.join(" and ")))
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

struct TableDrag {
    table: String,
    origin: (f64, f64),
}

pub struct JoinGraphEditor {
    schema: IndexMap<String, Table>,
    cards: IndexMap<String, TableCardLayout>,
    edges: Vec<CanvasEdge>,
    next_edge_id: EdgeId,
    viewport: Viewport,
    history: History,
    dirty: bool,
    connector: ConnectorState,
    table_drag: Option<TableDrag>,
    repaints: u64,
    repaint_deferred: bool,
    suggestions: Vec<PendingSuggestion>,
    next_suggestion_id: u64,
    metrics: TextMetrics,
    arrange: ArrangeEngine,
    loaded: bool,
}

impl Default for JoinGraphEditor {
    fn default() -> Self {
        Self::new(TextMetrics::default(), ArrangeEngine::default(), 100)
    }
}

impl JoinGraphEditor {
    pub fn new(metrics: TextMetrics, arrange: ArrangeEngine, history_limit: usize) -> Self {
        Self {
            schema: IndexMap::new(),
            cards: IndexMap::new(),
            edges: Vec::new(),
            next_edge_id: 1,
            viewport: Viewport::default(),
            history: History::new(ModelSnapshot::default(), history_limit),
            dirty: false,
            connector: ConnectorState::Idle,
            table_drag: None,
            repaints: 0,
            repaint_deferred: false,
            suggestions: Vec::new(),
            next_suggestion_id: 1,
            metrics,
            arrange,
            loaded: false,
        }
    }

    /// Replace the whole canvas with a stored schema model. Layout entries
    /// for unknown tables and joins whose endpoints do not resolve are dropped.
    pub fn load(&mut self, payload: SchemaPayload) -> ReconcileReport {
        self.schema = payload
            .tables
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        let joins: Vec<JoinEdge> = payload
            .joins
            .iter()
            .map(|j| {
                let left_pk = self.is_primary_key(&j.left_table, &j.left_column);
                let right_pk = self.is_primary_key(&j.right_table, &j.right_column);
                j.to_edge(left_pk, right_pk)
            })
            .collect();
        let snapshot = ModelSnapshot {
            layout: payload.layout.into_iter().map(Into::into).collect(),
            joins,
            viewport: Viewport::default(),
        };

        self.connector = ConnectorState::Idle;
        self.table_drag = None;
        self.repaint_deferred = false;
        self.suggestions.clear();

        let report = self.materialize(&snapshot, true);
        self.history.reset(self.snapshot());
        self.dirty = false;
        self.loaded = true;
        self.request_repaint();

        info!(
            tables = self.schema.len(),
            cards = self.cards.len(),
            joins = self.edges.len(),
            "join graph loaded"
        );
        if let Some(summary) = report.summary() {
            warn!("{}", summary);
        }
        report
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn schema_tables(&self) -> impl Iterator<Item = &Table> {
        self.schema.values()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schema.get(name)
    }

    pub fn cards(&self) -> impl Iterator<Item = &TableCardLayout> {
        self.cards.values()
    }

    pub fn card(&self, table: &str) -> Option<&TableCardLayout> {
        self.cards.get(table)
    }

    pub fn edges(&self) -> &[CanvasEdge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&CanvasEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    pub fn connector(&self) -> &ConnectorState {
        &self.connector
    }

    /// Unsaved structural changes exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of repaints issued so far. Table drags defer repaints to the drop.
    pub fn repaint_count(&self) -> u64 {
        self.repaints
    }

    fn request_repaint(&mut self) {
        if self.table_drag.is_some() {
            self.repaint_deferred = true;
        } else {
            self.repaints += 1;
        }
    }

    fn commit(&mut self) {
        let snapshot = self.snapshot();
        if self.history.push(snapshot) {
            self.dirty = true;
        }
        self.request_repaint();
    }

    fn is_primary_key(&self, table: &str, column: &str) -> bool {
        self.schema
            .get(table)
            .and_then(|t| t.column(column))
            .is_some_and(|c| c.is_primary_key)
    }

    fn is_collapsed(&self, table: &str) -> bool {
        self.cards.get(table).is_some_and(|c| c.collapsed)
    }

    fn resolves(&self, column: &ColumnRef) -> bool {
        self.cards.contains_key(&column.table)
            && self
                .schema
                .get(&column.table)
                .is_some_and(|t| t.column(&column.column).is_some())
    }

    /// Kind and primary-key flag of a column on the canvas.
    fn column_info(&self, column: &ColumnRef) -> Result<(DataKind, bool), EditorError> {
        let table = self
            .schema
            .get(&column.table)
            .ok_or_else(|| EditorError::UnknownTable(column.table.clone()))?;
        if !self.cards.contains_key(&column.table) {
            return Err(EditorError::NotOnCanvas(column.table.clone()));
        }
        let col = table
            .column(&column.column)
            .ok_or_else(|| EditorError::UnknownColumn(column.to_string()))?;
        Ok((col.kind(), col.is_primary_key))
    }

    fn has_join(&self, a: &ColumnRef, b: &ColumnRef) -> bool {
        self.edges.iter().any(|e| e.connects(a, b))
    }

    fn alloc_edge_id(&mut self) -> EdgeId {
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        id
    }

    fn build_edge(&mut self, join: &JoinEdge) -> CanvasEdge {
        let left = EdgeEnd::new(
            &join.left_table,
            &join.left_column,
            self.is_collapsed(&join.left_table),
        );
        let right = EdgeEnd::new(
            &join.right_table,
            &join.right_column,
            self.is_collapsed(&join.right_table),
        );
        CanvasEdge {
            id: self.alloc_edge_id(),
            left,
            right,
            join_type: join.join_type,
            cardinality: join.cardinality,
        }
    }

    fn materialize(&mut self, snapshot: &ModelSnapshot, restore_viewport: bool) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        self.cards.clear();
        for card in &snapshot.layout {
            if !self.schema.contains_key(&card.table_name) {
                warn!(table = %card.table_name, "dropping card for table missing from schema");
                report.dropped_tables.push(card.table_name.clone());
                continue;
            }
            self.cards.insert(card.table_name.clone(), card.clone());
        }

        self.edges.clear();
        for join in &snapshot.joins {
            let (left, right) = (join.left(), join.right());
            let reason = if !self.resolves(&left) {
                Some(format!("{} not found", left))
            } else if !self.resolves(&right) {
                Some(format!("{} not found", right))
            } else if left.table == right.table {
                Some("self join".to_string())
            } else if self.has_join(&left, &right) {
                Some("duplicate".to_string())
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    let label = format!("{} = {}", left, right);
                    warn!(join = %label, %reason, "dropping join");
                    report.dropped_joins.push(label);
                }
                None => {
                    let edge = self.build_edge(join);
                    self.edges.push(edge);
                }
            }
        }

        if restore_viewport {
            self.viewport = snapshot.viewport;
        }
        report
    }

    /// Current canvas state. Layout comes from the card store, joins with
    /// header anchors resolved back to their original columns.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            layout: self.cards.values().cloned().collect(),
            joins: self.edges.iter().map(CanvasEdge::to_join).collect(),
            viewport: self.viewport,
        }
    }

    pub fn export_model(&self) -> SaveModelRequest {
        let snapshot = self.snapshot();
        SaveModelRequest {
            layout: snapshot.layout,
            joins: snapshot.joins,
        }
    }

    /// Persist the model. On failure nothing local changes.
    pub fn save(
        &mut self,
        backend: &dyn DesignerBackend,
        connection_id: &str,
    ) -> Result<(), EditorError> {
        let model = self.export_model();
        let response = backend.save_model(connection_id, &model)?;
        if !response.success {
            let message = response
                .error
                .unwrap_or_else(|| "server reported failure".to_string());
            warn!(%message, "model save rejected");
            return Err(EditorError::SaveRejected(message));
        }
        self.dirty = false;
        info!(
            tables = model.layout.len(),
            joins = model.joins.len(),
            "model saved"
        );
        Ok(())
    }

    // Tables

    pub fn add_table(&mut self, name: &str, x: f64, y: f64) -> Result<(), EditorError> {
        if !self.schema.contains_key(name) {
            return Err(EditorError::UnknownTable(name.to_string()));
        }
        if self.cards.contains_key(name) {
            return Err(EditorError::AlreadyOnCanvas(name.to_string()));
        }
        check_position(x, y)?;
        self.cards.insert(
            name.to_string(),
            TableCardLayout {
                table_name: name.to_string(),
                x,
                y,
                collapsed: false,
            },
        );
        self.commit();
        Ok(())
    }

    /// Remove a card and every join touching it. Returns the number of joins removed.
    pub fn remove_table(&mut self, name: &str) -> Result<usize, EditorError> {
        if self.cards.shift_remove(name).is_none() {
            return Err(EditorError::NotOnCanvas(name.to_string()));
        }
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(name));
        let removed = before - self.edges.len();
        self.suggestions
            .retain(|s| s.edge.left_table != name && s.edge.right_table != name);
        if matches!(&self.connector, ConnectorState::Dragging { from, .. } if from.table == name) {
            self.connector = ConnectorState::Idle;
        }
        self.commit();
        Ok(removed)
    }

    pub fn move_table(&mut self, name: &str, x: f64, y: f64) -> Result<(), EditorError> {
        check_position(x, y)?;
        let card = self
            .cards
            .get_mut(name)
            .ok_or_else(|| EditorError::NotOnCanvas(name.to_string()))?;
        card.x = x;
        card.y = y;
        self.commit();
        Ok(())
    }

    pub fn begin_table_drag(&mut self, name: &str) -> Result<(), EditorError> {
        let card = self
            .cards
            .get(name)
            .ok_or_else(|| EditorError::NotOnCanvas(name.to_string()))?;
        self.table_drag = Some(TableDrag {
            table: name.to_string(),
            origin: (card.x, card.y),
        });
        Ok(())
    }

    /// Move the dragged card. Repaint is held until the drop.
    pub fn drag_table(&mut self, x: f64, y: f64) -> Result<(), EditorError> {
        check_position(x, y)?;
        let table = match &self.table_drag {
            Some(drag) => drag.table.clone(),
            None => return Err(EditorError::NotMoving),
        };
        if let Some(card) = self.cards.get_mut(&table) {
            card.x = x;
            card.y = y;
        }
        self.request_repaint();
        Ok(())
    }

    /// Drop the dragged card: one repaint and, if it moved, one snapshot.
    pub fn end_table_drag(&mut self) -> Result<bool, EditorError> {
        let drag = self.table_drag.take().ok_or(EditorError::NotMoving)?;
        let deferred = std::mem::take(&mut self.repaint_deferred);
        let moved = self
            .cards
            .get(&drag.table)
            .is_some_and(|c| (c.x, c.y) != drag.origin);
        if moved {
            self.commit();
        } else if deferred {
            self.request_repaint();
        }
        Ok(moved)
    }

    pub fn set_collapsed(&mut self, table: &str, collapsed: bool) -> Result<(), EditorError> {
        let card = self
            .cards
            .get_mut(table)
            .ok_or_else(|| EditorError::NotOnCanvas(table.to_string()))?;
        if card.collapsed == collapsed {
            return Ok(());
        }
        card.collapsed = collapsed;

        for edge in &mut self.edges {
            for end in [&mut edge.left, &mut edge.right] {
                if end.table == table {
                    end.reroute(collapsed);
                }
            }
        }
        let dragging_from_table = matches!(
            &self.connector,
            ConnectorState::Dragging { from, .. } if from.table == table
        );
        if collapsed && dragging_from_table {
            self.connector = ConnectorState::Idle;
        }
        debug!(table, collapsed, "card collapse toggled");
        self.commit();
        Ok(())
    }

    pub fn collapse(&mut self, table: &str) -> Result<(), EditorError> {
        self.set_collapsed(table, true)
    }

    pub fn expand(&mut self, table: &str) -> Result<(), EditorError> {
        self.set_collapsed(table, false)
    }

    // Joins

    /// Create a join between two canvas columns. Cardinality is inferred from
    /// the primary-key flags of both ends.
    pub fn add_join(
        &mut self,
        left: &ColumnRef,
        right: &ColumnRef,
        join_type: JoinType,
    ) -> Result<EdgeId, EditorError> {
        let id = self.insert_join(left, right, join_type)?;
        self.commit();
        Ok(id)
    }

    fn insert_join(
        &mut self,
        left: &ColumnRef,
        right: &ColumnRef,
        join_type: JoinType,
    ) -> Result<EdgeId, EditorError> {
        if left.table == right.table {
            return Err(EditorError::SelfJoin(left.table.clone()));
        }
        let (left_kind, left_pk) = self.column_info(left)?;
        let (right_kind, right_pk) = self.column_info(right)?;
        if !left_kind.joinable_with(right_kind) {
            return Err(EditorError::Incompatible {
                left: left.to_string(),
                right: right.to_string(),
                left_kind,
                right_kind,
            });
        }
        if self.has_join(left, right) {
            return Err(EditorError::DuplicateJoin {
                left: left.to_string(),
                right: right.to_string(),
            });
        }

        let join = JoinEdge {
            left_table: left.table.clone(),
            left_column: left.column.clone(),
            right_table: right.table.clone(),
            right_column: right.column.clone(),
            join_type,
            cardinality: Cardinality::infer(left_pk, right_pk),
        };
        let edge = self.build_edge(&join);
        let id = edge.id;
        debug!(%left, %right, cardinality = ?join.cardinality, "join added");
        self.edges.push(edge);
        self.suggestions.retain(|s| {
            let (l, r) = (s.left(), s.right());
            !((l == *left && r == *right) || (l == *right && r == *left))
        });
        Ok(id)
    }

    pub fn remove_join(&mut self, id: EdgeId) -> Result<JoinEdge, EditorError> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or(EditorError::UnknownEdge(id))?;
        let edge = self.edges.remove(pos);
        self.commit();
        Ok(edge.to_join())
    }

    /// Edit join type and/or cardinality of an existing join.
    pub fn update_join(
        &mut self,
        id: EdgeId,
        join_type: Option<JoinType>,
        cardinality: Option<Cardinality>,
    ) -> Result<(), EditorError> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EditorError::UnknownEdge(id))?;
        if let Some(join_type) = join_type {
            edge.join_type = join_type;
        }
        if let Some(cardinality) = cardinality {
            edge.cardinality = cardinality;
        }
        self.commit();
        Ok(())
    }

    // Connector drag: idle -> dragging -> (connect | cancel)

    pub fn begin_connect(&mut self, from: ColumnRef) -> Result<(), EditorError> {
        self.column_info(&from)?;
        if self.is_collapsed(&from.table) {
            return Err(EditorError::CollapsedTable(from.table));
        }
        self.connector = ConnectorState::Dragging { from, cursor: None };
        Ok(())
    }

    pub fn drag_connect(&mut self, x: f64, y: f64) {
        if let ConnectorState::Dragging { cursor, .. } = &mut self.connector {
            *cursor = Some((x, y));
            self.request_repaint();
        }
    }

    /// Drop the connector on `target`. The drag ends whether or not the join is created.
    pub fn finish_connect(&mut self, target: ColumnRef) -> Result<EdgeId, EditorError> {
        let from = match std::mem::replace(&mut self.connector, ConnectorState::Idle) {
            ConnectorState::Dragging { from, .. } => from,
            ConnectorState::Idle => return Err(EditorError::NotConnecting),
        };
        if self.is_collapsed(&target.table) {
            return Err(EditorError::CollapsedTable(target.table));
        }
        self.add_join(&from, &target, JoinType::Inner)
    }

    pub fn cancel_connect(&mut self) {
        if self.connector != ConnectorState::Idle {
            self.connector = ConnectorState::Idle;
            self.request_repaint();
        }
    }

    // Layout

    /// Layered left-to-right arrangement of every card. On failure the
    /// canvas is left as it was.
    pub fn auto_arrange(&mut self) -> Result<(), EditorError> {
        let nodes: Vec<ArrangeNode> = self
            .cards
            .values()
            .filter_map(|card| {
                let table = self.schema.get(&card.table_name)?;
                let (width, height) = self.metrics.card_size(table, card.collapsed);
                Some(ArrangeNode::new(&card.table_name, width, height))
            })
            .collect();
        let edges: Vec<ArrangeEdge> = self
            .edges
            .iter()
            .map(|e| ArrangeEdge::new(&e.left.table, &e.right.table))
            .collect();

        let arrangement = match self.arrange.arrange(&nodes, &edges) {
            Ok(arrangement) => arrangement,
            Err(err) => {
                warn!(error = %err, "auto-arrange skipped");
                return Err(err.into());
            }
        };

        for placement in &arrangement.placements {
            if let Some(card) = self.cards.get_mut(&placement.id) {
                card.x = placement.x;
                card.y = placement.y;
            }
        }
        self.commit();
        Ok(())
    }

    // Suggestions

    pub fn suggestion_request(&self) -> SuggestJoinsRequest {
        SuggestJoinsRequest {
            tables: self.cards.keys().cloned().collect(),
        }
    }

    /// Hold the backend's candidates as pending suggestions. Candidates that
    /// duplicate an existing join are skipped.
    pub fn receive_suggestions(&mut self, response: SuggestJoinsResponse) -> SuggestionBatch {
        self.suggestions.clear();
        let mut candidates = response.edges;
        for chosen in response.chosen {
            if !candidates.contains(&chosen) {
                candidates.push(chosen);
            }
        }

        for edge in candidates {
            let left = ColumnRef::new(&edge.left_table, &edge.left_column);
            let right = ColumnRef::new(&edge.right_table, &edge.right_column);
            if self.has_join(&left, &right) {
                continue;
            }
            let id = self.next_suggestion_id;
            self.next_suggestion_id += 1;
            self.suggestions.push(PendingSuggestion { id, edge });
        }

        debug!(
            pending = self.suggestions.len(),
            needs_manual = response.needs_manual,
            "join suggestions received"
        );
        SuggestionBatch {
            pending: self.suggestions.len(),
            needs_manual: response.needs_manual,
        }
    }

    pub fn suggestions(&self) -> &[PendingSuggestion] {
        &self.suggestions
    }

    /// Accept a suggestion exactly like a manually drawn join.
    pub fn accept_suggestion(&mut self, id: u64) -> Result<EdgeId, EditorError> {
        let pos = self
            .suggestions
            .iter()
            .position(|s| s.id == id)
            .ok_or(EditorError::UnknownSuggestion(id))?;
        let suggestion = self.suggestions[pos].clone();
        // on success insert_join retires the suggestion; on failure it stays pending
        self.add_join(&suggestion.left(), &suggestion.right(), suggestion.join_type())
    }

    pub fn reject_suggestion(&mut self, id: u64) -> Result<(), EditorError> {
        let before = self.suggestions.len();
        self.suggestions.retain(|s| s.id != id);
        if self.suggestions.len() == before {
            return Err(EditorError::UnknownSuggestion(id));
        }
        Ok(())
    }

    /// Accept every high-confidence suggestion as a single history entry.
    pub fn accept_high_confidence(&mut self) -> BulkAccept {
        let (high, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.suggestions)
            .into_iter()
            .partition(|s| s.edge.confidence == Confidence::High);
        self.suggestions = rest;

        let mut result = BulkAccept::default();
        for suggestion in high {
            let (left, right) = (suggestion.left(), suggestion.right());
            match self.insert_join(&left, &right, suggestion.join_type()) {
                Ok(id) => result.accepted.push(id),
                Err(err) => {
                    warn!(error = %err, "suggested join not applied");
                    if !matches!(err, EditorError::DuplicateJoin { .. }) {
                        self.suggestions.push(suggestion);
                    }
                    result.failed.push(err);
                }
            }
        }
        if !result.accepted.is_empty() {
            self.commit();
        }
        result
    }

    // History

    pub fn undo(&mut self) -> Option<ReconcileReport> {
        let snapshot = self.history.undo()?.clone();
        Some(self.restore(&snapshot))
    }

    pub fn redo(&mut self) -> Option<ReconcileReport> {
        let snapshot = self.history.redo()?.clone();
        Some(self.restore(&snapshot))
    }

    fn restore(&mut self, snapshot: &ModelSnapshot) -> ReconcileReport {
        self.connector = ConnectorState::Idle;
        self.table_drag = None;
        self.repaint_deferred = false;
        let report = self.materialize(snapshot, false);
        self.dirty = true;
        self.request_repaint();
        report
    }

    // Viewport

    /// Pan/zoom; not a history entry.
    pub fn set_viewport(&mut self, zoom: f64, scroll_x: f64, scroll_y: f64) {
        self.viewport = Viewport::clamped(zoom, scroll_x, scroll_y);
        self.request_repaint();
    }

    pub fn zoom_by(&mut self, factor: f64) {
        let v = self.viewport;
        self.set_viewport(v.zoom * factor, v.scroll_x, v.scroll_y);
    }

    // Geometry

    /// `(x, y, width, height)` of a card from the layout store.
    pub fn card_bounds(&self, table: &str) -> Option<(f64, f64, f64, f64)> {
        let card = self.cards.get(table)?;
        let schema = self.schema.get(table)?;
        let (width, height) = self.metrics.card_size(schema, card.collapsed);
        Some((card.x, card.y, width, height))
    }

    fn anchor_y(&self, end: &EdgeEnd) -> Option<f64> {
        let card = self.cards.get(&end.table)?;
        let offset = match &end.anchor {
            Anchor::Header { .. } => self.metrics.header_center(card.collapsed),
            Anchor::Column(column) => {
                let table = self.schema.get(&end.table)?;
                let row = table.columns.iter().position(|c| &c.name == column)?;
                self.metrics.row_center(row)
            }
        };
        Some(card.y + offset)
    }

    /// Endpoints of an edge on the facing sides of its two cards.
    pub fn edge_points(&self, edge: &CanvasEdge) -> Option<((f64, f64), (f64, f64))> {
        let (lx, _, lw, _) = self.card_bounds(&edge.left.table)?;
        let (rx, _, rw, _) = self.card_bounds(&edge.right.table)?;
        let ly = self.anchor_y(&edge.left)?;
        let ry = self.anchor_y(&edge.right)?;

        if lx + lw / 2.0 <= rx + rw / 2.0 {
            Some(((lx + lw, ly), (rx, ry)))
        } else {
            Some(((lx, ly), (rx + rw, ry)))
        }
    }
}

fn check_position(x: f64, y: f64) -> Result<(), EditorError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(EditorError::InvalidPosition { x, y })
    }
}
