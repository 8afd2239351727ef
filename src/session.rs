//! One designer session: catalog, dashboard document, join graph editor and
//! render pipeline, plus the notices the host UI should show.
//!
//! Failures never escape as panics. Every error is returned to the caller
//! and also queued as a [`Notice`]: user mistakes as warnings, backend and
//! configuration problems as errors.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::backend::{BackendError, DesignerBackend, SuggestJoinsResponse, WidgetDataResponse};
use crate::binding::{BindingEngine, ValidationIssue};
use crate::blueprint::{BlueprintRegistry, WidgetType};
use crate::catalog::{CatalogLoader, Field, FieldCatalog, RefreshOutcome, RefreshTicket};
use crate::config::DesignerConfig;
use crate::editor::{
    BulkAccept, EdgeId, EditorError, JoinGraphEditor, ReconcileReport, SuggestionBatch,
};
use crate::error::DesignerError;
use crate::render::{
    ChartHost, HeadlessHost, Palette, RenderOutcome, RenderPipeline, RenderTicket, Visual,
};
use crate::svg::SvgRenderer;
use crate::widget::{Aggregation, DashboardConfig, Page, Widget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct DesignerSession {
    config: DesignerConfig,
    backend: Box<dyn DesignerBackend>,
    connection_id: Option<String>,
    tables: Vec<String>,
    catalog: CatalogLoader,
    binding: BindingEngine,
    dashboard: DashboardConfig,
    active_page: Option<String>,
    focused_widget: Option<String>,
    editor: JoinGraphEditor,
    renderer: RenderPipeline<Box<dyn ChartHost>>,
    notices: Vec<Notice>,
    next_id: u64,
}

impl DesignerSession {
    pub fn new(config: DesignerConfig, backend: Box<dyn DesignerBackend>) -> Self {
        Self::with_host(config, backend, Box::new(HeadlessHost::new()))
    }

    pub fn with_host(
        config: DesignerConfig,
        backend: Box<dyn DesignerBackend>,
        host: Box<dyn ChartHost>,
    ) -> Self {
        let dashboard = DashboardConfig {
            theme: config.default_theme.clone(),
            ..DashboardConfig::default()
        };
        let palette = Palette::for_theme(&dashboard.theme);
        Self {
            editor: config.editor(),
            active_page: dashboard.pages.first().map(|p| p.id.clone()),
            dashboard,
            renderer: RenderPipeline::new(host, palette),
            binding: BindingEngine::default(),
            catalog: CatalogLoader::default(),
            connection_id: None,
            tables: Vec::new(),
            focused_widget: None,
            notices: Vec::new(),
            next_id: 0,
            config,
            backend,
        }
    }

    /// Session configured from TOML settings.
    pub fn from_toml(
        source: &str,
        backend: Box<dyn DesignerBackend>,
    ) -> Result<Self, DesignerError> {
        Ok(Self::new(DesignerConfig::from_toml_str(source)?, backend))
    }

    /// Use a registry with host-defined widget types.
    pub fn with_registry(mut self, registry: BlueprintRegistry) -> Self {
        self.binding = BindingEngine::new(registry);
        self
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    // Notices

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn report(&mut self, err: impl Into<DesignerError>) -> DesignerError {
        let err = err.into();
        let level = if err.is_user_error() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        self.notify(level, err.to_string());
        err
    }

    fn report_reconcile(&mut self, report: &ReconcileReport) {
        if let Some(summary) = report.summary() {
            self.notify(NoticeLevel::Warning, summary);
        }
    }

    // Catalog

    pub fn catalog(&self) -> &FieldCatalog {
        self.catalog.catalog()
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Change the data source without fetching; pair with
    /// [`begin_catalog_refresh`](Self::begin_catalog_refresh).
    pub fn set_source(&mut self, connection_id: Option<&str>, tables: Vec<String>) {
        self.connection_id = connection_id.map(str::to_string);
        self.tables = tables;
    }

    pub fn select_connection(&mut self, connection_id: Option<&str>) -> RefreshOutcome {
        self.connection_id = connection_id.map(str::to_string);
        self.refresh_catalog()
    }

    pub fn select_tables(&mut self, tables: Vec<String>) -> RefreshOutcome {
        self.tables = tables;
        self.refresh_catalog()
    }

    pub fn refresh_catalog(&mut self) -> RefreshOutcome {
        match self.begin_catalog_refresh() {
            RefreshOutcome::Pending(ticket) => {
                let result = self.backend.batch_columns(&ticket.request());
                self.complete_catalog_refresh(ticket, result)
            }
            other => other,
        }
    }

    /// First half of a refresh for hosts that fetch asynchronously.
    pub fn begin_catalog_refresh(&mut self) -> RefreshOutcome {
        self.catalog.begin(self.connection_id.as_deref(), &self.tables)
    }

    pub fn complete_catalog_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<crate::backend::BatchColumnsResponse, BackendError>,
    ) -> RefreshOutcome {
        let outcome = self.catalog.complete(ticket, result);
        match &outcome {
            RefreshOutcome::Applied { .. } => self.prune_assignments(),
            RefreshOutcome::Failed(message) => {
                let message = format!("Could not load columns: {}", message);
                self.notify(NoticeLevel::Error, message);
            }
            _ => {}
        }
        outcome
    }

    /// Drop assignments whose field left the catalog. The catalog is shared
    /// by the whole dashboard, so widgets on every page are checked; widgets
    /// whose fields are all still present are left untouched.
    fn prune_assignments(&mut self) {
        let catalog = self.catalog.catalog();
        let mut dropped = 0;
        for page in &mut self.dashboard.pages {
            for widget in &mut page.widgets {
                let stale = widget
                    .data_config
                    .assignments()
                    .any(|(_, a)| !catalog.contains(&a.field_id));
                if stale {
                    dropped += self.binding.prune_missing(widget, catalog).dropped.len();
                }
            }
        }
        if dropped > 0 {
            let message = if dropped == 1 {
                "1 field assignment removed because its column is no longer available".to_string()
            } else {
                format!(
                    "{} field assignments removed because their columns are no longer available",
                    dropped
                )
            };
            self.notify(NoticeLevel::Warning, message);
        }
    }

    /// Catalog fields matching `term`, minus those already on the focused widget.
    pub fn search_fields(&self, term: &str) -> Vec<&Field> {
        let exclude: HashSet<String> = self
            .focused_widget
            .as_deref()
            .and_then(|id| self.dashboard.widget(id))
            .map(|w| w.data_config.assigned_ids())
            .unwrap_or_default();
        self.catalog.catalog().search(term, &exclude)
    }

    // Dashboard document

    pub fn dashboard(&self) -> &DashboardConfig {
        &self.dashboard
    }

    pub fn load_dashboard(&mut self) -> Result<(), DesignerError> {
        match self.backend.load_dashboard() {
            Ok(dashboard) => {
                self.replace_dashboard(dashboard);
                if self.catalog.catalog().signature().is_some() {
                    self.prune_assignments();
                }
                info!(pages = self.dashboard.pages.len(), "dashboard loaded");
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Swap in a dashboard document; slot lists are normalized to each
    /// widget's blueprint.
    pub fn replace_dashboard(&mut self, dashboard: DashboardConfig) {
        for page in &self.dashboard.pages {
            for widget in &page.widgets {
                self.renderer.remove(&widget.id);
            }
        }
        self.renderer.set_palette(Palette::for_theme(&dashboard.theme));
        self.active_page = dashboard.pages.first().map(|p| p.id.clone());
        self.focused_widget = None;
        self.dashboard = dashboard;
        for page in &mut self.dashboard.pages {
            for widget in &mut page.widgets {
                self.binding.sync(widget);
            }
        }
    }

    /// Replace the dashboard from a JSON document. A malformed document
    /// leaves the current one in place.
    pub fn import_dashboard(&mut self, document: &str) -> Result<(), DesignerError> {
        match serde_json::from_str::<DashboardConfig>(document) {
            Ok(dashboard) => {
                self.replace_dashboard(dashboard);
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    pub fn save_dashboard(&mut self) -> Result<(), DesignerError> {
        match self.backend.save_dashboard(&self.dashboard) {
            Ok(()) => {
                self.notify(NoticeLevel::Info, "Dashboard saved");
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    pub fn set_theme(&mut self, theme: &str) {
        self.dashboard.theme = theme.to_string();
        self.renderer.set_palette(Palette::for_theme(theme));
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{}-{}", prefix, self.next_id);
            let taken = self.dashboard.pages.iter().any(|p| p.id == id)
                || self.dashboard.widget(&id).is_some();
            if !taken {
                return id;
            }
        }
    }

    pub fn add_page(&mut self, title: &str) -> String {
        let id = self.fresh_id("page");
        self.dashboard.pages.push(Page {
            id: id.clone(),
            title: title.to_string(),
            widgets: Vec::new(),
        });
        id
    }

    pub fn active_page(&self) -> Option<&Page> {
        self.active_page
            .as_deref()
            .and_then(|id| self.dashboard.page(id))
    }

    pub fn set_active_page(&mut self, page_id: &str) -> Result<(), DesignerError> {
        if self.dashboard.page(page_id).is_none() {
            return Err(self.report(DesignerError::UnknownPage(page_id.to_string())));
        }
        self.active_page = Some(page_id.to_string());
        self.focused_widget = None;
        Ok(())
    }

    /// Add a widget to the active page and focus it.
    pub fn add_widget(&mut self, widget_type: WidgetType) -> Result<String, DesignerError> {
        let page_id = match self.active_page.clone() {
            Some(id) => id,
            None => return Err(self.report(DesignerError::UnknownPage(String::new()))),
        };
        let id = self.fresh_id("widget");
        let mut widget = Widget::new(&id, widget_type);
        self.binding.sync(&mut widget);
        match self.dashboard.page_mut(&page_id) {
            Some(page) => page.widgets.push(widget),
            None => return Err(self.report(DesignerError::UnknownPage(page_id))),
        }
        self.focused_widget = Some(id.clone());
        Ok(id)
    }

    pub fn remove_widget(&mut self, widget_id: &str) -> Result<Widget, DesignerError> {
        for page in &mut self.dashboard.pages {
            if let Some(pos) = page.widgets.iter().position(|w| w.id == widget_id) {
                let widget = page.widgets.remove(pos);
                self.renderer.remove(widget_id);
                if self.focused_widget.as_deref() == Some(widget_id) {
                    self.focused_widget = None;
                }
                return Ok(widget);
            }
        }
        Err(self.report(DesignerError::UnknownWidget(widget_id.to_string())))
    }

    pub fn focus_widget(&mut self, widget_id: &str) -> Result<(), DesignerError> {
        if self.dashboard.widget(widget_id).is_none() {
            return Err(self.report(DesignerError::UnknownWidget(widget_id.to_string())));
        }
        self.focused_widget = Some(widget_id.to_string());
        Ok(())
    }

    pub fn focused_widget(&self) -> Option<&Widget> {
        self.focused_widget
            .as_deref()
            .and_then(|id| self.dashboard.widget(id))
    }

    pub fn widget(&self, widget_id: &str) -> Option<&Widget> {
        self.dashboard.widget(widget_id)
    }

    // Binding

    fn with_widget<T>(
        &mut self,
        widget_id: &str,
        op: impl FnOnce(&BindingEngine, &mut Widget) -> Result<T, DesignerError>,
    ) -> Result<T, DesignerError> {
        let result = match self.dashboard.widget_mut(widget_id) {
            Some(widget) => op(&self.binding, widget),
            None => Err(DesignerError::UnknownWidget(widget_id.to_string())),
        };
        result.map_err(|err| self.report(err))
    }

    fn field(&self, field_id: &str) -> Result<Field, DesignerError> {
        self.catalog
            .catalog()
            .field(field_id)
            .cloned()
            .ok_or_else(|| DesignerError::UnknownField(field_id.to_string()))
    }

    /// Click-assign a catalog field. Returns the slot it landed in.
    pub fn assign_field(
        &mut self,
        widget_id: &str,
        field_id: &str,
    ) -> Result<String, DesignerError> {
        let field = self.field(field_id).map_err(|err| self.report(err))?;
        self.with_widget(widget_id, |binding, widget| {
            Ok(binding.assign(widget, &field)?)
        })
    }

    pub fn assign_field_to_slot(
        &mut self,
        widget_id: &str,
        slot_key: &str,
        field_id: &str,
    ) -> Result<String, DesignerError> {
        let field = self.field(field_id).map_err(|err| self.report(err))?;
        self.with_widget(widget_id, |binding, widget| {
            Ok(binding.assign_to_slot(widget, slot_key, &field)?)
        })
    }

    pub fn set_aggregation(
        &mut self,
        widget_id: &str,
        field_id: &str,
        aggregation: Aggregation,
    ) -> Result<(), DesignerError> {
        self.with_widget(widget_id, |binding, widget| {
            Ok(binding.set_aggregation(widget, field_id, aggregation)?)
        })
    }

    pub fn remove_field(
        &mut self,
        widget_id: &str,
        slot_key: &str,
        field_id: &str,
    ) -> Result<(), DesignerError> {
        self.with_widget(widget_id, |binding, widget| {
            binding.remove(widget, slot_key, field_id)?;
            Ok(())
        })
    }

    /// Switch visualization type; assignments without a home are dropped.
    pub fn change_widget_type(
        &mut self,
        widget_id: &str,
        widget_type: WidgetType,
    ) -> Result<usize, DesignerError> {
        let dropped = self.with_widget(widget_id, |binding, widget| {
            Ok(binding.change_type(widget, widget_type.clone()).dropped.len())
        })?;
        self.renderer.widget_type_changed(widget_id, &widget_type);
        if dropped > 0 {
            let message = format!(
                "{} field{} removed: no matching slot in {}",
                dropped,
                if dropped == 1 { "" } else { "s" },
                widget_type
            );
            self.notify(NoticeLevel::Warning, message);
        }
        Ok(dropped)
    }

    pub fn validate_widget(&self, widget_id: &str) -> Vec<ValidationIssue> {
        self.dashboard
            .widget(widget_id)
            .map(|w| self.binding.validate(w))
            .unwrap_or_default()
    }

    // Rendering

    pub fn begin_render(&mut self, widget_id: &str) -> Result<RenderTicket, DesignerError> {
        match self.dashboard.widget(widget_id) {
            Some(widget) => Ok(self.renderer.begin(widget)),
            None => Err(self.report(DesignerError::UnknownWidget(widget_id.to_string()))),
        }
    }

    pub fn complete_render(
        &mut self,
        ticket: &RenderTicket,
        response: Result<WidgetDataResponse, BackendError>,
    ) -> RenderOutcome {
        self.renderer.complete(ticket, response)
    }

    pub fn render_widget(&mut self, widget_id: &str) -> Result<Visual, DesignerError> {
        let ticket = self.begin_render(widget_id)?;
        let response = self.backend.widget_data(&ticket.widget_id, &ticket.request);
        self.renderer.complete(&ticket, response);
        Ok(self.visual(widget_id).cloned().unwrap_or(Visual::Loading))
    }

    /// Render every widget of the active page.
    pub fn render_page(&mut self) -> Vec<(String, Visual)> {
        let ids: Vec<String> = self
            .active_page()
            .map(|p| p.widgets.iter().map(|w| w.id.clone()).collect())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.render_widget(&id).ok().map(|v| (id, v)))
            .collect()
    }

    pub fn visual(&self, widget_id: &str) -> Option<&Visual> {
        self.renderer.visual(widget_id)
    }

    pub fn resize_widget(&mut self, widget_id: &str, width: f64, height: f64) {
        self.renderer.resize(widget_id, width, height);
    }

    // Join graph

    pub fn editor(&self) -> &JoinGraphEditor {
        &self.editor
    }

    /// Load the stored schema model for the selected connection. On failure
    /// the canvas keeps its current state.
    pub fn load_model(&mut self) -> Result<ReconcileReport, DesignerError> {
        let Some(connection_id) = self.connection_id.clone() else {
            return Err(self.report(DesignerError::NoConnection));
        };
        let payload = match self
            .backend
            .load_schema(&connection_id, self.config.model_load_timeout())
        {
            Ok(payload) => payload,
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "schema load failed");
                return Err(self.report(err));
            }
        };
        let report = self.editor.load(payload);
        self.report_reconcile(&report);
        Ok(report)
    }

    /// Run an editor operation; its error becomes a notice.
    pub fn edit<T>(
        &mut self,
        op: impl FnOnce(&mut JoinGraphEditor) -> Result<T, EditorError>,
    ) -> Result<T, DesignerError> {
        if !self.editor.is_loaded() {
            return Err(self.report(DesignerError::NotLoaded));
        }
        op(&mut self.editor).map_err(|err| self.report(err))
    }

    pub fn save_model(&mut self) -> Result<(), DesignerError> {
        if !self.editor.is_loaded() {
            return Err(self.report(DesignerError::NotLoaded));
        }
        let Some(connection_id) = self.connection_id.clone() else {
            return Err(self.report(DesignerError::NoConnection));
        };
        match self.editor.save(self.backend.as_ref(), &connection_id) {
            Ok(()) => {
                self.notify(NoticeLevel::Info, "Model saved");
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    pub fn suggest_joins(&mut self) -> Result<SuggestionBatch, DesignerError> {
        if !self.editor.is_loaded() {
            return Err(self.report(DesignerError::NotLoaded));
        }
        let Some(connection_id) = self.connection_id.clone() else {
            return Err(self.report(DesignerError::NoConnection));
        };
        let request = self.editor.suggestion_request();
        let response = self.backend.suggest_joins(&connection_id, &request);
        self.receive_suggestions(response)
    }

    /// Apply a suggest-joins response, however it was fetched.
    pub fn receive_suggestions(
        &mut self,
        response: Result<SuggestJoinsResponse, BackendError>,
    ) -> Result<SuggestionBatch, DesignerError> {
        if !self.editor.is_loaded() {
            return Err(self.report(DesignerError::NotLoaded));
        }
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "join suggestions failed");
                return Err(self.report(err));
            }
        };
        let batch = self.editor.receive_suggestions(response);
        if batch.needs_manual {
            self.notify(
                NoticeLevel::Info,
                "Some tables could not be joined automatically; connect them manually",
            );
        }
        Ok(batch)
    }

    pub fn accept_suggestion(&mut self, id: u64) -> Result<EdgeId, DesignerError> {
        self.edit(|editor| editor.accept_suggestion(id))
    }

    pub fn reject_suggestion(&mut self, id: u64) -> Result<(), DesignerError> {
        self.edit(|editor| editor.reject_suggestion(id))
    }

    pub fn accept_high_confidence(&mut self) -> BulkAccept {
        let result = self.editor.accept_high_confidence();
        for err in &result.failed {
            self.notify(NoticeLevel::Warning, err.to_string());
        }
        result
    }

    pub fn auto_arrange(&mut self) -> Result<(), DesignerError> {
        self.edit(|editor| editor.auto_arrange())
    }

    pub fn undo(&mut self) -> bool {
        match self.editor.undo() {
            Some(report) => {
                self.report_reconcile(&report);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.editor.redo() {
            Some(report) => {
                self.report_reconcile(&report);
                true
            }
            None => false,
        }
    }

    pub fn canvas_svg(&self) -> String {
        SvgRenderer::default().render(&self.editor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn test_empty_state_without_connection() {
        let mut session = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        let outcome = session.select_tables(vec!["orders".into()]);
        assert!(matches!(outcome, RefreshOutcome::Empty(_)));
        assert!(session.catalog().is_empty());
        assert!(session.notices().is_empty());
    }

    #[test]
    fn test_save_without_model_is_config_error() {
        let mut session = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        assert!(matches!(session.save_model(), Err(DesignerError::NotLoaded)));
        assert_eq!(session.notices()[0].level, NoticeLevel::Error);
    }

    #[test]
    fn test_add_widget_on_active_page() {
        let mut session = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        let id = session.add_widget(WidgetType::Bar).unwrap();
        assert_eq!(session.focused_widget().unwrap().id, id);
        let slots: Vec<&String> = session.widget(&id).unwrap().data_config.slots.keys().collect();
        assert_eq!(slots, vec!["category", "series", "measures"]);

        let page = session.add_page("Sales");
        session.set_active_page(&page).unwrap();
        let second = session.add_widget(WidgetType::Kpi).unwrap();
        assert_ne!(id, second);
        assert_eq!(session.active_page().unwrap().widgets.len(), 1);
    }

    #[test]
    fn test_unknown_widget_warns() {
        let mut session = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        assert!(session.focus_widget("nope").is_err());
        assert_eq!(session.take_notices()[0].level, NoticeLevel::Warning);
        assert!(session.notices().is_empty());
    }

    #[test]
    fn test_settings_from_toml() {
        let session =
            DesignerSession::from_toml("history_limit = 5", Box::new(MemoryBackend::new()))
                .unwrap();
        assert_eq!(session.config().history_limit, 5);

        let err = DesignerSession::from_toml("history_limit = 0", Box::new(MemoryBackend::new()))
            .err()
            .unwrap();
        assert!(matches!(err, DesignerError::Config(_)));
    }

    #[test]
    fn test_malformed_dashboard_document_rejected() {
        let mut session = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        let widget = session.add_widget(WidgetType::Bar).unwrap();
        let before = session.dashboard().clone();

        let err = session.import_dashboard(r#"{"pages": [}"#).unwrap_err();
        assert!(matches!(err, DesignerError::Document(_)));
        assert_eq!(session.take_notices()[0].level, NoticeLevel::Error);
        assert_eq!(session.dashboard(), &before);
        assert!(session.widget(&widget).is_some());
    }

    #[test]
    fn test_import_dashboard_replaces_document() {
        let mut session = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        session.add_widget(WidgetType::Bar).unwrap();
        let mut other = DesignerSession::new(
            DesignerConfig::default(),
            Box::new(MemoryBackend::new()),
        );
        other.set_theme("dark");
        let document = serde_json::to_string(other.dashboard()).unwrap();

        session.import_dashboard(&document).unwrap();
        assert_eq!(session.dashboard(), other.dashboard());
        assert!(session.focused_widget().is_none());
    }
}
