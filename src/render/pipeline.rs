//! Widget render pipeline: request rows, show Loading, then the final visual.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::host::{ChartHost, InstanceId};
use super::palette::Palette;
use super::visual::{Visual, build_visual};
use crate::backend::{BackendError, DesignerBackend, WidgetDataRequest, WidgetDataResponse};
use crate::blueprint::WidgetType;
use crate::widget::Widget;

/// One in-flight render. Only the latest ticket per widget is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTicket {
    pub widget_id: String,
    pub generation: u64,
    pub request: WidgetDataRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Shown,
    Stale,
}

#[derive(Debug)]
struct WidgetRender {
    generation: u64,
    instance: Option<InstanceId>,
    visual: Visual,
}

pub struct RenderPipeline<H: ChartHost> {
    host: H,
    palette: Palette,
    widgets: HashMap<String, WidgetRender>,
    next_generation: u64,
}

impl<H: ChartHost> RenderPipeline<H> {
    pub fn new(host: H, palette: Palette) -> Self {
        Self {
            host,
            palette,
            widgets: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn visual(&self, widget_id: &str) -> Option<&Visual> {
        self.widgets.get(widget_id).map(|w| &w.visual)
    }

    /// Destroy the widget's previous instance, then mount `visual`.
    fn show(&mut self, widget_id: &str, visual: Visual) {
        let state = self
            .widgets
            .entry(widget_id.to_string())
            .or_insert_with(|| WidgetRender {
                generation: 0,
                instance: None,
                visual: Visual::Loading,
            });
        if let Some(old) = state.instance.take() {
            self.host.destroy(old);
        }
        state.instance = Some(self.host.mount(widget_id, &visual));
        state.visual = visual;
    }

    /// Start a render: Loading is shown immediately.
    pub fn begin(&mut self, widget: &Widget) -> RenderTicket {
        self.next_generation += 1;
        let generation = self.next_generation;

        let first = !self.widgets.contains_key(&widget.id);
        self.show(&widget.id, Visual::Loading);
        if let Some(state) = self.widgets.get_mut(&widget.id) {
            state.generation = generation;
        }
        if first {
            self.host.observe_resize(&widget.id);
        }

        RenderTicket {
            widget_id: widget.id.clone(),
            generation,
            request: WidgetDataRequest {
                widget_type: widget.widget_type.clone(),
                data_config: widget.data_config.clone(),
            },
        }
    }

    /// Apply a response. Superseded tickets are discarded.
    pub fn complete(
        &mut self,
        ticket: &RenderTicket,
        response: Result<WidgetDataResponse, BackendError>,
    ) -> RenderOutcome {
        let current = self.widgets.get(&ticket.widget_id).map(|w| w.generation);
        if current != Some(ticket.generation) {
            debug!(
                widget = %ticket.widget_id,
                generation = ticket.generation,
                "discarding stale widget data"
            );
            return RenderOutcome::Stale;
        }

        let visual = match response {
            Err(err) => {
                warn!(widget = %ticket.widget_id, error = %err, "widget data request failed");
                Visual::error(err.to_string())
            }
            Ok(resp) if !resp.success => {
                let message = resp
                    .error
                    .unwrap_or_else(|| "Data request failed".to_string());
                warn!(widget = %ticket.widget_id, %message, "widget data rejected");
                Visual::error(message)
            }
            Ok(resp) => build_visual(&ticket.request.widget_type, &resp.rows, &self.palette),
        };
        self.show(&ticket.widget_id, visual);
        RenderOutcome::Shown
    }

    /// Fetch and render in one step.
    pub fn render(&mut self, backend: &dyn DesignerBackend, widget: &Widget) -> &Visual {
        let ticket = self.begin(widget);
        let response = backend.widget_data(&ticket.widget_id, &ticket.request);
        self.complete(&ticket, response);
        &self.widgets[&ticket.widget_id].visual
    }

    /// Forward a container resize to the widget's mounted instance.
    pub fn resize(&mut self, widget_id: &str, width: f64, height: f64) {
        if let Some(instance) = self.widgets.get(widget_id).and_then(|w| w.instance) {
            self.host.resize(instance, width, height);
        }
    }

    /// Tear down a widget's instance and resize observer.
    pub fn remove(&mut self, widget_id: &str) {
        if let Some(state) = self.widgets.remove(widget_id) {
            if let Some(instance) = state.instance {
                self.host.destroy(instance);
            }
            self.host.unobserve_resize(widget_id);
        }
    }

    pub fn widget_type_changed(&mut self, widget_id: &str, widget_type: &WidgetType) {
        debug!(
            widget = widget_id,
            widget_type = %widget_type,
            "widget type changed, dropping visual"
        );
        self.remove(widget_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Row};
    use crate::render::HeadlessHost;
    use serde_json::json;

    fn pipeline() -> RenderPipeline<HeadlessHost> {
        RenderPipeline::new(HeadlessHost::new(), Palette::default())
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_loading_then_visual() {
        let mut p = pipeline();
        let widget = Widget::new("w1", WidgetType::Kpi);
        let ticket = p.begin(&widget);
        assert!(p.visual("w1").unwrap().is_loading());
        assert!(p.host().is_observed("w1"));

        let outcome = p.complete(
            &ticket,
            Ok(WidgetDataResponse {
                success: true,
                rows: vec![row(json!({"total": 42}))],
                error: None,
            }),
        );
        assert_eq!(outcome, RenderOutcome::Shown);
        assert_eq!(p.visual("w1").unwrap().kind(), "kpi");
        assert_eq!(p.host().live_instances(), 1);
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut p = pipeline();
        let widget = Widget::new("w1", WidgetType::Table);
        let first = p.begin(&widget);
        let second = p.begin(&widget);

        let late = p.complete(
            &first,
            Ok(WidgetDataResponse {
                success: true,
                rows: vec![row(json!({"a": 1}))],
                error: None,
            }),
        );
        assert_eq!(late, RenderOutcome::Stale);
        assert!(p.visual("w1").unwrap().is_loading());

        p.complete(
            &second,
            Err(BackendError::Transport("offline".into())),
        );
        assert_eq!(p.visual("w1").unwrap().kind(), "error");
        assert_eq!(p.host().live_instances(), 1);
    }

    #[test]
    fn test_failed_response_shows_error() {
        let backend = MemoryBackend::new();
        backend.set_widget_error("w1", "bad query");
        let mut p = pipeline();
        let visual = p.render(&backend, &Widget::new("w1", WidgetType::Bar));
        assert_eq!(visual, &Visual::error("bad query"));
    }

    #[test]
    fn test_empty_rows_show_no_data() {
        let backend = MemoryBackend::new();
        let mut p = pipeline();
        let visual = p.render(&backend, &Widget::new("w1", WidgetType::Bar));
        assert!(matches!(visual, Visual::NoData { .. }));
    }

    #[test]
    fn test_remove_tears_down() {
        let mut p = pipeline();
        let widget = Widget::new("w1", WidgetType::Pie);
        p.begin(&widget);
        p.resize("w1", 300.0, 200.0);
        assert_eq!(p.host().size("w1"), Some((300.0, 200.0)));
        p.remove("w1");
        assert_eq!(p.host().live_instances(), 0);
        assert!(!p.host().is_observed("w1"));
        assert!(p.visual("w1").is_none());
    }
}
