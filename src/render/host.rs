//! The drawing surface a widget's visual is mounted on.

use std::collections::HashMap;

use super::visual::Visual;

pub type InstanceId = u64;

/// Chart library seam. The pipeline destroys a widget's previous instance
/// before mounting the next one and keeps one resize observer per widget.
pub trait ChartHost {
    fn mount(&mut self, widget_id: &str, visual: &Visual) -> InstanceId;

    fn destroy(&mut self, instance: InstanceId);

    fn observe_resize(&mut self, widget_id: &str);

    fn unobserve_resize(&mut self, widget_id: &str);

    fn resize(&mut self, instance: InstanceId, width: f64, height: f64);
}

/// Host without a chart library: it keeps the mounted visuals so a caller
/// (tests, the wasm facade, the CLI) can read what would be on screen.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    next_id: InstanceId,
    mounted: HashMap<InstanceId, (String, Visual)>,
    observed: HashMap<String, (f64, f64)>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_instances(&self) -> usize {
        self.mounted.len()
    }

    pub fn is_observed(&self, widget_id: &str) -> bool {
        self.observed.contains_key(widget_id)
    }

    pub fn size(&self, widget_id: &str) -> Option<(f64, f64)> {
        self.observed.get(widget_id).copied()
    }

    pub fn shown(&self, widget_id: &str) -> Option<&Visual> {
        self.mounted
            .values()
            .find(|(id, _)| id == widget_id)
            .map(|(_, visual)| visual)
    }
}

impl ChartHost for HeadlessHost {
    fn mount(&mut self, widget_id: &str, visual: &Visual) -> InstanceId {
        self.next_id += 1;
        self.mounted
            .insert(self.next_id, (widget_id.to_string(), visual.clone()));
        self.next_id
    }

    fn destroy(&mut self, instance: InstanceId) {
        self.mounted.remove(&instance);
    }

    fn observe_resize(&mut self, widget_id: &str) {
        self.observed.entry(widget_id.to_string()).or_insert((0.0, 0.0));
    }

    fn unobserve_resize(&mut self, widget_id: &str) {
        self.observed.remove(widget_id);
    }

    fn resize(&mut self, instance: InstanceId, width: f64, height: f64) {
        if let Some((widget_id, _)) = self.mounted.get(&instance) {
            if let Some(size) = self.observed.get_mut(widget_id) {
                *size = (width, height);
            }
        }
    }
}

impl<H: ChartHost + ?Sized> ChartHost for Box<H> {
    fn mount(&mut self, widget_id: &str, visual: &Visual) -> InstanceId {
        (**self).mount(widget_id, visual)
    }

    fn destroy(&mut self, instance: InstanceId) {
        (**self).destroy(instance)
    }

    fn observe_resize(&mut self, widget_id: &str) {
        (**self).observe_resize(widget_id)
    }

    fn unobserve_resize(&mut self, widget_id: &str) {
        (**self).unobserve_resize(widget_id)
    }

    fn resize(&mut self, instance: InstanceId, width: f64, height: f64) {
        (**self).resize(instance, width, height)
    }
}
