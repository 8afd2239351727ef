//! Widget binding engine: places catalog fields into blueprint slots and
//! keeps the derived part of a widget's data configuration in step.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::blueprint::{BlueprintRegistry, SlotBlueprint, WidgetType};
use crate::catalog::{Field, FieldCatalog};
use crate::schema::Role;
use crate::widget::{Aggregation, FieldAssignment, MeasureRef, Shortcuts, Widget, WidgetDataConfig};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("{field_id} is already assigned to this widget")]
    AlreadyAssigned { field_id: String },
    #[error("every slot that takes a {role} field is full")]
    NoCapacity { role: &'static str },
    #[error("slot {slot} already holds its maximum of {max}")]
    SlotFull { slot: String, max: usize },
    #[error("a {widget_type} widget has no slot named {slot}")]
    UnknownSlot { widget_type: String, slot: String },
    #[error("{field_id} is not assigned to this widget")]
    NotAssigned { field_id: String },
    #[error("{aggregation} is not available for {field_id}")]
    AggregationNotAllowed {
        field_id: String,
        aggregation: &'static str,
    },
}

/// Advisory finding from [`BindingEngine::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub slot: String,
    pub required: usize,
    pub present: usize,
    pub message: String,
}

/// Assignments removed while re-syncing a widget against its blueprint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncReport {
    pub dropped: Vec<FieldAssignment>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

fn applied_role(slot: &SlotBlueprint, role: Role) -> Role {
    if let Some(sole) = slot.sole_role() {
        sole
    } else if slot.accepts(role) {
        role
    } else {
        slot.accepts.first().copied().unwrap_or(role)
    }
}

fn occupancy(config: &WidgetDataConfig, slot: &SlotBlueprint) -> usize {
    config.slots.get(&slot.key).map_or(0, Vec::len)
}

#[derive(Debug, Clone, Default)]
pub struct BindingEngine {
    registry: BlueprintRegistry,
}

impl BindingEngine {
    pub fn new(registry: BlueprintRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BlueprintRegistry {
        &self.registry
    }

    pub fn blueprint(&self, widget_type: &WidgetType) -> Vec<SlotBlueprint> {
        self.registry.blueprint(widget_type)
    }

    /// Click-assign: pick the best slot for the field's role. Returns the slot key.
    pub fn assign(&self, widget: &mut Widget, field: &Field) -> Result<String, BindingError> {
        self.reject_duplicate(widget, field)?;
        let blueprint = self.registry.blueprint(&widget.widget_type);
        let config = &widget.data_config;
        let has_room = |s: &&SlotBlueprint| occupancy(config, s) < s.max;

        let accepting: Vec<&SlotBlueprint> =
            blueprint.iter().filter(|s| s.accepts(field.role)).collect();

        let chosen = if accepting.is_empty() {
            blueprint.iter().find(has_room)
        } else {
            accepting
                .iter()
                .copied()
                .filter(has_room)
                .find(|s| s.sole_role() == Some(field.role))
                .or_else(|| accepting.iter().copied().find(has_room))
        };

        match chosen {
            Some(slot) => {
                let slot = slot.clone();
                Ok(self.place(widget, &slot, field))
            }
            None => {
                warn!(widget = %widget.id, field = %field.id, "no slot with capacity");
                Err(BindingError::NoCapacity {
                    role: field.role.as_str(),
                })
            }
        }
    }

    /// Drop onto a specific slot.
    pub fn assign_to_slot(
        &self,
        widget: &mut Widget,
        slot_key: &str,
        field: &Field,
    ) -> Result<String, BindingError> {
        self.reject_duplicate(widget, field)?;
        let slot = self
            .registry
            .slot(&widget.widget_type, slot_key)
            .ok_or_else(|| BindingError::UnknownSlot {
                widget_type: widget.widget_type.to_string(),
                slot: slot_key.to_string(),
            })?;
        if occupancy(&widget.data_config, &slot) >= slot.max {
            warn!(widget = %widget.id, slot = slot_key, "slot is full");
            return Err(BindingError::SlotFull {
                slot: slot.key,
                max: slot.max,
            });
        }
        Ok(self.place(widget, &slot, field))
    }

    fn reject_duplicate(&self, widget: &Widget, field: &Field) -> Result<(), BindingError> {
        if widget.data_config.is_assigned(&field.id) {
            warn!(widget = %widget.id, field = %field.id, "field already assigned");
            return Err(BindingError::AlreadyAssigned {
                field_id: field.id.clone(),
            });
        }
        Ok(())
    }

    fn place(&self, widget: &mut Widget, slot: &SlotBlueprint, field: &Field) -> String {
        let mut assignment = FieldAssignment {
            field_id: field.id.clone(),
            table: field.table.clone(),
            column: field.column.clone(),
            origin_role: field.role,
            applied_role: applied_role(slot, field.role),
            aggregation: None,
        };
        assignment.aggregation = assignment.default_aggregation();
        debug!(
            widget = %widget.id,
            field = %field.id,
            slot = %slot.key,
            role = assignment.applied_role.as_str(),
            "field assigned"
        );
        widget
            .data_config
            .slots
            .entry(slot.key.clone())
            .or_default()
            .push(assignment);
        self.sync(widget);
        slot.key.clone()
    }

    pub fn set_aggregation(
        &self,
        widget: &mut Widget,
        field_id: &str,
        aggregation: Aggregation,
    ) -> Result<(), BindingError> {
        let assignment =
            widget
                .data_config
                .find_mut(field_id)
                .ok_or_else(|| BindingError::NotAssigned {
                    field_id: field_id.to_string(),
                })?;
        if !assignment.allowed_aggregations().contains(&aggregation) {
            warn!(field = field_id, aggregation = aggregation.as_str(), "aggregation refused");
            return Err(BindingError::AggregationNotAllowed {
                field_id: field_id.to_string(),
                aggregation: aggregation.as_str(),
            });
        }
        assignment.aggregation = Some(aggregation);
        self.sync(widget);
        Ok(())
    }

    pub fn remove(
        &self,
        widget: &mut Widget,
        slot_key: &str,
        field_id: &str,
    ) -> Result<FieldAssignment, BindingError> {
        let not_assigned = || BindingError::NotAssigned {
            field_id: field_id.to_string(),
        };
        let list = widget
            .data_config
            .slots
            .get_mut(slot_key)
            .ok_or_else(not_assigned)?;
        let pos = list
            .iter()
            .position(|a| a.field_id == field_id)
            .ok_or_else(not_assigned)?;
        let removed = list.remove(pos);
        self.sync(widget);
        Ok(removed)
    }

    pub fn change_type(&self, widget: &mut Widget, widget_type: WidgetType) -> SyncReport {
        widget.widget_type = widget_type;
        self.sync(widget)
    }

    /// Drop assignments whose field is gone from the catalog.
    pub fn prune_missing(&self, widget: &mut Widget, catalog: &FieldCatalog) -> SyncReport {
        let mut dropped = Vec::new();
        for list in widget.data_config.slots.values_mut() {
            list.retain(|a| {
                let keep = catalog.contains(&a.field_id);
                if !keep {
                    dropped.push(a.clone());
                }
                keep
            });
        }
        let mut report = self.sync(widget);
        dropped.append(&mut report.dropped);
        for a in &dropped {
            warn!(widget = %widget.id, field = %a.field_id, "assignment dropped");
        }
        SyncReport { dropped }
    }

    /// Rebuild the derived configuration from `slots`. Idempotent.
    pub fn sync(&self, widget: &mut Widget) -> SyncReport {
        let blueprint = self.registry.blueprint(&widget.widget_type);
        let config = &mut widget.data_config;
        let mut old = std::mem::take(&mut config.slots);
        let mut slots: IndexMap<String, Vec<FieldAssignment>> = IndexMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut dropped = Vec::new();

        for slot in &blueprint {
            let mut kept = Vec::new();
            for mut a in old.shift_remove(&slot.key).unwrap_or_default() {
                if kept.len() >= slot.max || !seen.insert(a.field_id.clone()) {
                    dropped.push(a);
                    continue;
                }
                recoerce(slot, &mut a);
                kept.push(a);
            }
            slots.insert(slot.key.clone(), kept);
        }
        for (key, list) in old {
            if !list.is_empty() {
                warn!(widget = %widget.id, slot = %key, "slot not in blueprint, dropping");
            }
            dropped.extend(list);
        }

        config.slots = slots;
        derive(&widget.widget_type, config);
        SyncReport { dropped }
    }

    pub fn validate(&self, widget: &Widget) -> Vec<ValidationIssue> {
        self.registry
            .blueprint(&widget.widget_type)
            .iter()
            .filter_map(|slot| {
                let present = occupancy(&widget.data_config, slot);
                (present < slot.min).then(|| ValidationIssue {
                    slot: slot.key.clone(),
                    required: slot.min,
                    present,
                    message: format!(
                        "{} needs at least {} field{}",
                        slot.label,
                        slot.min,
                        if slot.min == 1 { "" } else { "s" }
                    ),
                })
            })
            .collect()
    }
}

fn recoerce(slot: &SlotBlueprint, a: &mut FieldAssignment) {
    let fits = match slot.sole_role() {
        Some(sole) => a.applied_role == sole,
        None => slot.accepts(a.applied_role),
    };
    if !fits {
        a.applied_role = applied_role(slot, a.origin_role);
    }
    match a.applied_role {
        Role::Dimension => a.aggregation = None,
        Role::Measure => {
            let allowed = a.allowed_aggregations();
            if !a.aggregation.is_some_and(|agg| allowed.contains(&agg)) {
                a.aggregation = a.default_aggregation();
            }
        }
    }
}

fn derive(widget_type: &WidgetType, config: &mut WidgetDataConfig) {
    let mut dimensions = Vec::new();
    let mut measures = Vec::new();
    let mut measure_agg = IndexMap::new();
    for (_, a) in config.assignments() {
        match a.applied_role {
            Role::Dimension => dimensions.push(a.field_id.clone()),
            Role::Measure => {
                measures.push(a.field_id.clone());
                measure_agg.insert(
                    a.field_id.clone(),
                    a.aggregation.unwrap_or(Aggregation::Count),
                );
            }
        }
    }

    let ids = |key: &str| -> Vec<String> {
        config
            .slots
            .get(key)
            .map(|list| list.iter().map(|a| a.field_id.clone()).collect())
            .unwrap_or_default()
    };
    let first = |key: &str| ids(key).into_iter().next();
    let measure_refs = |key: &str| -> Vec<MeasureRef> {
        config
            .slots
            .get(key)
            .map(|list| {
                list.iter()
                    .map(|a| MeasureRef {
                        field: a.field_id.clone(),
                        aggregation: a.aggregation.unwrap_or(Aggregation::Count),
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut shortcuts = Shortcuts::default();
    match widget_type {
        WidgetType::Kpi => {
            shortcuts.value_field = measure_refs("primaryMeasure").into_iter().next();
            shortcuts.drill_field = first("drillDimension");
        }
        WidgetType::Bar | WidgetType::Line | WidgetType::Area => {
            shortcuts.x_field = first("category");
            shortcuts.series_fields = ids("series");
            shortcuts.y_fields = measure_refs("measures");
        }
        WidgetType::Pie | WidgetType::Doughnut => {
            shortcuts.slice_field = first("category");
            shortcuts.value_field = measure_refs("measure").into_iter().next();
        }
        WidgetType::Table => {
            shortcuts.row_field = first("row");
            shortcuts.column_field = first("column");
        }
        WidgetType::Slicer | WidgetType::ButtonSlicer => {
            shortcuts.filter_field = first("field");
        }
        WidgetType::Other(_) => {
            shortcuts.x_field = dimensions.first().cloned();
            shortcuts.y_fields = measures
                .iter()
                .map(|id| MeasureRef {
                    field: id.clone(),
                    aggregation: measure_agg[id],
                })
                .collect();
        }
    }

    config.dimensions = dimensions;
    config.measures = measures;
    config.measure_agg = measure_agg;
    config.shortcuts = shortcuts;
}
