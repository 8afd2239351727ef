//! Slot blueprints: the static, per widget type layout of binding points.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Role;

/// Visualization type of a widget. Unknown names are kept verbatim and get
/// the generic blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetType {
    Kpi,
    Bar,
    Line,
    Area,
    Pie,
    Doughnut,
    Table,
    Slicer,
    ButtonSlicer,
    Other(String),
}

impl WidgetType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "kpi" | "card" => Self::Kpi,
            "bar" => Self::Bar,
            "line" => Self::Line,
            "area" => Self::Area,
            "pie" => Self::Pie,
            "doughnut" | "donut" => Self::Doughnut,
            "table" => Self::Table,
            "slicer" => Self::Slicer,
            "button-slicer" | "button_slicer" | "buttonslicer" => Self::ButtonSlicer,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Kpi => "kpi",
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Area => "area",
            Self::Pie => "pie",
            Self::Doughnut => "doughnut",
            Self::Table => "table",
            Self::Slicer => "slicer",
            Self::ButtonSlicer => "button-slicer",
            Self::Other(name) => name,
        }
    }

    pub fn is_cartesian(&self) -> bool {
        matches!(self, Self::Bar | Self::Line | Self::Area)
    }

    pub fn is_radial(&self) -> bool {
        matches!(self, Self::Pie | Self::Doughnut)
    }
}

impl From<String> for WidgetType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<WidgetType> for String {
    fn from(t: WidgetType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotBlueprint {
    pub key: String,
    pub label: String,
    pub accepts: Vec<Role>,
    pub min: usize,
    pub max: usize,
    #[serde(default)]
    pub hint: String,
}

impl SlotBlueprint {
    pub fn accepts(&self, role: Role) -> bool {
        self.accepts.contains(&role)
    }

    /// The role this slot forces on anything placed in it, if it takes only one.
    pub fn sole_role(&self) -> Option<Role> {
        match self.accepts.as_slice() {
            [role] => Some(*role),
            _ => None,
        }
    }
}

struct SlotDef {
    key: &'static str,
    label: &'static str,
    accepts: &'static [Role],
    min: usize,
    max: usize,
    hint: &'static str,
}

const fn slot(
    key: &'static str,
    label: &'static str,
    accepts: &'static [Role],
    min: usize,
    max: usize,
    hint: &'static str,
) -> SlotDef {
    SlotDef {
        key,
        label,
        accepts,
        min,
        max,
        hint,
    }
}

const DIM: &[Role] = &[Role::Dimension];
const MEA: &[Role] = &[Role::Measure];

const KPI: &[SlotDef] = &[
    slot("primaryMeasure", "Value", MEA, 1, 1, "The number to show"),
    slot("drillDimension", "Drill by", DIM, 0, 1, "Optional breakdown"),
];

const CARTESIAN: &[SlotDef] = &[
    slot("category", "Axis", DIM, 1, 1, "Values along the axis"),
    slot("series", "Legend", DIM, 0, 2, "Split into series"),
    slot("measures", "Values", MEA, 1, 4, "Aggregated values"),
];

const RADIAL: &[SlotDef] = &[
    slot("category", "Slices", DIM, 1, 1, "One slice per value"),
    slot("measure", "Size", MEA, 1, 1, "Slice size"),
];

const TABLE: &[SlotDef] = &[
    slot("row", "Rows", DIM, 1, 1, "Row grouping"),
    slot("column", "Columns", DIM, 0, 1, "Column grouping"),
];

const SLICER: &[SlotDef] = &[slot("field", "Field", DIM, 1, 1, "Values to filter by")];

const GENERIC: &[SlotDef] = &[
    slot("dimensions", "Dimensions", DIM, 0, 3, "Group by"),
    slot("measures", "Measures", MEA, 1, 3, "Aggregate"),
];

fn builtin(widget_type: &WidgetType) -> &'static [SlotDef] {
    match widget_type {
        WidgetType::Kpi => KPI,
        WidgetType::Bar | WidgetType::Line | WidgetType::Area => CARTESIAN,
        WidgetType::Pie | WidgetType::Doughnut => RADIAL,
        WidgetType::Table => TABLE,
        WidgetType::Slicer | WidgetType::ButtonSlicer => SLICER,
        WidgetType::Other(_) => GENERIC,
    }
}

fn materialize(defs: &[SlotDef]) -> Vec<SlotBlueprint> {
    defs.iter()
        .map(|d| SlotBlueprint {
            key: d.key.to_string(),
            label: d.label.to_string(),
            accepts: d.accepts.to_vec(),
            min: d.min,
            max: d.max,
            hint: d.hint.to_string(),
        })
        .collect()
}

/// Lookup of blueprints by widget type. Every lookup hands out a fresh copy.
#[derive(Debug, Clone, Default)]
pub struct BlueprintRegistry {
    overrides: HashMap<String, Vec<SlotBlueprint>>,
}

impl BlueprintRegistry {
    pub fn register(&mut self, widget_type: &str, slots: Vec<SlotBlueprint>) {
        self.overrides.insert(widget_type.trim().to_lowercase(), slots);
    }

    pub fn blueprint(&self, widget_type: &WidgetType) -> Vec<SlotBlueprint> {
        match self.overrides.get(&widget_type.as_str().to_lowercase()) {
            Some(slots) => slots.clone(),
            None => materialize(builtin(widget_type)),
        }
    }

    pub fn slot(&self, widget_type: &WidgetType, key: &str) -> Option<SlotBlueprint> {
        self.blueprint(widget_type).into_iter().find(|s| s.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_widget_types() {
        assert_eq!(WidgetType::parse("KPI"), WidgetType::Kpi);
        assert_eq!(WidgetType::parse("button_slicer"), WidgetType::ButtonSlicer);
        assert_eq!(WidgetType::parse("heatmap"), WidgetType::Other("heatmap".into()));
        let json = serde_json::to_string(&WidgetType::ButtonSlicer).unwrap();
        assert_eq!(json, r#""button-slicer""#);
    }

    #[test]
    fn test_cartesian_blueprint() {
        let registry = BlueprintRegistry::default();
        let slots = registry.blueprint(&WidgetType::Line);
        let keys: Vec<&str> = slots.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["category", "series", "measures"]);
        assert_eq!(slots[2].max, 4);
        assert_eq!(slots[1].min, 0);
    }

    #[test]
    fn test_unknown_type_gets_generic() {
        let registry = BlueprintRegistry::default();
        let slots = registry.blueprint(&WidgetType::parse("gauge"));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].key, "dimensions");
        assert_eq!(slots[1].max, 3);
    }

    #[test]
    fn test_lookup_returns_copy() {
        let registry = BlueprintRegistry::default();
        let mut slots = registry.blueprint(&WidgetType::Kpi);
        slots[0].max = 99;
        assert_eq!(registry.blueprint(&WidgetType::Kpi)[0].max, 1);
    }

    #[test]
    fn test_override() {
        let mut registry = BlueprintRegistry::default();
        registry.register(
            "scatter",
            vec![SlotBlueprint {
                key: "points".into(),
                label: "Points".into(),
                accepts: vec![Role::Dimension, Role::Measure],
                min: 2,
                max: 2,
                hint: String::new(),
            }],
        );
        let slot = registry.slot(&WidgetType::parse("scatter"), "points").unwrap();
        assert_eq!(slot.sole_role(), None);
    }
}
