//! Dashboard document: pages, widgets and their data configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::blueprint::WidgetType;
use crate::schema::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl Aggregation {
    pub const ALL: &'static [Aggregation] = &[
        Aggregation::Sum,
        Aggregation::Avg,
        Aggregation::Min,
        Aggregation::Max,
        Aggregation::Count,
    ];
    pub const COUNT_ONLY: &'static [Aggregation] = &[Aggregation::Count];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "avg" | "average" | "mean" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "count" => Some(Self::Count),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAssignment {
    pub field_id: String,
    pub table: String,
    pub column: String,
    pub origin_role: Role,
    pub applied_role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
}

impl FieldAssignment {
    /// Non-numeric fields (dimension by origin) can only be counted.
    pub fn allowed_aggregations(&self) -> &'static [Aggregation] {
        match (self.applied_role, self.origin_role) {
            (Role::Dimension, _) => &[],
            (Role::Measure, Role::Measure) => Aggregation::ALL,
            (Role::Measure, Role::Dimension) => Aggregation::COUNT_ONLY,
        }
    }

    pub fn default_aggregation(&self) -> Option<Aggregation> {
        match (self.applied_role, self.origin_role) {
            (Role::Dimension, _) => None,
            (Role::Measure, Role::Measure) => Some(Aggregation::Sum),
            (Role::Measure, Role::Dimension) => Some(Aggregation::Count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureRef {
    pub field: String,
    pub aggregation: Aggregation,
}

/// Per widget type shortcuts projected from the slots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortcuts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub y_fields: Vec<MeasureRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<MeasureRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill_field: Option<String>,
}

/// `slots` is authoritative; every other field is derived from it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDataConfig {
    #[serde(default)]
    pub slots: IndexMap<String, Vec<FieldAssignment>>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub measure_agg: IndexMap<String, Aggregation>,
    #[serde(flatten)]
    pub shortcuts: Shortcuts,
}

impl WidgetDataConfig {
    pub fn assignments(&self) -> impl Iterator<Item = (&str, &FieldAssignment)> {
        self.slots
            .iter()
            .flat_map(|(key, list)| list.iter().map(move |a| (key.as_str(), a)))
    }

    pub fn is_assigned(&self, field_id: &str) -> bool {
        self.assignments().any(|(_, a)| a.field_id == field_id)
    }

    pub fn assigned_ids(&self) -> std::collections::HashSet<String> {
        self.assignments().map(|(_, a)| a.field_id.clone()).collect()
    }

    pub fn find_mut(&mut self, field_id: &str) -> Option<&mut FieldAssignment> {
        self.slots
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|a| a.field_id == field_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    #[serde(rename = "type")]
    pub widget_type: WidgetType,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default = "default_span")]
    pub w: i32,
    #[serde(default = "default_span")]
    pub h: i32,
    #[serde(default)]
    pub data_config: WidgetDataConfig,
    #[serde(default)]
    pub display_options: serde_json::Map<String, serde_json::Value>,
}

fn default_span() -> i32 {
    4
}

impl Widget {
    pub fn new(id: impl Into<String>, widget_type: WidgetType) -> Self {
        Self {
            id: id.into(),
            widget_type,
            x: 0,
            y: 0,
            w: default_span(),
            h: default_span(),
            data_config: WidgetDataConfig::default(),
            display_options: serde_json::Map::new(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.display_options.get("title").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

impl Page {
    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub title: String,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_theme() -> String {
    "light".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Dashboard".to_string(),
            pages: vec![Page {
                id: "page-1".to_string(),
                title: "Page 1".to_string(),
                widgets: Vec::new(),
            }],
            theme: default_theme(),
        }
    }
}

impl DashboardConfig {
    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_mut(&mut self, id: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.pages.iter().find_map(|p| p.widget(id))
    }

    pub fn widget_mut(&mut self, id: &str) -> Option<&mut Widget> {
        self.pages.iter_mut().find_map(|p| p.widget_mut(id))
    }
}
