//! Join graph model: the serializable half of the editor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "INNER" => Some(Self::Inner),
            "LEFT" => Some(Self::Left),
            "RIGHT" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Initial cardinality from the primary-key flags of both endpoints.
    pub fn infer(left_pk: bool, right_pk: bool) -> Self {
        match (left_pk, right_pk) {
            (true, true) => Self::OneToOne,
            (true, false) => Self::OneToMany,
            (false, true) => Self::ManyToOne,
            (false, false) => Self::ManyToMany,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "one-to-one" | "1:1" => Some(Self::OneToOne),
            "one-to-many" | "1:n" => Some(Self::OneToMany),
            "many-to-one" | "n:1" => Some(Self::ManyToOne),
            "many-to-many" | "n:m" => Some(Self::ManyToMany),
            _ => None,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            other => *other,
        }
    }

    /// Labels drawn at the (left, right) ends of a connector.
    pub fn end_labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::OneToOne => ("1", "1"),
            Self::OneToMany => ("1", "*"),
            Self::ManyToOne => ("*", "1"),
            Self::ManyToMany => ("*", "*"),
        }
    }
}

/// A `(table, column)` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Parse `table.column`. The column may itself contain dots.
    pub fn parse(s: &str) -> Option<Self> {
        let (table, column) = s.split_once('.')?;
        if table.is_empty() || column.is_empty() {
            return None;
        }
        Some(Self::new(table, column))
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEdge {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    #[serde(default)]
    pub join_type: JoinType,
    pub cardinality: Cardinality,
}

impl JoinEdge {
    pub fn left(&self) -> ColumnRef {
        ColumnRef::new(&self.left_table, &self.left_column)
    }

    pub fn right(&self) -> ColumnRef {
        ColumnRef::new(&self.right_table, &self.right_column)
    }

    pub fn touches(&self, table: &str) -> bool {
        self.left_table == table || self.right_table == table
    }

    /// Same column pair regardless of direction.
    pub fn same_endpoints(&self, other: &JoinEdge) -> bool {
        (self.left() == other.left() && self.right() == other.right())
            || (self.left() == other.right() && self.right() == other.left())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCardLayout {
    pub table_name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub collapsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub zoom: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub const MIN_ZOOM: f64 = 0.25;
    pub const MAX_ZOOM: f64 = 4.0;

    pub fn clamped(zoom: f64, scroll_x: f64, scroll_y: f64) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)
        } else {
            1.0
        };
        Self {
            zoom,
            scroll_x: if scroll_x.is_finite() { scroll_x } else { 0.0 },
            scroll_y: if scroll_y.is_finite() { scroll_y } else { 0.0 },
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

/// Unit of undo/redo history and of persistence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub layout: Vec<TableCardLayout>,
    pub joins: Vec<JoinEdge>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl ModelSnapshot {
    /// Same cards and joins; the viewport is not compared.
    pub fn same_structure(&self, other: &ModelSnapshot) -> bool {
        self.layout == other.layout && self.joins == other.joins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_cardinality() {
        assert_eq!(Cardinality::infer(true, true), Cardinality::OneToOne);
        assert_eq!(Cardinality::infer(true, false), Cardinality::OneToMany);
        assert_eq!(Cardinality::infer(false, true), Cardinality::ManyToOne);
        assert_eq!(Cardinality::infer(false, false), Cardinality::ManyToMany);
    }

    #[test]
    fn test_parse_column_ref() {
        assert_eq!(ColumnRef::parse("orders.id"), Some(ColumnRef::new("orders", "id")));
        assert_eq!(ColumnRef::parse("t.a.b"), Some(ColumnRef::new("t", "a.b")));
        assert_eq!(ColumnRef::parse("orders"), None);
        assert_eq!(ColumnRef::parse(".id"), None);
    }

    #[test]
    fn test_cardinality_wire_format() {
        let json = serde_json::to_string(&Cardinality::OneToMany).unwrap();
        assert_eq!(json, r#""one-to-many""#);
        assert_eq!(Cardinality::from_str("MANY_TO_ONE"), Some(Cardinality::ManyToOne));
        assert_eq!(serde_json::to_string(&JoinType::Left).unwrap(), r#""LEFT""#);
    }

    #[test]
    fn test_same_endpoints_ignores_direction() {
        let a = JoinEdge {
            left_table: "orders".into(),
            left_column: "customer_id".into(),
            right_table: "customers".into(),
            right_column: "id".into(),
            join_type: JoinType::Inner,
            cardinality: Cardinality::ManyToOne,
        };
        let mut b = a.clone();
        std::mem::swap(&mut b.left_table, &mut b.right_table);
        std::mem::swap(&mut b.left_column, &mut b.right_column);
        assert!(a.same_endpoints(&b));
    }

    #[test]
    fn test_viewport_clamp() {
        let v = Viewport::clamped(10.0, f64::NAN, 5.0);
        assert_eq!(v.zoom, Viewport::MAX_ZOOM);
        assert_eq!(v.scroll_x, 0.0);
        assert_eq!(v.scroll_y, 5.0);
    }
}
