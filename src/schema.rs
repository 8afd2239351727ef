//! Table and column metadata as served by the schema store, plus the
//! type classification every other component keys off.

use serde::{Deserialize, Serialize};

/// Whether a field groups rows or gets aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Dimension,
    Measure,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Dimension => "dimension",
            Role::Measure => "measure",
        }
    }
}

/// Coarse family of a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Numeric,
    Temporal,
    Boolean,
    Text,
}

impl DataKind {
    /// Numeric kinds are measures; booleans and temporal values stay dimensions.
    pub fn role(&self) -> Role {
        match self {
            DataKind::Numeric => Role::Measure,
            DataKind::Temporal | DataKind::Boolean | DataKind::Text => Role::Dimension,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataKind::Numeric)
    }

    /// Join endpoints must share a family: numeric, temporal, or everything else.
    pub fn joinable_with(&self, other: DataKind) -> bool {
        fn family(kind: DataKind) -> u8 {
            match kind {
                DataKind::Numeric => 0,
                DataKind::Temporal => 1,
                DataKind::Boolean | DataKind::Text => 2,
            }
        }
        family(*self) == family(other)
    }
}

/// Classify a declared SQL type name.
pub fn classify_type(sql_type: &str) -> DataKind {
    let lower = sql_type.trim().to_lowercase();
    if lower.starts_with("tinyint(1)") || lower == "bit" || lower.starts_with("bit(1)") {
        return DataKind::Boolean;
    }
    let base = lower.split('(').next().unwrap_or(&lower).trim();
    let base = base.strip_suffix(" unsigned").unwrap_or(base);

    match base {
        // Integer types
        "int" | "int2" | "int4" | "int8" | "integer" | "bigint" | "smallint" | "tinyint"
        | "mediumint" | "serial" | "serial2" | "serial4" | "serial8" | "bigserial"
        | "smallserial" => DataKind::Numeric,

        // Floating point and fixed precision
        "real" | "float" | "float4" | "float8" | "double" | "double precision" | "decimal"
        | "numeric" | "number" | "money" | "smallmoney" => DataKind::Numeric,

        // Date/time
        "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "timestamp with time zone"
        | "timestamp without time zone" | "datetime" | "datetime2" | "smalldatetime"
        | "datetimeoffset" | "interval" | "year" => DataKind::Temporal,

        // Boolean
        "bool" | "boolean" => DataKind::Boolean,

        _ => DataKind::Text,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_numeric: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        let typ = typ.into();
        let is_numeric = classify_type(&typ).is_numeric();
        Self {
            name: name.into(),
            typ,
            is_primary_key: false,
            is_numeric,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// The backend's numeric flag upgrades text, never temporal or boolean.
    pub fn kind(&self) -> DataKind {
        match classify_type(&self.typ) {
            DataKind::Text if self.is_numeric => DataKind::Numeric,
            kind => kind,
        }
    }

    pub fn role(&self) -> Role {
        self.kind().role()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}
