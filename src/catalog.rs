//! Field catalog: every (table, column) of the selected tables, indexed for
//! the field picker and for O(1) lookup by id.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BatchColumnsRequest, BatchColumnsResponse, DesignerBackend};
use crate::schema::{Column, DataKind, Role, Table, classify_type};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub table: String,
    pub column: String,
    pub label: String,
    pub data_type: String,
    pub role: Role,
    pub kind: DataKind,
}

impl Field {
    pub fn from_column(table: &str, column: &Column) -> Self {
        Self {
            id: field_id(table, &column.name),
            table: table.to_string(),
            column: column.name.clone(),
            label: humanize(&column.name),
            data_type: column.typ.clone(),
            role: column.role(),
            kind: column.kind(),
        }
    }
}

pub fn field_id(table: &str, column: &str) -> String {
    format!("{}.{}", table, column)
}

/// `customer_id` -> `Customer Id`.
fn humanize(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identity of a catalog build: the connection plus the sorted table set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSignature {
    pub connection_id: String,
    pub tables: Vec<String>,
}

impl CatalogSignature {
    pub fn new(connection_id: &str, tables: &[String]) -> Self {
        let mut tables: Vec<String> = tables.to_vec();
        tables.sort();
        tables.dedup();
        Self {
            connection_id: connection_id.to_string(),
            tables,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyState {
    NoConnection,
    NoTables,
    NoColumns,
    LoadFailed(String),
}

impl EmptyState {
    pub fn message(&self) -> String {
        match self {
            EmptyState::NoConnection => "Select a connection to list its fields.".to_string(),
            EmptyState::NoTables => "Select one or more tables to list their fields.".to_string(),
            EmptyState::NoColumns => "The selected tables have no columns.".to_string(),
            EmptyState::LoadFailed(reason) => format!("Fields could not be loaded: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldCatalog {
    signature: Option<CatalogSignature>,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    empty_state: Option<EmptyState>,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::empty(EmptyState::NoConnection)
    }
}

impl FieldCatalog {
    pub fn empty(state: EmptyState) -> Self {
        Self {
            signature: None,
            fields: Vec::new(),
            index: HashMap::new(),
            empty_state: Some(state),
        }
    }

    fn from_fields(signature: CatalogSignature, fields: Vec<Field>) -> Self {
        let mut deduped: Vec<Field> = Vec::with_capacity(fields.len());
        let mut index = HashMap::new();
        for field in fields {
            if index.contains_key(&field.id) {
                continue;
            }
            index.insert(field.id.clone(), deduped.len());
            deduped.push(field);
        }
        let empty_state = if deduped.is_empty() {
            Some(EmptyState::NoColumns)
        } else {
            None
        };
        Self {
            signature: Some(signature),
            fields: deduped,
            index,
            empty_state,
        }
    }

    /// Build from a batch-columns response; columns of tables outside the
    /// signature are ignored.
    pub fn build(signature: CatalogSignature, response: &BatchColumnsResponse) -> Self {
        let wanted: HashSet<&str> = signature.tables.iter().map(|t| t.as_str()).collect();
        let fields = response
            .columns
            .iter()
            .filter(|c| wanted.contains(c.source.as_str()))
            .map(|c| {
                let column = Column {
                    name: c.name.clone(),
                    typ: c.typ.clone(),
                    is_primary_key: false,
                    is_numeric: classify_type(&c.typ).is_numeric(),
                };
                Field::from_column(&c.source, &column)
            })
            .collect();
        Self::from_fields(signature, fields)
    }

    /// Build from already loaded table metadata.
    pub fn from_tables(connection_id: &str, tables: &[Table]) -> Self {
        let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        let signature = CatalogSignature::new(connection_id, &names);
        let fields = tables
            .iter()
            .flat_map(|t| t.columns.iter().map(move |c| Field::from_column(&t.name, c)))
            .collect();
        Self::from_fields(signature, fields)
    }

    pub fn signature(&self) -> Option<&CatalogSignature> {
        self.signature.as_ref()
    }

    pub fn empty_state(&self) -> Option<&EmptyState> {
        self.empty_state.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Case-insensitive substring match on column names, skipping `exclude`.
    pub fn search(&self, term: &str, exclude: &HashSet<String>) -> Vec<&Field> {
        let needle = term.trim().to_lowercase();
        self.fields
            .iter()
            .filter(|f| !exclude.contains(&f.id))
            .filter(|f| needle.is_empty() || f.column.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn fields_by_table(&self) -> Vec<(&str, Vec<&Field>)> {
        let mut groups: Vec<(&str, Vec<&Field>)> = Vec::new();
        for field in &self.fields {
            match groups.iter_mut().find(|(t, _)| *t == field.table) {
                Some((_, list)) => list.push(field),
                None => groups.push((field.table.as_str(), vec![field])),
            }
        }
        groups
    }
}

/// Outstanding catalog request.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTicket {
    pub generation: u64,
    pub signature: CatalogSignature,
}

impl RefreshTicket {
    pub fn request(&self) -> BatchColumnsRequest {
        BatchColumnsRequest {
            connection_id: self.signature.connection_id.clone(),
            tables: self.signature.tables.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Nothing to fetch; the catalog shows an empty state.
    Empty(EmptyState),
    /// Signature matches the built catalog.
    Unchanged,
    /// Request issued, response not yet applied.
    Pending(RefreshTicket),
    Applied { fields: usize },
    /// A newer request was issued after this one.
    Stale,
    Failed(String),
}

/// Owns the live catalog and decides which responses may replace it.
#[derive(Debug, Default)]
pub struct CatalogLoader {
    catalog: FieldCatalog,
    issued: u64,
}

impl CatalogLoader {
    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn generation(&self) -> u64 {
        self.issued
    }

    /// Replace the catalog outright, invalidating outstanding requests.
    pub fn replace(&mut self, catalog: FieldCatalog) {
        self.issued += 1;
        self.catalog = catalog;
    }

    pub fn begin(&mut self, connection_id: Option<&str>, tables: &[String]) -> RefreshOutcome {
        let connection_id = match connection_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return self.show_empty(EmptyState::NoConnection),
        };
        if tables.is_empty() {
            return self.show_empty(EmptyState::NoTables);
        }

        let signature = CatalogSignature::new(connection_id, tables);
        if self.catalog.signature() == Some(&signature) {
            // the built catalog matches; any request still in flight is for
            // a selection that has since been abandoned
            self.issued += 1;
            debug!(connection = connection_id, "catalog signature unchanged");
            return RefreshOutcome::Unchanged;
        }

        self.issued += 1;
        RefreshOutcome::Pending(RefreshTicket {
            generation: self.issued,
            signature,
        })
    }

    pub fn complete(
        &mut self,
        ticket: RefreshTicket,
        result: Result<BatchColumnsResponse, BackendError>,
    ) -> RefreshOutcome {
        if ticket.generation != self.issued {
            warn!(
                generation = ticket.generation,
                latest = self.issued,
                "discarding stale catalog response"
            );
            return RefreshOutcome::Stale;
        }

        match result {
            Ok(response) => {
                self.catalog = FieldCatalog::build(ticket.signature, &response);
                info!(fields = self.catalog.len(), "field catalog rebuilt");
                RefreshOutcome::Applied {
                    fields: self.catalog.len(),
                }
            }
            Err(err) => {
                warn!(error = %err, "catalog refresh failed");
                if self.catalog.signature().is_none() {
                    self.catalog = FieldCatalog::empty(EmptyState::LoadFailed(err.to_string()));
                }
                RefreshOutcome::Failed(err.to_string())
            }
        }
    }

    pub fn refresh(
        &mut self,
        backend: &dyn DesignerBackend,
        connection_id: Option<&str>,
        tables: &[String],
    ) -> RefreshOutcome {
        match self.begin(connection_id, tables) {
            RefreshOutcome::Pending(ticket) => {
                let result = backend.batch_columns(&ticket.request());
                self.complete(ticket, result)
            }
            other => other,
        }
    }

    fn show_empty(&mut self, state: EmptyState) -> RefreshOutcome {
        self.issued += 1;
        self.catalog = FieldCatalog::empty(state.clone());
        RefreshOutcome::Empty(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SourceColumn;

    fn columns() -> BatchColumnsResponse {
        BatchColumnsResponse {
            columns: vec![
                SourceColumn::new("orders", "id", "int"),
                SourceColumn::new("orders", "customer_id", "int"),
                SourceColumn::new("orders", "amount", "decimal(10,2)"),
                SourceColumn::new("customers", "id", "int"),
                SourceColumn::new("customers", "name", "varchar"),
                SourceColumn::new("customers", "joined_on", "date"),
            ],
        }
    }

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_and_lookup() {
        let sig = CatalogSignature::new("c1", &tables(&["orders", "customers"]));
        let catalog = FieldCatalog::build(sig, &columns());

        assert_eq!(catalog.len(), 6);
        let amount = catalog.field("orders.amount").unwrap();
        assert_eq!(amount.role, Role::Measure);
        assert_eq!(catalog.field("customers.joined_on").unwrap().role, Role::Dimension);
        assert_eq!(catalog.field("orders.customer_id").unwrap().label, "Customer Id");
        assert!(catalog.field("orders.missing").is_none());
    }

    #[test]
    fn test_search_excludes_assigned() {
        let sig = CatalogSignature::new("c1", &tables(&["orders", "customers"]));
        let catalog = FieldCatalog::build(sig, &columns());
        let mut exclude = HashSet::new();
        exclude.insert("orders.id".to_string());

        let hits: Vec<&str> = catalog
            .search("ID", &exclude)
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(hits, vec!["orders.customer_id", "customers.id"]);
    }

    #[test]
    fn test_empty_states() {
        let mut loader = CatalogLoader::default();
        assert_eq!(
            loader.begin(None, &tables(&["orders"])),
            RefreshOutcome::Empty(EmptyState::NoConnection)
        );
        assert_eq!(
            loader.begin(Some("c1"), &[]),
            RefreshOutcome::Empty(EmptyState::NoTables)
        );
        assert!(loader.catalog().is_empty());
    }

    #[test]
    fn test_signature_ignores_table_order() {
        let mut loader = CatalogLoader::default();
        let ticket = match loader.begin(Some("c1"), &tables(&["orders", "customers"])) {
            RefreshOutcome::Pending(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        loader.complete(ticket, Ok(columns()));
        assert_eq!(
            loader.begin(Some("c1"), &tables(&["customers", "orders"])),
            RefreshOutcome::Unchanged
        );
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut loader = CatalogLoader::default();
        let first = match loader.begin(Some("c1"), &tables(&["orders"])) {
            RefreshOutcome::Pending(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        let second = match loader.begin(Some("c1"), &tables(&["customers"])) {
            RefreshOutcome::Pending(t) => t,
            other => panic!("unexpected {:?}", other),
        };

        assert!(matches!(
            loader.complete(second, Ok(columns())),
            RefreshOutcome::Applied { fields: 3 }
        ));
        assert_eq!(loader.complete(first, Ok(columns())), RefreshOutcome::Stale);
        assert!(loader.catalog().contains("customers.name"));
        assert!(!loader.catalog().contains("orders.amount"));
    }

    #[test]
    fn test_returning_to_built_selection_cancels_pending() {
        let mut loader = CatalogLoader::default();
        let built = match loader.begin(Some("c1"), &tables(&["orders"])) {
            RefreshOutcome::Pending(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        loader.complete(built, Ok(columns()));

        let abandoned = match loader.begin(Some("c1"), &tables(&["customers"])) {
            RefreshOutcome::Pending(t) => t,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            loader.begin(Some("c1"), &tables(&["orders"])),
            RefreshOutcome::Unchanged
        );

        assert_eq!(loader.complete(abandoned, Ok(columns())), RefreshOutcome::Stale);
        let signature = loader.catalog().signature().unwrap();
        assert_eq!(signature.tables, vec!["orders"]);
        assert!(loader.catalog().contains("orders.amount"));
    }

    #[test]
    fn test_fields_grouped_by_table() {
        let sig = CatalogSignature::new("c1", &tables(&["orders", "customers"]));
        let catalog = FieldCatalog::build(sig, &columns());
        let groups: Vec<(&str, Vec<&str>)> = catalog
            .fields_by_table()
            .into_iter()
            .map(|(table, fields)| (table, fields.iter().map(|f| f.column.as_str()).collect()))
            .collect();
        assert_eq!(
            groups,
            vec![
                ("orders", vec!["id", "customer_id", "amount"]),
                ("customers", vec!["id", "name", "joined_on"]),
            ]
        );
    }
}
