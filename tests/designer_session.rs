use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use misboard::backend::{
    BackendError, Confidence, MemoryBackend, Row, SchemaPayload, StoredJoin, StoredLayout,
    SuggestJoinsResponse, SuggestedEdge, SuggestionSource,
};
use misboard::blueprint::WidgetType;
use misboard::catalog::RefreshOutcome;
use misboard::config::DesignerConfig;
use misboard::render::Visual;
use misboard::schema::{Column, Table};
use misboard::widget::{Aggregation, MeasureRef};
use misboard::{DesignerError, DesignerSession, NoticeLevel};

fn schema() -> SchemaPayload {
    SchemaPayload {
        tables: vec![
            Table::new(
                "orders",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("customer_id", "int"),
                    Column::new("amount", "numeric"),
                    Column::new("region", "varchar"),
                ],
            ),
            Table::new(
                "customers",
                vec![
                    Column::new("id", "int").primary_key(),
                    Column::new("name", "text"),
                ],
            ),
            Table::new(
                "regions",
                vec![
                    Column::new("code", "varchar").primary_key(),
                    Column::new("label", "varchar"),
                ],
            ),
        ],
        layout: vec![
            layout("orders", 40.0, 40.0),
            layout("customers", 400.0, 40.0),
        ],
        joins: vec![StoredJoin {
            left_table: "orders".into(),
            left_column: "customer_id".into(),
            right_table: "customers".into(),
            right_column: "id".into(),
            join_type: None,
            cardinality: None,
        }],
    }
}

fn layout(table: &str, x: f64, y: f64) -> StoredLayout {
    StoredLayout {
        table_name: table.into(),
        x_pos: x,
        y_pos: y,
        collapsed: false,
    }
}

fn session_with(backend: &Rc<MemoryBackend>) -> DesignerSession {
    DesignerSession::new(DesignerConfig::default(), Box::new(backend.clone()))
}

fn connected() -> (Rc<MemoryBackend>, DesignerSession) {
    let backend = Rc::new(MemoryBackend::new().with_schema("c1", schema()));
    let mut session = session_with(&backend);
    session.select_connection(Some("c1"));
    let outcome = session.select_tables(vec!["orders".into(), "customers".into()]);
    assert_eq!(outcome, RefreshOutcome::Applied { fields: 6 });
    session.take_notices();
    (backend, session)
}

fn suggested(
    left: (&str, &str),
    right: (&str, &str),
    source: SuggestionSource,
    confidence: Confidence,
) -> SuggestedEdge {
    SuggestedEdge {
        left_table: left.0.into(),
        left_column: left.1.into(),
        right_table: right.0.into(),
        right_column: right.1.into(),
        join_type: None,
        source,
        confidence,
    }
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().unwrap().clone()
}

#[test]
fn test_amount_into_bar_chart_sums() {
    let (_, mut session) = connected();
    let widget = session.add_widget(WidgetType::Bar).unwrap();

    let slot = session.assign_field(&widget, "orders.amount").unwrap();
    assert_eq!(slot, "measures");
    let config = &session.widget(&widget).unwrap().data_config;
    assert_eq!(
        config.shortcuts.y_fields,
        vec![MeasureRef {
            field: "orders.amount".into(),
            aggregation: Aggregation::Sum,
        }]
    );
    assert!(session.notices().is_empty());
}

#[test]
fn test_name_into_kpi_counts() {
    let (_, mut session) = connected();
    let widget = session.add_widget(WidgetType::Kpi).unwrap();
    session
        .assign_field_to_slot(&widget, "primaryMeasure", "customers.name")
        .unwrap();

    let assignment = &session.widget(&widget).unwrap().data_config.slots["primaryMeasure"][0];
    assert_eq!(assignment.aggregation, Some(Aggregation::Count));

    let err = session
        .set_aggregation(&widget, "customers.name", Aggregation::Avg)
        .unwrap_err();
    assert!(matches!(err, DesignerError::Binding(_)));
    assert_eq!(session.take_notices().len(), 1);
}

#[test]
fn test_duplicate_assignment_warns_once() {
    let (_, mut session) = connected();
    let widget = session.add_widget(WidgetType::Bar).unwrap();
    session.assign_field(&widget, "orders.amount").unwrap();
    let before = session.widget(&widget).unwrap().clone();

    assert!(session.assign_field(&widget, "orders.amount").is_err());
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(session.widget(&widget).unwrap(), &before);
}

#[test]
fn test_search_hides_fields_on_focused_widget() {
    let (_, mut session) = connected();
    let widget = session.add_widget(WidgetType::Table).unwrap();
    assert_eq!(session.search_fields("id").len(), 3);

    session.assign_field(&widget, "orders.id").unwrap();
    let ids: Vec<&str> = session
        .search_fields("id")
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    assert_eq!(ids, vec!["orders.customer_id", "customers.id"]);
}

#[test]
fn test_dropping_a_table_prunes_assignments() {
    let (_, mut session) = connected();
    let widget = session.add_widget(WidgetType::Bar).unwrap();
    session.assign_field(&widget, "orders.amount").unwrap();

    session.select_tables(vec!["customers".into()]);
    let config = &session.widget(&widget).unwrap().data_config;
    assert!(config.slots["measures"].is_empty());
    assert!(config.shortcuts.y_fields.is_empty());

    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
}

#[test]
fn test_render_states() {
    let (backend, mut session) = connected();
    let widget = session.add_widget(WidgetType::Bar).unwrap();
    session.assign_field(&widget, "orders.region").unwrap();
    session.assign_field(&widget, "orders.amount").unwrap();

    let visual = session.render_widget(&widget).unwrap();
    assert!(matches!(visual, Visual::NoData { .. }));

    backend.set_rows(
        &widget,
        vec![
            row(json!({"region": "EU", "amount": 10})),
            row(json!({"region": "US", "amount": 32})),
        ],
    );
    let visual = session.render_widget(&widget).unwrap();
    assert_eq!(visual.kind(), "chart");

    let (_, request) = backend.widget_requests().pop().unwrap();
    assert_eq!(request.widget_type, WidgetType::Bar);
    assert_eq!(request.data_config.dimensions, vec!["orders.region"]);

    backend.set_widget_error(&widget, "column amount does not exist");
    let visual = session.render_widget(&widget).unwrap();
    assert_eq!(visual, Visual::error("column amount does not exist"));
}

#[test]
fn test_load_model_reports_stale_references() {
    let mut payload = schema();
    payload.layout.push(layout("archived", 0.0, 300.0));
    let backend = Rc::new(MemoryBackend::new().with_schema("c1", payload));
    let mut session = session_with(&backend);
    session.select_connection(Some("c1"));
    session.take_notices();

    let report = session.load_model().unwrap();
    assert_eq!(report.dropped_tables, vec!["archived"]);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "1 table removed due to schema changes");
    assert_eq!(session.editor().cards().count(), 2);
    assert_eq!(session.editor().edges().len(), 1);
}

#[test]
fn test_undo_redo_round_trip() {
    let (_, mut session) = connected();
    session.load_model().unwrap();
    let original = session.editor().snapshot();

    session.edit(|e| e.add_table("regions", 40.0, 300.0)).unwrap();
    session.edit(|e| e.move_table("orders", 120.0, 80.0)).unwrap();
    session.edit(|e| e.collapse("customers")).unwrap();
    let edited = session.editor().snapshot();

    for _ in 0..3 {
        assert!(session.undo());
    }
    assert!(!session.undo());
    assert_eq!(session.editor().snapshot(), original);

    for _ in 0..3 {
        assert!(session.redo());
    }
    assert!(!session.redo());
    assert_eq!(session.editor().snapshot(), edited);
}

#[test]
fn test_save_failure_keeps_local_state() {
    let (backend, mut session) = connected();
    session.load_model().unwrap();
    session.edit(|e| e.move_table("orders", 10.0, 10.0)).unwrap();

    backend.fail_saves(Some(BackendError::Transport("connection reset".into())));
    assert!(session.save_model().is_err());
    let notices = session.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(session.editor().is_dirty());
    assert!(backend.saved_models().is_empty());

    backend.fail_saves(None);
    session.save_model().unwrap();
    assert!(!session.editor().is_dirty());
    assert_eq!(backend.saved_models().len(), 1);
}

#[test]
fn test_slow_model_load_times_out() {
    let backend = Rc::new(MemoryBackend::new().with_schema("c1", schema()));
    backend.set_load_latency(Duration::from_secs(20));
    let mut session = session_with(&backend);
    session.select_connection(Some("c1"));
    session.take_notices();

    let err = session.load_model().unwrap_err();
    assert!(matches!(err, DesignerError::Backend(BackendError::Timeout(_))));
    assert!(!session.editor().is_loaded());
    assert_eq!(session.take_notices()[0].level, NoticeLevel::Error);

    assert!(session.edit(|e| e.add_table("orders", 0.0, 0.0)).is_err());
}

#[test]
fn test_dashboard_round_trip() {
    let (backend, mut session) = connected();
    let widget = session.add_widget(WidgetType::Pie).unwrap();
    session.assign_field(&widget, "orders.region").unwrap();
    session.set_theme("dark");
    session.save_dashboard().unwrap();

    let stored = backend.dashboard().unwrap();
    assert_eq!(stored.theme, "dark");

    let mut other = session_with(&backend);
    other.load_dashboard().unwrap();
    assert_eq!(other.dashboard(), &stored);
    assert_eq!(other.active_page().unwrap().widgets.len(), 1);
}

#[test]
fn test_catalog_grouped_by_table() {
    let (_, session) = connected();
    let groups: Vec<(&str, Vec<&str>)> = session
        .catalog()
        .fields_by_table()
        .into_iter()
        .map(|(table, fields)| (table, fields.iter().map(|f| f.id.as_str()).collect()))
        .collect();
    assert_eq!(
        groups,
        vec![
            (
                "orders",
                vec!["orders.id", "orders.customer_id", "orders.amount", "orders.region"]
            ),
            ("customers", vec!["customers.id", "customers.name"]),
        ]
    );
}

#[test]
fn test_pruning_leaves_intact_widgets_alone() {
    let (_, mut session) = connected();
    let chart = session.add_widget(WidgetType::Bar).unwrap();
    session.assign_field(&chart, "orders.amount").unwrap();

    let page = session.add_page("Customers");
    session.set_active_page(&page).unwrap();
    let kpi = session.add_widget(WidgetType::Kpi).unwrap();
    session.assign_field(&kpi, "customers.name").unwrap();
    let untouched = session.widget(&kpi).unwrap().clone();
    session.take_notices();

    session.select_tables(vec!["customers".into()]);
    assert!(session.widget(&chart).unwrap().data_config.slots["measures"].is_empty());
    assert_eq!(session.widget(&kpi).unwrap(), &untouched);
    assert_eq!(session.take_notices().len(), 1);
}

#[test]
fn test_join_suggestions_flow() {
    let suggestions = SuggestJoinsResponse {
        edges: vec![
            suggested(
                ("orders", "region"),
                ("regions", "code"),
                SuggestionSource::AutoFk,
                Confidence::High,
            ),
            suggested(
                ("customers", "name"),
                ("regions", "label"),
                SuggestionSource::Heuristic,
                Confidence::Low,
            ),
        ],
        // already drawn on the canvas
        chosen: vec![suggested(
            ("orders", "customer_id"),
            ("customers", "id"),
            SuggestionSource::Predefined,
            Confidence::High,
        )],
        needs_manual: true,
    };
    let backend = Rc::new(
        MemoryBackend::new()
            .with_schema("c1", schema())
            .with_suggestions("c1", suggestions),
    );
    let mut session = session_with(&backend);
    session.select_connection(Some("c1"));
    session.load_model().unwrap();
    session.edit(|e| e.add_table("regions", 40.0, 300.0)).unwrap();
    session.take_notices();

    let batch = session.suggest_joins().unwrap();
    assert_eq!(batch.pending, 2);
    assert!(batch.needs_manual);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Info);

    let accepted = session.accept_high_confidence();
    assert_eq!(accepted.accepted.len(), 1);
    assert!(accepted.failed.is_empty());
    assert_eq!(session.editor().edges().len(), 2);

    let remaining: Vec<u64> = session.editor().suggestions().iter().map(|s| s.id).collect();
    assert_eq!(remaining.len(), 1);
    session.reject_suggestion(remaining[0]).unwrap();
    assert!(session.editor().suggestions().is_empty());

    assert!(session.accept_suggestion(remaining[0]).is_err());
    assert_eq!(session.take_notices()[0].level, NoticeLevel::Warning);

    assert!(session.undo());
    assert_eq!(session.editor().edges().len(), 1);
}

#[test]
fn test_suggestions_need_a_loaded_model() {
    let (_, mut session) = connected();
    let err = session.suggest_joins().unwrap_err();
    assert!(matches!(err, DesignerError::NotLoaded));
    assert_eq!(session.take_notices()[0].level, NoticeLevel::Error);

    session.load_model().unwrap();
    session.take_notices();
    let err = session
        .receive_suggestions(Err(BackendError::Transport("offline".into())))
        .unwrap_err();
    assert!(matches!(err, DesignerError::Backend(_)));
    assert_eq!(session.take_notices()[0].level, NoticeLevel::Error);
    assert!(session.editor().suggestions().is_empty());
}
