use crate::editor::{CanvasEdge, JoinGraphEditor};
use crate::model::{JoinType, TableCardLayout};
use crate::schema::Table;
use std::collections::HashSet;
use std::fmt::Write;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Renders the join graph canvas from the editor's layout store.
pub struct SvgRenderer {
    margin: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self { margin: 40.0 }
    }
}

impl SvgRenderer {
    pub fn render(&self, editor: &JoinGraphEditor) -> String {
        let mut svg = String::new();

        let (mut width, mut height) = (self.margin * 2.0, self.margin * 2.0);
        for card in editor.cards() {
            if let Some((x, y, w, h)) = editor.card_bounds(&card.table_name) {
                width = width.max(x + w + self.margin);
                height = height.max(y + h + self.margin);
            }
        }
        let viewport = editor.viewport();

        writeln!(
            &mut svg,
            r#"<svg xmlns="{}" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            SVG_NS,
            w = width * viewport.zoom,
            h = height * viewport.zoom,
        )
        .unwrap();

        // Style
        writeln!(
            &mut svg,
            r#"<style>
  .table-bg {{ fill: #fff; }}
  .table-header {{ fill: #e0e0e0; }}
  .table-border {{ fill: none; stroke: #333; stroke-width: 1.5; }}
  .table-name {{ font-family: monospace; font-size: 14px; font-weight: bold; }}
  .column-text {{ font-family: monospace; font-size: 12px; }}
  .pk {{ font-weight: bold; }}
  .joined {{ fill: #1f5fa8; }}
  .hidden-count {{ font-family: monospace; font-size: 11px; fill: #777; }}
  .edge {{ stroke: #666; stroke-width: 1.5; fill: none; }}
  .edge.left {{ stroke-dasharray: 6 3; }}
  .edge.right {{ stroke-dasharray: 2 3; }}
  .edge.rerouted {{ stroke: #999; }}
  .cardinality {{ font-family: monospace; font-size: 11px; fill: #333; }}
  .edge-label {{ font-family: monospace; font-size: 10px; fill: #666; }}
</style>"#
        )
        .unwrap();

        writeln!(
            &mut svg,
            r#"<g transform="translate({} {}) scale({})">"#,
            -viewport.scroll_x, -viewport.scroll_y, viewport.zoom
        )
        .unwrap();

        // Edges first (behind cards)
        for edge in editor.edges() {
            self.render_edge(&mut svg, editor, edge);
        }

        let joined: HashSet<(String, String)> = editor
            .edges()
            .iter()
            .flat_map(|e| [&e.left, &e.right])
            .map(|end| (end.table.clone(), end.anchor.column().to_string()))
            .collect();

        for card in editor.cards() {
            if let Some(table) = editor.table(&card.table_name) {
                self.render_card(&mut svg, editor, card, table, &joined);
            }
        }

        writeln!(&mut svg, "</g>").unwrap();
        writeln!(&mut svg, "</svg>").unwrap();
        svg
    }

    fn render_card(
        &self,
        svg: &mut String,
        editor: &JoinGraphEditor,
        card: &TableCardLayout,
        table: &Table,
        joined: &HashSet<(String, String)>,
    ) {
        let metrics = editor.metrics();
        let Some((x, y, w, h)) = editor.card_bounds(&card.table_name) else {
            return;
        };
        let header_h = if card.collapsed {
            h
        } else {
            metrics.header_height()
        };

        // 1. Background
        writeln!(
            svg,
            r#"<rect class="table-bg" x="{}" y="{}" width="{}" height="{}" rx="4" />"#,
            x, y, w, h
        )
        .unwrap();

        // 2. Header background
        writeln!(
            svg,
            r#"<rect class="table-header" x="{}" y="{}" width="{}" height="{}" rx="4" />"#,
            x, y, w, header_h
        )
        .unwrap();
        if !card.collapsed && !table.columns.is_empty() {
            // square off the header's bottom corners
            writeln!(
                svg,
                r#"<rect class="table-header" x="{}" y="{}" width="{}" height="{}" />"#,
                x,
                y + header_h - 4.0,
                w,
                4.0
            )
            .unwrap();
        }

        // 3. Table name
        writeln!(
            svg,
            r#"<text class="table-name" x="{}" y="{}" text-anchor="middle">{}</text>"#,
            x + w / 2.0,
            y + metrics.header_center(card.collapsed) + 5.0,
            escape_xml(&table.name)
        )
        .unwrap();

        if card.collapsed {
            writeln!(
                svg,
                r#"<text class="hidden-count" x="{}" y="{}" text-anchor="end">{}</text>"#,
                x + w - metrics.padding_x,
                y + metrics.header_center(true) + 4.0,
                table.columns.len()
            )
            .unwrap();
        } else if !table.columns.is_empty() {
            // 4. Separator and column rows
            writeln!(
                svg,
                r##"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#333" stroke-width="1" />"##,
                x,
                y + header_h,
                x + w,
                y + header_h
            )
            .unwrap();

            for (row, col) in table.columns.iter().enumerate() {
                let mut class = "column-text".to_string();
                if col.is_primary_key {
                    class.push_str(" pk");
                }
                if joined.contains(&(table.name.clone(), col.name.clone())) {
                    class.push_str(" joined");
                }

                let prefix = if col.is_primary_key { "◆ " } else { "  " };
                let text = format!("{}{}: {}", prefix, col.name, col.typ);

                writeln!(
                    svg,
                    r#"<text class="{}" x="{}" y="{}">{}</text>"#,
                    class,
                    x + metrics.padding_x,
                    y + metrics.row_center(row) + 4.0,
                    escape_xml(&text)
                )
                .unwrap();
            }
        }

        // 5. Border on top
        writeln!(
            svg,
            r#"<rect class="table-border" x="{}" y="{}" width="{}" height="{}" rx="4" />"#,
            x, y, w, h
        )
        .unwrap();
    }

    fn render_edge(&self, svg: &mut String, editor: &JoinGraphEditor, edge: &CanvasEdge) {
        let Some(((x1, y1), (x2, y2))) = editor.edge_points(edge) else {
            return;
        };

        let mut class = format!("edge {}", join_class(edge.join_type));
        if edge.left.anchor.is_header() || edge.right.anchor.is_header() {
            class.push_str(" rerouted");
        }

        writeln!(
            svg,
            r#"<line class="{}" x1="{}" y1="{}" x2="{}" y2="{}" />"#,
            class, x1, y1, x2, y2
        )
        .unwrap();

        let offset = 12.0;
        let dx = x2 - x1;
        let dy = y2 - y1;
        let len = (dx * dx + dy * dy).sqrt();
        if len > 0.0 {
            let ux = dx / len;
            let uy = dy / len;
            let (left_label, right_label) = edge.cardinality.end_labels();

            writeln!(
                svg,
                r#"<text class="cardinality" x="{}" y="{}">{}</text>"#,
                x1 + ux * offset,
                y1 + uy * offset - 5.0,
                left_label
            )
            .unwrap();
            writeln!(
                svg,
                r#"<text class="cardinality" x="{}" y="{}">{}</text>"#,
                x2 - ux * offset,
                y2 - uy * offset - 5.0,
                right_label
            )
            .unwrap();

            if edge.join_type != JoinType::Inner {
                writeln!(
                    svg,
                    r#"<text class="edge-label" x="{}" y="{}" text-anchor="middle">{}</text>"#,
                    (x1 + x2) / 2.0,
                    (y1 + y2) / 2.0 - 5.0,
                    edge.join_type.as_str()
                )
                .unwrap();
            }
        }
    }
}

fn join_class(join_type: JoinType) -> &'static str {
    match join_type {
        JoinType::Inner => "inner",
        JoinType::Left => "left",
        JoinType::Right => "right",
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SchemaPayload, StoredLayout};
    use crate::model::ColumnRef;
    use crate::schema::Column;

    fn editor() -> JoinGraphEditor {
        let mut editor = JoinGraphEditor::default();
        editor.load(SchemaPayload {
            tables: vec![
                Table::new(
                    "customers",
                    vec![
                        Column::new("id", "int").primary_key(),
                        Column::new("name", "varchar"),
                    ],
                ),
                Table::new(
                    "orders",
                    vec![
                        Column::new("id", "int").primary_key(),
                        Column::new("customer_id", "int"),
                    ],
                ),
            ],
            layout: vec![
                StoredLayout {
                    table_name: "customers".into(),
                    x_pos: 40.0,
                    y_pos: 40.0,
                    collapsed: false,
                },
                StoredLayout {
                    table_name: "orders".into(),
                    x_pos: 400.0,
                    y_pos: 40.0,
                    collapsed: false,
                },
            ],
            joins: vec![],
        });
        editor
    }

    #[test]
    fn test_render_cards() {
        let svg = SvgRenderer::default().render(&editor());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("customers"));
        assert!(svg.contains("◆ id: int"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_render_join_styles() {
        let mut editor = editor();
        editor
            .add_join(
                &ColumnRef::new("orders", "customer_id"),
                &ColumnRef::new("customers", "id"),
                JoinType::Left,
            )
            .unwrap();
        let svg = SvgRenderer::default().render(&editor);
        assert!(svg.contains(r#"class="edge left""#));
        assert!(svg.contains(">LEFT<"));
        let row = svg
            .lines()
            .find(|line| line.contains(">  customer_id: int</text>"))
            .unwrap();
        assert!(row.starts_with(r#"<text class="column-text joined" "#));

        editor.collapse("orders").unwrap();
        let svg = SvgRenderer::default().render(&editor);
        assert!(svg.contains("edge left rerouted"));
        assert!(!svg.contains("customer_id: int"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_xml("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
