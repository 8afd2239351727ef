pub mod backend;
pub mod binding;
pub mod blueprint;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod layout;
pub mod measure;
pub mod model;
pub mod render;
pub mod schema;
pub mod session;
pub mod svg;
pub mod wasm;
pub mod widget;

use wasm_bindgen::prelude::*;

use backend::{SchemaPayload, StoredLayout};
use editor::JoinGraphEditor;
use svg::SvgRenderer;

pub use error::DesignerError;
pub use session::{DesignerSession, Notice, NoticeLevel};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Render a stored schema model to SVG. Tables without a saved position are
/// auto-arranged first.
#[wasm_bindgen(js_name = "schemaToSvg")]
pub fn render_schema(payload: &str) -> Result<String, String> {
    let payload: SchemaPayload = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    let mut editor = JoinGraphEditor::default();
    arrange_unplaced(&mut editor, payload).map_err(|e| e.to_string())?;
    Ok(SvgRenderer::default().render(&editor))
}

/// Load `payload`, putting every table without a stored position on the
/// canvas. If any were missing the whole canvas is auto-arranged.
pub fn arrange_unplaced(
    editor: &mut JoinGraphEditor,
    mut payload: SchemaPayload,
) -> Result<(), DesignerError> {
    let unplaced: Vec<String> = payload
        .tables
        .iter()
        .filter(|t| !payload.layout.iter().any(|l| l.table_name == t.name))
        .map(|t| t.name.clone())
        .collect();
    let needs_layout = !unplaced.is_empty();
    payload
        .layout
        .extend(unplaced.into_iter().map(|table_name| StoredLayout {
            table_name,
            x_pos: 0.0,
            y_pos: 0.0,
            collapsed: false,
        }));
    editor.load(payload);
    if needs_layout {
        editor.auto_arrange()?;
    }
    Ok(())
}
