use thiserror::Error;

use crate::backend::BackendError;
use crate::binding::BindingError;
use crate::config::ConfigError;
use crate::editor::EditorError;

#[derive(Debug, Error)]
pub enum DesignerError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no widget with id '{0}'")]
    UnknownWidget(String),
    #[error("no page with id '{0}'")]
    UnknownPage(String),
    #[error("no field with id '{0}' in the catalog")]
    UnknownField(String),
    #[error("no connection selected")]
    NoConnection,
    #[error("no schema model loaded")]
    NotLoaded,
    #[error("invalid document: {0}")]
    Document(#[from] serde_json::Error),
}

impl DesignerError {
    /// User mistakes warn; backend and configuration failures are errors.
    pub fn is_user_error(&self) -> bool {
        match self {
            DesignerError::Binding(_)
            | DesignerError::UnknownWidget(_)
            | DesignerError::UnknownPage(_)
            | DesignerError::UnknownField(_) => true,
            DesignerError::Editor(err) => !matches!(
                err,
                EditorError::Backend(_) | EditorError::SaveRejected(_)
            ),
            _ => false,
        }
    }
}
