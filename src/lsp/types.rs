//! Path and URI helpers.

use std::path::Path;

use lsp_types::Url;

use crate::error::LspError;

use super::LspResult;

/// Converts a path to an LSP `file://` URI.
///
/// Relative paths are resolved against the current directory and symlinks
/// are resolved, so the same file always maps to the same URI.
/// ## Errors
/// `LspError::DocumentNotFound` if the path does not exist.
pub fn path_to_url(path: &Path) -> LspResult<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| {
                LspError::DocumentNotFound(format!("failed to get current directory: {e}"))
            })?
            .join(path)
    };

    let canonical = absolute.canonicalize().map_err(|e| {
        LspError::DocumentNotFound(format!(
            "failed to canonicalize path '{}': {}",
            path.display(),
            e
        ))
    })?;

    Url::from_file_path(&canonical)
        .map_err(|()| LspError::DocumentNotFound(format!("invalid path: {}", canonical.display())))
}
