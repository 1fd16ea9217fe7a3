use std::path::{Component, Path};

use super::CatalogError;

/// Translate rusqlite errors into friendlier CatalogError variants.
pub(crate) fn map_sql_error(err: rusqlite::Error) -> CatalogError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            CatalogError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => CatalogError::Unexpected,
        other => CatalogError::Sql(other),
    }
}

/// True when the error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.code == rusqlite::ErrorCode::ConstraintViolation
                && sql_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Normalize a relative path for stable catalog storage.
///
/// Components are joined with `/` exactly as the filesystem reports them, so
/// the stored string joins back onto the base path to the same file. Rejects
/// absolute paths, parent traversal, root prefixes, empty paths, and names
/// that are not valid UTF-8.
pub fn normalize_relative_path(path: &Path) -> Result<String, CatalogError> {
    if path.is_absolute() {
        return Err(CatalogError::PathMustBeRelative(path.to_path_buf()));
    }
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| CatalogError::NonUtf8Path(path.to_path_buf()))?;
                parts.push(part);
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CatalogError::InvalidRelativePath(path.to_path_buf()));
            }
        }
    }
    if parts.is_empty() {
        return Err(CatalogError::InvalidRelativePath(path.to_path_buf()));
    }
    Ok(parts.join("/"))
}

/// Escape `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` clause.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub(super) fn create_parent_if_needed(path: &Path) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
