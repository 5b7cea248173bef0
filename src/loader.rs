use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Failure to obtain program text.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read a program file as UTF-8 text.
pub fn load_file(path: &Path) -> Result<String, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound { path: path.to_path_buf() });
    }
    fs::read_to_string(path).map_err(|source| LoadError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Program text from positional arguments, concatenated without separators.
pub fn from_parts(parts: &[String]) -> String {
    parts.concat()
}
