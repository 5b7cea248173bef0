use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use cross_xdg::BaseDirs;
use tracing::debug;

use crate::InterpreterError;

pub const DEFAULT_NUMBER_OF_CELLS: usize = 30_000;

/// Validated construction parameters for an [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    number_of_cells: usize,
    max_cells: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            number_of_cells: DEFAULT_NUMBER_OF_CELLS,
            max_cells: None,
        }
    }
}

impl EngineConfig {
    /// Both values must be positive; `max_cells: None` means unlimited.
    pub fn new(number_of_cells: usize, max_cells: Option<usize>) -> Result<Self, InterpreterError> {
        if number_of_cells == 0 {
            return Err(not_positive("number_of_cells", "0"));
        }
        if max_cells == Some(0) {
            return Err(not_positive("max_cells", "0"));
        }
        Ok(Self { number_of_cells, max_cells })
    }

    /// Parse textual values, as they arrive from flags, env or the config file.
    pub fn from_raw(
        number_of_cells: Option<&str>,
        max_cells: Option<&str>,
    ) -> Result<Self, InterpreterError> {
        let number_of_cells = match number_of_cells {
            Some(raw) => parse_positive("number_of_cells", raw)?,
            None => DEFAULT_NUMBER_OF_CELLS,
        };
        let max_cells = match max_cells {
            Some(raw) if raw.trim().eq_ignore_ascii_case("unlimited") => None,
            Some(raw) => Some(parse_positive("max_cells", raw)?),
            None => None,
        };
        Ok(Self { number_of_cells, max_cells })
    }

    pub fn number_of_cells(&self) -> usize {
        self.number_of_cells
    }

    pub fn max_cells(&self) -> Option<usize> {
        self.max_cells
    }
}

/// Parse a strictly positive integer for `field`.
pub fn parse_positive(field: &'static str, raw: &str) -> Result<usize, InterpreterError> {
    let trimmed = raw.trim();
    // Signed parse: negative input is non-positive, not malformed.
    match trimmed.parse::<i128>() {
        Ok(n) if n < 1 => Err(not_positive(field, raw)),
        Ok(n) => usize::try_from(n).map_err(|_| InterpreterError::InvalidConfiguration {
            field,
            value: raw.to_string(),
            reason: "value is too large",
        }),
        Err(_) => Err(InterpreterError::InvalidConfiguration {
            field,
            value: raw.to_string(),
            reason: "must be an integer",
        }),
    }
}

fn not_positive(field: &'static str, raw: &str) -> InterpreterError {
    InterpreterError::InvalidConfiguration {
        field,
        value: raw.to_string(),
        reason: "must be greater than 0",
    }
}

/// Settings read from the `[interpreter]` section of `bf.toml`.
///
/// Values are kept as text so they go through the same validation as flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSettings {
    pub number_of_cells: Option<String>,
    pub max_cells: Option<String>,
    pub max_steps: Option<String>,
    pub timeout_ms: Option<String>,
}

/// Location of the config file: `$BF_CONFIG`, else `<xdg config home>/bf.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(custom) = std::env::var("BF_CONFIG") {
        return Some(PathBuf::from(custom));
    }

    // On Linux: resolves to /home/<user>/.config
    // On macOS: resolves to /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("bf.toml");
    Some(path)
}

/// Load file settings. A missing or unreadable file yields the empty default.
pub fn load_file_settings() -> FileSettings {
    let Some(path) = config_path() else {
        return FileSettings::default();
    };
    match fs::read_to_string(&path) {
        Ok(content) => {
            debug!(path = %path.display(), "loaded config file");
            parse_settings(&content)
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "no config file");
            FileSettings::default()
        }
    }
}

/// Very small hand-rolled parser: look for the [interpreter] section and key = value pairs.
pub fn parse_settings(content: &str) -> FileSettings {
    let mut in_section = false;
    let mut map: HashMap<String, String> = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            in_section = &line[1..line.len() - 1] == "interpreter";
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, val_raw)) = line.split_once('=') {
            let val_raw = val_raw.trim();
            // Accept quoted or unquoted
            let val = val_raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(val_raw);
            map.insert(key.trim().to_string(), val.to_string());
        }
    }

    FileSettings {
        number_of_cells: map.remove("number_of_cells"),
        max_cells: map.remove("max_cells"),
        max_steps: map.remove("max_steps"),
        timeout_ms: map.remove("timeout_ms"),
    }
}

/// First of flag, environment value, file value; `None` when none are set.
pub fn resolve(flag: Option<String>, env: Option<String>, file: Option<String>) -> Option<String> {
    flag.or(env).or(file)
}

/// Process environment lookup, for use with [`resolve`].
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
