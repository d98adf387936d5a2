use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Errors produced while loading or reading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: String, source: std::io::Error },
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
    Syntax {
        line: usize,
        text: String,
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "error reading file {path}: {source}"),
            Self::InvalidValue {
                section,
                key,
                value,
                reason,
            } => write!(f, "invalid value {value:?} for [{section}] {key}: {reason}"),
            Self::Syntax { line, text, reason } => write!(f, "line {line}: {reason}: {text:?}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::InvalidValue { .. } | Self::Syntax { .. } => None,
        }
    }
}

/// INI-style configuration: `key = value` lines, optionally grouped under
/// `[Section]` headers. Lines starting with `#` are comments; values may be
/// wrapped in double quotes.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration text. Malformed lines are reported with their
    /// 1-based line number instead of being skipped.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let syntax = |reason| ConfigError::Syntax {
                line: idx + 1,
                text: line.to_owned(),
                reason,
            };

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| syntax("unterminated section header"))?
                    .trim();
                if name.is_empty() {
                    return Err(syntax("empty section name"));
                }
                current_section = Some(name.to_owned());
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| syntax("expected `key = value`"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(syntax("missing key"));
            }
            let value = value.trim().trim_matches('"').to_owned();

            match &current_section {
                None => {
                    globals.insert(key.to_owned(), value);
                }
                Some(sec) => {
                    sections
                        .entry(sec.clone())
                        .or_default()
                        .insert(key.to_owned(), value);
                }
            }
        }
        Ok(Config { globals, sections })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key)
            .or_else(|| self.get_global(key))
            .unwrap_or(default)
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parses `[section] key` (falling back to the global `key`) into `T`.
    ///
    /// Missing or empty values yield `default`; present but unparsable values
    /// are an error.
    pub fn get_parsed_or<T>(&self, section: &str, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self
            .get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()));

        match raw {
            None => Ok(default),
            Some(v) => v.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                section: section.to_owned(),
                key: key.to_owned(),
                value: v.to_owned(),
                reason: e.to_string(),
            }),
        }
    }
}
