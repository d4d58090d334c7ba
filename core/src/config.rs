//! Parser-wide configuration.
//!
//! Root defaults that contexts fall back to, plus ingress limits and
//! rendering preferences. Loadable from YAML or JSON.
//!
//! # Example YAML
//!
//! ```yaml
//! flag_prefixes: ["--", "-", "+"]
//! positional_policy: AfterFlags
//! char_mode: ExpectInteger
//! max_input_len: 65536
//! error_style: Tree
//! charset: Unicode
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::convert::CharMode;
use crate::diagnostics::{Charset, ErrorStyle};
use crate::error::Result;
use crate::positional::PositionalPolicy;

/// Settings applied to the root context and to every parse.
///
/// Missing fields take their defaults, so an empty document is valid.
///
/// # Examples
///
/// ```
/// use flagtree_core::{ParserConfig, PositionalPolicy};
///
/// let config: ParserConfig = serde_yaml::from_str("positional_policy: BeforeFlags").unwrap();
/// assert_eq!(config.positional_policy, PositionalPolicy::BeforeFlags);
/// assert_eq!(config.flag_prefixes, vec!["--", "-"]);
/// assert!(config.max_input_len.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Prefixes that mark an identifier as a flag head.
    pub flag_prefixes: Vec<String>,
    /// Policy for contexts that say `UseDefault`.
    pub positional_policy: PositionalPolicy,
    /// Character mode for contexts and entries that set none.
    pub char_mode: CharMode,
    /// Inputs longer than this many bytes are rejected before tokenizing.
    pub max_input_len: Option<usize>,
    pub error_style: ErrorStyle,
    /// Forced tree charset; `None` probes the terminal.
    pub charset: Option<Charset>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            flag_prefixes: vec!["--".to_string(), "-".to_string()],
            positional_policy: PositionalPolicy::Interleaved,
            char_mode: CharMode::ExpectAscii,
            max_input_len: None,
            error_style: ErrorStyle::Flat,
            charset: None,
        }
    }
}

impl ParserConfig {
    /// Loads configuration from a file; `.json` files are read as JSON,
    /// anything else as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::Error::Io) if the file cannot be read, or
    /// [`Json`](crate::Error::Json) / [`Yaml`](crate::Error::Yaml) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let config = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        Ok(config)
    }

    /// Saves the configuration, choosing the format by extension like
    /// [`load`](Self::load).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(std::fs::File::create(path)?);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }

    /// The tree charset to use: the forced one, or a terminal probe.
    pub fn resolved_charset(&self) -> Charset {
        self.charset.unwrap_or_else(Charset::detect)
    }
}

pub(crate) fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ParserConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ParserConfig::default());
    }

    #[test]
    fn test_deserialize_complete() {
        let yaml = r#"
flag_prefixes: ["+", "/"]
positional_policy: AfterFlags
char_mode: ExpectInteger
max_input_len: 128
error_style: Tree
charset: Ascii
"#;
        let config: ParserConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.flag_prefixes, vec!["+", "/"]);
        assert_eq!(config.positional_policy, PositionalPolicy::AfterFlags);
        assert_eq!(config.char_mode, CharMode::ExpectInteger);
        assert_eq!(config.max_input_len, Some(128));
        assert_eq!(config.error_style, ErrorStyle::Tree);
        assert_eq!(config.resolved_charset(), Charset::Ascii);
    }

    #[test]
    fn test_load_save_roundtrip_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = ParserConfig {
            max_input_len: Some(4096),
            error_style: ErrorStyle::Tree,
            ..ParserConfig::default()
        };

        for name in ["parser.yml", "parser.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(ParserConfig::load(&path).unwrap(), config, "{name}");
        }

        let json = std::fs::read_to_string(dir.path().join("parser.json")).unwrap();
        assert!(json.trim_start().starts_with('{'));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ParserConfig::load("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
