//! Declarative schema documents.
//!
//! A [`SchemaFile`] describes options, groups, positional slots and
//! constraints in YAML or JSON and builds a [`Parser`] at runtime. Value
//! types are named by keyword, so the document needs no Rust code.
//!
//! # Example YAML
//!
//! ```yaml
//! name: convert
//! positional_policy: AfterFlags
//! options:
//!   - name: --width
//!     aliases: [-w]
//!     type: u32
//!     hint: N
//!     description: Output width
//!     default: 80
//!     min: 1
//!     max: 4096
//!   - name: --ints
//!     type: i32
//!     multi: true
//!     capacity: 3
//! groups:
//!   - name: --degrees
//!     options:
//!       - { name: --major, type: string }
//! positionals:
//!   - { name: input, type: path }
//! constraints:
//!   - required: { flag: --width }
//!   - depends_on: { flag: --ints, requires: [--degrees > --major] }
//! ```

use std::fmt;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{ParserConfig, is_json};
use crate::constraint::Constraint;
use crate::convert::{CharMode, FlagValue};
use crate::error::{Error, Result};
use crate::option::{Group, MultiOption, OptionEntry, SingleOption};
use crate::parser::Parser;
use crate::positional::PositionalPolicy;
use crate::schema::FlagPath;

/// A whole schema document.
///
/// # Examples
///
/// ```
/// use flagtree_core::{ParserConfig, SchemaFile};
///
/// let file = SchemaFile::from_yaml_str(r#"
/// name: app
/// options:
///   - { name: --width, aliases: [-w], type: uint }
/// "#).unwrap();
///
/// let mut parser = file.build(ParserConfig::default()).unwrap();
/// parser.parse_str("-w 42").unwrap();
/// assert_eq!(parser.get::<u32>("--width").unwrap(), 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Program name; labels the root error group and the usage line.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_prefixes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positional_policy: Option<PositionalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_mode: Option<CharMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positionals: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintSpec>,
}

/// One option or positional slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Type keyword: `bool`, `char`, `string`, `path`, `i8`..`i128`,
    /// `isize`, `u8`..`u128`, `usize`, `f32`, `f64`, or the shorthands `int`,
    /// `uint`, `float` and `double`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// A scalar, or a list for multi options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_mode: Option<CharMode>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub multi: bool,
    /// Fixed value count for multi options; absent means growable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// A group with its own context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positional_policy: Option<PositionalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_mode: Option<CharMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positionals: Vec<OptionSpec>,
}

/// A constraint; paths use the `"--group > --flag"` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSpec {
    Required {
        flag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    MutuallyExclusive {
        flag: String,
        with: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    DependsOn {
        flag: String,
        requires: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ConstraintSpec {
    fn paths(&self) -> Vec<&str> {
        match self {
            ConstraintSpec::Required { flag, .. } => vec![flag.as_str()],
            ConstraintSpec::MutuallyExclusive { flag, with: others, .. }
            | ConstraintSpec::DependsOn {
                flag,
                requires: others,
                ..
            } => std::iter::once(flag.as_str())
                .chain(others.iter().map(String::as_str))
                .collect(),
        }
    }

    fn to_constraint(&self) -> Constraint {
        let (constraint, message) = match self {
            ConstraintSpec::Required { flag, message } => (Constraint::required(flag), message),
            ConstraintSpec::MutuallyExclusive { flag, with, message } => {
                (Constraint::mutually_exclusive(flag, with), message)
            }
            ConstraintSpec::DependsOn {
                flag,
                requires,
                message,
            } => (Constraint::depends_on(flag, requires), message),
        };
        match message {
            Some(text) => constraint.with_message(text.clone()),
            None => constraint,
        }
    }
}

impl SchemaFile {
    /// Loads a document; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let file = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        Ok(file)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds a parser. Root settings in the document override `config`.
    ///
    /// # Errors
    ///
    /// [`InvalidSchemaFile`](Error::InvalidSchemaFile) for unknown type
    /// keywords, unparsable defaults or bounds, misplaced `capacity`, or
    /// constraints naming nothing in the schema; declaration errors
    /// (duplicates, inverted bounds) as their own variants.
    pub fn build(&self, config: ParserConfig) -> Result<Parser> {
        let mut parser = Parser::new(self.name.clone()).with_config(config);
        if let Some(prefixes) = &self.flag_prefixes {
            parser = parser.with_flag_prefixes(prefixes.iter().cloned());
        }
        if let Some(policy) = self.positional_policy {
            parser = parser.with_positional_policy(policy);
        }
        if let Some(mode) = self.char_mode {
            parser = parser.with_char_mode(mode);
        }

        for spec in &self.options {
            parser.add_option(option_entry(spec, false)?)?;
        }
        for spec in &self.groups {
            parser.add_group(group(spec)?)?;
        }
        for spec in &self.positionals {
            parser.add_positional(option_entry(spec, true)?)?;
        }

        for spec in &self.constraints {
            for path in spec.paths() {
                let resolved = FlagPath::from(path);
                if parser.schema().resolve_path(&resolved).is_none()
                    && parser.schema().resolve_positional(&resolved).is_none()
                {
                    return Err(invalid(format!("constraint names unknown flag '{path}'")));
                }
            }
            parser.add_constraint(spec.to_constraint());
        }

        parser.schema().validate(parser.config().char_mode)?;
        debug!(
            name = %self.name,
            options = self.options.len(),
            groups = self.groups.len(),
            positionals = self.positionals.len(),
            constraints = self.constraints.len(),
            "built parser from schema file"
        );
        Ok(parser)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidSchemaFile(message.into())
}

fn group(spec: &GroupSpec) -> Result<Group> {
    let mut group = Group::new(spec.name.clone());
    for alias in &spec.aliases {
        group = group.alias(alias.clone());
    }
    if let Some(text) = &spec.description {
        group = group.with_description(text.clone());
    }
    if let Some(policy) = spec.positional_policy {
        group = group.with_positional_policy(policy);
    }
    if let Some(mode) = spec.char_mode {
        group = group.with_char_mode(mode);
    }
    for option in &spec.options {
        group = group.with_option(option_entry(option, false)?);
    }
    for child in &spec.groups {
        group = group.with_group(self::group(child)?);
    }
    for slot in &spec.positionals {
        group = group.with_positional(option_entry(slot, true)?);
    }
    Ok(group)
}

fn option_entry(spec: &OptionSpec, positional: bool) -> Result<OptionEntry> {
    if spec.capacity.is_some() && !spec.multi {
        return Err(invalid(format!("'{}': capacity requires multi: true", spec.name)));
    }
    if positional && !spec.aliases.is_empty() {
        return Err(invalid(format!("positional '{}' cannot have aliases", spec.name)));
    }

    match spec.kind.as_str() {
        "bool" => plain::<bool>(spec),
        "char" => plain::<char>(spec),
        "string" => plain::<String>(spec),
        "path" => plain::<PathBuf>(spec),
        "i8" => bounded::<i8>(spec),
        "i16" => bounded::<i16>(spec),
        "i32" | "int" => bounded::<i32>(spec),
        "i64" => bounded::<i64>(spec),
        "i128" => bounded::<i128>(spec),
        "isize" => bounded::<isize>(spec),
        "u8" => bounded::<u8>(spec),
        "u16" => bounded::<u16>(spec),
        "u32" | "uint" => bounded::<u32>(spec),
        "u64" => bounded::<u64>(spec),
        "u128" => bounded::<u128>(spec),
        "usize" => bounded::<usize>(spec),
        "f32" | "float" => bounded::<f32>(spec),
        "f64" | "double" => bounded::<f64>(spec),
        other => Err(invalid(format!("'{}': unknown type '{other}'", spec.name))),
    }
}

/// A typed declaration before it is erased into an [`OptionEntry`].
enum Declared<T: FlagValue> {
    Single(SingleOption<T>),
    Multi(MultiOption<T>),
}

impl<T: FlagValue> From<Declared<T>> for OptionEntry {
    fn from(declared: Declared<T>) -> Self {
        match declared {
            Declared::Single(option) => option.into(),
            Declared::Multi(option) => option.into(),
        }
    }
}

fn plain<T: FlagValue + Default>(spec: &OptionSpec) -> Result<OptionEntry> {
    if spec.min.is_some() || spec.max.is_some() {
        return Err(invalid(format!(
            "'{}': min/max only apply to numeric types",
            spec.name
        )));
    }
    Ok(declare::<T>(spec)?.into())
}

fn bounded<T: FlagValue + Default + PartialOrd + fmt::Display>(spec: &OptionSpec) -> Result<OptionEntry> {
    let mode = spec.char_mode.unwrap_or_default();
    let min = spec
        .min
        .as_ref()
        .map(|v| literal::<T>(v, mode, spec, "min"))
        .transpose()?;
    let max = spec
        .max
        .as_ref()
        .map(|v| literal::<T>(v, mode, spec, "max"))
        .transpose()?;

    let declared = match declare::<T>(spec)? {
        Declared::Single(mut option) => {
            if let Some(min) = min {
                option = option.with_min(min);
            }
            if let Some(max) = max {
                option = option.with_max(max);
            }
            Declared::Single(option)
        }
        Declared::Multi(mut option) => {
            if let Some(min) = min {
                option = option.with_min(min);
            }
            if let Some(max) = max {
                option = option.with_max(max);
            }
            Declared::Multi(option)
        }
    };
    Ok(declared.into())
}

fn declare<T: FlagValue + Default>(spec: &OptionSpec) -> Result<Declared<T>> {
    let mode = spec.char_mode.unwrap_or_default();

    if spec.multi {
        let mut option = match spec.capacity {
            Some(capacity) => MultiOption::<T>::fixed(spec.name.clone(), capacity),
            None => MultiOption::<T>::growable(spec.name.clone()),
        };
        for alias in &spec.aliases {
            option = option.alias(alias.clone());
        }
        if let Some(text) = &spec.description {
            option = option.with_description(text.clone());
        }
        if let Some(hint) = &spec.hint {
            option = option.with_hint(hint.clone());
        }
        if let Some(mode) = spec.char_mode {
            option = option.with_char_mode(mode);
        }
        if let Some(default) = &spec.default {
            let items = match default {
                Value::Array(items) => items
                    .iter()
                    .map(|item| literal::<T>(item, mode, spec, "default"))
                    .collect::<Result<Vec<T>>>()?,
                scalar => vec![literal::<T>(scalar, mode, spec, "default")?],
            };
            option = option.default_values(items);
        }
        return Ok(Declared::Multi(option));
    }

    let mut option = SingleOption::<T>::new(spec.name.clone());
    for alias in &spec.aliases {
        option = option.alias(alias.clone());
    }
    if let Some(text) = &spec.description {
        option = option.with_description(text.clone());
    }
    if let Some(hint) = &spec.hint {
        option = option.with_hint(hint.clone());
    }
    if let Some(mode) = spec.char_mode {
        option = option.with_char_mode(mode);
    }
    if let Some(default) = &spec.default {
        option = option.default_value(literal::<T>(default, mode, spec, "default")?);
    }
    Ok(Declared::Single(option))
}

/// Converts a document scalar with the type's built-in conversion.
fn literal<T: FlagValue>(value: &Value, mode: CharMode, spec: &OptionSpec, field: &str) -> Result<T> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        _ => {
            return Err(invalid(format!(
                "'{}': {field} must be a scalar",
                spec.name
            )));
        }
    };
    match T::from_flag_str(&text, mode) {
        Some(Ok(parsed)) => Ok(parsed),
        _ => Err(invalid(format!(
            "'{}': {field} '{text}' is not a valid {}",
            spec.name,
            T::type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
name: convert
positional_policy: AfterFlags
options:
  - name: --width
    aliases: [-w]
    type: u32
    hint: N
    description: Output width
    default: 80
    min: 1
    max: 4096
  - name: --ints
    type: int
    multi: true
    capacity: 3
  - name: --scale
    type: double
    multi: true
    default: [1.0, 2.5]
  - name: --sep
    type: char
    char_mode: ExpectInteger
    default: 44
groups:
  - name: --degrees
    aliases: [-d]
    positional_policy: Interleaved
    options:
      - { name: --major, type: string }
    positionals:
      - { name: thesis, type: path }
positionals:
  - { name: input, type: path }
constraints:
  - required: { flag: --width }
  - depends_on: { flag: --ints, requires: ["--degrees > --major"] }
  - mutually_exclusive: { flag: --scale, with: [--sep], message: pick one }
"#;

    #[test]
    fn test_build_and_parse() {
        let file = SchemaFile::from_yaml_str(DOCUMENT).unwrap();
        let mut parser = file.build(ParserConfig::default()).unwrap();
        assert_eq!(parser.config().positional_policy, PositionalPolicy::AfterFlags);

        parser
            .parse_str("-w 120 --ints 1 2 3 -d [thesis.pdf --major CS] in.txt")
            .unwrap();
        assert!(!parser.has_errors(), "{:?}", parser.errors().messages());
        assert_eq!(parser.get::<u32>("--width").unwrap(), 120);
        assert_eq!(parser.get_all::<i32>("--ints").unwrap(), vec![1, 2, 3]);
        assert_eq!(parser.get_all::<f64>("--scale").unwrap(), vec![1.0, 2.5]);
        assert_eq!(parser.get::<char>("--sep").unwrap(), ',');
        assert_eq!(
            parser.positional::<PathBuf>("-d > thesis").unwrap(),
            PathBuf::from("thesis.pdf")
        );
        assert_eq!(parser.positional::<PathBuf>("input").unwrap(), PathBuf::from("in.txt"));
    }

    #[test]
    fn test_constraints_from_document() {
        let mut parser = SchemaFile::from_yaml_str(DOCUMENT)
            .unwrap()
            .build(ParserConfig::default())
            .unwrap();
        parser.parse_str("--ints 1 2 3 --scale 1 --sep 59").unwrap();
        let texts: Vec<&str> = parser
            .errors()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![
                "Flag '--ints' depends on flag '--degrees > --major', which is not set",
                "pick one",
                "Flag '--width' is a required flag and must be set",
            ]
        );
    }

    #[test]
    fn test_bounds_enforced() {
        let mut parser = SchemaFile::from_yaml_str(DOCUMENT)
            .unwrap()
            .build(ParserConfig::default())
            .unwrap();
        parser.parse_str("-w 0").unwrap();
        assert!(parser.has_errors());
    }

    #[test]
    fn test_invalid_documents() {
        let cases = [
            ("name: a\noptions: [{ name: --x, type: complex }]", "unknown type 'complex'"),
            ("name: a\noptions: [{ name: --x, type: u8, default: 300 }]", "default '300'"),
            ("name: a\noptions: [{ name: --x, type: string, min: 1 }]", "numeric types"),
            ("name: a\noptions: [{ name: --x, type: u8, capacity: 2 }]", "capacity requires"),
            ("name: a\nconstraints: [{ required: { flag: --ghost } }]", "unknown flag '--ghost'"),
        ];
        for (yaml, expected) in cases {
            let err = SchemaFile::from_yaml_str(yaml)
                .unwrap()
                .build(ParserConfig::default())
                .unwrap_err();
            match err {
                Error::InvalidSchemaFile(message) => {
                    assert!(message.contains(expected), "{message} vs {expected}")
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_declaration_errors_propagate() {
        let yaml = "name: a\noptions:\n  - { name: --x, type: u8 }\n  - { name: --y, aliases: [--x], type: u8 }";
        let err = SchemaFile::from_yaml_str(yaml)
            .unwrap()
            .build(ParserConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFlag { .. }));

        let yaml = "name: a\noptions: [{ name: --x, type: u8, min: 9, max: 3 }]";
        let err = SchemaFile::from_yaml_str(yaml)
            .unwrap()
            .build(ParserConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBounds { .. }));
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let file = SchemaFile::from_yaml_str(DOCUMENT).unwrap();
        std::fs::write(&path, serde_json::to_string_pretty(&file).unwrap()).unwrap();

        let loaded = SchemaFile::load(&path).unwrap();
        assert_eq!(loaded, file);
        assert!(matches!(
            SchemaFile::load(dir.path().join("missing.yml")),
            Err(Error::Io(_))
        ));
    }
}
