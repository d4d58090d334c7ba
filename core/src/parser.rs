//! The parser: owner of the schema, constraints and configuration.
//!
//! A parse runs the whole pipeline synchronously:
//!
//! 1. tokenize the input,
//! 2. build the statement tree,
//! 3. pre-register one error group per group node,
//! 4. analyze the statement against the schema,
//! 5. check constraints and fixed cardinality.
//!
//! The resulting [`ErrorTree`] is kept on the parser until the next parse.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

use crate::analyzer::Analyzer;
use crate::config::ParserConfig;
use crate::constraint::{Constraint, check_constraints};
use crate::convert::{CharMode, FlagValue};
use crate::diagnostics::{Charset, ErrorStyle, ErrorTree};
use crate::error::{Error, Result};
use crate::help::render_help;
use crate::option::{Group, MultiValue, OptionEntry, OptionValue, SingleValue};
use crate::positional::PositionalPolicy;
use crate::schema::{ContextId, EntryId, FlagPath, Schema};
use crate::syntax::build_statement;
use crate::token::{TokenStream, Tokenizer};

/// A declared command line plus the state of the last parse.
///
/// # Examples
///
/// ```
/// use flagtree_core::{Group, Parser, SingleOption};
///
/// let mut parser = Parser::new("app")
///     .with_option(SingleOption::<u32>::new("--width").alias("-w"))
///     .with_group(Group::new("--degrees").with_option(SingleOption::<String>::new("--major")));
///
/// parser.parse_str("-w 100 --degrees [--major CS]").unwrap();
/// assert!(!parser.has_errors());
/// assert_eq!(parser.get::<u32>("--width").unwrap(), 100);
/// assert_eq!(parser.get::<String>("--degrees > --major").unwrap(), "CS");
/// ```
#[derive(Debug)]
pub struct Parser {
    schema: Schema,
    constraints: Vec<Constraint>,
    config: ParserConfig,
    errors: ErrorTree,
    /// First declaration error raised inside the builder chain, reported by
    /// every parse.
    deferred: Option<Error>,
}

impl Parser {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            errors: ErrorTree::new(name.clone(), 0),
            schema: Schema::new(name),
            constraints: Vec::new(),
            config: ParserConfig::default(),
            deferred: None,
        }
    }

    /// Replaces the configuration. Later `with_char_mode` and friends
    /// override individual fields.
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_flag_prefixes<S: Into<String>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.config.flag_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Declares a root option. Declaration errors surface on the next parse.
    pub fn with_option(mut self, option: impl Into<OptionEntry>) -> Self {
        let result = self.schema.add_entry(ContextId::ROOT, option.into());
        self.defer(result);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        let result = self.schema.add_group(ContextId::ROOT, group);
        self.defer(result);
        self
    }

    /// Declares the next root positional slot.
    pub fn with_positional(mut self, slot: impl Into<OptionEntry>) -> Self {
        let result = self.schema.add_positional(ContextId::ROOT, slot.into());
        self.defer(result);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_char_mode(mut self, mode: CharMode) -> Self {
        self.config.char_mode = mode;
        self
    }

    pub fn with_positional_policy(mut self, policy: PositionalPolicy) -> Self {
        self.config.positional_policy = policy;
        self
    }

    pub fn with_max_input_len(mut self, limit: usize) -> Self {
        self.config.max_input_len = Some(limit);
        self
    }

    /// Registers a root converter for every `T` entry without its own.
    pub fn with_conversion_fn<T: FlagValue>(
        mut self,
        convert: impl Fn(&str) -> Option<T> + 'static,
    ) -> Self {
        self.root_settings().registry.register(convert);
        self
    }

    pub fn with_min<T: FlagValue + PartialOrd + fmt::Display>(mut self, min: T) -> Self {
        self.root_settings().registry.set_min(min);
        self
    }

    pub fn with_max<T: FlagValue + PartialOrd + fmt::Display>(mut self, max: T) -> Self {
        self.root_settings().registry.set_max(max);
        self
    }

    fn root_settings(&mut self) -> &mut crate::schema::ContextSettings {
        &mut self.schema.context_mut(ContextId::ROOT).settings
    }

    fn defer(&mut self, result: Result<EntryId>) {
        if let Err(err) = result
            && self.deferred.is_none()
        {
            self.deferred = Some(err);
        }
    }

    /// Declares a root option, failing immediately on a duplicate name.
    pub fn add_option(&mut self, option: impl Into<OptionEntry>) -> Result<EntryId> {
        self.schema.add_entry(ContextId::ROOT, option.into())
    }

    pub fn add_group(&mut self, group: Group) -> Result<EntryId> {
        self.schema.add_group(ContextId::ROOT, group)
    }

    pub fn add_positional(&mut self, slot: impl Into<OptionEntry>) -> Result<EntryId> {
        self.schema.add_positional(ContextId::ROOT, slot.into())
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn name(&self) -> &str {
        &self.schema.root().name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ParserConfig {
        &mut self.config
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Parses one command-line string.
    ///
    /// # Errors
    ///
    /// Only programmer errors: deferred declaration errors, invalid bounds,
    /// missing converters, an oversized input or overlapping error groups.
    /// Problems in the input itself land in the returned tree.
    pub fn parse_str(&mut self, input: &str) -> Result<&ErrorTree> {
        self.prepare(input.len())?;
        self.run(Tokenizer::tokenize(input))
    }

    /// Parses an argv vector. Element 0 is the program name and is skipped.
    pub fn parse_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<&ErrorTree> {
        let args = args.get(1..).unwrap_or(&[]);
        let len = args.iter().map(|arg| arg.as_ref().len()).sum::<usize>()
            + args.len().saturating_sub(1);
        self.prepare(len)?;
        self.run(Tokenizer::tokenize_argv(args))
    }

    /// Parses the arguments of the current process.
    pub fn parse_env(&mut self) -> Result<&ErrorTree> {
        let args: Vec<String> = std::env::args().collect();
        self.parse_args(&args)
    }

    fn prepare(&mut self, len: usize) -> Result<()> {
        if let Some(err) = &self.deferred {
            return Err(err.replay());
        }
        self.schema.validate(self.config.char_mode)?;
        if let Some(limit) = self.config.max_input_len
            && len > limit
        {
            return Err(Error::InputTooLarge { len, limit });
        }
        Ok(())
    }

    fn run(&mut self, stream: TokenStream) -> Result<&ErrorTree> {
        let input_len = stream.input_len();
        let token_count = stream.tokens().len();
        trace!(input_len, tokens = token_count, "tokenized input");

        self.schema.reset();
        let (statement, syntax_errors) = build_statement(stream, &self.config.flag_prefixes);

        let mut errors = ErrorTree::new(self.schema.root().name.clone(), input_len);
        let mut groups = Vec::new();
        statement.for_each_group(&mut |group| groups.push(group));
        for group in groups {
            errors.add_group(group.name.text.clone(), group.open, group.close)?;
        }
        for error in &syntax_errors {
            errors.add_message(error.message.clone(), error.position);
        }

        Analyzer::new(
            &mut self.schema,
            &mut errors,
            self.config.char_mode,
            self.config.positional_policy,
        )
        .analyze(&statement);

        let set = self.schema.harvest_set();
        check_constraints(&self.constraints, &set, input_len, &mut errors);

        debug!(
            tokens = token_count,
            nodes = statement.nodes.len(),
            syntax_errors = syntax_errors.len(),
            constraints = self.constraints.len(),
            set_flags = set.len(),
            errors = errors.messages().len(),
            "parse finished"
        );

        self.errors = errors;
        Ok(&self.errors)
    }

    /// The error tree of the last parse.
    pub fn errors(&self) -> &ErrorTree {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    /// Renders the last parse's errors in `style`, with the configured
    /// or probed charset.
    pub fn render_errors(&self, style: ErrorStyle) -> String {
        self.errors.render(style, self.config.resolved_charset())
    }

    /// Renders with the configured style.
    pub fn render_errors_default(&self) -> String {
        self.render_errors(self.config.error_style)
    }

    pub fn render_errors_with(&self, style: ErrorStyle, charset: Charset) -> String {
        self.errors.render(style, charset)
    }

    /// Writes the rendered errors to stderr.
    pub fn print_errors(&self, style: ErrorStyle) {
        eprint!("{}", self.render_errors(style));
    }

    pub fn help(&self) -> String {
        render_help(&self.schema)
    }

    fn value_at(&self, path: &FlagPath, positional: bool) -> Result<&dyn OptionValue> {
        let resolved = if positional {
            self.schema.resolve_positional(path)
        } else {
            self.schema.resolve_path(path)
        };
        let id = resolved.ok_or_else(|| Error::UnknownFlagPath(path.to_string()))?;
        self.schema
            .entry(id)
            .value()
            .ok_or_else(|| Error::NotAValue(path.to_string()))
    }

    fn single<T: FlagValue>(&self, path: &FlagPath, positional: bool) -> Result<T> {
        let value = self.value_at(path, positional)?;
        value
            .as_any()
            .downcast_ref::<SingleValue<T>>()
            .map(|single| single.value().clone())
            .ok_or_else(|| mismatch::<T>(path, value))
    }

    fn multi<T: FlagValue>(&self, path: &FlagPath, positional: bool) -> Result<Vec<T>> {
        let value = self.value_at(path, positional)?;
        value
            .as_any()
            .downcast_ref::<MultiValue<T>>()
            .map(|multi| multi.values().to_vec())
            .ok_or_else(|| mismatch::<T>(path, value))
    }

    /// The value of a single-valued option: the last parsed value, or the
    /// default when it was not given.
    ///
    /// # Errors
    ///
    /// [`UnknownFlagPath`](Error::UnknownFlagPath) when nothing matches,
    /// [`NotAValue`](Error::NotAValue) for a group and
    /// [`TypeMismatch`](Error::TypeMismatch) when `T` or the arity is wrong.
    pub fn get<T: FlagValue>(&self, path: impl Into<FlagPath>) -> Result<T> {
        self.single(&path.into(), false)
    }

    /// The values of a multi-valued option, or its defaults when unset.
    pub fn get_all<T: FlagValue>(&self, path: impl Into<FlagPath>) -> Result<Vec<T>> {
        self.multi(&path.into(), false)
    }

    /// The value of a single positional slot, `"slot"` or `"--group > slot"`.
    pub fn positional<T: FlagValue>(&self, path: impl Into<FlagPath>) -> Result<T> {
        self.single(&path.into(), true)
    }

    pub fn positional_all<T: FlagValue>(&self, path: impl Into<FlagPath>) -> Result<Vec<T>> {
        self.multi(&path.into(), true)
    }

    /// Whether the named option or group occurred in the last parse.
    pub fn is_set(&self, path: impl Into<FlagPath>) -> Result<bool> {
        let path = path.into();
        let id = self
            .schema
            .resolve_path(&path)
            .ok_or_else(|| Error::UnknownFlagPath(path.to_string()))?;
        Ok(self.schema.entry(id).is_set())
    }

    /// Number of values assigned to an option in the last parse.
    pub fn count(&self, path: impl Into<FlagPath>) -> Result<usize> {
        Ok(self.value_at(&path.into(), false)?.count())
    }

    /// Rendered values of every entry set in the last parse, keyed by the
    /// primary path. Positional slots are keyed by their slot path.
    pub fn values(&self) -> BTreeMap<String, Vec<String>> {
        let mut out = BTreeMap::new();
        for (context, ctx) in self.schema.contexts() {
            let named = ctx.entries.iter().enumerate().map(|(index, entry)| (index, entry, false));
            let slots = ctx
                .positionals
                .iter()
                .enumerate()
                .map(|(index, entry)| (index, entry, true));

            for (index, entry, positional) in named.chain(slots) {
                let Some(value) = entry.value() else {
                    continue;
                };
                if !value.is_set() {
                    continue;
                }
                let id = EntryId {
                    context,
                    index,
                    positional,
                };
                out.insert(self.schema.entry_path(id).to_string(), value.rendered_values());
            }
        }
        out
    }
}

fn mismatch<T: FlagValue>(path: &FlagPath, value: &dyn OptionValue) -> Error {
    let actual = if value.is_multi() {
        "a list"
    } else {
        value.type_name()
    };
    Error::TypeMismatch {
        flag: path.to_string(),
        requested: T::type_name(),
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{Destination, MultiOption, SingleOption};

    fn sample() -> Parser {
        Parser::new("app")
            .with_option(SingleOption::<u32>::new("--width").alias("-w"))
            .with_option(MultiOption::<f64>::growable("--doubles"))
            .with_option(SingleOption::<bool>::new("--verbose").alias("-v"))
            .with_group(
                Group::new("--degrees")
                    .with_option(SingleOption::<String>::new("--major"))
                    .with_positional(SingleOption::<String>::new("thesis")),
            )
            .with_positional(SingleOption::<String>::new("input"))
    }

    #[test]
    fn test_typed_retrieval() {
        let mut parser = sample();
        let errors = parser
            .parse_str("in.txt -w 7 --doubles 1.5 2 --degrees [--major CS paper.pdf]")
            .unwrap();
        assert!(!errors.has_errors(), "{:?}", errors.messages());

        assert_eq!(parser.get::<u32>("-w").unwrap(), 7);
        assert_eq!(parser.get_all::<f64>("--doubles").unwrap(), vec![1.5, 2.0]);
        assert_eq!(parser.count("--doubles").unwrap(), 2);
        assert_eq!(parser.positional::<String>("input").unwrap(), "in.txt");
        assert_eq!(
            parser.positional::<String>("--degrees > thesis").unwrap(),
            "paper.pdf"
        );
        assert!(parser.is_set("--degrees").unwrap());
        assert!(!parser.is_set("--verbose").unwrap());
        assert!(!parser.get::<bool>("--verbose").unwrap());
    }

    #[test]
    fn test_retrieval_errors() {
        let mut parser = sample();
        parser.parse_str("").unwrap();
        assert!(matches!(
            parser.get::<u32>("--height"),
            Err(Error::UnknownFlagPath(path)) if path == "--height"
        ));
        assert!(matches!(parser.get::<u32>("--degrees"), Err(Error::NotAValue(_))));
        assert!(matches!(
            parser.get::<i64>("--width"),
            Err(Error::TypeMismatch { actual: "unsigned 32-bit integer", .. })
        ));
        assert!(matches!(
            parser.get::<f64>("--doubles"),
            Err(Error::TypeMismatch { actual: "a list", .. })
        ));
    }

    #[test]
    fn test_values_snapshot_lists_set_entries() {
        let mut parser = sample();
        parser.parse_str("-v --degrees [--major Math] a").unwrap();
        let values = parser.values();
        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["--degrees > --major", "--verbose", "input"]);
        assert_eq!(values["--degrees > --major"], vec!["Math"]);
        assert_eq!(values["--verbose"], vec!["true"]);
    }

    #[test]
    fn test_reparse_resets_state() {
        let width = Destination::new(0u32);
        let mut parser = Parser::new("app").with_option(SingleOption::<u32>::new("--width").bind(&width));

        parser.parse_str("--width 5").unwrap();
        assert!(parser.is_set("--width").unwrap());
        parser.parse_str("--bogus").unwrap();
        assert!(parser.has_errors());
        assert!(!parser.is_set("--width").unwrap());
        assert_eq!(parser.get::<u32>("--width").unwrap(), 0);
        // Destinations keep the last written value.
        assert_eq!(width.get(), 5);
    }

    #[test]
    fn test_deferred_duplicate_reported_by_every_parse() {
        let mut parser = Parser::new("app")
            .with_option(SingleOption::<u32>::new("--w"))
            .with_option(SingleOption::<u32>::new("--x").alias("--w"));
        for _ in 0..2 {
            assert!(matches!(
                parser.parse_str("--w 1"),
                Err(Error::DuplicateFlag { flag, .. }) if flag == "--w"
            ));
        }

        let err = parser.add_option(SingleOption::<u32>::new("--w")).unwrap_err();
        assert!(matches!(err, Error::DuplicateFlag { .. }));
    }

    #[test]
    fn test_group_with_duplicate_member_is_not_half_declared() {
        let mut parser = Parser::new("app").with_group(
            Group::new("--g")
                .with_option(SingleOption::<u32>::new("--a"))
                .with_option(SingleOption::<u32>::new("--a"))
                .with_option(SingleOption::<u32>::new("--b")),
        );
        for _ in 0..2 {
            assert!(matches!(
                parser.parse_str("--g [--b 1]"),
                Err(Error::DuplicateFlag { flag, .. }) if flag == "--a"
            ));
        }
        assert_eq!(parser.schema().contexts().count(), 1);
        assert!(parser.schema().lookup(ContextId::ROOT, "--g").is_none());
    }

    #[test]
    fn test_input_limit_and_argv() {
        let mut parser = sample().with_max_input_len(10);
        assert!(matches!(
            parser.parse_str("--width 1000000"),
            Err(Error::InputTooLarge { len: 15, limit: 10 })
        ));
        parser.parse_args(&["prog", "-w", "12"]).unwrap();
        assert_eq!(parser.get::<u32>("--width").unwrap(), 12);
        assert_eq!(parser.errors().root().end, 5);

        assert!(parser.parse_args::<&str>(&[]).is_ok());
    }

    #[test]
    fn test_root_registry_and_bounds() {
        let mut parser = Parser::new("app")
            .with_conversion_fn::<u32>(|s| s.strip_suffix('k').and_then(|n| n.parse::<u32>().ok()).map(|n| n * 1000))
            .with_max::<u32>(5000)
            .with_option(SingleOption::<u32>::new("--size"));

        parser.parse_str("--size 4k").unwrap();
        assert!(!parser.has_errors());
        assert_eq!(parser.get::<u32>("--size").unwrap(), 4000);

        parser.parse_str("--size 6k").unwrap();
        assert_eq!(parser.errors().messages().len(), 1);
    }

    #[test]
    fn test_custom_prefixes() {
        let mut parser = Parser::new("app")
            .with_flag_prefixes(["+"])
            .with_option(SingleOption::<bool>::new("+debug"))
            .with_positional(MultiOption::<String>::growable("rest"));
        parser.parse_str("+debug --literal").unwrap();
        assert!(!parser.has_errors(), "{:?}", parser.errors().messages());
        assert!(parser.get::<bool>("+debug").unwrap());
        assert_eq!(parser.positional_all::<String>("rest").unwrap(), vec!["--literal"]);
    }
}
