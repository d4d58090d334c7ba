//! The declared schema: an arena of contexts holding flag entries.
//!
//! Contexts live in one `Vec` and refer to each other by [`ContextId`]; a
//! group entry stores the id of the child context it owns and each context
//! stores its parent id. Cloning the schema therefore deep-copies the whole
//! tree with its parent links intact.

use std::fmt;

use crate::convert::{CharMode, ConversionRegistry, ConversionScope};
use crate::error::{Error, Result};
use crate::option::{Group, Member, OptionEntry, OptionValue};
use crate::positional::PositionalPolicy;

/// A primary name plus aliases.
///
/// # Examples
///
/// ```
/// use flagtree_core::FlagDescriptor;
///
/// let flag = FlagDescriptor::new("--verbose").with_alias("-v");
/// assert!(flag.contains("-v"));
/// assert!(flag.contains("--verbose"));
/// assert!(!flag.contains("-x"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDescriptor {
    name: String,
    aliases: Vec<String>,
}

impl FlagDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Primary name first, then aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }
}

/// Help text with an optional `[hint]` placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub hint: Option<String>,
    pub text: String,
}

/// Navigation from the root through groups to a terminal entry.
///
/// Parsed from `"--group > --flag"` strings; whitespace around `>` is ignored.
///
/// # Examples
///
/// ```
/// use flagtree_core::FlagPath;
///
/// let path = FlagPath::from("--degrees>--instruments > --main");
/// assert_eq!(path.steps(), ["--degrees", "--instruments", "--main"]);
/// assert_eq!(path.to_string(), "--degrees > --instruments > --main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagPath(Vec<String>);

impl FlagPath {
    pub fn new(steps: Vec<String>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }

    pub fn terminal(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl From<&str> for FlagPath {
    fn from(path: &str) -> Self {
        Self(
            path.split('>')
                .map(str::trim)
                .filter(|step| !step.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

impl From<String> for FlagPath {
    fn from(path: String) -> Self {
        Self::from(path.as_str())
    }
}

impl From<&String> for FlagPath {
    fn from(path: &String) -> Self {
        Self::from(path.as_str())
    }
}

impl From<Vec<String>> for FlagPath {
    fn from(steps: Vec<String>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for FlagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" > "))
    }
}

/// A schema-side path where each step carries its full alias set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagPathWithAlias(Vec<FlagDescriptor>);

impl FlagPathWithAlias {
    pub fn new(steps: Vec<FlagDescriptor>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[FlagDescriptor] {
        &self.0
    }

    /// Same length, and every step's aliases contain the requested name.
    pub fn matches(&self, path: &FlagPath) -> bool {
        self.0.len() == path.steps().len()
            && self
                .0
                .iter()
                .zip(path.steps())
                .all(|(descriptor, name)| descriptor.contains(name))
    }

    /// The path spelled with primary names.
    pub fn primary(&self) -> FlagPath {
        FlagPath(self.0.iter().map(|d| d.name().to_string()).collect())
    }
}

impl fmt::Display for FlagPathWithAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.primary().fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

impl ContextId {
    pub const ROOT: ContextId = ContextId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Addresses a named entry (`positional == false`) or a positional slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub context: ContextId,
    pub index: usize,
    pub positional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Single,
    Multi,
    Group,
    Positional,
}

#[derive(Debug, Clone)]
pub enum EntryBody {
    Value(Box<dyn OptionValue>),
    Group(ContextId),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub descriptor: FlagDescriptor,
    pub description: Option<Description>,
    pub body: EntryBody,
    /// Position of the first occurrence in the current parse.
    pub first_position: Option<usize>,
}

impl Entry {
    pub fn value(&self) -> Option<&dyn OptionValue> {
        match &self.body {
            EntryBody::Value(value) => Some(value.as_ref()),
            EntryBody::Group(_) => None,
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut (dyn OptionValue + 'static)> {
        match &mut self.body {
            EntryBody::Value(value) => Some(value.as_mut()),
            EntryBody::Group(_) => None,
        }
    }

    /// Whether the entry occurred in the current parse.
    pub fn is_set(&self) -> bool {
        match &self.body {
            EntryBody::Value(value) => value.is_set(),
            EntryBody::Group(_) => self.first_position.is_some(),
        }
    }

    /// Records an occurrence; only the first position is kept.
    pub fn record_occurrence(&mut self, position: usize) {
        self.first_position.get_or_insert(position);
    }

    fn reset(&mut self) {
        self.first_position = None;
        if let EntryBody::Value(value) = &mut self.body {
            value.reset();
        }
    }
}

/// Per-context overrides; unset values inherit from the enclosing context.
#[derive(Debug, Clone, Default)]
pub struct ContextSettings {
    pub char_mode: Option<CharMode>,
    pub positional_policy: PositionalPolicy,
    pub registry: ConversionRegistry,
}

#[derive(Debug, Clone)]
pub struct Context {
    pub name: String,
    pub parent: Option<ContextId>,
    /// Descriptor of the group entry owning this context; `None` for the root.
    pub descriptor: Option<FlagDescriptor>,
    pub entries: Vec<Entry>,
    pub positionals: Vec<Entry>,
    pub settings: ContextSettings,
}

impl Context {
    fn new(name: String, parent: Option<ContextId>, descriptor: Option<FlagDescriptor>) -> Self {
        Self {
            name,
            parent,
            descriptor,
            entries: Vec::new(),
            positionals: Vec::new(),
            settings: ContextSettings::default(),
        }
    }

    fn find_duplicate(&self, descriptor: &FlagDescriptor, positional: bool) -> Option<String> {
        let existing = if positional {
            &self.positionals
        } else {
            &self.entries
        };
        descriptor
            .names()
            .find(|name| existing.iter().any(|entry| entry.descriptor.contains(name)))
            .map(String::from)
    }
}

/// A resolved flag that occurred in the input, keyed by its schema path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetFlag {
    pub path: FlagPathWithAlias,
    pub position: usize,
    pub count: usize,
    pub capacity: Option<usize>,
    pub multi: bool,
}

/// The conversion environment of one context, detached from the schema so
/// entries can be mutated while it is in use.
#[derive(Debug, Clone)]
pub struct ContextScope {
    registries: Vec<ConversionRegistry>,
    char_mode: CharMode,
}

impl ConversionScope for ContextScope {
    fn registries(&self) -> Vec<&ConversionRegistry> {
        self.registries.iter().collect()
    }

    fn char_mode(&self) -> CharMode {
        self.char_mode
    }
}

/// The arena. Context 0 is the root.
#[derive(Debug, Clone)]
pub struct Schema {
    contexts: Vec<Context>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            contexts: vec![Context::new(name.into(), None, None)],
        }
    }

    pub fn root(&self) -> &Context {
        &self.contexts[0]
    }

    pub fn context(&self, id: ContextId) -> &Context {
        &self.contexts[id.0]
    }

    pub fn context_mut(&mut self, id: ContextId) -> &mut Context {
        &mut self.contexts[id.0]
    }

    pub fn contexts(&self) -> impl Iterator<Item = (ContextId, &Context)> {
        self.contexts
            .iter()
            .enumerate()
            .map(|(idx, ctx)| (ContextId(idx), ctx))
    }

    /// Finds a named entry by primary name or alias.
    pub fn lookup(&self, context: ContextId, name: &str) -> Option<EntryId> {
        self.context(context)
            .entries
            .iter()
            .position(|entry| entry.descriptor.contains(name))
            .map(|index| EntryId {
                context,
                index,
                positional: false,
            })
    }

    pub fn entry(&self, id: EntryId) -> &Entry {
        let ctx = self.context(id.context);
        if id.positional {
            &ctx.positionals[id.index]
        } else {
            &ctx.entries[id.index]
        }
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        let ctx = self.context_mut(id.context);
        if id.positional {
            &mut ctx.positionals[id.index]
        } else {
            &mut ctx.entries[id.index]
        }
    }

    pub fn is_group(&self, id: EntryId) -> bool {
        self.child_context(id).is_some()
    }

    pub fn child_context(&self, id: EntryId) -> Option<ContextId> {
        match self.entry(id).body {
            EntryBody::Group(child) => Some(child),
            EntryBody::Value(_) => None,
        }
    }

    pub fn kind(&self, id: EntryId) -> EntryKind {
        if id.positional {
            return EntryKind::Positional;
        }
        match &self.entry(id).body {
            EntryBody::Group(_) => EntryKind::Group,
            EntryBody::Value(value) if value.is_multi() => EntryKind::Multi,
            EntryBody::Value(_) => EntryKind::Single,
        }
    }

    /// Number of positional slots declared directly in `context`.
    pub fn positional_count(&self, context: ContextId) -> usize {
        self.context(context).positionals.len()
    }

    pub fn add_entry(&mut self, context: ContextId, option: OptionEntry) -> Result<EntryId> {
        self.insert(context, option, false)
    }

    pub fn add_positional(&mut self, context: ContextId, slot: OptionEntry) -> Result<EntryId> {
        self.insert(context, slot, true)
    }

    fn insert(&mut self, context: ContextId, option: OptionEntry, positional: bool) -> Result<EntryId> {
        self.check_name(context, &option.descriptor, positional)?;
        let entry = Entry {
            descriptor: option.descriptor,
            description: option.description,
            body: EntryBody::Value(option.value),
            first_position: None,
        };

        let ctx = self.context_mut(context);
        let list = if positional {
            &mut ctx.positionals
        } else {
            &mut ctx.entries
        };
        list.push(entry);
        Ok(EntryId {
            context,
            index: list.len() - 1,
            positional,
        })
    }

    /// Inserts a group and, recursively, everything it declares. On error
    /// nothing of the group is left in the schema.
    pub fn add_group(&mut self, context: ContextId, group: Group) -> Result<EntryId> {
        let Group {
            descriptor,
            description,
            members,
            positionals,
            settings,
        } = group;
        self.check_name(context, &descriptor, false)?;

        let contexts_before = self.contexts.len();
        let child = ContextId(contexts_before);
        let mut child_context =
            Context::new(descriptor.name().to_string(), Some(context), Some(descriptor.clone()));
        child_context.settings = settings;
        self.contexts.push(child_context);

        let ctx = self.context_mut(context);
        ctx.entries.push(Entry {
            descriptor,
            description,
            body: EntryBody::Group(child),
            first_position: None,
        });
        let id = EntryId {
            context,
            index: ctx.entries.len() - 1,
            positional: false,
        };

        if let Err(err) = self.populate(child, members, positionals) {
            self.contexts.truncate(contexts_before);
            self.context_mut(context).entries.truncate(id.index);
            return Err(err);
        }
        Ok(id)
    }

    fn populate(&mut self, child: ContextId, members: Vec<Member>, positionals: Vec<OptionEntry>) -> Result<()> {
        for member in members {
            match member {
                Member::Option(option) => {
                    self.add_entry(child, option)?;
                }
                Member::Group(group) => {
                    self.add_group(child, group)?;
                }
            }
        }
        for slot in positionals {
            self.add_positional(child, slot)?;
        }
        Ok(())
    }

    fn check_name(&self, context: ContextId, descriptor: &FlagDescriptor, positional: bool) -> Result<()> {
        if descriptor.name().is_empty() {
            return Err(Error::MissingFlagName);
        }
        if let Some(flag) = self.context(context).find_duplicate(descriptor, positional) {
            return Err(Error::DuplicateFlag {
                scope: self.context(context).name.clone(),
                flag,
            });
        }
        Ok(())
    }

    /// Group descriptors from the root down to `context` (exclusive of root).
    pub fn group_path(&self, context: ContextId) -> Vec<FlagDescriptor> {
        let mut path = Vec::new();
        let mut current = Some(context);
        while let Some(id) = current {
            let ctx = self.context(id);
            if let Some(descriptor) = &ctx.descriptor {
                path.push(descriptor.clone());
            }
            current = ctx.parent;
        }
        path.reverse();
        path
    }

    pub fn entry_path(&self, id: EntryId) -> FlagPathWithAlias {
        let mut steps = self.group_path(id.context);
        steps.push(self.entry(id).descriptor.clone());
        FlagPathWithAlias(steps)
    }

    /// Resolves a path from the root; aliases are accepted at every step.
    pub fn resolve_path(&self, path: &FlagPath) -> Option<EntryId> {
        let (terminal, groups) = path.steps().split_last()?;
        let mut context = ContextId::ROOT;
        for step in groups {
            let group = self.lookup(context, step)?;
            context = self.child_context(group)?;
        }
        self.lookup(context, terminal)
    }

    /// Resolves a positional slot by path (`"--group > slot"` or `"slot"`).
    pub fn resolve_positional(&self, path: &FlagPath) -> Option<EntryId> {
        let (terminal, groups) = path.steps().split_last()?;
        let mut context = ContextId::ROOT;
        for step in groups {
            let group = self.lookup(context, step)?;
            context = self.child_context(group)?;
        }
        self.context(context)
            .positionals
            .iter()
            .position(|slot| slot.descriptor.contains(terminal))
            .map(|index| EntryId {
                context,
                index,
                positional: true,
            })
    }

    /// Character mode in effect for `context`.
    pub fn char_mode(&self, context: ContextId, fallback: CharMode) -> CharMode {
        let mut current = Some(context);
        while let Some(id) = current {
            let ctx = self.context(id);
            if let Some(mode) = ctx.settings.char_mode {
                return mode;
            }
            current = ctx.parent;
        }
        fallback
    }

    /// Positional policy in effect for `context`, never `UseDefault`.
    pub fn positional_policy(&self, context: ContextId, fallback: PositionalPolicy) -> PositionalPolicy {
        let ctx = self.context(context);
        let inherited = match ctx.parent {
            Some(parent) => self.positional_policy(parent, fallback),
            None => fallback.resolve(PositionalPolicy::Interleaved),
        };
        ctx.settings.positional_policy.resolve(inherited)
    }

    /// Registry chain from `context` out to the root, plus the char mode.
    pub fn scope(&self, context: ContextId, fallback: CharMode) -> ContextScope {
        let mut registries = Vec::new();
        let mut current = Some(context);
        while let Some(id) = current {
            let ctx = self.context(id);
            if !ctx.settings.registry.is_empty() {
                registries.push(ctx.settings.registry.clone());
            }
            current = ctx.parent;
        }
        ContextScope {
            registries,
            char_mode: self.char_mode(context, fallback),
        }
    }

    /// Checks bounds and converter availability for every value entry.
    pub fn validate(&self, fallback: CharMode) -> Result<()> {
        for (id, ctx) in self.contexts() {
            let scope = self.scope(id, fallback);
            for entry in ctx.entries.iter().chain(&ctx.positionals) {
                let Some(value) = entry.value() else {
                    continue;
                };
                let flag = entry.descriptor.name().to_string();
                if let Some((min, max)) = value.inverted_bounds() {
                    return Err(Error::InvalidBounds { flag, min, max });
                }
                if !value.has_converter(&scope) {
                    return Err(Error::NoConverter {
                        flag,
                        type_name: value.type_name(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Clears every entry's per-parse state.
    pub fn reset(&mut self) {
        for ctx in &mut self.contexts {
            for entry in ctx.entries.iter_mut().chain(ctx.positionals.iter_mut()) {
                entry.reset();
            }
        }
    }

    /// Every entry that occurred in the current parse.
    pub fn harvest_set(&self) -> Vec<SetFlag> {
        let mut set = Vec::new();
        for (context, ctx) in self.contexts() {
            let named = ctx.entries.iter().enumerate().map(|(index, entry)| (index, entry, false));
            let slots = ctx
                .positionals
                .iter()
                .enumerate()
                .map(|(index, entry)| (index, entry, true));

            for (index, entry, positional) in named.chain(slots) {
                if !entry.is_set() {
                    continue;
                }
                let id = EntryId {
                    context,
                    index,
                    positional,
                };
                let (count, capacity, multi) = match entry.value() {
                    Some(value) => (value.count(), value.capacity(), value.is_multi()),
                    None => (0, None, false),
                };
                set.push(SetFlag {
                    path: self.entry_path(id),
                    position: entry.first_position.unwrap_or_default(),
                    count,
                    capacity,
                    multi,
                });
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{MultiOption, SingleOption};

    fn sample() -> Schema {
        let mut schema = Schema::new("app");
        schema
            .add_entry(ContextId::ROOT, SingleOption::<String>::new("--name").into())
            .unwrap();
        schema
            .add_group(
                ContextId::ROOT,
                Group::new("--degrees").alias("-d").with_group(
                    Group::new("--instruments")
                        .with_option(SingleOption::<String>::new("--main").alias("-m"))
                        .with_option(MultiOption::<i32>::fixed("--ints", 3)),
                ),
            )
            .unwrap();
        schema
    }

    #[test]
    fn test_failed_group_leaves_schema_untouched() {
        let mut schema = sample();
        let contexts = schema.contexts().count();
        let err = schema
            .add_group(
                ContextId::ROOT,
                Group::new("--extra")
                    .with_option(SingleOption::<i32>::new("--a"))
                    .with_group(
                        Group::new("--inner")
                            .with_option(SingleOption::<i32>::new("--x"))
                            .with_option(SingleOption::<i32>::new("--y").alias("--x")),
                    ),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFlag { flag, .. } if flag == "--x"));
        assert_eq!(schema.contexts().count(), contexts);
        assert!(schema.lookup(ContextId::ROOT, "--extra").is_none());

        let retry = schema
            .add_group(ContextId::ROOT, Group::new("--extra").with_option(SingleOption::<i32>::new("--a")))
            .unwrap();
        let child = schema.child_context(retry).unwrap();
        assert!(schema.lookup(child, "--a").is_some());
    }

    #[test]
    fn test_lookup_kind_and_child_context() {
        let schema = sample();
        let name = schema.lookup(ContextId::ROOT, "--name").unwrap();
        assert_eq!(schema.kind(name), EntryKind::Single);
        assert!(!schema.is_group(name));

        let degrees = schema.lookup(ContextId::ROOT, "-d").unwrap();
        assert_eq!(schema.kind(degrees), EntryKind::Group);
        let child = schema.child_context(degrees).unwrap();
        assert_eq!(schema.context(child).parent, Some(ContextId::ROOT));
        assert!(schema.lookup(ContextId::ROOT, "--main").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected_per_context() {
        let mut schema = sample();
        let err = schema
            .add_entry(ContextId::ROOT, SingleOption::<i32>::new("-n").alias("--name").into())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFlag { flag, .. } if flag == "--name"));

        let err = schema
            .add_entry(ContextId::ROOT, SingleOption::<i32>::new("").into())
            .unwrap_err();
        assert!(matches!(err, Error::MissingFlagName));

        // Same name in a different context is fine.
        let degrees = schema.lookup(ContextId::ROOT, "--degrees").unwrap();
        let child = schema.child_context(degrees).unwrap();
        assert!(
            schema
                .add_entry(child, SingleOption::<String>::new("--name").into())
                .is_ok()
        );
    }

    #[test]
    fn test_resolve_path_through_aliases() {
        let schema = sample();
        let main = schema.resolve_path(&FlagPath::from("-d > --instruments > -m")).unwrap();
        assert_eq!(schema.entry(main).descriptor.name(), "--main");
        assert_eq!(
            schema.entry_path(main).to_string(),
            "--degrees > --instruments > --main"
        );
        assert!(schema.resolve_path(&FlagPath::from("--instruments > --main")).is_none());
        assert!(schema.resolve_path(&FlagPath::from("")).is_none());
    }

    #[test]
    fn test_path_with_alias_matching() {
        let path = FlagPathWithAlias::new(vec![
            FlagDescriptor::new("--group").with_alias("-g"),
            FlagDescriptor::new("--a"),
        ]);
        assert!(path.matches(&FlagPath::from("-g > --a")));
        assert!(path.matches(&FlagPath::from("--group>--a")));
        assert!(!path.matches(&FlagPath::from("--a")));
        assert!(!path.matches(&FlagPath::from("--group > --b")));
    }

    #[test]
    fn test_settings_inherit_towards_root() {
        let mut schema = Schema::new("app");
        schema.context_mut(ContextId::ROOT).settings.char_mode = Some(CharMode::ExpectInteger);
        let outer = schema
            .add_group(
                ContextId::ROOT,
                Group::new("--outer")
                    .with_positional_policy(PositionalPolicy::AfterFlags)
                    .with_group(Group::new("--inner").with_char_mode(CharMode::ExpectAscii)),
            )
            .unwrap();
        let outer_ctx = schema.child_context(outer).unwrap();
        let inner = schema.lookup(outer_ctx, "--inner").unwrap();
        let inner_ctx = schema.child_context(inner).unwrap();

        assert_eq!(
            schema.char_mode(outer_ctx, CharMode::ExpectAscii),
            CharMode::ExpectInteger
        );
        assert_eq!(
            schema.char_mode(inner_ctx, CharMode::ExpectInteger),
            CharMode::ExpectAscii
        );
        assert_eq!(
            schema.positional_policy(inner_ctx, PositionalPolicy::Interleaved),
            PositionalPolicy::AfterFlags
        );
        assert_eq!(
            schema.positional_policy(ContextId::ROOT, PositionalPolicy::BeforeFlags),
            PositionalPolicy::BeforeFlags
        );
    }

    #[test]
    fn test_validate_reports_bounds_and_missing_converters() {
        #[derive(Debug, Clone)]
        struct Opaque;
        impl crate::convert::FlagValue for Opaque {
            fn type_name() -> &'static str {
                "opaque"
            }
        }

        let mut schema = Schema::new("app");
        schema
            .add_entry(
                ContextId::ROOT,
                SingleOption::<i32>::new("--n").with_min(5).with_max(1).into(),
            )
            .unwrap();
        assert!(matches!(
            schema.validate(CharMode::ExpectAscii),
            Err(Error::InvalidBounds { flag, .. }) if flag == "--n"
        ));

        let mut schema = Schema::new("app");
        schema
            .add_entry(ContextId::ROOT, SingleOption::with_default("--o", Opaque).into())
            .unwrap();
        assert!(matches!(
            schema.validate(CharMode::ExpectAscii),
            Err(Error::NoConverter { type_name: "opaque", .. })
        ));

        schema
            .context_mut(ContextId::ROOT)
            .settings
            .registry
            .register::<Opaque>(|_| Some(Opaque));
        assert!(schema.validate(CharMode::ExpectAscii).is_ok());
    }

    #[test]
    fn test_harvest_and_reset() {
        let mut schema = sample();
        let main = schema.resolve_path(&FlagPath::from("--degrees > --instruments > --main")).unwrap();
        let scope = schema.scope(main.context, CharMode::ExpectAscii);
        let entry = schema.entry_mut(main);
        entry.record_occurrence(12);
        entry.record_occurrence(30);
        entry.value_mut().unwrap().assign("piano", "--main", &scope).unwrap();

        let set = schema.harvest_set();
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].position, 12);
        assert!(set[0].path.matches(&FlagPath::from("-d > --instruments > -m")));

        schema.reset();
        assert!(schema.harvest_set().is_empty());
    }

    #[test]
    fn test_clone_is_deep() {
        let schema = sample();
        let mut copy = schema.clone();
        let name = copy.lookup(ContextId::ROOT, "--name").unwrap();
        copy.entry_mut(name).record_occurrence(0);
        assert!(schema.entry(name).first_position.is_none());
    }
}
