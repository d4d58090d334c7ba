//! Typed option declarations.
//!
//! Callers declare entries with [`SingleOption`], [`MultiOption`] and
//! [`Group`]; the parser stores them type-erased as [`OptionValue`] trait
//! objects inside the schema arena. Values flow back out through typed
//! retrieval on the parser or through a [`Destination`] handle the caller
//! keeps.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::convert::{
    Bounds, CharMode, ConversionFailure, ConversionRegistry, ConversionScope, ConvertFn,
    ErrorFormatter, FlagValue, convert_value, has_converter,
};
use crate::positional::PositionalPolicy;
use crate::schema::{ContextSettings, Description, FlagDescriptor};

/// A caller-owned slot the parser writes into on every successful conversion.
///
/// Cloning the handle shares the slot.
///
/// # Examples
///
/// ```
/// use flagtree_core::Destination;
///
/// let width = Destination::new(0u32);
/// let shared = width.clone();
/// shared.set(100);
/// assert_eq!(width.get(), 100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Destination<T>(Rc<RefCell<T>>);

impl<T> Destination<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }
}

impl<T: Clone> Destination<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

/// Type-erased view of an option's value state, stored in the schema.
pub trait OptionValue: fmt::Debug {
    fn type_name(&self) -> &'static str;
    fn value_type_id(&self) -> TypeId;
    fn is_multi(&self) -> bool;
    /// Bare occurrences mean `true`.
    fn is_switch(&self) -> bool;
    /// Maximum number of values; `None` when growable.
    fn capacity(&self) -> Option<usize>;
    /// Values assigned during the current parse.
    fn count(&self) -> usize;
    fn is_set(&self) -> bool;
    fn mark_set(&mut self);
    /// Restores the declared defaults. Destinations are left untouched.
    fn reset(&mut self);
    /// Converts `input` and stores it (replace for single, append for multi).
    /// On failure returns the diagnostic text, formatted with the entry's
    /// formatter when it has one.
    fn assign(&mut self, input: &str, label: &str, scope: &dyn ConversionScope)
    -> Result<(), String>;
    /// Rendered `(min, max)` when the entry's bounds are inverted.
    fn inverted_bounds(&self) -> Option<(String, String)>;
    fn has_converter(&self, scope: &dyn ConversionScope) -> bool;
    /// Current values (or defaults when unset), rendered.
    fn rendered_values(&self) -> Vec<String>;
    fn rendered_default(&self) -> Option<String>;
    fn bounds_description(&self) -> Option<String>;
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn OptionValue>;
}

impl Clone for Box<dyn OptionValue> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Conversion settings shared by single and multi values.
#[derive(Clone)]
struct ValueSettings<T> {
    converter: Option<ConvertFn<T>>,
    formatter: Option<ErrorFormatter>,
    bounds: Option<Bounds<T>>,
    char_mode: Option<CharMode>,
}

impl<T> Default for ValueSettings<T> {
    fn default() -> Self {
        Self {
            converter: None,
            formatter: None,
            bounds: None,
            char_mode: None,
        }
    }
}

impl<T: FlagValue> ValueSettings<T> {
    fn convert(&self, input: &str, label: &str, scope: &dyn ConversionScope) -> Result<T, String> {
        let mode = if T::uses_char_mode() {
            self.char_mode
        } else {
            None
        };
        convert_value(
            input,
            self.converter.as_ref(),
            self.bounds.as_ref(),
            mode,
            scope,
        )
        .map_err(|kind| {
            let failure = ConversionFailure {
                flag: label.to_string(),
                input: input.to_string(),
                type_name: T::type_name(),
                range: T::value_range(),
                kind,
            };
            match &self.formatter {
                Some(format) => format(&failure),
                None => failure.default_message(),
            }
        })
    }

    fn has_converter(&self, scope: &dyn ConversionScope) -> bool {
        has_converter::<T>(self.converter.is_some(), scope)
    }
}

impl<T> fmt::Debug for ValueSettings<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSettings")
            .field("converter", &self.converter.is_some())
            .field("formatter", &self.formatter.is_some())
            .field("bounds", &self.bounds)
            .field("char_mode", &self.char_mode)
            .finish()
    }
}

/// Value state of a single-valued entry.
#[derive(Debug, Clone)]
pub struct SingleValue<T: FlagValue> {
    value: T,
    default: T,
    set: bool,
    destination: Option<Destination<T>>,
    settings: ValueSettings<T>,
}

impl<T: FlagValue> SingleValue<T> {
    /// The last assigned value, or the default.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }
}

impl<T: FlagValue> OptionValue for SingleValue<T> {
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn is_multi(&self) -> bool {
        false
    }

    fn is_switch(&self) -> bool {
        T::is_switch()
    }

    fn capacity(&self) -> Option<usize> {
        Some(1)
    }

    fn count(&self) -> usize {
        usize::from(self.set)
    }

    fn is_set(&self) -> bool {
        self.set
    }

    fn mark_set(&mut self) {
        self.set = true;
    }

    fn reset(&mut self) {
        self.value = self.default.clone();
        self.set = false;
    }

    fn assign(
        &mut self,
        input: &str,
        label: &str,
        scope: &dyn ConversionScope,
    ) -> Result<(), String> {
        let value = self.settings.convert(input, label, scope)?;
        if let Some(destination) = &self.destination {
            destination.set(value.clone());
        }
        self.value = value;
        self.set = true;
        Ok(())
    }

    fn inverted_bounds(&self) -> Option<(String, String)> {
        self.settings.bounds.as_ref().and_then(Bounds::inverted)
    }

    fn has_converter(&self, scope: &dyn ConversionScope) -> bool {
        self.settings.has_converter(scope)
    }

    fn rendered_values(&self) -> Vec<String> {
        vec![self.value.render()]
    }

    fn rendered_default(&self) -> Option<String> {
        Some(self.default.render())
    }

    fn bounds_description(&self) -> Option<String> {
        self.settings.bounds.as_ref().map(Bounds::describe)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn OptionValue> {
        Box::new(self.clone())
    }
}

/// Value state of a multi-valued entry.
#[derive(Debug, Clone)]
pub struct MultiValue<T: FlagValue> {
    values: Vec<T>,
    defaults: Vec<T>,
    capacity: Option<usize>,
    set: bool,
    destination: Option<Destination<Vec<T>>>,
    settings: ValueSettings<T>,
}

impl<T: FlagValue> MultiValue<T> {
    /// Values parsed in input order, or the defaults when unset.
    pub fn values(&self) -> &[T] {
        if self.set { &self.values } else { &self.defaults }
    }
}

impl<T: FlagValue> OptionValue for MultiValue<T> {
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn is_multi(&self) -> bool {
        true
    }

    fn is_switch(&self) -> bool {
        false
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn is_set(&self) -> bool {
        self.set
    }

    fn mark_set(&mut self) {
        self.set = true;
    }

    fn reset(&mut self) {
        self.values.clear();
        self.set = false;
    }

    fn assign(
        &mut self,
        input: &str,
        label: &str,
        scope: &dyn ConversionScope,
    ) -> Result<(), String> {
        let value = self.settings.convert(input, label, scope)?;
        self.values.push(value);
        self.set = true;
        if let Some(destination) = &self.destination {
            destination.set(self.values.clone());
        }
        Ok(())
    }

    fn inverted_bounds(&self) -> Option<(String, String)> {
        self.settings.bounds.as_ref().and_then(Bounds::inverted)
    }

    fn has_converter(&self, scope: &dyn ConversionScope) -> bool {
        self.settings.has_converter(scope)
    }

    fn rendered_values(&self) -> Vec<String> {
        self.values().iter().map(T::render).collect()
    }

    fn rendered_default(&self) -> Option<String> {
        if self.defaults.is_empty() {
            return None;
        }
        let items: Vec<_> = self.defaults.iter().map(T::render).collect();
        Some(items.join(" "))
    }

    fn bounds_description(&self) -> Option<String> {
        self.settings.bounds.as_ref().map(Bounds::describe)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn OptionValue> {
        Box::new(self.clone())
    }
}

/// A declared entry ready to be inserted into a context.
#[derive(Debug, Clone)]
pub struct OptionEntry {
    pub(crate) descriptor: FlagDescriptor,
    pub(crate) description: Option<Description>,
    pub(crate) value: Box<dyn OptionValue>,
}

impl OptionEntry {
    pub fn descriptor(&self) -> &FlagDescriptor {
        &self.descriptor
    }
}

fn describe(description: &mut Option<Description>) -> &mut Description {
    description.get_or_insert_with(Description::default)
}

/// A flag that takes exactly one value (or none, for `bool`).
///
/// Also used to declare a single positional slot, in which case the name is
/// the slot name.
///
/// # Examples
///
/// ```
/// use flagtree_core::{Destination, Parser, SingleOption};
///
/// let width = Destination::new(0u32);
/// let mut parser = Parser::new("app")
///     .with_option(SingleOption::<u32>::new("--width").alias("-w").bind(&width).with_max(4096));
///
/// parser.parse_str("-w 100").unwrap();
/// assert_eq!(width.get(), 100);
/// assert!(!parser.has_errors());
/// ```
#[derive(Debug, Clone)]
pub struct SingleOption<T: FlagValue> {
    descriptor: FlagDescriptor,
    description: Option<Description>,
    value: SingleValue<T>,
}

impl<T: FlagValue + Default> SingleOption<T> {
    /// Declares an option whose default is `T::default()`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_default(name, T::default())
    }
}

impl<T: FlagValue> SingleOption<T> {
    /// Declares an option with an explicit default, for types without `Default`.
    pub fn with_default(name: impl Into<String>, default: T) -> Self {
        Self {
            descriptor: FlagDescriptor::new(name),
            description: None,
            value: SingleValue {
                value: default.clone(),
                default,
                set: false,
                destination: None,
                settings: ValueSettings::default(),
            },
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_alias(alias);
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        describe(&mut self.description).text = text.into();
        self
    }

    /// Placeholder shown as `[hint]` in help output.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        describe(&mut self.description).hint = Some(hint.into());
        self
    }

    pub fn default_value(mut self, default: T) -> Self {
        self.value.value = default.clone();
        self.value.default = default;
        self
    }

    pub fn bind(mut self, destination: &Destination<T>) -> Self {
        self.value.destination = Some(destination.clone());
        self
    }

    pub fn with_char_mode(mut self, mode: CharMode) -> Self {
        self.value.settings.char_mode = Some(mode);
        self
    }

    pub fn with_conversion_fn(mut self, convert: impl Fn(&str) -> Option<T> + 'static) -> Self {
        self.value.settings.converter = Some(Rc::new(convert));
        self
    }

    pub fn with_error_msg_fn(
        mut self,
        format: impl Fn(&ConversionFailure) -> String + 'static,
    ) -> Self {
        self.value.settings.formatter = Some(Rc::new(format));
        self
    }
}

impl<T: FlagValue + PartialOrd + fmt::Display> SingleOption<T> {
    pub fn with_min(mut self, min: T) -> Self {
        self.value
            .settings
            .bounds
            .get_or_insert_with(Bounds::new)
            .set_min(min);
        self
    }

    pub fn with_max(mut self, max: T) -> Self {
        self.value
            .settings
            .bounds
            .get_or_insert_with(Bounds::new)
            .set_max(max);
        self
    }
}

impl<T: FlagValue> From<SingleOption<T>> for OptionEntry {
    fn from(option: SingleOption<T>) -> Self {
        Self {
            descriptor: option.descriptor,
            description: option.description,
            value: Box::new(option.value),
        }
    }
}

/// A flag that collects several values per occurrence.
///
/// A fixed capacity `N` means exactly `N` values are expected; a growable
/// option accepts any number and appends on every occurrence.
#[derive(Debug, Clone)]
pub struct MultiOption<T: FlagValue> {
    descriptor: FlagDescriptor,
    description: Option<Description>,
    value: MultiValue<T>,
}

impl<T: FlagValue> MultiOption<T> {
    fn with_capacity(name: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            descriptor: FlagDescriptor::new(name),
            description: None,
            value: MultiValue {
                values: Vec::new(),
                defaults: Vec::new(),
                capacity,
                set: false,
                destination: None,
                settings: ValueSettings::default(),
            },
        }
    }

    /// Expects exactly `capacity` values.
    pub fn fixed(name: impl Into<String>, capacity: usize) -> Self {
        Self::with_capacity(name, Some(capacity))
    }

    pub fn growable(name: impl Into<String>) -> Self {
        Self::with_capacity(name, None)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_alias(alias);
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        describe(&mut self.description).text = text.into();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        describe(&mut self.description).hint = Some(hint.into());
        self
    }

    pub fn default_values(mut self, defaults: Vec<T>) -> Self {
        self.value.defaults = defaults;
        self
    }

    pub fn bind(mut self, destination: &Destination<Vec<T>>) -> Self {
        self.value.destination = Some(destination.clone());
        self
    }

    pub fn with_char_mode(mut self, mode: CharMode) -> Self {
        self.value.settings.char_mode = Some(mode);
        self
    }

    pub fn with_conversion_fn(mut self, convert: impl Fn(&str) -> Option<T> + 'static) -> Self {
        self.value.settings.converter = Some(Rc::new(convert));
        self
    }

    pub fn with_error_msg_fn(
        mut self,
        format: impl Fn(&ConversionFailure) -> String + 'static,
    ) -> Self {
        self.value.settings.formatter = Some(Rc::new(format));
        self
    }
}

impl<T: FlagValue + PartialOrd + fmt::Display> MultiOption<T> {
    pub fn with_min(mut self, min: T) -> Self {
        self.value
            .settings
            .bounds
            .get_or_insert_with(Bounds::new)
            .set_min(min);
        self
    }

    pub fn with_max(mut self, max: T) -> Self {
        self.value
            .settings
            .bounds
            .get_or_insert_with(Bounds::new)
            .set_max(max);
        self
    }
}

impl<T: FlagValue> From<MultiOption<T>> for OptionEntry {
    fn from(option: MultiOption<T>) -> Self {
        Self {
            descriptor: option.descriptor,
            description: option.description,
            value: Box::new(option.value),
        }
    }
}

/// A member of a [`Group`] declaration.
#[derive(Debug, Clone)]
pub(crate) enum Member {
    Option(OptionEntry),
    Group(Group),
}

/// A nested scope: `--name [ ... ]` on the command line.
///
/// # Examples
///
/// ```
/// use flagtree_core::{Destination, Group, Parser, SingleOption};
///
/// let major = Destination::new(String::new());
/// let mut parser = Parser::new("app").with_group(
///     Group::new("--degrees").with_option(SingleOption::<String>::new("--major").bind(&major)),
/// );
///
/// parser.parse_str("--degrees [--major CS]").unwrap();
/// assert_eq!(major.get(), "CS");
/// ```
#[derive(Debug, Clone)]
pub struct Group {
    pub(crate) descriptor: FlagDescriptor,
    pub(crate) description: Option<Description>,
    pub(crate) members: Vec<Member>,
    pub(crate) positionals: Vec<OptionEntry>,
    pub(crate) settings: ContextSettings,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: FlagDescriptor::new(name),
            description: None,
            members: Vec::new(),
            positionals: Vec::new(),
            settings: ContextSettings::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_alias(alias);
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        describe(&mut self.description).text = text.into();
        self
    }

    pub fn with_option(mut self, option: impl Into<OptionEntry>) -> Self {
        self.members.push(Member::Option(option.into()));
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.members.push(Member::Group(group));
        self
    }

    /// Adds a positional slot; slots fill in declaration order.
    pub fn with_positional(mut self, slot: impl Into<OptionEntry>) -> Self {
        self.positionals.push(slot.into());
        self
    }

    pub fn with_char_mode(mut self, mode: CharMode) -> Self {
        self.settings.char_mode = Some(mode);
        self
    }

    pub fn with_positional_policy(mut self, policy: PositionalPolicy) -> Self {
        self.settings.positional_policy = policy;
        self
    }

    /// Registers a converter for every `T` entry in this group and below.
    pub fn with_conversion_fn<T: FlagValue>(
        mut self,
        convert: impl Fn(&str) -> Option<T> + 'static,
    ) -> Self {
        self.settings.registry.register(convert);
        self
    }

    /// Replaces the whole conversion registry of this group.
    pub fn with_registry(mut self, registry: ConversionRegistry) -> Self {
        self.settings.registry = registry;
        self
    }

    pub fn with_min<T: FlagValue + PartialOrd + fmt::Display>(mut self, min: T) -> Self {
        self.settings.registry.set_min(min);
        self
    }

    pub fn with_max<T: FlagValue + PartialOrd + fmt::Display>(mut self, max: T) -> Self {
        self.settings.registry.set_max(max);
        self
    }

    pub fn descriptor(&self) -> &FlagDescriptor {
        &self.descriptor
    }
}
