//! String-to-value conversion.
//!
//! Every value type used by an option implements [`FlagValue`]. The trait
//! carries an optional built-in conversion; callers can override it per entry
//! or per context through a [`ConversionRegistry`]. Resolution order when a
//! value is converted:
//!
//! 1. the entry's own converter,
//! 2. the nearest registry (active context outwards) holding one for `T`,
//! 3. the built-in [`FlagValue::from_flag_str`],
//! 4. otherwise [`Error::NoConverter`](crate::Error::NoConverter), which is
//!    reported before any input is consumed.
//!
//! Conversion must consume the entire input; trailing bytes are a failure.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// How character-typed entries interpret their input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharMode {
    /// Exactly one ASCII character, e.g. `x`.
    #[default]
    ExpectAscii,
    /// An integer code point in any supported base, e.g. `65` or `0x41`.
    ExpectInteger,
}

/// Why a conversion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionErrorKind {
    /// Nothing to convert.
    Empty,
    /// The input is not a valid literal of the target type.
    Malformed,
    /// A base prefix (`0x`, `0b`) with no digits after it.
    MissingDigits,
    /// A valid literal that does not fit the target type.
    OutOfRange,
    /// Character mode expected a single ASCII character.
    NotAscii,
    /// Below an explicit minimum (rendered).
    BelowMinimum(String),
    /// Above an explicit maximum (rendered).
    AboveMaximum(String),
    /// A custom converter rejected the input.
    Rejected,
}

/// Everything a diagnostic formatter needs to describe a failed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    /// Display form of the flag (or positional slot) being converted.
    pub flag: String,
    pub input: String,
    pub type_name: &'static str,
    /// The type's natural range, e.g. `("0", "255")` for `u8`.
    pub range: Option<(String, String)>,
    pub kind: ConversionErrorKind,
}

impl ConversionFailure {
    /// The registry's default wording.
    pub fn default_message(&self) -> String {
        let expected = match &self.range {
            Some((min, max)) => format!("{} in range [{min}, {max}]", self.type_name),
            None => self.type_name.to_string(),
        };
        let flag = &self.flag;
        let input = &self.input;

        match &self.kind {
            ConversionErrorKind::Empty => {
                format!("Missing value for flag '{flag}': expected {expected}")
            }
            ConversionErrorKind::Malformed | ConversionErrorKind::Rejected => {
                format!("Invalid value '{input}' for flag '{flag}': expected {expected}")
            }
            ConversionErrorKind::MissingDigits => format!(
                "Invalid value '{input}' for flag '{flag}': no digits after base prefix, expected {expected}"
            ),
            ConversionErrorKind::OutOfRange => {
                format!("Value '{input}' for flag '{flag}' is out of range for {expected}")
            }
            ConversionErrorKind::NotAscii => format!(
                "Invalid value '{input}' for flag '{flag}': expected a single ASCII character"
            ),
            ConversionErrorKind::BelowMinimum(min) => {
                format!("Value '{input}' for flag '{flag}' is below the minimum of {min}")
            }
            ConversionErrorKind::AboveMaximum(max) => {
                format!("Value '{input}' for flag '{flag}' is above the maximum of {max}")
            }
        }
    }
}

/// Per-entry diagnostic formatter.
pub type ErrorFormatter = Rc<dyn Fn(&ConversionFailure) -> String>;

/// A typed converter. Returning `None` rejects the input.
pub type ConvertFn<T> = Rc<dyn Fn(&str) -> Option<T>>;

/// A type that options can hold.
///
/// Implementations for the standard scalar types are provided. Custom types
/// either implement [`from_flag_str`](Self::from_flag_str) or rely on a
/// converter registered per entry or per context.
pub trait FlagValue: Clone + fmt::Debug + 'static {
    /// Human-readable name used in diagnostics ("unsigned 32-bit integer").
    fn type_name() -> &'static str;

    /// Built-in conversion, `None` when the type has none.
    fn from_flag_str(_input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        None
    }

    /// The type's natural range for diagnostics.
    fn value_range() -> Option<(String, String)> {
        None
    }

    /// `bool` options accept a bare flag as `true`.
    fn is_switch() -> bool {
        false
    }

    /// Whether conversion depends on [`CharMode`].
    fn uses_char_mode() -> bool {
        false
    }

    /// Display form used by help output and value snapshots.
    fn render(&self) -> String {
        format!("{self:?}")
    }
}

impl FlagValue for bool {
    fn type_name() -> &'static str {
        "boolean"
    }

    fn from_flag_str(input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        Some(parse_bool(input))
    }

    fn is_switch() -> bool {
        true
    }
}

impl FlagValue for char {
    fn type_name() -> &'static str {
        "character"
    }

    fn from_flag_str(input: &str, mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        Some(parse_char(input, mode))
    }

    fn uses_char_mode() -> bool {
        true
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl FlagValue for String {
    fn type_name() -> &'static str {
        "string"
    }

    fn from_flag_str(input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        Some(Ok(input.to_string()))
    }

    fn render(&self) -> String {
        self.clone()
    }
}

impl FlagValue for PathBuf {
    fn type_name() -> &'static str {
        "path"
    }

    fn from_flag_str(input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        if input.is_empty() {
            return Some(Err(ConversionErrorKind::Empty));
        }
        Some(Ok(PathBuf::from(input)))
    }

    fn render(&self) -> String {
        self.display().to_string()
    }
}

macro_rules! integer_flag_value {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl FlagValue for $ty {
            fn type_name() -> &'static str {
                $name
            }

            fn from_flag_str(input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
                Some(parse_integer::<$ty>(input))
            }

            fn value_range() -> Option<(String, String)> {
                Some((<$ty>::MIN.to_string(), <$ty>::MAX.to_string()))
            }

            fn render(&self) -> String {
                self.to_string()
            }
        }
    )*};
}

integer_flag_value! {
    i8 => "signed 8-bit integer",
    i16 => "signed 16-bit integer",
    i32 => "signed 32-bit integer",
    i64 => "signed 64-bit integer",
    i128 => "signed 128-bit integer",
    isize => "signed pointer-sized integer",
    u8 => "unsigned 8-bit integer",
    u16 => "unsigned 16-bit integer",
    u32 => "unsigned 32-bit integer",
    u64 => "unsigned 64-bit integer",
    u128 => "unsigned 128-bit integer",
    usize => "unsigned pointer-sized integer",
}

impl FlagValue for f32 {
    fn type_name() -> &'static str {
        "single-precision float"
    }

    fn from_flag_str(input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        Some(parse_f64(input).and_then(|value| {
            let narrowed = value as f32;
            if value.is_finite() && narrowed.is_infinite() {
                Err(ConversionErrorKind::OutOfRange)
            } else {
                Ok(narrowed)
            }
        }))
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl FlagValue for f64 {
    fn type_name() -> &'static str {
        "double-precision float"
    }

    fn from_flag_str(input: &str, _mode: CharMode) -> Option<Result<Self, ConversionErrorKind>> {
        Some(parse_f64(input))
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

fn parse_bool(input: &str) -> Result<bool, ConversionErrorKind> {
    if input.is_empty() {
        Err(ConversionErrorKind::Empty)
    } else if input.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if input.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConversionErrorKind::Malformed)
    }
}

fn parse_char(input: &str, mode: CharMode) -> Result<char, ConversionErrorKind> {
    if input.is_empty() {
        return Err(ConversionErrorKind::Empty);
    }
    match mode {
        CharMode::ExpectAscii => {
            let mut chars = input.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if ch.is_ascii() => Ok(ch),
                _ => Err(ConversionErrorKind::NotAscii),
            }
        }
        CharMode::ExpectInteger => {
            let code = parse_integer::<u32>(input)?;
            char::from_u32(code).ok_or(ConversionErrorKind::OutOfRange)
        }
    }
}

/// Splits an optional sign and base prefix off an integer literal.
///
/// Returns `(negative, radix, digits)`.
fn split_integer(input: &str) -> Result<(bool, u32, &str), ConversionErrorKind> {
    if input.is_empty() {
        return Err(ConversionErrorKind::Empty);
    }

    let (negative, unsigned) = match input.as_bytes()[0] {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let (radix, digits, prefixed) = if let Some(rest) = strip_prefix_ci(unsigned, "0x") {
        (16, rest, true)
    } else if let Some(rest) = strip_prefix_ci(unsigned, "0b") {
        (2, rest, true)
    } else {
        (10, unsigned, false)
    };

    if digits.is_empty() {
        return Err(if prefixed {
            ConversionErrorKind::MissingDigits
        } else {
            ConversionErrorKind::Malformed
        });
    }
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(ConversionErrorKind::Malformed);
    }

    Ok((negative, radix, digits))
}

fn strip_prefix_ci<'s>(input: &'s str, prefix: &str) -> Option<&'s str> {
    let head = input.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &input[prefix.len()..])
}

/// Parses decimal, `0x` hexadecimal or `0b` binary integers with an optional sign.
pub(crate) fn parse_integer<T>(input: &str) -> Result<T, ConversionErrorKind>
where
    T: TryFrom<i128> + TryFrom<u128>,
{
    let (negative, radix, digits) = split_integer(input)?;
    let magnitude =
        u128::from_str_radix(digits, radix).map_err(|_| ConversionErrorKind::OutOfRange)?;

    if negative {
        let limit = i128::MAX as u128 + 1;
        if magnitude > limit {
            return Err(ConversionErrorKind::OutOfRange);
        }
        let value = (magnitude as i128).wrapping_neg();
        <T as TryFrom<i128>>::try_from(value).map_err(|_| ConversionErrorKind::OutOfRange)
    } else {
        <T as TryFrom<u128>>::try_from(magnitude).map_err(|_| ConversionErrorKind::OutOfRange)
    }
}

/// Parses standard decimal floats or C-style hexadecimal floats (`0x1.8p3`).
pub(crate) fn parse_f64(input: &str) -> Result<f64, ConversionErrorKind> {
    if input.is_empty() {
        return Err(ConversionErrorKind::Empty);
    }

    let unsigned = input.strip_prefix(['+', '-']).unwrap_or(input);
    if let Some(body) = strip_prefix_ci(unsigned, "0x") {
        let magnitude = parse_hex_float(body)?;
        return Ok(if input.starts_with('-') {
            -magnitude
        } else {
            magnitude
        });
    }

    let value: f64 = input.parse().map_err(|_| ConversionErrorKind::Malformed)?;
    if value.is_infinite() && !unsigned.to_ascii_lowercase().starts_with("inf") {
        return Err(ConversionErrorKind::OutOfRange);
    }
    Ok(value)
}

/// Hex digits kept in the mantissa; the rest only shift the exponent.
const SIGNIFICANT_HEX_DIGITS: usize = 15;

/// Binary exponents past this magnitude are 0 or infinite for any mantissa.
const EXPONENT_LIMIT: i64 = 2200;

fn parse_hex_float(body: &str) -> Result<f64, ConversionErrorKind> {
    let (mantissa, exponent) = match body.find(['p', 'P']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(ConversionErrorKind::MissingDigits);
    }

    let mut bits = 0u64;
    let mut kept = 0usize;
    let mut dropped = 0i64;
    for ch in int_part.chars().chain(frac_part.chars()) {
        let digit = ch.to_digit(16).ok_or(ConversionErrorKind::Malformed)?;
        if kept == 0 && digit == 0 {
            continue;
        }
        if kept < SIGNIFICANT_HEX_DIGITS {
            bits = bits * 16 + u64::from(digit);
            kept += 1;
        } else {
            dropped = dropped.saturating_add(1);
        }
    }

    let frac_len = i64::try_from(frac_part.len()).unwrap_or(i64::MAX);
    let mut exp = dropped.saturating_sub(frac_len).saturating_mul(4);
    if let Some(exponent) = exponent {
        let (negative, radix, digits) =
            split_integer(exponent).map_err(|_| ConversionErrorKind::Malformed)?;
        if radix != 10 {
            return Err(ConversionErrorKind::Malformed);
        }
        let magnitude: i64 = digits.parse().unwrap_or(i64::MAX);
        exp = if negative {
            exp.saturating_sub(magnitude)
        } else {
            exp.saturating_add(magnitude)
        };
    }

    if bits == 0 {
        return Ok(0.0);
    }

    // Two steps so an in-range result is not lost to an intermediate overflow.
    let exp = exp.clamp(-EXPONENT_LIMIT, EXPONENT_LIMIT) as i32;
    let half = exp / 2;
    let scaled = bits as f64 * 2f64.powi(half) * 2f64.powi(exp - half);
    if !scaled.is_finite() {
        return Err(ConversionErrorKind::OutOfRange);
    }
    Ok(scaled)
}

/// Inclusive numeric bounds for an entry or a whole type.
pub struct Bounds<T> {
    min: Option<T>,
    max: Option<T>,
    less: fn(&T, &T) -> bool,
    show: fn(&T) -> String,
}

impl<T: Clone> Clone for Bounds<T> {
    fn clone(&self) -> Self {
        Self {
            min: self.min.clone(),
            max: self.max.clone(),
            less: self.less,
            show: self.show,
        }
    }
}

impl<T> fmt::Debug for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bounds")
            .field("min", &self.min.as_ref().map(self.show))
            .field("max", &self.max.as_ref().map(self.show))
            .finish()
    }
}

impl<T: PartialOrd + fmt::Display> Bounds<T> {
    pub fn new() -> Self {
        Self {
            min: None,
            max: None,
            less: |a, b| a < b,
            show: |v| v.to_string(),
        }
    }
}

impl<T: PartialOrd + fmt::Display> Default for Bounds<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Bounds<T> {
    pub fn with_min(mut self, min: T) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn set_min(&mut self, min: T) {
        self.min = Some(min);
    }

    pub fn set_max(&mut self, max: T) {
        self.max = Some(max);
    }

    pub fn min(&self) -> Option<&T> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&T> {
        self.max.as_ref()
    }

    /// Returns the rendered `(min, max)` pair when `min > max`.
    pub fn inverted(&self) -> Option<(String, String)> {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) if (self.less)(max, min) => {
                Some(((self.show)(min), (self.show)(max)))
            }
            _ => None,
        }
    }

    pub fn check(&self, value: &T) -> Result<(), ConversionErrorKind> {
        if let Some(min) = &self.min
            && (self.less)(value, min)
        {
            return Err(ConversionErrorKind::BelowMinimum((self.show)(min)));
        }
        if let Some(max) = &self.max
            && (self.less)(max, value)
        {
            return Err(ConversionErrorKind::AboveMaximum((self.show)(max)));
        }
        Ok(())
    }

    /// Rendered `[min, max]` for help output; open ends render as `..`.
    pub fn describe(&self) -> String {
        let min = self.min.as_ref().map_or_else(|| "..".to_string(), self.show);
        let max = self.max.as_ref().map_or_else(|| "..".to_string(), self.show);
        format!("[{min}, {max}]")
    }
}

/// Type-indexed converters and bounds.
///
/// Entries are stored type-erased behind [`TypeId`] and recovered by a typed
/// downcast, so one registry can serve every value type in a schema.
///
/// # Examples
///
/// ```
/// use flagtree_core::ConversionRegistry;
///
/// let mut registry = ConversionRegistry::default();
/// registry.register::<u32>(|s| s.strip_suffix('k').and_then(|n| n.parse::<u32>().ok()).map(|n| n * 1000));
///
/// let convert = registry.converter::<u32>().unwrap();
/// assert_eq!(convert("4k"), Some(4000));
/// assert!(registry.converter::<i32>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct ConversionRegistry {
    converters: HashMap<TypeId, Rc<dyn Any>>,
    bounds: HashMap<TypeId, Rc<dyn Any>>,
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("converters", &self.converters.len())
            .field("bounds", &self.bounds.len())
            .finish()
    }
}

impl ConversionRegistry {
    /// Registers (or replaces) the converter for `T`.
    pub fn register<T: FlagValue>(&mut self, convert: impl Fn(&str) -> Option<T> + 'static) {
        let convert: ConvertFn<T> = Rc::new(convert);
        self.converters.insert(TypeId::of::<T>(), Rc::new(convert));
    }

    pub fn converter<T: FlagValue>(&self) -> Option<ConvertFn<T>> {
        self.converters
            .get(&TypeId::of::<T>())
            .and_then(|erased| erased.downcast_ref::<ConvertFn<T>>())
            .cloned()
    }

    pub fn has_converter(&self, type_id: TypeId) -> bool {
        self.converters.contains_key(&type_id)
    }

    /// Sets the default minimum for every entry of type `T` in scope.
    pub fn set_min<T: FlagValue + PartialOrd + fmt::Display>(&mut self, min: T) {
        let mut bounds = self.bounds::<T>().unwrap_or_default();
        bounds.set_min(min);
        self.bounds.insert(TypeId::of::<T>(), Rc::new(bounds));
    }

    /// Sets the default maximum for every entry of type `T` in scope.
    pub fn set_max<T: FlagValue + PartialOrd + fmt::Display>(&mut self, max: T) {
        let mut bounds = self.bounds::<T>().unwrap_or_default();
        bounds.set_max(max);
        self.bounds.insert(TypeId::of::<T>(), Rc::new(bounds));
    }

    pub fn bounds<T: FlagValue>(&self) -> Option<Bounds<T>> {
        self.bounds
            .get(&TypeId::of::<T>())
            .and_then(|erased| erased.downcast_ref::<Bounds<T>>())
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty() && self.bounds.is_empty()
    }
}

/// The conversion environment of the active context: the registry chain from
/// the active context out to the root, plus the effective character mode.
pub trait ConversionScope {
    fn registries(&self) -> Vec<&ConversionRegistry>;
    fn char_mode(&self) -> CharMode;
}

/// Converts `input` for an entry, applying the resolution order and bounds.
pub(crate) fn convert_value<T: FlagValue>(
    input: &str,
    own: Option<&ConvertFn<T>>,
    bounds: Option<&Bounds<T>>,
    mode: Option<CharMode>,
    scope: &dyn ConversionScope,
) -> Result<T, ConversionErrorKind> {
    let registries = scope.registries();

    let value = if let Some(convert) = own {
        convert(input).ok_or(ConversionErrorKind::Rejected)?
    } else if let Some(convert) = registries.iter().find_map(|r| r.converter::<T>()) {
        convert(input).ok_or(ConversionErrorKind::Rejected)?
    } else {
        let mode = mode.unwrap_or_else(|| scope.char_mode());
        match T::from_flag_str(input, mode) {
            Some(result) => result?,
            None => return Err(ConversionErrorKind::Rejected),
        }
    };

    let scoped_bounds;
    let bounds = match bounds {
        Some(bounds) => Some(bounds),
        None => {
            scoped_bounds = registries.iter().find_map(|r| r.bounds::<T>());
            scoped_bounds.as_ref()
        }
    };
    if let Some(bounds) = bounds {
        bounds.check(&value)?;
    }

    Ok(value)
}

/// Whether any converter is reachable for `T`.
pub(crate) fn has_converter<T: FlagValue>(own: bool, scope: &dyn ConversionScope) -> bool {
    own || scope
        .registries()
        .iter()
        .any(|r| r.has_converter(TypeId::of::<T>()))
        || T::from_flag_str("", CharMode::default()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RootScope(ConversionRegistry, CharMode);

    impl ConversionScope for RootScope {
        fn registries(&self) -> Vec<&ConversionRegistry> {
            vec![&self.0]
        }

        fn char_mode(&self) -> CharMode {
            self.1
        }
    }

    fn scope() -> RootScope {
        RootScope(ConversionRegistry::default(), CharMode::ExpectAscii)
    }

    fn convert<T: FlagValue>(input: &str) -> Result<T, ConversionErrorKind> {
        convert_value::<T>(input, None, None, None, &scope())
    }

    #[test]
    fn test_integer_bases_and_signs() {
        assert_eq!(convert::<i32>("-0x12345"), Ok(-0x12345));
        assert_eq!(convert::<u32>("0x12345"), Ok(0x12345));
        assert_eq!(convert::<i64>("-0b11111"), Ok(-31));
        assert_eq!(convert::<u64>("0B11111"), Ok(31));
        assert_eq!(convert::<u32>("+123456"), Ok(123456));
        assert_eq!(convert::<i8>("-128"), Ok(i8::MIN));
        assert_eq!(convert::<i128>(&i128::MIN.to_string()), Ok(i128::MIN));
        assert_eq!(convert::<u128>(&u128::MAX.to_string()), Ok(u128::MAX));
        assert_eq!(convert::<u8>("-0"), Ok(0));
    }

    #[test]
    fn test_integer_failures() {
        assert_eq!(convert::<u8>("256"), Err(ConversionErrorKind::OutOfRange));
        assert_eq!(convert::<u32>("-1"), Err(ConversionErrorKind::OutOfRange));
        assert_eq!(convert::<i32>("12abc"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<i32>("0x"), Err(ConversionErrorKind::MissingDigits));
        assert_eq!(convert::<i32>("0b102"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<i32>(""), Err(ConversionErrorKind::Empty));
        assert_eq!(convert::<i32>("+-1"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<i32>("1.5"), Err(ConversionErrorKind::Malformed));
        assert_eq!(
            convert::<u128>("340282366920938463463374607431768211456"),
            Err(ConversionErrorKind::OutOfRange)
        );
    }

    #[test]
    fn test_floats_standard_and_hex() {
        assert_eq!(convert::<f64>("69.123456"), Ok(69.123456));
        assert_eq!(convert::<f32>("50.1"), Ok(50.1f32));
        assert_eq!(convert::<f64>("1e3"), Ok(1000.0));
        assert_eq!(convert::<f64>("0x1.8p3"), Ok(12.0));
        assert_eq!(convert::<f64>("-0X10"), Ok(-16.0));
        assert_eq!(convert::<f64>("0x.8"), Ok(0.5));
        assert_eq!(convert::<f64>("0x1p-2"), Ok(0.25));
        assert_eq!(convert::<f64>("4.0x"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<f64>("0xp3"), Err(ConversionErrorKind::MissingDigits));
        assert_eq!(convert::<f32>("1e300"), Err(ConversionErrorKind::OutOfRange));
        assert_eq!(convert::<f64>("1e400"), Err(ConversionErrorKind::OutOfRange));
        assert!(convert::<f64>("inf").is_ok_and(f64::is_infinite));
    }

    #[test]
    fn test_hex_float_extreme_exponents() {
        assert_eq!(convert::<f64>("0x1.0p-9223372036854775807"), Ok(0.0));
        assert_eq!(convert::<f64>("0x1p-99999999999999999999999"), Ok(0.0));
        assert_eq!(
            convert::<f64>("0x1p9223372036854775807"),
            Err(ConversionErrorKind::OutOfRange)
        );
        assert_eq!(convert::<f64>("0x1p1024"), Err(ConversionErrorKind::OutOfRange));
        assert_eq!(convert::<f64>("0x1p1023"), Ok(2f64.powi(1023)));
        assert_eq!(convert::<f64>("0x1p-1074"), Ok(f64::from_bits(1)));
        assert_eq!(convert::<f64>("0x0p99999"), Ok(0.0));
    }

    #[test]
    fn test_hex_float_long_mantissas() {
        let long_fraction = format!("0x1.{}", "0".repeat(300));
        assert_eq!(convert::<f64>(&long_fraction), Ok(1.0));

        let leading_zeros = format!("0x{}1p4", "0".repeat(300));
        assert_eq!(convert::<f64>(&leading_zeros), Ok(16.0));

        let long_integer = format!("0x1{}", "0".repeat(20));
        assert_eq!(convert::<f64>(&long_integer), Ok(2f64.powi(80)));

        let overflowing = format!("0x1{}", "0".repeat(300));
        assert_eq!(convert::<f64>(&overflowing), Err(ConversionErrorKind::OutOfRange));
    }

    #[test]
    fn test_hex_float_malformed() {
        assert_eq!(convert::<f64>("0x.p1"), Err(ConversionErrorKind::MissingDigits));
        assert_eq!(convert::<f64>("0x1p0x10"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<f64>("0x1p"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<f64>("0x1pz"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<f64>("0x1.g"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<f64>("-0x1p-1"), Ok(-0.5));
    }

    #[test]
    fn test_bool_and_strings() {
        assert_eq!(convert::<bool>("TRUE"), Ok(true));
        assert_eq!(convert::<bool>("False"), Ok(false));
        assert_eq!(convert::<bool>("yes"), Err(ConversionErrorKind::Malformed));
        assert_eq!(convert::<String>("hello world"), Ok("hello world".to_string()));
        assert_eq!(convert::<String>(""), Ok(String::new()));
        assert_eq!(convert::<PathBuf>("a/b"), Ok(PathBuf::from("a/b")));
    }

    #[test]
    fn test_char_modes() {
        assert_eq!(convert::<char>("x"), Ok('x'));
        assert_eq!(convert::<char>("xy"), Err(ConversionErrorKind::NotAscii));
        assert_eq!(convert::<char>("é"), Err(ConversionErrorKind::NotAscii));

        let integer = RootScope(ConversionRegistry::default(), CharMode::ExpectInteger);
        assert_eq!(convert_value::<char>("65", None, None, None, &integer), Ok('A'));
        assert_eq!(convert_value::<char>("0x61", None, None, None, &integer), Ok('a'));
        assert_eq!(
            convert_value::<char>("0xD800", None, None, None, &integer),
            Err(ConversionErrorKind::OutOfRange)
        );
        assert_eq!(
            convert_value::<char>("A", None, None, Some(CharMode::ExpectAscii), &integer),
            Ok('A')
        );
    }

    #[test]
    fn test_resolution_order() {
        let mut scope = scope();
        scope.0.register::<i32>(|s| (s == "answer").then_some(42));

        assert_eq!(convert_value::<i32>("answer", None, None, None, &scope), Ok(42));
        assert_eq!(
            convert_value::<i32>("7", None, None, None, &scope),
            Err(ConversionErrorKind::Rejected)
        );

        let own: ConvertFn<i32> = Rc::new(|s| s.parse::<i32>().ok().map(|n| n * 2));
        assert_eq!(convert_value::<i32>("7", Some(&own), None, None, &scope), Ok(14));
    }

    #[test]
    fn test_bounds_entry_and_scope() {
        let bounds = Bounds::<i32>::new().with_min(1).with_max(10);
        assert_eq!(
            convert_value::<i32>("0", None, Some(&bounds), None, &scope()),
            Err(ConversionErrorKind::BelowMinimum("1".to_string()))
        );
        assert_eq!(
            convert_value::<i32>("11", None, Some(&bounds), None, &scope()),
            Err(ConversionErrorKind::AboveMaximum("10".to_string()))
        );
        assert_eq!(bounds.describe(), "[1, 10]");

        let mut scope = scope();
        scope.0.set_max(5u8);
        assert_eq!(
            convert_value::<u8>("6", None, None, None, &scope),
            Err(ConversionErrorKind::AboveMaximum("5".to_string()))
        );
        assert_eq!(convert_value::<u16>("6", None, None, None, &scope), Ok(6));
    }

    #[test]
    fn test_inverted_bounds_detected() {
        let bounds = Bounds::<f64>::new().with_min(2.5).with_max(1.0);
        assert_eq!(bounds.inverted(), Some(("2.5".to_string(), "1".to_string())));
        assert!(Bounds::<f64>::new().with_min(1.0).inverted().is_none());
    }

    #[test]
    fn test_default_messages_name_type_and_range() {
        let failure = ConversionFailure {
            flag: "--width".to_string(),
            input: "abc".to_string(),
            type_name: u8::type_name(),
            range: u8::value_range(),
            kind: ConversionErrorKind::Malformed,
        };
        assert_eq!(
            failure.default_message(),
            "Invalid value 'abc' for flag '--width': expected unsigned 8-bit integer in range [0, 255]"
        );

        let failure = ConversionFailure {
            kind: ConversionErrorKind::OutOfRange,
            input: "300".to_string(),
            ..failure
        };
        assert_eq!(
            failure.default_message(),
            "Value '300' for flag '--width' is out of range for unsigned 8-bit integer in range [0, 255]"
        );
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Rgb(u8, u8, u8);

    impl FlagValue for Rgb {
        fn type_name() -> &'static str {
            "rgb color"
        }
    }

    #[test]
    fn test_custom_type_without_builtin_needs_converter() {
        assert!(!has_converter::<Rgb>(false, &scope()));
        assert!(has_converter::<Rgb>(true, &scope()));

        let mut scope = scope();
        scope.0.register::<Rgb>(|s| {
            let parts: Vec<u8> = s.split(',').filter_map(|p| p.parse().ok()).collect();
            (parts.len() == 3).then(|| Rgb(parts[0], parts[1], parts[2]))
        });
        assert!(has_converter::<Rgb>(false, &scope));
        assert_eq!(
            convert_value::<Rgb>("1,2,3", None, None, None, &scope),
            Ok(Rgb(1, 2, 3))
        );
    }
}
