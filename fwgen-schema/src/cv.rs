// Config validators
// Leaf checks and the small wrappers around them. Every constructor returns a
// `Validator` (or a type convertible into one) so schemas can store them
// uniformly.

use crate::context::{Context, Invalid, Rejected};
use crate::error::SchemaError;
use crate::schema::Schema;
use crate::symbols::IdType;
use crate::{Validate, Validator, ValueType};
use fwgen_diagnostics::fuzzy;
use fwgen_value::{Mapping, Setting, Value};
use regex::Regex;

/// Update interval meaning "never poll"
pub const NEVER: u64 = 4_294_967_295;

/// Names that would collide with native keywords or the generated program
pub const RESERVED_IDS: &[&str] = &[
    // C++ keywords
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char16_t", "char32_t", "class", "compl", "concept", "const",
    "constexpr", "const_cast", "continue", "decltype", "default", "delete", "do", "double",
    "dynamic_cast", "else", "enum", "explicit", "export", "extern", "false", "float", "for",
    "friend", "goto", "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept",
    "not", "not_eq", "nullptr", "operator", "or", "or_eq", "private", "protected", "public",
    "register", "reinterpret_cast", "requires", "return", "short", "signed", "sizeof",
    "static", "static_assert", "static_cast", "struct", "switch", "template", "this",
    "thread_local", "throw", "true", "try", "typedef", "typeid", "typename", "union",
    "unsigned", "using", "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
    // Generated program and runtime names
    "App", "setup", "loop", "main", "pinMode", "delay", "delayMicroseconds", "digitalRead",
    "digitalWrite", "millis", "micros", "Serial", "Wire", "SPI", "yield",
];

struct Leaf<F> {
    ty: ValueType,
    description: String,
    check: F,
}

impl<F> Validate for Leaf<F>
where
    F: Fn(&Value) -> Result<Setting, Invalid> + Send + Sync,
{
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        (self.check)(value).map_err(|invalid| cx.invalid(invalid))
    }

    fn value_type(&self) -> ValueType {
        self.ty.clone()
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Wrap a plain check function as a validator
pub fn leaf<F>(ty: ValueType, description: impl Into<String>, check: F) -> Validator
where
    F: Fn(&Value) -> Result<Setting, Invalid> + Send + Sync + 'static,
{
    Validator::new(Leaf {
        ty,
        description: description.into(),
        check,
    })
}

/// Accept anything, converting it structurally
pub fn any() -> Validator {
    leaf(ValueType::Any, "any", |value| Ok(passthrough(value)))
}

fn passthrough(value: &Value) -> Setting {
    match value {
        Value::Null => Setting::Null,
        Value::Bool(b) => Setting::Bool(*b),
        Value::Int(i) => Setting::Int(*i),
        Value::Float(x) => Setting::Float(*x),
        Value::String(s) => Setting::Str(s.clone()),
        Value::List(items) => Setting::List(items.iter().map(passthrough).collect()),
        Value::Map(map) => Setting::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), passthrough(v)))
                .collect(),
        ),
        Value::Lambda(code) => Setting::Lambda(code.clone()),
    }
}

pub fn boolean() -> Validator {
    leaf(ValueType::Bool, "boolean", |value| match value {
        Value::Bool(b) => Ok(Setting::Bool(*b)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" => Ok(Setting::Bool(true)),
            "false" | "no" | "off" | "disable" => Ok(Setting::Bool(false)),
            _ => Err(Invalid::new(format!(
                "Expected boolean value, but cannot convert '{}' to a boolean. Please use 'true' or 'false'",
                s
            ))),
        },
        other => Err(Invalid::new(format!(
            "Expected boolean value, got {}",
            other.type_name()
        ))),
    })
}

/// String, stringifying other scalars
pub fn string() -> Validator {
    leaf(ValueType::String, "string", |value| match value {
        Value::Map(_) | Value::List(_) => Err(Invalid::new(
            "string value cannot be a dictionary or list.",
        )),
        Value::Null => Err(Invalid::new("string value is None")),
        Value::Lambda(_) => Err(Invalid::new("This option does not accept lambdas")),
        other => Ok(Setting::Str(other.scalar_text().unwrap_or_default())),
    })
}

/// String only, no coercion
pub fn string_strict() -> Validator {
    leaf(ValueType::String, "string!", |value| match value {
        Value::String(s) => Ok(Setting::Str(s.clone())),
        other => Err(Invalid::new(format!(
            "Must be string, got {}. did you forget putting quotes around the value?",
            other.type_name()
        ))),
    })
}

/// Bounds of the floats that convert to `i64` without saturating
const I64_FLOOR: f64 = -9_223_372_036_854_775_808.0;
const I64_CEILING: f64 = 9_223_372_036_854_775_808.0;

fn to_int(value: &Value) -> Result<i64, Invalid> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Float(x) if x.is_finite() && x.fract() == 0.0 => {
            if *x >= I64_FLOOR && *x < I64_CEILING {
                Ok(*x as i64)
            } else {
                Err(Invalid::new(format!("Value {} is too large for an integer", x)))
            }
        }
        Value::Float(x) => Err(Invalid::new(format!(
            "This option only accepts integers with no fractional part. Please remove the fractional part from {}",
            x
        ))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Invalid::new(format!("Expected integer, but cannot parse '{}' as an integer", s))),
        other => Err(Invalid::new(format!("Expected integer, got {}", other.type_name()))),
    }
}

/// Integer within `[min, max]`; integer-valued floats are accepted
pub fn int_range(min: i64, max: i64) -> Validator {
    leaf(
        ValueType::Int,
        format!("int[{}..={}]", min, max),
        move |value| {
            let i = to_int(value)?;
            if i < min || i > max {
                return Err(Invalid::new(format!(
                    "Value {} is out of range, must be in [{}, {}]",
                    i, min, max
                )));
            }
            Ok(Setting::Int(i))
        },
    )
}

pub fn positive_int() -> Validator {
    int_range(0, i64::MAX)
}

pub fn port() -> Validator {
    int_range(1, 65_535)
}

fn to_float(value: &Value) -> Result<f64, Invalid> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(x) => Ok(*x),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Invalid::new(format!("Expected float, but cannot parse '{}' as a number", s))),
        other => Err(Invalid::new(format!("Expected float, got {}", other.type_name()))),
    }
}

/// Finite number within optional bounds; integers coerce
pub fn float_range(min: Option<f64>, max: Option<f64>) -> Validator {
    let fmt_bound = |b: Option<f64>| b.map(|x| x.to_string()).unwrap_or_default();
    let description = format!("float[{}..={}]", fmt_bound(min), fmt_bound(max));
    leaf(ValueType::Float, description, move |value| {
        let x = to_float(value)?;
        if !x.is_finite() {
            return Err(Invalid::new("Value must be a finite number"));
        }
        if min.is_some_and(|m| x < m) || max.is_some_and(|m| x > m) {
            return Err(Invalid::new(format!(
                "Value {} is out of range, must be in [{}, {}]",
                x,
                min.map_or("-inf".to_string(), |m| m.to_string()),
                max.map_or("inf".to_string(), |m| m.to_string()),
            )));
        }
        Ok(Setting::Float(x))
    })
}

pub fn float_any() -> Validator {
    float_range(None, None)
}

/// `"50%"` or a fraction in `[0, 1]`
pub fn percentage() -> Validator {
    leaf(ValueType::Float, "percentage", |value| {
        let fraction = match value {
            Value::String(s) if s.trim_end().ends_with('%') => {
                let number = s.trim_end().trim_end_matches('%').trim();
                number
                    .parse::<f64>()
                    .map(|p| p / 100.0)
                    .map_err(|_| Invalid::new(format!("Cannot parse '{}' as a percentage", s)))?
            }
            other => to_float(other)?,
        };
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Invalid::new(
                "Percentage must be between 0% and 100%. Did you forget the '%' sign?",
            ));
        }
        Ok(Setting::Float(fraction))
    })
}

/// GPIO number, given as an integer or `GPIO<n>`
pub fn pin() -> Validator {
    leaf(ValueType::Int, "pin", |value| {
        let number = match value {
            Value::String(s) => {
                let upper = s.trim().to_ascii_uppercase();
                let digits = upper.strip_prefix("GPIO").unwrap_or(&upper);
                digits
                    .parse::<i64>()
                    .map_err(|_| Invalid::new(format!("Invalid pin number: {}", s)))?
            }
            other => to_int(other)?,
        };
        if !(0..=63).contains(&number) {
            return Err(Invalid::new(format!(
                "Pin number {} is out of range, must be in [0, 63]",
                number
            )));
        }
        Ok(Setting::Int(number))
    })
}

/// Enumeration over a fixed set of canonical tokens
#[derive(Debug, Clone)]
pub struct Enumeration {
    options: Vec<&'static str>,
    case_insensitive: bool,
}

pub fn enumeration(options: &[&'static str]) -> Enumeration {
    Enumeration {
        options: options.to_vec(),
        case_insensitive: false,
    }
}

impl Enumeration {
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn options(&self) -> &[&'static str] {
        &self.options
    }

    /// Canonical token for `text`
    pub fn normalize(&self, text: &str) -> Result<&'static str, Invalid> {
        let found = self.options.iter().find(|option| {
            if self.case_insensitive {
                option.eq_ignore_ascii_case(text)
            } else {
                **option == text
            }
        });
        if let Some(option) = found {
            return Ok(option);
        }

        let candidates: Vec<String> = self.options.iter().map(|o| o.to_string()).collect();
        let listed = candidates
            .iter()
            .map(|o| format!("'{}'", o))
            .collect::<Vec<_>>()
            .join(", ");
        Err(
            Invalid::new(format!("Unknown value '{}', valid options are {}.", text, listed))
                .with_suggestion_opt(fuzzy::closest(text, &candidates)),
        )
    }
}

impl Validate for Enumeration {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let Some(text) = value.scalar_text() else {
            return Err(cx.invalid(Invalid::new(format!(
                "Expected one of the enumeration options, got {}",
                value.type_name()
            ))));
        };
        match self.normalize(&text) {
            Ok(token) => Ok(Setting::Enum(token.to_string())),
            Err(invalid) => Err(cx.invalid(invalid)),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Enum
    }

    fn describe(&self) -> String {
        format!(
            "enum({}){}",
            self.options.join("|"),
            if self.case_insensitive { "/i" } else { "" }
        )
    }
}

fn unit_factor(unit: &str) -> Option<f64> {
    Some(match unit {
        "us" | "microseconds" => 0.001,
        "ms" | "milliseconds" => 1.0,
        "s" | "sec" | "seconds" => 1_000.0,
        "min" | "minutes" => 60_000.0,
        "h" | "hours" => 3_600_000.0,
        "d" | "days" => 86_400_000.0,
        _ => return None,
    })
}

const UNITS: &[&str] = &["us", "ms", "s", "sec", "min", "h", "d"];

/// Parse `"<number><unit>"` into whole milliseconds
pub fn parse_duration(text: &str) -> Result<u64, Invalid> {
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let number = number.trim();
    let unit = unit.trim().to_ascii_lowercase();

    let amount: f64 = number
        .parse()
        .map_err(|_| Invalid::new(format!("Expected time period with unit, got '{}'", text)))?;
    if !amount.is_finite() {
        return Err(Invalid::new(format!("Time period '{}' is not finite", text)));
    }
    if amount < 0.0 {
        return Err(Invalid::new(format!(
            "Negative time period '{}' is not allowed",
            text
        )));
    }
    if unit.is_empty() {
        return Err(Invalid::new(format!(
            "Don't know what '{}' means as it has no time *unit*! Did you mean '{}s'?",
            text, number
        ))
        .with_suggestion(format!("{}s", number)));
    }
    let Some(factor) = unit_factor(&unit) else {
        let units: Vec<String> = UNITS.iter().map(|u| u.to_string()).collect();
        return Err(Invalid::new(format!(
            "Unknown time unit '{}', valid units are {}",
            unit,
            UNITS.join(", ")
        ))
        .with_suggestion_opt(fuzzy::closest(&unit, &units)));
    };

    let ms = amount * factor;
    if (ms - ms.round()).abs() > 1e-6 {
        return Err(Invalid::new(format!(
            "Time period '{}' is not a whole number of milliseconds",
            text
        )));
    }
    if ms.round() > u64::MAX as f64 {
        return Err(Invalid::new(format!("Time period '{}' is too large", text)));
    }
    Ok(ms.round() as u64)
}

fn duration_from(value: &Value) -> Result<u64, Invalid> {
    match value {
        Value::String(s) => parse_duration(s),
        Value::Int(_) | Value::Float(_) => {
            let text = value.scalar_text().unwrap_or_default();
            Err(Invalid::new(format!(
                "Don't know what '{}' means as it has no time *unit*! Did you mean '{}s'?",
                text, text
            ))
            .with_suggestion(format!("{}s", text)))
        }
        other => Err(Invalid::new(format!(
            "Expected time period with unit, got {}",
            other.type_name()
        ))),
    }
}

/// Non-negative duration in milliseconds
pub fn duration() -> Validator {
    leaf(ValueType::Duration, "duration", |value| {
        duration_from(value).map(Setting::Duration)
    })
}

/// Duration that must be greater than zero
pub fn positive_duration() -> Validator {
    leaf(ValueType::Duration, "duration>0", |value| {
        let ms = duration_from(value)?;
        if ms == 0 {
            return Err(Invalid::new("Time period must be greater than zero"));
        }
        Ok(Setting::Duration(ms))
    })
}

/// Polling interval; `never` disables polling
pub fn update_interval() -> Validator {
    leaf(ValueType::Duration, "update_interval", |value| match value {
        Value::String(s) if s.trim().eq_ignore_ascii_case("never") => Ok(Setting::Duration(NEVER)),
        other => duration_from(other).map(Setting::Duration),
    })
}

fn parse_hex(text: &str) -> Result<i64, Invalid> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    i64::from_str_radix(digits, 16)
        .map_err(|_| Invalid::new(format!("Invalid hexadecimal value '{}'", text)))
}

fn hex_value(value: &Value) -> Result<i64, Invalid> {
    match value {
        Value::String(s) => parse_hex(s),
        other => to_int(other),
    }
}

/// Single byte given as an integer or hex text (`0x1F` or `1F`)
pub fn hex_byte() -> Validator {
    leaf(ValueType::Byte, "hex_byte", |value| {
        let i = hex_value(value)?;
        u8::try_from(i).map(Setting::Byte).map_err(|_| {
            Invalid::new(format!(
                "Value {} is out of range, must be in [0x00, 0xFF]",
                value
            ))
        })
    })
}

/// Integer given as a number or `0x` hex text, within bounds
pub fn hex_int_range(min: i64, max: i64) -> Validator {
    leaf(
        ValueType::Int,
        format!("hex_int[{:#04X}..={:#04X}]", min, max),
        move |value| {
            let i = match value {
                Value::String(s) if s.trim().starts_with("0x") || s.trim().starts_with("0X") => {
                    parse_hex(s)?
                }
                other => to_int(other)?,
            };
            if i < min || i > max {
                return Err(Invalid::new(format!(
                    "Value {} is out of range, must be in [{:#04X}, {:#04X}]",
                    value, min, max
                )));
            }
            Ok(Setting::Int(i))
        },
    )
}

/// Seven-bit bus address
pub fn i2c_address() -> Validator {
    hex_int_range(0x00, 0x7F)
}

/// Byte list given as a list of bytes or a hex string; separators `:`,
/// `-` and spaces are ignored
pub fn byte_list(min_len: usize, max_len: usize) -> Validator {
    leaf(
        ValueType::List(Box::new(ValueType::Byte)),
        format!("bytes[{}..={}]", min_len, max_len),
        move |value| {
            let bytes: Vec<u8> = match value {
                Value::List(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        let b = u8::try_from(hex_value(item)?).map_err(|_| {
                            Invalid::new(format!("Item {} is out of range, must be in [0x00, 0xFF]", i))
                        })?;
                        out.push(b);
                    }
                    out
                }
                Value::String(s) => {
                    let digits: Vec<char> = s
                        .chars()
                        .filter(|c| !matches!(c, ':' | '-' | ' '))
                        .collect();
                    if digits.len() % 2 != 0 {
                        return Err(Invalid::new(format!(
                            "Hex string '{}' must have an even number of digits",
                            s
                        )));
                    }
                    let mut out = Vec::with_capacity(digits.len() / 2);
                    for pair in digits.chunks(2) {
                        let text: String = pair.iter().collect();
                        let b = u8::from_str_radix(&text, 16).map_err(|_| {
                            Invalid::new(format!("Invalid hex digits '{}' in '{}'", text, s))
                        })?;
                        out.push(b);
                    }
                    out
                }
                other => {
                    return Err(Invalid::new(format!(
                        "Expected list of bytes or hex string, got {}",
                        other.type_name()
                    )))
                }
            };
            if bytes.len() < min_len || bytes.len() > max_len {
                let expected = if min_len == max_len {
                    format!("exactly {}", min_len)
                } else {
                    format!("between {} and {}", min_len, max_len)
                };
                return Err(Invalid::new(format!(
                    "Expected {} bytes, got {}",
                    expected,
                    bytes.len()
                )));
            }
            Ok(Setting::List(bytes.into_iter().map(Setting::Byte).collect()))
        },
    )
}

/// Opaque code matched against a fixed pattern, stored as written
struct Pattern {
    regex: Regex,
    description: &'static str,
}

impl Validate for Pattern {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let Some(text) = value.as_str() else {
            return Err(cx.invalid(Invalid::new(format!(
                "Expected {} as a string, got {}",
                self.description,
                value.type_name()
            ))));
        };
        if self.regex.is_match(text) {
            Ok(Setting::Str(text.to_string()))
        } else {
            Err(cx.invalid(Invalid::new(format!(
                "'{}' is not a valid {}",
                text, self.description
            ))))
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::String
    }

    fn describe(&self) -> String {
        format!("pattern({})", self.regex.as_str())
    }
}

pub fn pattern(regex: &str, description: &'static str) -> Result<Validator, SchemaError> {
    let regex = Regex::new(regex).map_err(|e| SchemaError::InvalidRegex {
        pattern: regex.to_string(),
        error: e.to_string(),
    })?;
    Ok(Validator::new(Pattern { regex, description }))
}

/// Metering identifier `A-B:C.D.E`, each part one to three digits
pub fn obis_code() -> Result<Validator, SchemaError> {
    pattern(
        r"^\d{1,3}-\d{1,3}:\d{1,3}\.\d{1,3}\.\d{1,3}$",
        "OBIS code (A-B:C.D.E)",
    )
}

/// Syntax and reserved-name check for identifiers
pub fn check_identifier(name: &str) -> Result<(), Invalid> {
    let Some(first) = name.chars().next() else {
        return Err(Invalid::new("ID must not be empty"));
    };
    if first.is_ascii_digit() {
        return Err(Invalid::new("First character in ID cannot be a digit."));
    }
    if name.contains('-') {
        return Err(Invalid::new(
            "Dashes are not supported in IDs, please use underscores instead.",
        )
        .with_suggestion(name.replace('-', "_")));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(Invalid::new(format!(
            "IDs must only consist of upper/lowercase characters, the underscore character and numbers. The character '{}' cannot be used",
            bad
        )));
    }
    if RESERVED_IDS.contains(&name) {
        return Err(Invalid::new(format!(
            "ID '{}' is reserved internally and cannot be used",
            name
        )));
    }
    Ok(())
}

pub fn identifier() -> Validator {
    leaf(ValueType::String, "identifier", |value| match value {
        Value::String(s) => check_identifier(s).map(|_| Setting::Str(s.clone())),
        other => Err(Invalid::new(format!(
            "ID must be a string, got {}",
            other.type_name()
        ))),
    })
}

fn id_text<'v>(value: &'v Value, cx: &mut Context<'_>) -> Result<Option<&'v str>, Rejected> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => match check_identifier(s) {
            Ok(()) => Ok(Some(s)),
            Err(invalid) => Err(cx.invalid(invalid)),
        },
        other => Err(cx.invalid(Invalid::new(format!(
            "ID must be a string, got {}",
            other.type_name()
        )))),
    }
}

/// Declares an id of a given type; a missing value is minted later
pub struct DeclareId(&'static IdType);

pub fn declare_id(ty: &'static IdType) -> DeclareId {
    DeclareId(ty)
}

impl Validate for DeclareId {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let name = id_text(value, cx)?;
        let owner = cx.owner();
        let path = cx.path().clone();
        match cx.symbols().declare(name, self.0, owner, path) {
            Ok(id) => Ok(Setting::Declare(id)),
            Err(diagnostic) => {
                cx.emit(diagnostic);
                Err(Rejected)
            }
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::DeclareId(self.0.class)
    }
}

/// References an id of a given type or one of its descendants
pub struct UseId(&'static IdType);

pub fn use_id(ty: &'static IdType) -> UseId {
    UseId(ty)
}

impl Validate for UseId {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let name = id_text(value, cx)?;
        let owner = cx.owner();
        let path = cx.path().clone();
        Ok(Setting::Use(cx.symbols().reference(name, self.0, owner, path)))
    }

    fn value_type(&self) -> ValueType {
        ValueType::UseId(self.0.class)
    }
}

/// Native code from a `!lambda` tag; a plain string is taken as the body
pub fn lambda() -> Validator {
    leaf(ValueType::Lambda, "lambda", |value| match value {
        Value::Lambda(code) | Value::String(code) => Ok(Setting::Lambda(code.clone())),
        other => Err(Invalid::new(format!(
            "This option requires a lambda, got {}",
            other.type_name()
        ))),
    })
}

/// List validator whose result must hold `min..=max` items
pub struct Length {
    inner: Validator,
    min: usize,
    max: Option<usize>,
}

pub fn length(inner: impl Into<Validator>, min: usize, max: Option<usize>) -> Length {
    Length {
        inner: inner.into(),
        min,
        max,
    }
}

impl Validate for Length {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let setting = self.inner.validate(value, cx)?;
        let count = setting.as_list().map_or(0, <[Setting]>::len);
        if count < self.min {
            return Err(cx.invalid(Invalid::new(format!(
                "Length of value must be at least {}, got {}",
                self.min, count
            ))));
        }
        if let Some(max) = self.max.filter(|max| count > *max) {
            return Err(cx.invalid(Invalid::new(format!(
                "Length of value must be at most {}, got {}",
                max, count
            ))));
        }
        Ok(setting)
    }

    fn value_type(&self) -> ValueType {
        self.inner.value_type()
    }

    fn describe(&self) -> String {
        let max = self.max.map(|m| m.to_string()).unwrap_or_default();
        format!("{}[len {}..{}]", self.inner.describe(), self.min, max)
    }
}

/// Wraps a lone value into a one-item list; null becomes an empty list
pub struct EnsureList(Validator);

pub fn ensure_list(item: impl Into<Validator>) -> EnsureList {
    EnsureList(item.into())
}

impl Validate for EnsureList {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        match value {
            Value::Null => Ok(Setting::List(Vec::new())),
            Value::Map(map) if map.is_empty() => Ok(Setting::List(Vec::new())),
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut failed = false;
                for (index, item) in items.iter().enumerate() {
                    match cx.at_index(index, |cx| self.0.validate(item, cx)) {
                        Ok(setting) => out.push(setting),
                        Err(Rejected) => failed = true,
                    }
                }
                if failed {
                    Err(Rejected)
                } else {
                    Ok(Setting::List(out))
                }
            }
            single => Ok(Setting::List(vec![self.0.validate(single, cx)?])),
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::List(Box::new(self.0.value_type()))
    }

    fn describe(&self) -> String {
        format!("list[{}]", self.0.describe())
    }
}

/// A mapping, or a scalar shorthand for its `key` option
pub struct MaybeSimpleValue {
    schema: Schema,
    key: &'static str,
}

pub fn maybe_simple_value(schema: Schema, key: &'static str) -> MaybeSimpleValue {
    MaybeSimpleValue { schema, key }
}

impl Validate for MaybeSimpleValue {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        match value {
            Value::Map(_) => self.schema.validate(value, cx),
            scalar => {
                let mut expanded = Mapping::new();
                expanded.insert(self.key.to_string(), scalar.clone());
                self.schema.validate(&Value::Map(expanded), cx)
            }
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Map
    }

    fn describe(&self) -> String {
        format!("maybe_simple({}, {})", self.key, self.schema.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check;
    use fwgen_diagnostics::ErrorKind;

    fn ok(v: &Validator, value: Value) -> Setting {
        check(&**v, &value).unwrap()
    }

    fn err(v: &dyn Validate, value: Value) -> fwgen_diagnostics::Diagnostic {
        let report = check(v, &value).unwrap_err();
        assert_eq!(report.error_count(), 1, "{}", report.render());
        report.diagnostics()[0].clone()
    }

    #[test]
    fn test_int_range() {
        let v = int_range(0, 10);
        assert_eq!(ok(&v, Value::Int(5)), Setting::Int(5));
        assert_eq!(ok(&v, Value::Float(7.0)), Setting::Int(7));
        assert_eq!(err(&*v, Value::Int(11)).kind, ErrorKind::ValueInvalid);
        assert_eq!(err(&*v, Value::Float(2.5)).kind, ErrorKind::ValueInvalid);
        assert_eq!(err(&*v, Value::Bool(true)).kind, ErrorKind::ValueInvalid);
    }

    #[test]
    fn test_case_insensitive_enum_normalizes() {
        let v = enumeration(&["5V", "10V"]).case_insensitive();
        assert_eq!(
            check(&v, &Value::from("5v")).unwrap(),
            Setting::Enum("5V".into())
        );
        let strict = enumeration(&["5V", "10V"]);
        let diag = err(&strict, Value::from("5v"));
        assert!(diag.message.contains("valid options are '5V', '10V'"));
    }

    #[test]
    fn test_enum_suggestion() {
        let v = enumeration(&["NONE", "EVEN", "ODD"]);
        let diag = err(&v, Value::from("EVN"));
        assert_eq!(diag.suggestion.as_deref(), Some("EVEN"));
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), 2000);
        assert_eq!(parse_duration("1000ms").unwrap(), 1000);
        assert_eq!(parse_duration("1.5min").unwrap(), 90_000);
        assert_eq!(parse_duration("2 hours").unwrap(), 7_200_000);
        assert_eq!(parse_duration("1d").unwrap(), 86_400_000);
        assert_eq!(parse_duration("3000us").unwrap(), 3);
        assert!(parse_duration("1500us").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn test_duration_rejects_bare_number() {
        let diag = err(&*duration(), Value::Int(5));
        assert_eq!(diag.suggestion.as_deref(), Some("5s"));
    }

    #[test]
    fn test_positive_duration_rejects_zero() {
        assert_eq!(ok(&duration(), Value::from("0s")), Setting::Duration(0));
        err(&*positive_duration(), Value::from("0s"));
    }

    #[test]
    fn test_update_interval_never() {
        assert_eq!(
            ok(&update_interval(), Value::from("never")),
            Setting::Duration(NEVER)
        );
        assert_eq!(
            ok(&update_interval(), Value::from("60s")),
            Setting::Duration(60_000)
        );
    }

    #[test]
    fn test_boolean_spellings() {
        assert_eq!(ok(&boolean(), Value::from("Yes")), Setting::Bool(true));
        assert_eq!(ok(&boolean(), Value::from("off")), Setting::Bool(false));
        err(&*boolean(), Value::from("maybe"));
    }

    #[test]
    fn test_hex_byte() {
        assert_eq!(ok(&hex_byte(), Value::from("0x1F")), Setting::Byte(0x1F));
        assert_eq!(ok(&hex_byte(), Value::from("ff")), Setting::Byte(0xFF));
        assert_eq!(ok(&hex_byte(), Value::Int(16)), Setting::Byte(16));
        err(&*hex_byte(), Value::from("0x100"));
        let negative = err(&*hex_byte(), Value::from("-1"));
        assert!(negative.message.contains("Value -1 is out of range"), "{}", negative.message);
        let address = err(&*i2c_address(), Value::Int(-3));
        assert!(address.message.contains("Value -3 is out of range"), "{}", address.message);
    }

    #[test]
    fn test_huge_floats_are_not_saturated() {
        let diag = err(&*positive_int(), Value::Float(1e19));
        assert!(diag.message.contains("too large"), "{}", diag.message);
        err(&*int_range(i64::MIN, 0), Value::Float(-1e19));
        assert_eq!(ok(&positive_int(), Value::Float(4096.0)), Setting::Int(4096));
    }

    #[test]
    fn test_lambda_accepts_tag_or_string() {
        assert_eq!(
            ok(&lambda(), Value::Lambda("return 1;".into())),
            Setting::Lambda("return 1;".into())
        );
        assert_eq!(
            ok(&lambda(), Value::from("return 2;")),
            Setting::Lambda("return 2;".into())
        );
        err(&*lambda(), Value::Int(3));
        err(&*string(), Value::Lambda("return 1;".into()));
    }

    #[test]
    fn test_length_bounds_list_size() {
        let v = length(ensure_list(int_range(0, 9)), 2, Some(3));
        let short = err(&v, Value::Int(1));
        assert!(short.message.contains("at least 2"));
        let long = err(&v, Value::List((0..4).map(Value::Int).collect()));
        assert!(long.message.contains("at most 3"));
        assert!(check(&v, &Value::List(vec![Value::Int(1), Value::Int(2)])).is_ok());
    }

    #[test]
    fn test_byte_list_lengths() {
        let v = byte_list(16, 16);
        let key = "00112233445566778899AABBCCDDEEFF";
        match ok(&v, Value::from(key)) {
            Setting::List(items) => {
                assert_eq!(items.len(), 16);
                assert_eq!(items[15], Setting::Byte(0xFF));
            }
            other => panic!("unexpected {other:?}"),
        }
        let diag = err(&*v, Value::from("0011"));
        assert!(diag.message.contains("exactly 16"));
    }

    #[test]
    fn test_obis_code() {
        let v = obis_code().unwrap();
        assert_eq!(
            ok(&v, Value::from("1-0:1.8.1")),
            Setting::Str("1-0:1.8.1".into())
        );
        err(&*v, Value::from("1-0:1.8"));
        err(&*v, Value::from("1234-0:1.8.1"));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(check_identifier("my_bus2").is_ok());
        assert!(check_identifier("2bus").is_err());
        assert!(check_identifier("App").is_err());
        assert!(check_identifier("class").is_err());
        let dashed = check_identifier("my-bus").unwrap_err();
        assert_eq!(dashed.suggestion.as_deref(), Some("my_bus"));
    }

    #[test]
    fn test_percentage_and_pin() {
        assert_eq!(ok(&percentage(), Value::from("50%")), Setting::Float(0.5));
        err(&*percentage(), Value::Float(1.5));
        assert_eq!(ok(&pin(), Value::from("GPIO21")), Setting::Int(21));
        err(&*pin(), Value::Int(99));
    }

    #[test]
    fn test_ensure_list_wraps_and_indexes() {
        let v = ensure_list(int_range(0, 5));
        assert_eq!(
            check(&v, &Value::Int(3)).unwrap(),
            Setting::List(vec![Setting::Int(3)])
        );
        assert_eq!(check(&v, &Value::Null).unwrap(), Setting::List(vec![]));
        let report = check(&v, &Value::List(vec![Value::Int(1), Value::Int(9)])).unwrap_err();
        assert_eq!(report.diagnostics()[0].path.to_string(), "[1]");
    }

    #[test]
    fn test_maybe_simple_value_expands_scalar() {
        let v = maybe_simple_value(
            Schema::new()
                .required("number", pin())
                .optional("inverted", boolean()),
            "number",
        );
        let Setting::Map(short) = check(&v, &Value::Int(4)).unwrap() else {
            panic!("expected a mapping");
        };
        assert_eq!(short.get_int("number"), Some(4));

        let mut full = Mapping::new();
        full.insert("number".to_string(), Value::Int(4));
        full.insert("inverted".to_string(), Value::Bool(true));
        let Setting::Map(long) = check(&v, &Value::Map(full)).unwrap() else {
            panic!("expected a mapping");
        };
        assert_eq!(long.get_bool("inverted"), Some(true));

        let report = check(&v, &Value::from("nope")).unwrap_err();
        assert_eq!(report.diagnostics()[0].path.to_string(), "number");
    }

    #[test]
    fn test_string_coerces_scalars() {
        assert_eq!(ok(&string(), Value::Int(5)), Setting::Str("5".into()));
        err(&*string(), Value::List(vec![]));
        err(&*string_strict(), Value::Int(5));
    }
}
