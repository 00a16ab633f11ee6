// Native-source literals
// Renders validated settings as C++ expressions. The core never parses its
// own output, so this is a one-way printer.

use fwgen_value::Setting;
use std::fmt;

/// One argument of a constructor or setter call
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Hex(u8),
    /// Milliseconds, rendered as an unsigned literal
    Millis(u64),
    /// Enum token qualified by a namespace, `uart::UART_CONFIG_PARITY_NONE`
    Enum { prefix: String, token: String },
    /// Byte array initializer `{0x00, 0x11}`
    Bytes(Vec<u8>),
    /// Variable or expression emitted verbatim
    Raw(String),
    /// Capture-by-value closure around user code
    Lambda {
        params: String,
        ret: &'static str,
        body: String,
    },
}

impl Arg {
    pub fn var(name: impl Into<String>) -> Self {
        Arg::Raw(name.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        Arg::Str(text.into())
    }

    pub fn enum_token(prefix: impl Into<String>, token: impl Into<String>) -> Self {
        Arg::Enum {
            prefix: prefix.into(),
            token: token.into(),
        }
    }

    pub fn lambda(params: impl Into<String>, ret: &'static str, body: &str) -> Self {
        Arg::Lambda {
            params: params.into(),
            ret,
            body: body.trim_end().to_string(),
        }
    }

    /// Literal for a scalar setting; ids and containers have no literal form
    pub fn from_setting(setting: &Setting) -> Option<Self> {
        Some(match setting {
            Setting::Bool(b) => Arg::Bool(*b),
            Setting::Int(i) => Arg::Int(*i),
            Setting::Float(x) => Arg::Float(*x),
            Setting::Str(s) => Arg::Str(s.clone()),
            Setting::Enum(token) => Arg::Raw(token.clone()),
            Setting::Duration(ms) => Arg::Millis(*ms),
            Setting::Byte(b) => Arg::Hex(*b),
            Setting::List(items) => Arg::Bytes(
                items
                    .iter()
                    .map(Setting::as_byte)
                    .collect::<Option<Vec<u8>>>()?,
            ),
            Setting::Null
            | Setting::Declare(_)
            | Setting::Use(_)
            | Setting::Map(_)
            | Setting::Lambda(_) => return None,
        })
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(x) => write!(f, "{}", float_literal(*x)),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Str(s) => write!(f, "{}", string_literal(s)),
            Arg::Hex(b) => write!(f, "0x{:02X}", b),
            Arg::Millis(ms) => write!(f, "{}", ms),
            Arg::Enum { prefix, token } => write!(f, "{}{}", prefix, token),
            Arg::Bytes(bytes) => {
                write!(f, "{{")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "0x{:02X}", b)?;
                }
                write!(f, "}}")
            }
            Arg::Raw(text) => write!(f, "{}", text),
            Arg::Lambda { params, ret, body } => {
                write!(f, "[=]({}) -> {} {{\n", params, ret)?;
                for line in body.lines() {
                    writeln!(f, "  {}", line)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// `1.0f`, `0.25f`
pub fn float_literal(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{:.1}f", x)
    } else {
        format!("{}f", x)
    }
}

/// Double-quoted C++ string with escapes
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Comma-separated argument list
pub fn join_args(args: &[Arg]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
