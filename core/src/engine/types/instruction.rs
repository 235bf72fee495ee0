//! Compiled template instructions
//!
//! A template arrives already compiled: an ordered list of literal text
//! fragments and directives. Two JSON encodings are accepted:
//!
//! - the tagged form produced by `serde` for [`Template`]
//! - the compact array form (`["var", "title", ["uppercase"]]`), see
//!   [`Template::from_compact_json`]

use super::super::errors::RenderError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/* ===================== Literals ===================== */

/// Literal argument value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Num(n) => f.write_str(&super::values::format_num(*n)),
            Literal::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Num(n)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

/* ===================== Variable Paths ===================== */

/// Path addressing a possibly nested variable
///
/// Parsing a string splits on `.`, so `"item.id"` and `["item", "id"]` are the
/// same path, and a single key `"x"` is the one-segment path `["x"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "PathRepr", into = "Vec<String>")]
pub struct VarPath(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum PathRepr {
    Dotted(String),
    Segments(Vec<String>),
}

impl From<PathRepr> for VarPath {
    fn from(repr: PathRepr) -> Self {
        match repr {
            PathRepr::Dotted(s) => VarPath::parse(&s),
            PathRepr::Segments(segments) => VarPath(segments),
        }
    }
}

impl From<VarPath> for Vec<String> {
    fn from(path: VarPath) -> Self {
        path.0
    }
}

impl VarPath {
    /// Parse a dot-separated path
    pub fn parse(s: &str) -> Self {
        VarPath(s.split('.').map(str::to_string).collect())
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        VarPath(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment - the key change notifications are raised on
    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for VarPath {
    fn from(s: &str) -> Self {
        VarPath::parse(s)
    }
}

impl From<String> for VarPath {
    fn from(s: String) -> Self {
        VarPath::parse(&s)
    }
}

impl From<Vec<String>> for VarPath {
    fn from(segments: Vec<String>) -> Self {
        VarPath(segments)
    }
}

impl<const N: usize> From<[&str; N]> for VarPath {
    fn from(segments: [&str; N]) -> Self {
        VarPath(segments.iter().map(|s| s.to_string()).collect())
    }
}

/* ===================== Instructions ===================== */

/// Filter specification: a filter name plus its literal construction args
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Literal>,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>, args: Vec<Literal>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Directive argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Argument {
    Lit { v: Literal },
    Path { path: VarPath },
    Filter(FilterSpec),
}

impl Argument {
    pub fn lit(v: impl Into<Literal>) -> Self {
        Argument::Lit { v: v.into() }
    }

    pub fn path(path: impl Into<VarPath>) -> Self {
        Argument::Path { path: path.into() }
    }

    pub fn filter(name: impl Into<String>, args: Vec<Literal>) -> Self {
        Argument::Filter(FilterSpec::new(name, args))
    }
}

/// One compiled template instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Instruction {
    Literal {
        text: String,
    },
    Directive {
        name: String,
        #[serde(default)]
        args: Vec<Argument>,
    },
}

impl Instruction {
    pub fn lit(text: impl Into<String>) -> Self {
        Instruction::Literal { text: text.into() }
    }

    pub fn directive(name: impl Into<String>, args: Vec<Argument>) -> Self {
        Instruction::Directive {
            name: name.into(),
            args,
        }
    }
}

/* ===================== Template ===================== */

/// Immutable, cursor-addressed instruction sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template {
    instructions: Vec<Instruction>,
}

impl Template {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Load the tagged JSON form
    pub fn from_json(source: &str) -> Result<Self, RenderError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load the compact array form
    ///
    /// - a string is a literal
    /// - an array is a directive; its first element is the directive name
    /// - inside a directive, the first argument (string or array of strings)
    ///   is a variable path, later arrays are filter specs `[name, ...args]`,
    ///   anything else is a literal
    pub fn from_compact_json(source: &str) -> Result<Self, RenderError> {
        let raw: Vec<JsonValue> = serde_json::from_str(source)?;
        let instructions = raw
            .iter()
            .enumerate()
            .map(|(index, item)| compact_instruction(index, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(instructions))
    }
}

impl From<Vec<Instruction>> for Template {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

fn compact_instruction(index: usize, item: &JsonValue) -> Result<Instruction, RenderError> {
    let invalid = |reason: &str| RenderError::InvalidInstruction {
        index,
        reason: reason.to_string(),
    };

    match item {
        JsonValue::String(text) => Ok(Instruction::lit(text.clone())),
        JsonValue::Array(parts) => {
            let Some((JsonValue::String(name), rest)) = parts.split_first() else {
                return Err(invalid("directive must start with its name"));
            };
            let args = rest
                .iter()
                .enumerate()
                .map(|(position, arg)| compact_argument(position, arg).ok_or_else(|| {
                    invalid(&format!("unsupported argument at position {}", position))
                }))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Instruction::directive(name.clone(), args))
        }
        _ => Err(invalid("expected a string or an array")),
    }
}

fn compact_argument(position: usize, arg: &JsonValue) -> Option<Argument> {
    match arg {
        JsonValue::String(s) if position == 0 => Some(Argument::path(VarPath::parse(s))),
        JsonValue::Array(items) if position == 0 => {
            let segments = items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()?;
            Some(Argument::path(VarPath::from_segments(segments)))
        }
        JsonValue::Array(items) => {
            let (name, rest) = items.split_first()?;
            let args = rest.iter().map(compact_literal).collect::<Option<Vec<_>>>()?;
            Some(Argument::filter(name.as_str()?, args))
        }
        other => compact_literal(other).map(|v| Argument::Lit { v }),
    }
}

fn compact_literal(value: &JsonValue) -> Option<Literal> {
    match value {
        JsonValue::Bool(b) => Some(Literal::Bool(*b)),
        JsonValue::Number(n) => n.as_f64().map(Literal::Num),
        JsonValue::String(s) => Some(Literal::Str(s.clone())),
        _ => None,
    }
}
