//! Legacy field type → semantic type → PostgreSQL column type.
//!
//! Mapping is total: every descriptor resolves to some type. Unknown codes
//! fall back to a 255-character short text, unknown symbolic names pass
//! through as custom concrete types.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extraction::{FieldDescriptor, FieldType};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default length for short text when the descriptor carries no size.
pub const DEFAULT_TEXT_LENGTH: u32 = 255;

/// Length of a GUID rendered as `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}`.
pub const GUID_TEXT_LENGTH: u32 = 38;

/// Default precision for decimal numbers.
pub const DEFAULT_DECIMAL_PRECISION: u32 = 18;

/// Default scale for decimal numbers.
pub const DEFAULT_DECIMAL_SCALE: u32 = 0;

/// Legacy type code for calculated fields.
pub const CALCULATED_TYPE_CODE: i64 = 18;

// ---------------------------------------------------------------------------
// Semantic types
// ---------------------------------------------------------------------------

/// Sub-kind of the legacy `Number` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberSize {
    Byte,
    Integer,
    LongInteger,
    Single,
    Double,
    Decimal { precision: u32, scale: u32 },
}

impl NumberSize {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Integer => "Integer",
            Self::LongInteger => "Long Integer",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::Decimal { .. } => "Decimal",
        }
    }

    /// Parse a `fieldSize` sub-kind. Unknown or missing sizes are Long Integer.
    fn from_field_size(
        field_size: Option<&str>,
        precision: Option<u32>,
        scale: Option<u32>,
    ) -> Self {
        let normalized = field_size
            .map(|s| s.trim().to_lowercase().replace([' ', '_', '-'], ""))
            .unwrap_or_default();
        match normalized.as_str() {
            "byte" => Self::Byte,
            "integer" | "int" => Self::Integer,
            "single" => Self::Single,
            "double" => Self::Double,
            "decimal" => Self::Decimal {
                precision: precision.unwrap_or(DEFAULT_DECIMAL_PRECISION),
                scale: scale.unwrap_or(DEFAULT_DECIMAL_SCALE),
            },
            _ => Self::LongInteger,
        }
    }
}

/// Store-agnostic type tag sitting between a legacy type code and a
/// concrete target column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticType {
    ShortText { length: u32 },
    LongText,
    Number(NumberSize),
    YesNo,
    DateTime,
    Currency,
    AutoNumber,
    /// Hand-authored concrete type, emitted verbatim.
    Custom(String),
}

impl SemanticType {
    /// Human-readable tag, e.g. `Number/Long Integer` or `Short Text(50)`.
    pub fn tag(&self) -> String {
        match self {
            Self::ShortText { length } => format!("Short Text({length})"),
            Self::LongText => "Long Text".to_string(),
            Self::Number(size) => format!("Number/{}", size.label()),
            Self::YesNo => "Yes/No".to_string(),
            Self::DateTime => "Date/Time".to_string(),
            Self::Currency => "Currency".to_string(),
            Self::AutoNumber => "AutoNumber".to_string(),
            Self::Custom(raw) => raw.clone(),
        }
    }

    /// Concrete PostgreSQL column type.
    pub fn to_pg_type(&self) -> String {
        match self {
            Self::ShortText { length } => format!("varchar({length})"),
            Self::LongText => "text".to_string(),
            Self::Number(NumberSize::Byte | NumberSize::Integer) => "smallint".to_string(),
            Self::Number(NumberSize::LongInteger) => "integer".to_string(),
            Self::Number(NumberSize::Single) => "real".to_string(),
            Self::Number(NumberSize::Double) => "double precision".to_string(),
            Self::Number(NumberSize::Decimal { precision, scale }) => {
                format!("numeric({precision},{scale})")
            }
            Self::YesNo => "boolean".to_string(),
            Self::DateTime => "timestamp without time zone".to_string(),
            Self::Currency => "numeric(19,4)".to_string(),
            Self::AutoNumber => "integer".to_string(),
            Self::Custom(raw) => raw.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::AutoNumber)
    }

    /// Whether values for this type load through an integer column.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Self::AutoNumber
                | Self::Number(NumberSize::Byte | NumberSize::Integer | NumberSize::LongInteger)
        )
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Resolve a field descriptor to its semantic type.
///
/// A calculated field is never an identity, whatever its flags say.
pub fn semantic_type(field: &FieldDescriptor) -> SemanticType {
    let auto_number = field.is_auto_number && !field.is_calculated;
    resolve(&field.field_type, field, auto_number, 0)
}

/// Resolve a field descriptor straight to a concrete PostgreSQL type.
pub fn pg_type(field: &FieldDescriptor) -> String {
    semantic_type(field).to_pg_type()
}

fn resolve(
    field_type: &FieldType,
    field: &FieldDescriptor,
    auto_number: bool,
    depth: u8,
) -> SemanticType {
    match field_type {
        FieldType::Code(code) => from_code(*code, field, auto_number, depth),
        FieldType::Name(name) => match name.trim().parse::<i64>() {
            Ok(code) => from_code(code, field, auto_number, depth),
            Err(_) => from_name(name, field, auto_number),
        },
    }
}

fn text_length(field: &FieldDescriptor) -> u32 {
    field
        .size
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_TEXT_LENGTH)
}

fn from_code(code: i64, field: &FieldDescriptor, auto_number: bool, depth: u8) -> SemanticType {
    match code {
        1 => SemanticType::YesNo,
        2 => SemanticType::Number(NumberSize::Byte),
        3 => SemanticType::Number(NumberSize::Integer),
        4 if auto_number => SemanticType::AutoNumber,
        4 => SemanticType::Number(NumberSize::LongInteger),
        5 => SemanticType::Currency,
        6 => SemanticType::Number(NumberSize::Single),
        7 => SemanticType::Number(NumberSize::Double),
        8 => SemanticType::DateTime,
        10 => SemanticType::ShortText {
            length: text_length(field),
        },
        12 => SemanticType::LongText,
        15 => SemanticType::ShortText {
            length: GUID_TEXT_LENGTH,
        },
        16 => SemanticType::Number(NumberSize::LongInteger),
        // A calculated field's storage type is its declared result type;
        // a calculated value is never store-generated as an identity.
        CALCULATED_TYPE_CODE if depth == 0 => match &field.result_type {
            Some(result_type) => resolve(result_type, field, false, depth + 1),
            None => SemanticType::ShortText {
                length: DEFAULT_TEXT_LENGTH,
            },
        },
        _ => SemanticType::ShortText {
            length: DEFAULT_TEXT_LENGTH,
        },
    }
}

fn from_name(name: &str, field: &FieldDescriptor, auto_number: bool) -> SemanticType {
    let normalized = name.trim().to_lowercase();
    match normalized.as_str() {
        "short text" | "text" => SemanticType::ShortText {
            length: text_length(field),
        },
        "long text" | "memo" => SemanticType::LongText,
        "number" => {
            let size = NumberSize::from_field_size(
                field.field_size.as_deref(),
                field.precision,
                field.scale,
            );
            if auto_number && size == NumberSize::LongInteger {
                SemanticType::AutoNumber
            } else {
                SemanticType::Number(size)
            }
        }
        "yes/no" | "boolean" => SemanticType::YesNo,
        "date/time" | "datetime" => SemanticType::DateTime,
        "currency" => SemanticType::Currency,
        "autonumber" if auto_number => SemanticType::AutoNumber,
        "autonumber" => SemanticType::Number(NumberSize::LongInteger),
        _ => SemanticType::Custom(name.trim().to_string()),
    }
}

/// Pattern for custom concrete types: words, an optional `(p)` or `(p, s)`
/// modifier, and an optional array suffix.
const TYPE_LITERAL_PATTERN: &str =
    r"^[A-Za-z_][A-Za-z0-9_ ]*(\(\s*\d+\s*(,\s*\d+\s*)?\))?(\[\])?$";

static TYPE_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TYPE_LITERAL_PATTERN).expect("valid regex"));

/// Words that would turn a type position into a column constraint.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "default",
    "not",
    "null",
    "primary",
    "unique",
    "references",
    "check",
    "constraint",
    "generated",
    "collate",
];

/// Whether a custom type string is safe to splice into DDL,
/// e.g. `numeric(10, 2)` or `double precision`.
pub fn is_safe_type_literal(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !TYPE_LITERAL_RE.is_match(trimmed) {
        return false;
    }
    !trimmed
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .any(|word| CONSTRAINT_KEYWORDS.contains(&word.to_lowercase().as_str()))
}
