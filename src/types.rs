//! The AIDA type system and per-channel configuration.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

use crate::error::AidaError;

/// Most fields a table-producing channel may declare
pub const MAX_FIELDS: usize = 10;

/// Every type a channel can be asked for, or be configured to return
///
/// `Any`, `Scalar` and `ScalarArray` are meta types. A channel configured with
/// one of them can return any concrete type in that class, and the caller must
/// name the concrete type with a `TYPE` argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum AidaType {
    /// Not supported: used to mark a getter or setter as absent
    None,
    /// Nothing is returned, used for setters
    Void,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
    BooleanArray,
    ByteArray,
    ShortArray,
    IntegerArray,
    LongArray,
    FloatArray,
    DoubleArray,
    StringArray,
    Table,
    /// A value that the scanner should interpret as JSON
    Json,
    Any,
    Scalar,
    ScalarArray,
}

impl AidaType {
    pub const SCALARS: [AidaType; 8] = [
        Self::Boolean,
        Self::Byte,
        Self::Short,
        Self::Integer,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::String,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Void => "VOID",
            Self::Boolean => "BOOLEAN",
            Self::Byte => "BYTE",
            Self::Short => "SHORT",
            Self::Integer => "INTEGER",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::BooleanArray => "BOOLEAN_ARRAY",
            Self::ByteArray => "BYTE_ARRAY",
            Self::ShortArray => "SHORT_ARRAY",
            Self::IntegerArray => "INTEGER_ARRAY",
            Self::LongArray => "LONG_ARRAY",
            Self::FloatArray => "FLOAT_ARRAY",
            Self::DoubleArray => "DOUBLE_ARRAY",
            Self::StringArray => "STRING_ARRAY",
            Self::Table => "TABLE",
            Self::Json => "JSON",
            Self::Any => "ANY",
            Self::Scalar => "SCALAR",
            Self::ScalarArray => "SCALAR_ARRAY",
        }
    }

    pub fn is_scalar(&self) -> bool {
        Self::SCALARS.contains(self)
    }

    pub fn is_array(&self) -> bool {
        self.element_type().is_some()
    }

    /// The array type holding elements of this scalar type
    pub fn array_type(&self) -> Option<AidaType> {
        Some(match self {
            Self::Boolean => Self::BooleanArray,
            Self::Byte => Self::ByteArray,
            Self::Short => Self::ShortArray,
            Self::Integer => Self::IntegerArray,
            Self::Long => Self::LongArray,
            Self::Float => Self::FloatArray,
            Self::Double => Self::DoubleArray,
            Self::String => Self::StringArray,
            _ => return None,
        })
    }

    /// The scalar type of each element, if this is an array type
    pub fn element_type(&self) -> Option<AidaType> {
        Some(match self {
            Self::BooleanArray => Self::Boolean,
            Self::ByteArray => Self::Byte,
            Self::ShortArray => Self::Short,
            Self::IntegerArray => Self::Integer,
            Self::LongArray => Self::Long,
            Self::FloatArray => Self::Float,
            Self::DoubleArray => Self::Double,
            Self::StringArray => Self::String,
            _ => return None,
        })
    }

    /// The class this type is dispatched by
    ///
    /// Concrete scalars report `Scalar`, concrete arrays report `ScalarArray`,
    /// and everything else, tables included, reports `Any`.
    pub fn meta_type(&self) -> AidaType {
        if self.is_scalar() || *self == Self::Scalar {
            Self::Scalar
        } else if self.is_array() || *self == Self::ScalarArray {
            Self::ScalarArray
        } else {
            Self::Any
        }
    }

    /// A meta type can't be returned as-is, it needs a concrete `TYPE`
    pub fn is_meta(&self) -> bool {
        matches!(self, Self::Any | Self::Scalar | Self::ScalarArray)
    }

    /// Can a caller ask for this type from a channel configured as `configured`?
    pub fn is_compatible_with(&self, configured: AidaType) -> bool {
        match configured {
            Self::Any => true,
            Self::Scalar | Self::ScalarArray => {
                *self == Self::Table || self.meta_type() == configured
            }
            _ => *self == configured,
        }
    }
}

impl fmt::Display for AidaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognised AIDA type: {0}")]
pub struct UnknownType(String);

impl FromStr for AidaType {
    type Err = UnknownType;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        [
            Self::None,
            Self::Void,
            Self::Table,
            Self::Json,
            Self::Any,
            Self::Scalar,
            Self::ScalarArray,
        ]
        .into_iter()
        .chain(Self::SCALARS)
        .chain(Self::SCALARS.iter().filter_map(|t| t.array_type()))
        .find(|t| t.name() == upper)
        .ok_or(UnknownType(s.to_string()))
    }
}

impl TryFrom<String> for AidaType {
    type Error = UnknownType;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a table travels over the wire
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layout {
    /// Not declared, treated as column-major
    #[default]
    Unspecified,
    ColumnMajor,
    RowMajor,
}

/// One declared column of a table-producing channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
}

impl Field {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// The configuration of a getter or setter on a channel
///
/// A config with type `None` and nothing else set is the default: it means
/// "no override", and the natural type for the channel is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(rename = "type")]
    pub ty: AidaType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Names of the arguments this channel accepts
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(AidaType::None)
    }
}

impl Config {
    pub fn new(ty: AidaType) -> Self {
        Self {
            ty,
            description: None,
            layout: Layout::Unspecified,
            fields: Vec::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: &[&str]) -> Self {
        self.arguments = arguments.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn add_field(mut self, field: Field) -> Result<Self, AidaError> {
        if self.fields.len() >= MAX_FIELDS {
            return Err(AidaError::internal(format!(
                "Channel configuration has more than {MAX_FIELDS} fields"
            )));
        }
        self.fields.push(field);
        Ok(self)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// The layout only means anything for tables
    pub fn table_layout(&self) -> Option<Layout> {
        (self.ty == AidaType::Table).then_some(match self.layout {
            Layout::Unspecified => Layout::ColumnMajor,
            other => other,
        })
    }

    /// Does this config accept an argument with this name?
    pub fn accepts_argument(&self, name: &str) -> bool {
        self.arguments.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Overlay a provider supplied override onto this config
    ///
    /// Only parts the override actually sets are taken.
    pub fn apply_override(&mut self, over: &Config) {
        if over.ty != AidaType::None {
            self.ty = over.ty;
        }
        if over.layout != Layout::Unspecified {
            self.layout = over.layout;
        }
        if over.description.is_some() {
            self.description.clone_from(&over.description);
        }
        if !over.fields.is_empty() {
            self.fields.clone_from(&over.fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_types() {
        assert_eq!(AidaType::Float.meta_type(), AidaType::Scalar);
        assert_eq!(AidaType::StringArray.meta_type(), AidaType::ScalarArray);
        assert_eq!(AidaType::Table.meta_type(), AidaType::Any);
        assert_eq!(AidaType::ScalarArray.meta_type(), AidaType::ScalarArray);
        assert_eq!(AidaType::Short.array_type(), Some(AidaType::ShortArray));
        assert_eq!(AidaType::Table.array_type(), None);
    }

    #[test]
    fn compatibility() {
        assert!(AidaType::Short.is_compatible_with(AidaType::Scalar));
        assert!(AidaType::Table.is_compatible_with(AidaType::Any));
        assert!(AidaType::DoubleArray.is_compatible_with(AidaType::ScalarArray));
        assert!(!AidaType::DoubleArray.is_compatible_with(AidaType::Scalar));
        assert!(AidaType::Table.is_compatible_with(AidaType::Scalar));
        assert!(!AidaType::Long.is_compatible_with(AidaType::Short));
        assert!(!AidaType::Void.is_compatible_with(AidaType::Table));
    }

    #[test]
    fn parse_names() {
        assert_eq!("float".parse::<AidaType>(), Ok(AidaType::Float));
        assert_eq!(
            " Scalar_Array ".parse::<AidaType>(),
            Ok(AidaType::ScalarArray)
        );
        assert_eq!("TABLE".parse::<AidaType>(), Ok(AidaType::Table));
        assert!("QUATERNION".parse::<AidaType>().is_err());
    }

    #[test]
    fn field_limit() {
        let mut config = Config::new(AidaType::Table);
        for i in 0..MAX_FIELDS {
            config = config.add_field(Field::new(&format!("f{i}"))).unwrap();
        }
        assert!(config.add_field(Field::new("overflow")).is_err());
    }

    #[test]
    fn overrides() {
        assert!(Config::default().is_default());
        let mut config = Config::new(AidaType::Scalar).with_arguments(&["BEAM"]);
        config.apply_override(&Config::default());
        assert_eq!(config.ty, AidaType::Scalar);
        config.apply_override(&Config::new(AidaType::Short));
        assert_eq!(config.ty, AidaType::Short);
        assert!(config.accepts_argument("beam"));
        assert_eq!(config.table_layout(), None);
        config.ty = AidaType::Table;
        assert_eq!(config.table_layout(), Some(Layout::ColumnMajor));
    }
}
