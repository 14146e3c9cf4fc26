//! Typed values moving in and out of providers.

use serde_json::json;

use crate::{table::Table, types::AidaType};

/// A single value of one of the eight scalar types
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Scalar {
    pub fn get_type(&self) -> AidaType {
        match self {
            Self::Boolean(_) => AidaType::Boolean,
            Self::Byte(_) => AidaType::Byte,
            Self::Short(_) => AidaType::Short,
            Self::Integer(_) => AidaType::Integer,
            Self::Long(_) => AidaType::Long,
            Self::Float(_) => AidaType::Float,
            Self::Double(_) => AidaType::Double,
            Self::String(_) => AidaType::String,
        }
    }

    /// The zero value of a scalar type, or None if `ty` is not a scalar
    pub fn zero(ty: AidaType) -> Option<Scalar> {
        Some(match ty {
            AidaType::Boolean => Self::Boolean(false),
            AidaType::Byte => Self::Byte(0),
            AidaType::Short => Self::Short(0),
            AidaType::Integer => Self::Integer(0),
            AidaType::Long => Self::Long(0),
            AidaType::Float => Self::Float(0.0),
            AidaType::Double => Self::Double(0.0),
            AidaType::String => Self::String(String::new()),
            _ => return None,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(v) => json!(v),
            Self::Byte(v) => json!(v),
            Self::Short(v) => json!(v),
            Self::Integer(v) => json!(v),
            Self::Long(v) => json!(v),
            Self::Float(v) => json!(v),
            Self::Double(v) => json!(v),
            Self::String(v) => json!(v),
        }
    }
}

/// A homogeneous array of one of the eight scalar types
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Boolean(Vec<bool>),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Integer(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

macro_rules! array_dispatch {
    ($array:expr, $inner:ident => $body:expr) => {
        match $array {
            Array::Boolean($inner) => $body,
            Array::Byte($inner) => $body,
            Array::Short($inner) => $body,
            Array::Integer($inner) => $body,
            Array::Long($inner) => $body,
            Array::Float($inner) => $body,
            Array::Double($inner) => $body,
            Array::String($inner) => $body,
        }
    };
}

impl Array {
    /// The array type, e.g. `FLOAT_ARRAY`
    pub fn get_type(&self) -> AidaType {
        match self {
            Self::Boolean(_) => AidaType::BooleanArray,
            Self::Byte(_) => AidaType::ByteArray,
            Self::Short(_) => AidaType::ShortArray,
            Self::Integer(_) => AidaType::IntegerArray,
            Self::Long(_) => AidaType::LongArray,
            Self::Float(_) => AidaType::FloatArray,
            Self::Double(_) => AidaType::DoubleArray,
            Self::String(_) => AidaType::StringArray,
        }
    }

    /// The scalar type of each element
    pub fn element_type(&self) -> AidaType {
        match self {
            Self::Boolean(_) => AidaType::Boolean,
            Self::Byte(_) => AidaType::Byte,
            Self::Short(_) => AidaType::Short,
            Self::Integer(_) => AidaType::Integer,
            Self::Long(_) => AidaType::Long,
            Self::Float(_) => AidaType::Float,
            Self::Double(_) => AidaType::Double,
            Self::String(_) => AidaType::String,
        }
    }

    /// An empty array, from either the array type or the element type
    pub fn empty(ty: AidaType) -> Option<Array> {
        Some(match ty.element_type().unwrap_or(ty) {
            AidaType::Boolean => Self::Boolean(Vec::new()),
            AidaType::Byte => Self::Byte(Vec::new()),
            AidaType::Short => Self::Short(Vec::new()),
            AidaType::Integer => Self::Integer(Vec::new()),
            AidaType::Long => Self::Long(Vec::new()),
            AidaType::Float => Self::Float(Vec::new()),
            AidaType::Double => Self::Double(Vec::new()),
            AidaType::String => Self::String(Vec::new()),
            _ => return None,
        })
    }

    pub fn get_count(&self) -> usize {
        array_dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.get_count() == 0
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        Some(match self {
            Self::Boolean(v) => Scalar::Boolean(*v.get(index)?),
            Self::Byte(v) => Scalar::Byte(*v.get(index)?),
            Self::Short(v) => Scalar::Short(*v.get(index)?),
            Self::Integer(v) => Scalar::Integer(*v.get(index)?),
            Self::Long(v) => Scalar::Long(*v.get(index)?),
            Self::Float(v) => Scalar::Float(*v.get(index)?),
            Self::Double(v) => Scalar::Double(*v.get(index)?),
            Self::String(v) => Scalar::String(v.get(index)?.clone()),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.get_count()).filter_map(|i| self.get(i))
    }
}

macro_rules! impl_conversions {
    ($( $variant:ident => $t:ty ),*) => {
        $(
            impl From<$t> for Scalar {
                fn from(value: $t) -> Self {
                    Scalar::$variant(value)
                }
            }
            impl From<Vec<$t>> for Array {
                fn from(value: Vec<$t>) -> Self {
                    Array::$variant(value)
                }
            }
            impl TryFrom<Scalar> for $t {
                type Error = Scalar;
                fn try_from(value: Scalar) -> Result<Self, Self::Error> {
                    match value {
                        Scalar::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
            impl TryFrom<Array> for Vec<$t> {
                type Error = Array;
                fn try_from(value: Array) -> Result<Self, Self::Error> {
                    match value {
                        Array::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_conversions!(
    Boolean => bool,
    Byte => i8,
    Short => i16,
    Integer => i32,
    Long => i64,
    Float => f32,
    Double => f64,
    String => String
);

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<Vec<&str>> for Array {
    fn from(value: Vec<&str>) -> Self {
        Array::String(value.into_iter().map(str::to_owned).collect())
    }
}

/// The value argument of a set request
///
/// This arrives as text, but if the text is valid JSON it is carried as the
/// parsed document so that providers can scan structured values out of it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Json(serde_json::Value),
}

impl Value {
    /// Interpret the `VALUE` argument as it came off the wire
    ///
    /// Only JSON objects and arrays are taken as JSON. A bare number or word is
    /// left as text, so that scalar parsing rules apply to it.
    pub fn from_wire(text: &str) -> Value {
        let trimmed = text.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(json) = serde_json::from_str(text)
        {
            return Value::Json(json);
        }
        Value::String(text.to_string())
    }

    pub fn get_type(&self) -> AidaType {
        match self {
            Self::String(_) => AidaType::String,
            Self::Json(_) => AidaType::Json,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Json(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

/// Anything a request can produce
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Result of a setter that does not return a table
    Void,
    Scalar(Scalar),
    Array(Array),
    Table(Table),
}

impl Payload {
    /// An empty response in the shape of `ty`
    ///
    /// This is what accompanies a raised exception. Meta and unknown types
    /// produce `Void`.
    pub fn empty(ty: AidaType) -> Payload {
        if let Some(scalar) = Scalar::zero(ty) {
            Payload::Scalar(scalar)
        } else if let Some(array) = Array::empty(ty).filter(|_| ty.is_array()) {
            Payload::Array(array)
        } else if ty == AidaType::Table {
            Payload::Table(Table::empty())
        } else {
            Payload::Void
        }
    }

    pub fn get_type(&self) -> AidaType {
        match self {
            Self::Void => AidaType::Void,
            Self::Scalar(s) => s.get_type(),
            Self::Array(a) => a.get_type(),
            Self::Table(_) => AidaType::Table,
        }
    }
}
