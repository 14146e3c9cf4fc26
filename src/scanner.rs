//! Typed extraction of request arguments.
//!
//! A provider describes the arguments it wants as a list of [`FieldSpec`]s, one
//! per field, each with a target type and whether it is required. The
//! [`Scanner`] walks that list in order, finds each argument by name, and
//! converts its text to the target type.
//!
//! ```
//! use aidars::{Arguments, AidaType, scanner::{FieldSpec, Scanner}};
//!
//! let arguments = Arguments::new().with("BEAM", "8").with("DEVICES", r#"["KLYS:LI31:31"]"#);
//! let scanned = Scanner::new(&arguments)
//!     .scan(&[
//!         FieldSpec::required("beam", AidaType::String),
//!         FieldSpec::optional("dgrp", AidaType::String).or("LIN_KLYS"),
//!         FieldSpec::required("devices", AidaType::StringArray),
//!     ])
//!     .unwrap();
//! assert_eq!(scanned.get::<String>("dgrp").unwrap(), "LIN_KLYS");
//! assert_eq!(scanned.get::<Vec<String>>("devices").unwrap().len(), 1);
//! ```
//!
//! The first field that is missing or can't be converted stops the scan with a
//! `MissingRequiredArgumentException`, and nothing scanned so far is returned.
//!
//! Numbers are read the way C's `sscanf` reads them: the longest valid prefix
//! is taken and the rest ignored, and text with no valid prefix reads as zero.
//! Both cases log a warning. A [`ScanPolicy::Strict`] scan rejects them instead.
//! Arrays are always strict, and must be JSON array literals.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, hex_digit1, multispace0, oct_digit1, one_of},
    combinator::{map, opt, recognize},
    sequence::preceded,
};
use num::{Bounded, NumCast};
use tracing::{trace, warn};

use crate::{
    arguments::Arguments,
    error::AidaError,
    types::AidaType,
    value::{Array, Scalar, Value},
};

/// How to treat numeric text that isn't entirely a number
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Take the longest numeric prefix, or zero, and warn
    #[default]
    BestEffort,
    /// Anything but a complete number is an error
    Strict,
}

/// Describes one field to extract
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: AidaType,
    required: bool,
    default: Option<Scanned>,
}

impl FieldSpec {
    pub fn required(name: &str, kind: AidaType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, kind: AidaType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// The value to use when an optional argument is absent
    pub fn or(mut self, default: impl Into<Scalar>) -> Self {
        self.default = Some(Scanned::Scalar(default.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `value` field is taken from the set value, if one was given
    fn is_value(&self) -> bool {
        self.name.eq_ignore_ascii_case("value")
    }
}

/// The result of scanning one field
#[derive(Debug, Clone, PartialEq)]
pub enum Scanned {
    /// An optional field with no argument and no default
    Absent,
    Scalar(Scalar),
    Array(Array),
    Json(serde_json::Value),
}

/// Types that can be read out of a [`Scanned`] field
///
/// Absent fields read as the natural empty value: zero, false, an empty string
/// or an empty array. Ask for an `Option` to tell absence apart.
pub trait FromScanned: Sized {
    fn from_scanned(scanned: &Scanned) -> Option<Self>;
}

macro_rules! impl_from_scanned {
    ($( $variant:ident => $t:ty ),*) => {
        $(
            impl FromScanned for $t {
                fn from_scanned(scanned: &Scanned) -> Option<Self> {
                    match scanned {
                        Scanned::Absent => Some(<$t>::default()),
                        Scanned::Scalar(Scalar::$variant(v)) => Some(v.to_owned()),
                        _ => None,
                    }
                }
            }
            impl FromScanned for Vec<$t> {
                fn from_scanned(scanned: &Scanned) -> Option<Self> {
                    match scanned {
                        Scanned::Absent => Some(Vec::new()),
                        Scanned::Array(Array::$variant(v)) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_scanned!(
    Boolean => bool,
    Byte => i8,
    Short => i16,
    Integer => i32,
    Long => i64,
    Float => f32,
    Double => f64,
    String => String
);

impl<T: FromScanned> FromScanned for Option<T> {
    fn from_scanned(scanned: &Scanned) -> Option<Self> {
        match scanned {
            Scanned::Absent => Some(None),
            other => T::from_scanned(other).map(Some),
        }
    }
}

impl FromScanned for serde_json::Value {
    fn from_scanned(scanned: &Scanned) -> Option<Self> {
        match scanned {
            Scanned::Absent => Some(serde_json::Value::Null),
            Scanned::Json(json) => Some(json.clone()),
            Scanned::Scalar(scalar) => Some(scalar.to_json()),
            Scanned::Array(array) => Some(array.iter().map(|s| s.to_json()).collect()),
        }
    }
}

/// Every field from one successful scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedArguments {
    fields: Vec<(String, Scanned)>,
}

impl ScannedArguments {
    /// Read a scanned field as a native type
    ///
    /// Asking for a field that wasn't in the scan, or as a type it wasn't
    /// scanned as, is a provider defect and raises an internal error.
    pub fn get<T: FromScanned>(&self, name: &str) -> Result<T, AidaError> {
        let scanned = self.raw(name).ok_or_else(|| {
            AidaError::internal(format!("Argument {name} was not part of the scan"))
        })?;
        T::from_scanned(scanned).ok_or_else(|| {
            AidaError::internal(format!(
                "Argument {name} cannot be read as {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn raw(&self, name: &str) -> Option<&Scanned> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, s)| s)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.raw(name).is_some_and(|s| *s != Scanned::Absent)
    }
}

enum Source<'a> {
    Text(&'a str),
    Json(&'a serde_json::Value),
}

/// Scans a request's arguments, and for set requests its value
pub struct Scanner<'a> {
    arguments: &'a Arguments,
    value: Option<&'a Value>,
    policy: ScanPolicy,
}

impl<'a> Scanner<'a> {
    pub fn new(arguments: &'a Arguments) -> Self {
        Self {
            arguments,
            value: None,
            policy: ScanPolicy::default(),
        }
    }

    /// Supply the set value, read by a field named `value`
    pub fn with_value(mut self, value: &'a Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scan every field, in order
    pub fn scan(&self, fields: &[FieldSpec]) -> Result<ScannedArguments, AidaError> {
        let fields = fields
            .iter()
            .map(|spec| Ok((spec.name.clone(), self.scan_field(spec)?)))
            .collect::<Result<Vec<_>, AidaError>>()?;
        Ok(ScannedArguments { fields })
    }

    fn source(&self, spec: &FieldSpec) -> Option<Source<'a>> {
        match self.value {
            Some(Value::String(s)) if spec.is_value() => {
                (!s.is_empty()).then_some(Source::Text(s.as_str()))
            }
            Some(Value::Json(json)) if spec.is_value() => Some(Source::Json(json)),
            _ => self
                .arguments
                .get(&spec.name)
                .map(|a| Source::Text(a.value())),
        }
    }

    fn scan_field(&self, spec: &FieldSpec) -> Result<Scanned, AidaError> {
        let Some(source) = self.source(spec) else {
            if spec.required {
                return Err(AidaError::missing_argument(format!(
                    "Missing required argument {}",
                    spec.name
                )));
            }
            return Ok(spec.default.clone().unwrap_or(Scanned::Absent));
        };
        let name = &spec.name;
        trace!("Scanning argument {name} as {}", spec.kind);

        match (spec.kind, source) {
            (AidaType::Json, Source::Json(json)) => Ok(Scanned::Json(json.clone())),
            (AidaType::Json, Source::Text(text)) => match serde_json::from_str(text) {
                Ok(json) => Ok(Scanned::Json(json)),
                Err(e) if self.policy == ScanPolicy::Strict => Err(AidaError::missing_argument(
                    format!("Argument {name} is not valid JSON: {e}"),
                )),
                Err(_) => Ok(Scanned::Json(serde_json::Value::String(text.to_string()))),
            },
            (kind, Source::Text(text)) if kind.is_scalar() => {
                parse_scalar(name, text, kind, self.policy).map(Scanned::Scalar)
            }
            (kind, Source::Json(json)) if kind.is_scalar() => {
                json_to_scalar(name, json, kind, self.policy).map(Scanned::Scalar)
            }
            (kind, Source::Text(text)) if kind.is_array() => {
                let json = serde_json::from_str(text).map_err(|e| {
                    AidaError::missing_argument(format!(
                        "Argument {name} must be a JSON array: {e}"
                    ))
                })?;
                json_to_array(name, &json, kind, self.policy).map(Scanned::Array)
            }
            (kind, Source::Json(json)) if kind.is_array() => {
                json_to_array(name, json, kind, self.policy).map(Scanned::Array)
            }
            (kind, _) => Err(AidaError::internal(format!(
                "Argument {name} can not be scanned as {kind}"
            ))),
        }
    }
}

/// Boolean arguments are false when empty, `false` or `0`, and true otherwise
pub fn parse_boolean(text: &str) -> bool {
    !(text.is_empty() || text.eq_ignore_ascii_case("false") || text == "0")
}

/// Convert an argument's text to a scalar of the given type
pub fn parse_scalar(
    name: &str,
    text: &str,
    kind: AidaType,
    policy: ScanPolicy,
) -> Result<Scalar, AidaError> {
    let settle_int = |prefix: Prefix<i128>| policy.settle(name, text, kind, prefix);
    Ok(match kind {
        AidaType::Boolean => Scalar::Boolean(parse_boolean(text)),
        AidaType::Byte => {
            // Only an exact lowercase 0x prefix selects hex, and the result
            // wraps into a byte.
            let prefix = if text.starts_with("0x") {
                Prefix::of(hexadecimal(text))
            } else {
                Prefix::of(decimal(text))
            };
            Scalar::Byte(settle_int(prefix)? as i8)
        }
        AidaType::Short => Scalar::Short(saturate(settle_int(Prefix::of(any_radix(text)))?)),
        AidaType::Integer => Scalar::Integer(saturate(settle_int(Prefix::of(decimal(text)))?)),
        AidaType::Long => Scalar::Long(saturate(settle_int(Prefix::of(decimal(text)))?)),
        AidaType::Float => {
            Scalar::Float(policy.settle(name, text, kind, float_prefix(text))? as f32)
        }
        AidaType::Double => Scalar::Double(policy.settle(name, text, kind, float_prefix(text))?),
        AidaType::String => Scalar::String(text.to_string()),
        other => {
            return Err(AidaError::internal(format!(
                "Argument {name} can not be scanned as {other}"
            )));
        }
    })
}

fn json_to_scalar(
    name: &str,
    json: &serde_json::Value,
    kind: AidaType,
    policy: ScanPolicy,
) -> Result<Scalar, AidaError> {
    use serde_json::Value as Json;
    let invalid = || {
        AidaError::missing_argument(format!(
            "Argument {name} has an invalid {kind} value: {json}"
        ))
    };
    match (json, kind) {
        (Json::String(text), _) => parse_scalar(name, text, kind, policy),
        (Json::Bool(b), AidaType::Boolean) => Ok(Scalar::Boolean(*b)),
        (Json::Bool(b), AidaType::String) => Ok(Scalar::String(b.to_string())),
        (Json::Bool(b), _) => parse_scalar(name, if *b { "1" } else { "0" }, kind, policy),
        (Json::Number(n), AidaType::Boolean) => Ok(Scalar::Boolean(n.as_f64() != Some(0.0))),
        (Json::Number(n), AidaType::Byte) => cast_number(n).map(Scalar::Byte).ok_or_else(invalid),
        (Json::Number(n), AidaType::Short) => cast_number(n).map(Scalar::Short).ok_or_else(invalid),
        (Json::Number(n), AidaType::Integer) => {
            cast_number(n).map(Scalar::Integer).ok_or_else(invalid)
        }
        (Json::Number(n), AidaType::Long) => cast_number(n).map(Scalar::Long).ok_or_else(invalid),
        (Json::Number(n), AidaType::Float) => {
            n.as_f64().map(|f| Scalar::Float(f as f32)).ok_or_else(invalid)
        }
        (Json::Number(n), AidaType::Double) => n.as_f64().map(Scalar::Double).ok_or_else(invalid),
        (Json::Null, _) => Err(invalid()),
        (other, AidaType::String) => Ok(Scalar::String(other.to_string())),
        _ => Err(invalid()),
    }
}

fn json_to_array(
    name: &str,
    json: &serde_json::Value,
    kind: AidaType,
    policy: ScanPolicy,
) -> Result<Array, AidaError> {
    let serde_json::Value::Array(items) = json else {
        return Err(AidaError::missing_argument(format!(
            "Argument {name} must be a JSON array"
        )));
    };
    let element = kind
        .element_type()
        .ok_or_else(|| AidaError::internal(format!("{kind} is not an array type")))?;
    let scalars = items
        .iter()
        .map(|item| json_to_scalar(name, item, element, policy))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(match element {
        AidaType::Boolean => Array::Boolean(collect_as(scalars)),
        AidaType::Byte => Array::Byte(collect_as(scalars)),
        AidaType::Short => Array::Short(collect_as(scalars)),
        AidaType::Integer => Array::Integer(collect_as(scalars)),
        AidaType::Long => Array::Long(collect_as(scalars)),
        AidaType::Float => Array::Float(collect_as(scalars)),
        AidaType::Double => Array::Double(collect_as(scalars)),
        _ => Array::String(collect_as(scalars)),
    })
}

fn collect_as<T: TryFrom<Scalar>>(scalars: Vec<Scalar>) -> Vec<T> {
    scalars
        .into_iter()
        .filter_map(|s| T::try_from(s).ok())
        .collect()
}

fn cast_number<T: NumCast>(number: &serde_json::Number) -> Option<T> {
    if let Some(i) = number.as_i64() {
        NumCast::from(i)
    } else if let Some(u) = number.as_u64() {
        NumCast::from(u)
    } else {
        number.as_f64().and_then(|f| NumCast::from(f))
    }
}

fn saturate<T: NumCast + Bounded>(value: i128) -> T {
    NumCast::from(value).unwrap_or_else(|| {
        if value < 0 {
            T::min_value()
        } else {
            T::max_value()
        }
    })
}

/// How much of a piece of text a numeric parser accepted
enum Prefix<T> {
    Whole(T),
    Partial(T),
    Unreadable,
}

impl<T> Prefix<T> {
    fn of(result: IResult<&str, T>) -> Self {
        match result {
            Ok((rest, value)) if rest.trim().is_empty() => Prefix::Whole(value),
            Ok((_, value)) => Prefix::Partial(value),
            Err(_) => Prefix::Unreadable,
        }
    }
}

impl ScanPolicy {
    fn settle<T: Default>(
        self,
        name: &str,
        text: &str,
        kind: AidaType,
        prefix: Prefix<T>,
    ) -> Result<T, AidaError> {
        match (prefix, self) {
            (Prefix::Whole(value), _) => Ok(value),
            (Prefix::Partial(_) | Prefix::Unreadable, ScanPolicy::Strict) => {
                Err(AidaError::missing_argument(format!(
                    "Argument {name} has an invalid {kind} value: {text}"
                )))
            }
            (Prefix::Partial(value), ScanPolicy::BestEffort) => {
                warn!("Argument {name}='{text}' was only partly read as {kind}");
                Ok(value)
            }
            (Prefix::Unreadable, ScanPolicy::BestEffort) => {
                warn!("Argument {name}='{text}' is not a {kind}, using zero");
                Ok(T::default())
            }
        }
    }
}

fn signed(sign: Option<char>, digits: &str, radix: u32) -> i128 {
    // Only overflow can fail here, digits have already been matched
    let magnitude = i128::from_str_radix(digits, radix).unwrap_or(i128::MAX);
    if sign == Some('-') {
        -magnitude
    } else {
        magnitude
    }
}

/// Decimal integer, like `%d`
fn decimal(input: &str) -> IResult<&str, i128> {
    map(
        preceded(multispace0, (opt(one_of("+-")), digit1)),
        |(sign, digits)| signed(sign, digits, 10),
    )
    .parse(input)
}

/// Hexadecimal integer with optional `0x`, like `%x`
fn hexadecimal(input: &str) -> IResult<&str, i128> {
    map(
        preceded(
            multispace0,
            (opt(one_of("+-")), opt(tag_no_case("0x")), hex_digit1),
        ),
        |(sign, _, digits)| signed(sign, digits, 16),
    )
    .parse(input)
}

/// Integer with C prefix rules for the base, like `%i`
fn any_radix(input: &str) -> IResult<&str, i128> {
    map(
        preceded(
            multispace0,
            (
                opt(one_of("+-")),
                alt((
                    map(preceded(tag_no_case("0x"), hex_digit1), |d| (d, 16)),
                    map(preceded(char('0'), opt(oct_digit1)), |d: Option<&str>| {
                        (d.unwrap_or("0"), 8)
                    }),
                    map(digit1, |d| (d, 10)),
                )),
            ),
        ),
        |(sign, (digits, radix))| signed(sign, digits, radix),
    )
    .parse(input)
}

/// The text of a decimal floating point number, like `%f`
fn float_text(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        recognize((
            opt(one_of("+-")),
            alt((
                recognize((digit1, opt((char('.'), opt(digit1))))),
                recognize((char('.'), digit1)),
            )),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
    )
    .parse(input)
}

fn float_prefix(text: &str) -> Prefix<f64> {
    match Prefix::of(float_text(text)) {
        Prefix::Whole(t) => t.trim().parse().map_or(Prefix::Unreadable, Prefix::Whole),
        Prefix::Partial(t) => t.trim().parse().map_or(Prefix::Unreadable, Prefix::Partial),
        Prefix::Unreadable => Prefix::Unreadable,
    }
}
