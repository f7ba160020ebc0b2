use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

/// Key/value map with insertion order, as held by `Value::Dict`.
pub type ValueMap = IndexMap<Value, Value>;

/// Ordered set of unique values, as held by `Value::Set`.
pub type ValueSet = IndexSet<Value>;

/// A complex number.  Only the handful of operations the arithmetic words need are provided.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    #[serde(with = "float_repr")]
    pub re: f64,

    #[serde(with = "float_repr")]
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Complex {
        Complex { re, im }
    }

    pub fn add(self, other: Complex) -> Complex {
        Complex::new(self.re + other.re, self.im + other.im)
    }

    pub fn sub(self, other: Complex) -> Complex {
        Complex::new(self.re - other.re, self.im - other.im)
    }

    pub fn mul(self, other: Complex) -> Complex {
        Complex::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }

    /// None when dividing by zero.
    pub fn div(self, other: Complex) -> Option<Complex> {
        let denominator = other.re * other.re + other.im * other.im;

        if denominator == 0.0 {
            return None;
        }

        Some(Complex::new(
            (self.re * other.re + self.im * other.im) / denominator,
            (self.im * other.re - self.re * other.im) / denominator,
        ))
    }

    pub fn abs(self) -> f64 {
        self.re.hypot(self.im)
    }

    pub fn powc(self, exponent: Complex) -> Complex {
        if self.re == 0.0 && self.im == 0.0 {
            return if exponent.re == 0.0 && exponent.im == 0.0 {
                Complex::new(1.0, 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }

        let (modulus, argument) = (self.abs().ln(), self.im.atan2(self.re));
        let real = exponent.re * modulus - exponent.im * argument;
        let imaginary = exponent.im * modulus + exponent.re * argument;
        let scale = real.exp();

        Complex::new(scale * imaginary.cos(), scale * imaginary.sin())
    }
}

/// Format one part of a complex number the way the console shows it, integral parts without a
/// fraction.
fn complex_part(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl Display for Complex {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.re == 0.0 && self.re.is_sign_positive() {
            write!(f, "{}j", complex_part(self.im))
        } else if self.im < 0.0 {
            write!(f, "({}-{}j)", complex_part(self.re), complex_part(-self.im))
        } else {
            write!(f, "({}+{}j)", complex_part(self.re), complex_part(self.im))
        }
    }
}

/// Core value enumeration.  Every item on the data and auxiliary stacks, and every literal operand
/// in the program store, is one of these.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum Value {
    /// The value represents nothing and no data is associated.
    #[default]
    None,

    /// A boolean value.
    Bool(bool),

    /// We have an integer value.  Represented as an i64.
    Int(i64),

    /// A floating-point value.  Represented as a f64.
    Float(#[serde(with = "float_repr")] f64),

    /// A complex number.
    Complex(Complex),

    /// A string value, represented by a Rust string.
    Str(String),

    /// An ordered, growable sequence of values.
    List(Vec<Value>),

    /// A fixed sequence of values.
    Tuple(Vec<Value>),

    /// Key/value map.  Saved images hold it as a list of pairs because the keys are not strings.
    Dict(#[serde(with = "map_pairs")] ValueMap),

    /// Ordered set of unique values.
    Set(ValueSet),

    /// An opaque handle to an external resource.
    Handle(u64),
}

/// Floats as JSON numbers.  JSON has no infinity or NaN, those are written as the strings `inf`,
/// `-inf` and `nan`.
mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FloatRepr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match FloatRepr::deserialize(deserializer)? {
            FloatRepr::Number(value) => Ok(value),
            FloatRepr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid float \"{}\"", other))),
            },
        }
    }
}

/// Serialize a map as a sequence of `[key, value]` pairs.
mod map_pairs {
    use super::{Value, ValueMap};
    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(map: &ValueMap, serializer: S) -> Result<S::Ok, S::Error> {
        let mut sequence = serializer.serialize_seq(Some(map.len()))?;

        for pair in map {
            sequence.serialize_element(&pair)?;
        }

        sequence.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ValueMap, D::Error> {
        let pairs = Vec::<(Value, Value)>::deserialize(deserializer)?;

        Ok(pairs.into_iter().collect())
    }
}

/// Convert an arbitrary data type to a Value.
pub trait ToValue {
    /// Implement to handle the actual conversion.
    fn to_value(&self) -> Value;
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

/// Floats used as keys hash like the integer they are equal to, so `1` and `1.0` find the same
/// map entry.
fn hash_float<H: Hasher>(value: f64, state: &mut H) {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        (value as i64).hash(state);
    } else {
        value.to_bits().hash(state);
    }
}

/// Values can hold floating point numbers which violate the Eq rules.  This is a known limitation,
/// NaN keys will never be found in a map.
impl Eq for Value {}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Handle(a), Value::Handle(b)) => a == b,

            _ => match (self.as_complex(), other.as_complex()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::None => 0u8.hash(state),
            Value::Bool(value) => (*value as i64).hash(state),
            Value::Int(value) => value.hash(state),
            Value::Float(value) => hash_float(*value, state),
            Value::Complex(value) => {
                hash_float(value.re, state);

                if value.im != 0.0 {
                    hash_float(value.im, state);
                }
            }
            Value::Str(value) => value.hash(state),
            Value::List(items) | Value::Tuple(items) => items.hash(state),
            Value::Dict(map) => map.len().hash(state),
            Value::Set(set) => set.len().hash(state),
            Value::Handle(value) => value.hash(state),
        }
    }
}

/// The console form of a value.  Strings print without quotes, anything nested inside a container
/// prints in its literal form.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Str(text) => write!(f, "{}", text),
            _ => write!(f, "{}", self.repr()),
        }
    }
}

fn join_repr<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items.map(Value::repr).collect::<Vec<_>>().join(", ")
}

impl Value {
    /// The literal form of the value, strings in quotes.  Lists and friends print their items
    /// this way.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => {
                if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
                    format!("{:.1}", value)
                } else {
                    format!("{}", value)
                }
            }
            Value::Complex(value) => value.to_string(),
            Value::Str(text) => {
                let escaped = text
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t");

                format!("'{}'", escaped)
            }
            Value::List(items) => format!("[{}]", join_repr(items.iter())),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!("({})", join_repr(items.iter())),
            Value::Dict(map) => {
                let pairs = map
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.repr(), value.repr()))
                    .collect::<Vec<_>>()
                    .join(", ");

                format!("{{{}}}", pairs)
            }
            Value::Set(set) if set.is_empty() => "set()".to_string(),
            Value::Set(set) => format!("{{{}}}", join_repr(set.iter())),
            Value::Handle(handle) => format!("<handle {}>", handle),
        }
    }

    /// The name of the value's type as shown in abort reports and by the `type` word.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Complex(_) => "complex",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::Handle(_) => "handle",
        }
    }

    /// Truthiness used by the logical words: zero, empty and None are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Complex(value) => value.re != 0.0 || value.im != 0.0,
            Value::Str(text) => !text.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.is_empty(),
            Value::Set(set) => !set.is_empty(),
            Value::Handle(_) => true,
        }
    }

    /// Is this one of the numeric types?
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Complex(_)
        )
    }

    /// The value as an integer, if it is one.  Booleans count as 0 and 1.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Bool(value) => Some(*value as i64),
            _ => None,
        }
    }

    /// The value as a real number, if it is an integer or a float.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => self.as_int().map(|value| value as f64),
        }
    }

    /// The value as a complex number, if it is numeric at all.
    pub fn as_complex(&self) -> Option<Complex> {
        match self {
            Value::Complex(value) => Some(*value),
            _ => self.as_real().map(|value| Complex::new(value, 0.0)),
        }
    }

    /// Order two values.  Numbers compare across their types, strings and sequences compare
    /// lexicographically.  None when the two can not be ordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.compare(right)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }

                Some(a.len().cmp(&b.len()))
            }

            _ => match (self.as_real(), other.as_real()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Membership test used by `in` and `notin`.
    pub fn contains(&self, item: &Value) -> Result<bool, String> {
        match (self, item) {
            (Value::Str(text), Value::Str(part)) => Ok(text.contains(part.as_str())),
            (Value::Str(_), other) => Err(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            )),
            (Value::List(items) | Value::Tuple(items), _) => Ok(items.contains(item)),
            (Value::Dict(map), _) => Ok(map.contains_key(item)),
            (Value::Set(set), _) => Ok(set.contains(item)),
            (other, _) => Err(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            )),
        }
    }

    /// Number of items of a container or characters of a string.
    pub fn item_count(&self) -> Option<usize> {
        match self {
            Value::Str(text) => Some(text.chars().count()),
            Value::List(items) | Value::Tuple(items) => Some(items.len()),
            Value::Dict(map) => Some(map.len()),
            Value::Set(set) => Some(set.len()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();

        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn numbers_compare_across_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(hash_of(&Value::Int(2)), hash_of(&Value::Float(2.0)));
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Str("a".into()).compare(&Value::Int(1)), None);
    }

    #[test]
    fn repr_matches_console_literals() {
        let list = Value::List(vec![
            Value::Int(1),
            Value::Float(5.0),
            Value::Str("it's".into()),
            Value::Tuple(vec![Value::None]),
        ]);

        assert_eq!(list.repr(), "[1, 5.0, 'it\\'s', (None,)]");
        assert_eq!(Value::Complex(Complex::new(1.0, -2.0)).repr(), "(1-2j)");
        assert_eq!(Value::Complex(Complex::new(0.0, 3.0)).repr(), "3j");
        assert_eq!(Value::Set(ValueSet::new()).repr(), "set()");
        assert_eq!(Value::Str("plain".into()).to_string(), "plain");
    }

    #[test]
    fn maps_survive_json_with_non_string_keys() {
        let mut map = ValueMap::new();

        map.insert(Value::Int(1), Value::Str("one".into()));
        map.insert(Value::Tuple(vec![Value::Int(2)]), Value::List(vec![]));

        let value = Value::Dict(map);
        let text = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(back, value);
    }
}
