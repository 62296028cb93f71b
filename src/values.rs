// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Field values held by record snapshots.
//!
//! A record's fields are stored positionally in a [`ValueSet`]: slot `i` holds the
//! value of the `i`-th [`FieldDef`] of the record type, or `None` if the field is
//! unset. Each present slot is a [`FieldValue`], which is either a plain [`Value`]
//! or an [`EncryptedField`] that carries the plaintext together with its
//! ciphertext.
//!
//! Comparisons between field values produce a [`Difference`] rather than a `bool`,
//! so that a change of storage representation (same plaintext, new ciphertext) can
//! be told apart from a change of the value itself.
use crate::{RecordId, encrypted::EncryptedField};
use chrono::NaiveDate;
use std::{cmp::Ordering, fmt, str::FromStr};

#[cfg(any(test, feature = "arbitrary"))]
mod arbitrary;
mod snapshot;
pub use snapshot::ValueSet;

/// Position of a field within a record type's [`Record::FIELDS`](crate::Record::FIELDS).
pub type FieldId = usize;

/// How a field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Plain,
    Encrypted,
}

/// Schema entry for one field of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn plain(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Plain,
        }
    }

    pub const fn encrypted(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Encrypted,
        }
    }

    pub const fn is_encrypted(&self) -> bool {
        matches!(self.kind, FieldKind::Encrypted)
    }
}

/// Outcome of comparing two values, fields or snapshots.
///
/// The variants are ordered so that combining several comparisons is a `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Difference {
    /// Same value, same stored representation.
    #[default]
    Identical,
    /// Same plaintext, but the ciphertext differs (typically after re-keying).
    ///
    /// Not a user-visible change, but the record still has to be persisted again.
    SecurityDifferent,
    /// The value itself differs.
    Different,
}

impl Difference {
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_identical(self) -> bool {
        self == Difference::Identical
    }

    pub fn is_different(self) -> bool {
        self == Difference::Different
    }
}

/// Error returned when creating or parsing a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    /// The input was empty.
    Empty,
    /// The input is not a decimal number.
    Parse(String),
    /// More fractional digits than [`Decimal::MAX_SCALE`].
    Scale(usize),
    /// The number does not fit in 64 bits of units.
    Overflow,
}

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalError::Empty => f.write_str("empty decimal"),
            DecimalError::Parse(s) => write!(f, "failed to parse {s:?} as a decimal"),
            DecimalError::Scale(scale) => write!(
                f,
                "scale {scale} exceeds the maximum of {}",
                Decimal::MAX_SCALE
            ),
            DecimalError::Overflow => f.write_str("decimal out of range"),
        }
    }
}

impl std::error::Error for DecimalError {}

/// Fixed-point decimal: `units / 10^scale`.
///
/// Money, prices and rates are all stored this way. Two decimals compare equal when
/// their numeric values are equal, whatever their scales (`1.50 == 1.5`).
#[derive(Clone, Copy)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawDecimal"))]
pub struct Decimal {
    units: i64,
    scale: u8,
}

/// The serialized form of a [`Decimal`], checked by [`Decimal::new`] on the way in.
#[cfg(feature = "serde")]
#[derive(::serde::Deserialize)]
struct RawDecimal {
    units: i64,
    scale: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<RawDecimal> for Decimal {
    type Error = DecimalError;

    fn try_from(raw: RawDecimal) -> Result<Self, Self::Error> {
        Decimal::new(raw.units, raw.scale)
    }
}

impl Decimal {
    pub const MAX_SCALE: u8 = 18;
    pub const ZERO: Decimal = Decimal { units: 0, scale: 0 };
    const ENCODED_LEN: usize = 9;

    /// Creates `units / 10^scale`.
    ///
    /// # Errors
    ///
    /// Returns an error if `scale` exceeds [`Decimal::MAX_SCALE`].
    pub fn new(units: i64, scale: u8) -> Result<Self, DecimalError> {
        if scale > Self::MAX_SCALE {
            return Err(DecimalError::Scale(scale.into()));
        }
        Ok(Self { units, scale })
    }

    pub const fn units(&self) -> i64 {
        self.units
    }

    pub const fn scale(&self) -> u8 {
        self.scale
    }

    pub const fn is_zero(&self) -> bool {
        self.units == 0
    }

    fn widened(&self, scale: u8) -> i128 {
        // scale <= MAX_SCALE, so 10^18 * i64::MAX still fits in an i128
        i128::from(self.units) * 10i128.pow(u32::from(scale - self.scale))
    }

    pub(crate) fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0; Self::ENCODED_LEN];
        out[0] = self.scale;
        out[1..].copy_from_slice(&self.units.to_be_bytes());
        out
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&scale, units) = bytes.split_first()?;
        let units = i64::from_be_bytes(units.try_into().ok()?);
        Self::new(units, scale).ok()
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.widened(scale).cmp(&other.widened(scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let pow = 10u64.pow(u32::from(self.scale));
        let abs = self.units.unsigned_abs();
        let sign = if self.units < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / pow,
            abs % pow,
            width = usize::from(self.scale)
        )
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalError::Empty);
        }
        let (negative, digits) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        let well_formed = !(whole.is_empty() && fraction.is_empty())
            && whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(DecimalError::Parse(s.to_string()));
        }
        if fraction.len() > usize::from(Self::MAX_SCALE) {
            return Err(DecimalError::Scale(fraction.len()));
        }
        let mut units: i64 = 0;
        for b in whole.bytes().chain(fraction.bytes()) {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(i64::from(b - b'0')))
                .ok_or(DecimalError::Overflow)?;
        }
        if negative {
            units = -units;
        }
        // fraction.len() <= MAX_SCALE was checked above
        Self::new(units, fraction.len() as u8)
    }
}

/// A single field value.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    Decimal(Decimal),
    Bytes(#[cfg_attr(feature = "serde", serde(with = "serde_bytes"))] Vec<u8>),
    /// Reference to a record of another list, by id.
    Link(RecordId),
}

impl Value {
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Decimal(_) => "decimal",
            Value::Bytes(_) => "bytes",
            Value::Link(_) => "link",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<RecordId> {
        match self {
            Value::Link(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => v.fmt(f),
            Value::Integer(v) => v.fmt(f),
            Value::Text(v) => v.fmt(f),
            Value::Date(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Link(v) => write!(f, "#{v}"),
        }
    }
}

macro_rules! impl_from {
    ($t:ty, $into:ident) => {
        impl From<$t> for Value {
            fn from(val: $t) -> Self {
                Self::$into(val.into())
            }
        }
    };
}

impl_from!(bool, Bool);
impl_from!(i64, Integer);
impl_from!(i32, Integer);
impl_from!(String, Text);
impl_from!(&str, Text);
impl_from!(NaiveDate, Date);
impl_from!(Decimal, Decimal);
impl_from!(Vec<u8>, Bytes);
impl_from!(&[u8], Bytes);

/// The content of one field slot.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Plain(Value),
    Encrypted(EncryptedField<Value>),
}

impl FieldValue {
    /// The plaintext value, whether or not the field is encrypted.
    pub fn value(&self) -> &Value {
        match self {
            FieldValue::Plain(v) => v,
            FieldValue::Encrypted(e) => e.value(),
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, FieldValue::Encrypted(_))
    }

    pub fn as_encrypted(&self) -> Option<&EncryptedField<Value>> {
        match self {
            FieldValue::Encrypted(e) => Some(e),
            FieldValue::Plain(_) => None,
        }
    }

    pub fn as_encrypted_mut(&mut self) -> Option<&mut EncryptedField<Value>> {
        match self {
            FieldValue::Encrypted(e) => Some(e),
            FieldValue::Plain(_) => None,
        }
    }

    pub fn differs(&self, other: &FieldValue) -> Difference {
        match (self, other) {
            (FieldValue::Plain(a), FieldValue::Plain(b)) => {
                if a == b {
                    Difference::Identical
                } else {
                    Difference::Different
                }
            }
            (FieldValue::Encrypted(a), FieldValue::Encrypted(b)) => a.differs(b),
            (a, b) if a.value() == b.value() => Difference::SecurityDifferent,
            _ => Difference::Different,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Plain(value)
    }
}

impl From<EncryptedField<Value>> for FieldValue {
    fn from(field: EncryptedField<Value>) -> Self {
        FieldValue::Encrypted(field)
    }
}

/// Compares two optional field slots; an unset slot only matches another unset slot.
pub(crate) fn slot_differs(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Difference {
    match (a, b) {
        (None, None) => Difference::Identical,
        (Some(a), Some(b)) => a.differs(b),
        _ => Difference::Different,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "json")]
    fn decimal_deserialization_checks_the_scale() {
        let d: Decimal = serde_json::from_str(r#"{"units": 12345, "scale": 2}"#).unwrap();
        assert_eq!(d.to_string(), "123.45");
        assert_eq!(serde_json::to_value(d).unwrap(), serde_json::json!({"units": 12345, "scale": 2}));

        let err = serde_json::from_str::<Decimal>(r#"{"units": 1, "scale": 60}"#).unwrap_err();
        assert!(err.to_string().starts_with("scale 60 exceeds the maximum of 18"));
    }

    #[test]
    fn decimal_parse_and_display() {
        let d: Decimal = "123.45".parse().unwrap();
        assert_eq!(d.units(), 12345);
        assert_eq!(d.scale(), 2);
        assert_eq!(d.to_string(), "123.45");

        let d: Decimal = "-0.05".parse().unwrap();
        assert_eq!(d.to_string(), "-0.05");

        let d: Decimal = "42".parse().unwrap();
        assert_eq!(d.to_string(), "42");
        assert_eq!(".5".parse::<Decimal>().unwrap().to_string(), "0.5");
    }

    #[test]
    fn decimal_parse_errors() {
        assert_eq!("".parse::<Decimal>(), Err(DecimalError::Empty));
        assert_eq!(
            "1.2.3".parse::<Decimal>(),
            Err(DecimalError::Parse("1.2.3".to_string()))
        );
        assert_eq!(
            "-".parse::<Decimal>(),
            Err(DecimalError::Parse("-".to_string()))
        );
        assert_eq!(
            "0.1234567890123456789".parse::<Decimal>(),
            Err(DecimalError::Scale(19))
        );
        assert_eq!(
            "99999999999999999999".parse::<Decimal>(),
            Err(DecimalError::Overflow)
        );
    }

    #[test]
    fn decimal_equality_ignores_scale() {
        let a = Decimal::new(150, 2).unwrap();
        let b = Decimal::new(15, 1).unwrap();
        assert_eq!(a, b);
        assert!(Decimal::new(-1, 0).unwrap() < Decimal::ZERO);
        assert!(Decimal::new(1, 18).unwrap() > Decimal::ZERO);
    }

    #[quickcheck]
    fn decimal_bytes_roundtrip(d: Decimal) -> bool {
        Decimal::from_bytes(&d.to_bytes()) == Some(d)
    }

    #[quickcheck]
    fn decimal_display_parses_back(d: Decimal) -> bool {
        d.to_string().parse::<Decimal>() == Ok(d)
    }

    #[test]
    fn field_value_differences() {
        let a = FieldValue::from(Value::from("Bank"));
        let b = FieldValue::from(Value::from("Bank A"));
        assert_eq!(a.differs(&a.clone()), Difference::Identical);
        assert_eq!(a.differs(&b), Difference::Different);

        let enc = FieldValue::from(EncryptedField::new(Value::from("Bank")));
        assert_eq!(a.differs(&enc), Difference::SecurityDifferent);
        assert_eq!(b.differs(&enc), Difference::Different);

        assert_eq!(slot_differs(None, None), Difference::Identical);
        assert_eq!(slot_differs(Some(&a), None), Difference::Different);
    }

    #[test]
    fn difference_combines_to_worst() {
        use Difference::*;
        assert_eq!(Identical.combine(SecurityDifferent), SecurityDifferent);
        assert_eq!(SecurityDifferent.combine(Different), Different);
        assert_eq!(Identical.combine(Identical), Identical);
    }
}
