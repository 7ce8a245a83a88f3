// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cell values read from and bound to the store
//!
//! Selections, grouping keys and run identities all need a value that can be
//! hashed and ordered. Reals compare by bit pattern, so two values are equal
//! exactly when the store returned the same double.

use duckdb::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single table cell
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Numeric view of the cell; text is parsed, null has none
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Real(r) => Some(*r),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integral view of the cell; reals must have no fractional part
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Null => None,
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            FieldValue::Real(_) => None,
            FieldValue::Text(s) => {
                let s = s.trim();
                s.parse().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|r| r.fract() == 0.0)
                        .map(|r| r as i64)
                })
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Integer(_) => 1,
            FieldValue::Real(_) => 2,
            FieldValue::Text(_) => 3,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FieldValue {}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Real(a), FieldValue::Real(b)) => a.total_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            FieldValue::Null => {}
            FieldValue::Integer(i) => i.hash(state),
            FieldValue::Real(r) => r.to_bits().hash(state),
            FieldValue::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Real(r) => write!(f, "{r}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Real)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl FromSql for FieldValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Boolean(b) => FieldValue::Integer(i64::from(b)),
            ValueRef::TinyInt(i) => FieldValue::Integer(i64::from(i)),
            ValueRef::SmallInt(i) => FieldValue::Integer(i64::from(i)),
            ValueRef::Int(i) => FieldValue::Integer(i64::from(i)),
            ValueRef::BigInt(i) => FieldValue::Integer(i),
            ValueRef::HugeInt(i) => {
                i64::try_from(i).map_or(FieldValue::Real(i as f64), FieldValue::Integer)
            }
            ValueRef::UTinyInt(i) => FieldValue::Integer(i64::from(i)),
            ValueRef::USmallInt(i) => FieldValue::Integer(i64::from(i)),
            ValueRef::UInt(i) => FieldValue::Integer(i64::from(i)),
            ValueRef::UBigInt(i) => {
                i64::try_from(i).map_or(FieldValue::Real(i as f64), FieldValue::Integer)
            }
            ValueRef::Float(r) => FieldValue::Real(f64::from(r)),
            ValueRef::Double(r) => FieldValue::Real(r),
            ValueRef::Text(bytes) => FieldValue::Text(
                std::str::from_utf8(bytes)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))?
                    .to_string(),
            ),
            _ => return Err(FromSqlError::InvalidType),
        })
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self {
            FieldValue::Null => Value::Null,
            FieldValue::Integer(i) => Value::BigInt(*i),
            FieldValue::Real(r) => Value::Double(*r),
            FieldValue::Text(s) => Value::Text(s.clone()),
        }))
    }
}
