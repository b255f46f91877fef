use arrow_schema::DataType;
use chrono::NaiveDate;
use datafusion_common::ScalarValue;

/// Result of converting a literal into the key domain of a column.
#[derive(Clone, Debug, PartialEq)]
pub enum Coerced {
    /// Converted without loss, comparisons keep their meaning.
    Exact(ScalarValue),
    /// Literal falls strictly between `floor` and the next representable key.
    Fractional { floor: ScalarValue },
    /// Literal is smaller than any value of the column type.
    BelowDomain,
    /// Literal is greater than any value of the column type.
    AboveDomain,
    Null,
    /// Rendered in the column type, but the conversion doesn't keep ordering. Only usable for
    /// equality.
    EqualityOnly(ScalarValue),
    Incompatible,
}

/// Key domain of a column type. Values of integer columns are widened so literals of other
/// widths compare directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDomain {
    Signed { min: i64, max: i64 },
    Unsigned { max: u64 },
    Float,
    String,
    Boolean,
    Date,
}

impl KeyDomain {
    pub fn of(data_type: &DataType) -> Option<Self> {
        Some(match data_type {
            DataType::Int8 => KeyDomain::Signed {
                min: i8::MIN as i64,
                max: i8::MAX as i64,
            },
            DataType::Int16 => KeyDomain::Signed {
                min: i16::MIN as i64,
                max: i16::MAX as i64,
            },
            DataType::Int32 => KeyDomain::Signed {
                min: i32::MIN as i64,
                max: i32::MAX as i64,
            },
            DataType::Int64 => KeyDomain::Signed {
                min: i64::MIN,
                max: i64::MAX,
            },
            DataType::UInt8 => KeyDomain::Unsigned {
                max: u8::MAX as u64,
            },
            DataType::UInt16 => KeyDomain::Unsigned {
                max: u16::MAX as u64,
            },
            DataType::UInt32 => KeyDomain::Unsigned {
                max: u32::MAX as u64,
            },
            DataType::UInt64 => KeyDomain::Unsigned { max: u64::MAX },
            DataType::Float32 | DataType::Float64 => KeyDomain::Float,
            DataType::Utf8 | DataType::LargeUtf8 => KeyDomain::String,
            DataType::Boolean => KeyDomain::Boolean,
            DataType::Date32 => KeyDomain::Date,
            _ => return None,
        })
    }
}

/// Literal value stripped of its arrow width.
enum Literal {
    Int(i128),
    Float(f64),
    Str(String),
    Bool(bool),
    Date(i32),
}

fn literal_of(value: &ScalarValue) -> Option<Literal> {
    Some(match value {
        ScalarValue::Int8(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::Int16(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::Int32(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::Int64(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::UInt8(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::UInt16(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::UInt32(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::UInt64(Some(v)) => Literal::Int(*v as i128),
        ScalarValue::Float32(Some(v)) => Literal::Float(*v as f64),
        ScalarValue::Float64(Some(v)) => Literal::Float(*v),
        ScalarValue::Utf8(Some(s)) | ScalarValue::LargeUtf8(Some(s)) => Literal::Str(s.clone()),
        ScalarValue::Boolean(Some(b)) => Literal::Bool(*b),
        ScalarValue::Date32(Some(d)) => Literal::Date(*d),
        _ => return None,
    })
}

fn parse_date(s: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

fn coerce_int(v: i128, domain: KeyDomain) -> Coerced {
    match domain {
        KeyDomain::Signed { min, max } => {
            if v < min as i128 {
                Coerced::BelowDomain
            } else if v > max as i128 {
                Coerced::AboveDomain
            } else {
                Coerced::Exact(ScalarValue::Int64(Some(v as i64)))
            }
        }
        KeyDomain::Unsigned { max } => {
            if v < 0 {
                Coerced::BelowDomain
            } else if v > max as i128 {
                Coerced::AboveDomain
            } else {
                Coerced::Exact(ScalarValue::UInt64(Some(v as u64)))
            }
        }
        _ => Coerced::Incompatible,
    }
}

fn coerce_float_to_int(v: f64, domain: KeyDomain) -> Coerced {
    if v.is_nan() {
        return Coerced::Incompatible;
    }
    let floor = v.floor();
    if floor < i128::MIN as f64 {
        return Coerced::BelowDomain;
    }
    if floor > i128::MAX as f64 {
        return Coerced::AboveDomain;
    }
    match coerce_int(floor as i128, domain) {
        Coerced::Exact(floor) if v.fract() != 0.0 => Coerced::Fractional { floor },
        // Fraction above the domain maximum is still above every key.
        Coerced::AboveDomain => Coerced::AboveDomain,
        other => other,
    }
}

fn render_number(lit: &Literal) -> Option<String> {
    match lit {
        Literal::Int(v) => Some(v.to_string()),
        Literal::Float(v) if v.is_finite() => Some(format!("{}", v)),
        _ => None,
    }
}

/// Converts `value` into the key domain of a column of `column_type`.
pub fn coerce_literal(value: &ScalarValue, column_type: &DataType) -> Coerced {
    if value.is_null() {
        return Coerced::Null;
    }
    let (Some(domain), Some(lit)) = (KeyDomain::of(column_type), literal_of(value)) else {
        return Coerced::Incompatible;
    };

    match (domain, lit) {
        (KeyDomain::Signed { .. } | KeyDomain::Unsigned { .. }, Literal::Int(v)) => {
            coerce_int(v, domain)
        }
        (KeyDomain::Signed { .. } | KeyDomain::Unsigned { .. }, Literal::Float(v)) => {
            coerce_float_to_int(v, domain)
        }
        (KeyDomain::Signed { .. } | KeyDomain::Unsigned { .. }, Literal::Str(s)) => {
            if let Ok(v) = s.trim().parse::<i128>() {
                coerce_int(v, domain)
            } else if let Ok(v) = s.trim().parse::<f64>() {
                coerce_float_to_int(v, domain)
            } else {
                Coerced::Incompatible
            }
        }
        (KeyDomain::Float, Literal::Int(v)) => Coerced::Exact(ScalarValue::Float64(Some(v as f64))),
        (KeyDomain::Float, Literal::Float(v)) if !v.is_nan() => {
            Coerced::Exact(ScalarValue::Float64(Some(v)))
        }
        (KeyDomain::Float, Literal::Str(s)) => match s.trim().parse::<f64>() {
            Ok(v) if !v.is_nan() => Coerced::Exact(ScalarValue::Float64(Some(v))),
            _ => Coerced::Incompatible,
        },
        (KeyDomain::String, Literal::Str(s)) => Coerced::Exact(ScalarValue::Utf8(Some(s))),
        (KeyDomain::String, lit @ (Literal::Int(_) | Literal::Float(_))) => {
            match render_number(&lit) {
                Some(s) => Coerced::EqualityOnly(ScalarValue::Utf8(Some(s))),
                None => Coerced::Incompatible,
            }
        }
        (KeyDomain::Boolean, Literal::Bool(b)) => Coerced::Exact(ScalarValue::Boolean(Some(b))),
        (KeyDomain::Boolean, Literal::Int(v)) if v == 0 || v == 1 => {
            Coerced::Exact(ScalarValue::Boolean(Some(v == 1)))
        }
        (KeyDomain::Date, Literal::Date(d)) => Coerced::Exact(ScalarValue::Date32(Some(d))),
        (KeyDomain::Date, Literal::Str(s)) => match parse_date(&s) {
            Some(d) => Coerced::Exact(ScalarValue::Date32(Some(d))),
            None => Coerced::Incompatible,
        },
        _ => Coerced::Incompatible,
    }
}
