// src/cache/fingerprint.rs

//! Descriptor fingerprints.
//!
//! A descriptor is a list of `(owner task tag, field index)` pairs. The
//! fingerprint is computed from the display form of each referenced field:
//!
//! 1. format each value for its type (dates, times and numerics through the
//!    field's picture, a numeric without one verbatim; everything else
//!    verbatim; null becomes `""`),
//! 2. join the pieces with `;`,
//! 3. hex-dump the joined string,
//! 4. hash the dump down to 32 bits.
//!
//! The same field values always produce the same key; that is what lets two
//! requests for the same master record share one cached detail view.

use std::fmt;
use std::str::FromStr;

use crate::errors::{EngineError, Result};

/// 32-bit content fingerprint used as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(pub i32);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One `(owner task, field)` reference of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPart {
    pub owner_task_tag: String,
    pub field_index: usize,
}

impl DescriptorPart {
    pub fn new(owner_task_tag: impl Into<String>, field_index: usize) -> Self {
        Self {
            owner_task_tag: owner_task_tag.into(),
            field_index,
        }
    }

    /// Parse the protocol form `"tag,idx;tag,idx;..."`.
    pub fn parse_list(s: &str) -> Result<Vec<DescriptorPart>> {
        s.split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|part| {
                let (tag, idx) = part.split_once(',').ok_or_else(|| {
                    EngineError::invalid_attribute("descriptor", s, "expected tag,index pairs")
                })?;
                let field_index = idx.trim().parse().map_err(|_| {
                    EngineError::invalid_attribute("descriptor", s, "field index is not a number")
                })?;
                Ok(DescriptorPart::new(tag.trim(), field_index))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Alpha,
    Unicode,
    Numeric,
    Date,
    Time,
    Boolean,
    Blob,
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alpha" | "a" => Ok(FieldKind::Alpha),
            "unicode" | "u" => Ok(FieldKind::Unicode),
            "numeric" | "n" => Ok(FieldKind::Numeric),
            "date" | "d" => Ok(FieldKind::Date),
            "time" | "t" => Ok(FieldKind::Time),
            "boolean" | "b" => Ok(FieldKind::Boolean),
            "blob" => Ok(FieldKind::Blob),
            other => Err(format!("invalid field kind: {other}")),
        }
    }
}

/// A field value as stored by the data layer.
///
/// `value` is the storage form (`YYYYMMDD` for dates, `HHMMSS` for times,
/// a decimal literal for numerics); `None` is a null field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub kind: FieldKind,
    pub value: Option<String>,
    pub picture: Option<String>,
}

impl FieldValue {
    pub fn new(kind: FieldKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
            picture: None,
        }
    }

    pub fn null(kind: FieldKind) -> Self {
        Self {
            kind,
            value: None,
            picture: None,
        }
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }

    /// The display representation contributing to a fingerprint.
    pub fn display(&self) -> String {
        let Some(raw) = self.value.as_deref() else {
            return String::new();
        };
        match self.kind {
            FieldKind::Numeric => format_numeric(raw, self.picture.as_deref()),
            FieldKind::Date => format_date(raw, self.picture.as_deref().unwrap_or("DD/MM/YYYY")),
            FieldKind::Time => format_time(raw, self.picture.as_deref().unwrap_or("HH:MM:SS")),
            FieldKind::Alpha | FieldKind::Unicode | FieldKind::Boolean | FieldKind::Blob => {
                raw.to_string()
            }
        }
    }
}

/// Numeric pictures look like `N5.2`; only the decimal count matters here.
/// Without a picture the stored literal is used as is. Rounding is half-up
/// and done on the digits, so long literals keep every digit.
fn format_numeric(raw: &str, picture: Option<&str>) -> String {
    let raw = raw.trim();
    let Some(picture) = picture else {
        return raw.to_string();
    };
    let decimals = match picture.split_once('.') {
        Some((_, d)) => d.trim().parse::<usize>().unwrap_or(0),
        None => 0,
    };
    round_decimal(raw, decimals).unwrap_or_else(|| raw.to_string())
}

/// `None` when `raw` is not a plain decimal literal.
fn round_decimal(raw: &str, decimals: usize) -> Option<String> {
    let (negative, unsigned) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut frac: Vec<u8> = frac_part.bytes().collect();
    frac.resize(frac.len().max(decimals + 1), b'0');
    let round_up = frac[decimals] >= b'5';

    let mut digits: Vec<u8> = int_part.bytes().collect();
    digits.extend_from_slice(&frac[..decimals]);
    if round_up {
        let mut carry = true;
        for d in digits.iter_mut().rev() {
            if *d == b'9' {
                *d = b'0';
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            digits.insert(0, b'1');
        }
    }

    let split = digits.len() - decimals;
    let int_digits = std::str::from_utf8(&digits[..split]).ok()?.trim_start_matches('0');
    let frac_digits = std::str::from_utf8(&digits[split..]).ok()?;
    let int_digits = if int_digits.is_empty() { "0" } else { int_digits };
    let is_zero = digits.iter().all(|&d| d == b'0');

    let mut out = String::with_capacity(digits.len() + 2);
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(int_digits);
    if decimals > 0 {
        out.push('.');
        out.push_str(frac_digits);
    }
    Some(out)
}

fn format_date(raw: &str, picture: &str) -> String {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }
    picture
        .replace("YYYY", &raw[0..4])
        .replace("MM", &raw[4..6])
        .replace("DD", &raw[6..8])
}

fn format_time(raw: &str, picture: &str) -> String {
    let raw = raw.trim();
    if raw.len() != 6 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }
    picture
        .replace("HH", &raw[0..2])
        .replace("MM", &raw[2..4])
        .replace("SS", &raw[4..6])
}

/// Uppercase hex dump of the UTF-8 bytes of `s`.
pub fn hex_dump(s: &str) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(s.len() * 2);
    for byte in s.as_bytes() {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Hash an arbitrary string down to a cache key.
pub fn hash_to_key(s: &str) -> CacheKey {
    let digest = blake3::hash(s.as_bytes());
    let bytes = digest.as_bytes();
    CacheKey(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Fingerprint of already-fetched descriptor values, in descriptor order.
///
/// A `None` entry stands for a null field and contributes an empty string.
pub fn fingerprint_of(values: &[Option<FieldValue>]) -> CacheKey {
    let joined = values
        .iter()
        .map(|v| v.as_ref().map(FieldValue::display).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(";");
    hash_to_key(&hex_dump(&joined))
}
