//! Structured identifiers attached to every record and message.
//!
//! A key has the textual form `index \t level \t KIND`, optionally followed by
//! `\t value` when it travels as a shuffle message. [`decode`] is the single
//! parse point; everything past it works on the typed values.

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::HapError;

const FIELD_SEPARATOR: char = '\t';

/// Closed set of matrix tags.
///
/// Uppercase tags name stored matrices, the two lowercase tags only ever
/// appear on messages that rebroadcast a diagonal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatrixKind {
    Similarity,
    Responsibility,
    ResponsibilityDiag,
    Availability,
    AvailabilityDiag,
    Tau,
    Phi,
    ExemplarPreference,
}

impl MatrixKind {
    pub const ALL: [MatrixKind; 8] = [
        MatrixKind::Similarity,
        MatrixKind::Responsibility,
        MatrixKind::ResponsibilityDiag,
        MatrixKind::Availability,
        MatrixKind::AvailabilityDiag,
        MatrixKind::Tau,
        MatrixKind::Phi,
        MatrixKind::ExemplarPreference,
    ];

    pub fn tag(self) -> char {
        match self {
            MatrixKind::Similarity => 'S',
            MatrixKind::Responsibility => 'R',
            MatrixKind::ResponsibilityDiag => 'r',
            MatrixKind::Availability => 'A',
            MatrixKind::AvailabilityDiag => 'a',
            MatrixKind::Tau => 'T',
            MatrixKind::Phi => 'P',
            MatrixKind::ExemplarPreference => 'C',
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let mut chars = tag.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::ALL.iter().copied().find(|k| k.tag() == c),
            _ => None,
        }
    }

    /// The tag used when this matrix's diagonal is rebroadcast, if it has one.
    pub fn diagonal(self) -> Option<Self> {
        match self {
            MatrixKind::Responsibility => Some(MatrixKind::ResponsibilityDiag),
            MatrixKind::Availability => Some(MatrixKind::AvailabilityDiag),
            _ => None,
        }
    }

    /// Scalar kinds carry a single value, all others a length-N vector.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            MatrixKind::Tau
                | MatrixKind::Phi
                | MatrixKind::ExemplarPreference
                | MatrixKind::ResponsibilityDiag
                | MatrixKind::AvailabilityDiag
        )
    }

    /// Kinds that may appear as durable records.
    pub fn is_stored(self) -> bool {
        !matches!(
            self,
            MatrixKind::ResponsibilityDiag | MatrixKind::AvailabilityDiag
        )
    }
}

impl Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for MatrixKind {
    type Err = HapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatrixKind::from_tag(s)
            .ok_or_else(|| HapError::malformed_key(s, "unrecognized matrix kind"))
    }
}

/// Identifies one row/column slice (or scalar) of one matrix at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub index: usize,
    pub level: usize,
    pub kind: MatrixKind,
}

impl CellKey {
    pub fn new(index: usize, level: usize, kind: MatrixKind) -> Self {
        Self { index, level, kind }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.index,
            self.level,
            self.kind,
            sep = FIELD_SEPARATOR
        )
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.index, self.level, self.kind)
    }
}

/// Shuffle partition: every message for the same `(index, level)` meets in
/// one reduce invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReduceKey {
    pub index: usize,
    pub level: usize,
}

impl ReduceKey {
    pub fn new(index: usize, level: usize) -> Self {
        Self { index, level }
    }
}

impl Display for ReduceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.index, self.level)
    }
}

/// One element travelling from a map step to a reducer.
///
/// `source.index` is the position the value occupies in the vector the
/// reducer reconstructs; `source.level` is the level it originated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message<F> {
    pub source: CellKey,
    pub value: F,
}

impl<F> Message<F> {
    pub fn new(index: usize, level: usize, kind: MatrixKind, value: F) -> Self {
        Self {
            source: CellKey::new(index, level, kind),
            value,
        }
    }
}

impl<F> Message<F>
where
    F: Copy + Display + FromStr,
{
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.source.encode(), FIELD_SEPARATOR, self.value)
    }

    pub fn decode(message: &str) -> Result<Self, HapError> {
        match decode(message, true)? {
            (source, Some(value)) => Ok(Self { source, value }),
            (_, None) => Err(HapError::malformed_key(message, "missing value field")),
        }
    }
}

/// Plain decimal digits only: no sign, no whitespace.
pub(crate) fn parse_index(field: &str) -> Option<usize> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Split a key into its typed parts.
///
/// `expects_value` selects between the 3-field record form and the 4-field
/// message form; any other field count is rejected. Bounds against N or the
/// level count are left to the caller.
pub fn decode<F>(key: &str, expects_value: bool) -> Result<(CellKey, Option<F>), HapError>
where
    F: FromStr,
{
    let fields: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
    let expected = if expects_value { 4 } else { 3 };
    if fields.len() != expected {
        return Err(HapError::malformed_key(
            key,
            format!("expected {} fields, found {}", expected, fields.len()),
        ));
    }
    let index = parse_index(fields[0])
        .ok_or_else(|| HapError::malformed_key(key, "index is not a non-negative integer"))?;
    let level = parse_index(fields[1])
        .ok_or_else(|| HapError::malformed_key(key, "level is not a non-negative integer"))?;
    let kind = MatrixKind::from_tag(fields[2])
        .ok_or_else(|| HapError::malformed_key(key, "unrecognized matrix kind"))?;
    let value = if expects_value {
        let value = fields[3]
            .parse::<F>()
            .map_err(|_| HapError::malformed_key(key, "value is not a number"))?;
        Some(value)
    } else {
        None
    };
    Ok((CellKey::new(index, level, kind), value))
}
