use std::fmt::Display;
use std::str::FromStr;

use ndarray::Array1;

use crate::key::{decode, parse_index, CellKey, MatrixKind};
use crate::HapError;

const VALUE_SEPARATOR: char = ',';

/// One durable slice of a matrix generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<F> {
    pub key: CellKey,
    pub values: Array1<F>,
}

impl<F> Record<F>
where
    F: Clone,
{
    pub fn new(index: usize, level: usize, kind: MatrixKind, values: Array1<F>) -> Self {
        Self {
            key: CellKey::new(index, level, kind),
            values,
        }
    }

    pub fn scalar(index: usize, level: usize, kind: MatrixKind, value: F) -> Self {
        Self::new(index, level, kind, Array1::from_elem(1, value))
    }
}

impl<F> Record<F>
where
    F: Copy + Display + FromStr,
{
    /// Serialize as `index \t level \t KIND \t v0,v1,...`
    pub fn to_line(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        format!("{}\t{}", self.key.encode(), values.join(&VALUE_SEPARATOR.to_string()))
    }

    /// Parse a line written by [`Record::to_line`]. `line_no` is 1-based and
    /// only used for error reporting.
    pub fn from_line(line: &str, line_no: usize) -> Result<Self, HapError> {
        let (header, body) = match line.rfind('\t') {
            Some(pos) => (&line[..pos], &line[pos + 1..]),
            None => {
                return Err(HapError::MalformedRecord {
                    line: line_no,
                    reason: "missing value field".to_string(),
                })
            }
        };
        let (key, _) = decode::<F>(header, false)?;
        if !key.kind.is_stored() {
            return Err(HapError::InvalidMatrixIdentifier {
                kind: key.kind,
                stage: "stored record",
            });
        }
        let mut values = Vec::new();
        for s in body.split(VALUE_SEPARATOR) {
            match s.trim().parse::<F>() {
                Ok(v) => values.push(v),
                Err(_) => {
                    return Err(HapError::MalformedRecord {
                        line: line_no,
                        reason: format!("unable to parse value '{}'", s),
                    })
                }
            }
        }
        if key.kind.is_scalar() && values.len() != 1 {
            return Err(HapError::MalformedRecord {
                line: line_no,
                reason: format!("{} is a scalar, found {} values", key.kind, values.len()),
            });
        }
        Ok(Self {
            key,
            values: Array1::from(values),
        })
    }
}

/// Final output triple: `row` belongs to `exemplar` at `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Assignment {
    pub exemplar: usize,
    pub row: usize,
    pub level: usize,
}

impl Assignment {
    pub fn to_line(&self) -> String {
        format!("{}\t{}\t{}", self.exemplar, self.row, self.level)
    }

    pub fn from_line(line: &str, line_no: usize) -> Result<Self, HapError> {
        let fields: Vec<usize> = line
            .split('\t')
            .map(parse_index)
            .collect::<Option<_>>()
            .ok_or_else(|| HapError::MalformedRecord {
                line: line_no,
                reason: "assignment fields must be non-negative integers".to_string(),
            })?;
        match fields[..] {
            [exemplar, row, level] => Ok(Self {
                exemplar,
                row,
                level,
            }),
            _ => Err(HapError::MalformedRecord {
                line: line_no,
                reason: format!("expected 3 assignment fields, found {}", fields.len()),
            }),
        }
    }
}
