use std::fmt::Display;
use std::fs::{self, File};
use std::io::{stdout, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use hap::ClusterHierarchy;
use ndarray::{Array2, Axis};
use num_traits::Float;
use thiserror::Error;

/// Row labels of the vectors a generation was built from, stored next to its part file.
pub(crate) const LABELS_FILE: &str = "labels";

#[derive(Debug, Error)]
pub(crate) enum FileParseError {
    #[error("{message}")]
    Format { message: String },

    #[error("Unable to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl FileParseError {
    fn format<S: Into<String>>(message: S) -> Self {
        FileParseError::Format {
            message: message.into(),
        }
    }
}

/// Reads in a file formatted as (tab separated):
///     id1 val1 val2 val3
///     id2 val1 val2 val3
///
/// Provide as many ids and values as desired
/// All rows should be same length
/// Values should be floating-point decimal values
pub(crate) fn from_file<F>(p: &Path) -> Result<(Array2<F>, Vec<String>), FileParseError>
where
    F: Float + Default + FromStr,
{
    let reader = BufReader::new(File::open(p)?);
    let mut labels = Vec::new();
    let mut data: Vec<Vec<F>> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if !line.contains('\t') {
            return Err(FileParseError::format(format!(
                "Input file is not tab-delimited at line {}",
                idx + 1
            )));
        }
        let mut line = line.split('\t');
        // ID as first col
        match line.next() {
            Some(l) => labels.push(l.to_string()),
            None => return Err(FileParseError::format("Error loading line label")),
        }
        let mut entry: Vec<F> = vec![];
        for s in line {
            match s.trim().parse::<F>() {
                Ok(v) => entry.push(v),
                Err(_) => {
                    return Err(FileParseError::format(format!(
                        "Error parsing file at line {}",
                        idx + 1
                    )))
                }
            };
        }
        data.push(entry);
    }
    if data.is_empty() {
        return Err(FileParseError::format("Data file is empty"));
    }
    let length = data[0].len();
    if data.iter().any(|v| v.len() != length) {
        return Err(FileParseError::format(
            "Input data rows must all be same length!",
        ));
    }
    let mut out = Array2::<F>::default((data.len(), length));
    out.axis_iter_mut(Axis(0))
        .zip(data.iter())
        .for_each(|(mut row, values)| {
            row.iter_mut().zip(values.iter()).for_each(|(col, v)| *col = *v);
        });
    Ok((out, labels))
}

pub(crate) fn write_labels(dir: &Path, labels: &[String]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(dir.join(LABELS_FILE))?);
    for label in labels {
        writeln!(writer, "{}", label)?;
    }
    writer.flush()
}

/// Labels saved by `build`, or the row ids when there are none.
pub(crate) fn read_labels(dir: &Path, n: usize) -> std::io::Result<Vec<String>> {
    let path = dir.join(LABELS_FILE);
    if !path.is_file() {
        return Ok((0..n).map(|i| i.to_string()).collect());
    }
    let labels: Vec<String> = fs::read_to_string(path)?
        .lines()
        .map(|l| l.to_string())
        .collect();
    if labels.len() != n {
        return Ok((0..n).map(|i| i.to_string()).collect());
    }
    Ok(labels)
}

#[cfg(not(tarpaulin_include))]
pub(crate) fn display_results<L>(results: &ClusterHierarchy, labels: &[L]) -> std::io::Result<()>
where
    L: Display,
{
    let mut writer = BufWriter::new(stdout());
    for level in 0..results.num_levels() {
        let clusters = match results.level(level) {
            Some(c) => c,
            None => continue,
        };
        writeln!(
            writer,
            "Level={} nClusters={} nSamples={}",
            level,
            clusters.len(),
            clusters.values().map(|v| v.len()).sum::<usize>()
        )?;
        for (idx, (exemplar, members)) in clusters.iter().enumerate() {
            writeln!(
                writer,
                ">Cluster={} size={} exemplar={}",
                idx + 1,
                members.len(),
                labels[*exemplar]
            )?;
            let members: Vec<String> = members.iter().map(|m| labels[*m].to_string()).collect();
            writeln!(writer, "{}", members.join(","))?;
        }
    }
    writer.flush()
}
