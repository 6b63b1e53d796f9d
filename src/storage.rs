//! Durable generations of matrix records.
//!
//! A location names one complete generation. Generations are written whole
//! and never appended to, so a reader either sees all of a phase's output or
//! nothing at all.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::key::MatrixKind;
use crate::record::{Assignment, Record};
use crate::HapError;

/// Name of the single data file inside a generation directory.
pub const PART_FILE: &str = "part-00000";

pub trait Storage<F> {
    fn exists(&self, location: &Path) -> bool;

    /// True when the generation at `location` holds at least one `kind` record.
    fn has_matrix(&self, location: &Path, kind: MatrixKind) -> Result<bool, HapError>;

    fn read(&self, location: &Path) -> Result<Vec<Record<F>>, HapError>;

    fn write(&mut self, location: &Path, records: &[Record<F>]) -> Result<(), HapError>;

    fn write_assignments(
        &mut self,
        location: &Path,
        assignments: &[Assignment],
    ) -> Result<(), HapError>;

    fn read_assignments(&self, location: &Path) -> Result<Vec<Assignment>, HapError>;

    /// Remove a generation. Deleting a missing location is not an error.
    fn delete(&mut self, location: &Path) -> Result<(), HapError>;
}

/// One directory per generation with a single text part file.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryStore;

impl DirectoryStore {
    pub fn new() -> Self {
        Self
    }

    fn part_file(location: &Path) -> PathBuf {
        location.join(PART_FILE)
    }

    fn open(location: &Path) -> Result<BufReader<File>, HapError> {
        let part = Self::part_file(location);
        if !part.is_file() {
            return Err(HapError::InputNotFound { path: part });
        }
        Ok(BufReader::new(File::open(part)?))
    }

    /// Write `lines` into a hidden sibling directory and rename it into place.
    fn write_lines<I>(location: &Path, lines: I) -> Result<(), HapError>
    where
        I: Iterator<Item = String>,
    {
        if location.exists() {
            return Err(HapError::AlreadyExists {
                path: location.to_path_buf(),
            });
        }
        let name = match location.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => {
                return Err(HapError::configuration(format!(
                    "storage location {} has no final path component",
                    location.display()
                )))
            }
        };
        let parent = match location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let staging = parent.join(format!(".{}.partial", name));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;
        let mut writer = BufWriter::new(File::create(Self::part_file(&staging))?);
        let mut count = 0;
        for line in lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            count += 1;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&staging, location)?;
        debug!(location = %location.display(), records = count, "generation written");
        Ok(())
    }
}

impl<F> Storage<F> for DirectoryStore
where
    F: Copy + Display + FromStr,
{
    fn exists(&self, location: &Path) -> bool {
        location.is_dir()
    }

    fn has_matrix(&self, location: &Path, kind: MatrixKind) -> Result<bool, HapError> {
        let reader = Self::open(location)?;
        for line in reader.lines() {
            // third field is the tag
            if line?.splitn(4, '\t').nth(2).and_then(MatrixKind::from_tag) == Some(kind) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read(&self, location: &Path) -> Result<Vec<Record<F>>, HapError> {
        let reader = Self::open(location)?;
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            records.push(Record::from_line(&line, idx + 1)?);
        }
        debug!(location = %location.display(), records = records.len(), "generation read");
        Ok(records)
    }

    fn write(&mut self, location: &Path, records: &[Record<F>]) -> Result<(), HapError> {
        Self::write_lines(location, records.iter().map(|r| r.to_line()))
    }

    fn write_assignments(
        &mut self,
        location: &Path,
        assignments: &[Assignment],
    ) -> Result<(), HapError> {
        Self::write_lines(location, assignments.iter().map(|a| a.to_line()))
    }

    fn read_assignments(&self, location: &Path) -> Result<Vec<Assignment>, HapError> {
        let reader = Self::open(location)?;
        let mut assignments = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            assignments.push(Assignment::from_line(&line, idx + 1)?);
        }
        Ok(assignments)
    }

    fn delete(&mut self, location: &Path) -> Result<(), HapError> {
        if location.exists() {
            fs::remove_dir_all(location)?;
            debug!(location = %location.display(), "generation deleted");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Generation<F> {
    Records(Vec<Record<F>>),
    Assignments(Vec<Assignment>),
}

/// In-process store, used by [`crate::HierarchicalAffinityPropagation::predict`].
#[derive(Debug, Clone)]
pub struct MemoryStore<F> {
    generations: HashMap<PathBuf, Generation<F>>,
}

impl<F> Default for MemoryStore<F> {
    fn default() -> Self {
        Self {
            generations: HashMap::new(),
        }
    }
}

impl<F> MemoryStore<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live generations.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    fn insert(&mut self, location: &Path, generation: Generation<F>) -> Result<(), HapError> {
        if self.generations.contains_key(location) {
            return Err(HapError::AlreadyExists {
                path: location.to_path_buf(),
            });
        }
        self.generations.insert(location.to_path_buf(), generation);
        Ok(())
    }

    fn get(&self, location: &Path) -> Result<&Generation<F>, HapError> {
        self.generations
            .get(location)
            .ok_or_else(|| HapError::InputNotFound {
                path: location.to_path_buf(),
            })
    }
}

impl<F> Storage<F> for MemoryStore<F>
where
    F: Clone,
{
    fn exists(&self, location: &Path) -> bool {
        self.generations.contains_key(location)
    }

    fn has_matrix(&self, location: &Path, kind: MatrixKind) -> Result<bool, HapError> {
        Ok(match self.get(location)? {
            Generation::Records(records) => records.iter().any(|r| r.key.kind == kind),
            Generation::Assignments(_) => false,
        })
    }

    fn read(&self, location: &Path) -> Result<Vec<Record<F>>, HapError> {
        match self.get(location)? {
            Generation::Records(records) => Ok(records.clone()),
            Generation::Assignments(_) => Err(HapError::configuration(format!(
                "{} holds assignments, not matrix records",
                location.display()
            ))),
        }
    }

    fn write(&mut self, location: &Path, records: &[Record<F>]) -> Result<(), HapError> {
        self.insert(location, Generation::Records(records.to_vec()))
    }

    fn write_assignments(
        &mut self,
        location: &Path,
        assignments: &[Assignment],
    ) -> Result<(), HapError> {
        self.insert(location, Generation::Assignments(assignments.to_vec()))
    }

    fn read_assignments(&self, location: &Path) -> Result<Vec<Assignment>, HapError> {
        match self.get(location)? {
            Generation::Assignments(assignments) => Ok(assignments.clone()),
            Generation::Records(_) => Err(HapError::configuration(format!(
                "{} holds matrix records, not assignments",
                location.display()
            ))),
        }
    }

    fn delete(&mut self, location: &Path) -> Result<(), HapError> {
        self.generations.remove(location);
        Ok(())
    }
}
