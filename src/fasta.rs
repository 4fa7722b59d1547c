//! Line-level FASTA handling: header renaming and id-based extraction.
//!
//! Sequence lines are never parsed; only lines starting with `>` are touched.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::BuildError;
use crate::fs_util;

pub const UNKNOWN_PREFIX: &str = "UNKNOWN_";

/// Old identifier to new identifier, loaded from a two-column table.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    names: HashMap<String, String>,
}

impl HeaderMap {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, BuildError> {
        let mut names = HashMap::new();
        for line in reader.lines() {
            let line = line.map_err(|err| BuildError::Filesystem(err.to_string()))?;
            let mut columns = if line.contains('\t') {
                line.split('\t').map(str::trim).collect::<Vec<_>>()
            } else {
                line.split_whitespace().collect::<Vec<_>>()
            };
            columns.retain(|column| !column.is_empty());
            if let [old, new, ..] = columns.as_slice() {
                names.insert(old.to_string(), new.to_string());
            }
        }
        Ok(Self { names })
    }

    pub fn from_path(path: &Path) -> Result<Self, BuildError> {
        Self::from_reader(fs_util::open_text(path)?)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.names.get(old).map(String::as_str)
    }

    /// The mapped name, or the original prefixed with `UNKNOWN_`.
    pub fn rename(&self, old: &str) -> String {
        match self.get(old) {
            Some(new) => new.to_string(),
            None => format!("{UNKNOWN_PREFIX}{old}"),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(old, new)| (old.into(), new.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub renamed: usize,
    pub unknown: usize,
}

/// Rewrites every header through `map`, copying all other lines verbatim.
/// Line endings (`\n` or `\r\n`) are kept as they appear in the input.
pub fn rename<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    map: &HeaderMap,
) -> Result<RenameStats, BuildError> {
    let mut stats = RenameStats::default();
    let mut line = String::new();
    while read_raw_line(&mut input, &mut line)? {
        let (body, ending) = split_terminator(&line);
        let written = match body.strip_prefix('>') {
            Some(header) => {
                let id = header.trim();
                let new = match map.get(id) {
                    Some(new) => {
                        stats.renamed += 1;
                        new.to_string()
                    }
                    None => {
                        stats.unknown += 1;
                        debug!("no mapping for header {id}");
                        map.rename(id)
                    }
                };
                write!(output, ">{new}{ending}")
            }
            None => output.write_all(line.as_bytes()),
        };
        written.map_err(|err| BuildError::Filesystem(err.to_string()))?;
    }
    output
        .flush()
        .map_err(|err| BuildError::Filesystem(err.to_string()))?;
    Ok(stats)
}

/// Reads one line including its terminator; `false` at end of input.
fn read_raw_line<R: BufRead>(input: &mut R, line: &mut String) -> Result<bool, BuildError> {
    line.clear();
    let read = input
        .read_line(line)
        .map_err(|err| BuildError::Filesystem(err.to_string()))?;
    Ok(read > 0)
}

fn split_terminator(line: &str) -> (&str, &str) {
    let body = match line.strip_suffix('\n') {
        Some(body) => body.strip_suffix('\r').unwrap_or(body),
        None => line,
    };
    (body, &line[body.len()..])
}

pub fn rename_file(
    sequences: &Path,
    mapping: &Path,
    destination: &Path,
) -> Result<RenameStats, BuildError> {
    let map = HeaderMap::from_path(mapping)?;
    info!("loaded {} header mappings from {}", map.len(), mapping.display());
    let input = fs_util::open_text(sequences)?;
    let mut stats = RenameStats::default();
    fs_util::write_atomic(destination, |writer| {
        stats = rename(input, writer, &map)?;
        Ok(())
    })?;
    Ok(stats)
}

/// Reads one id per line, ignoring blank lines.
pub fn read_ids<R: BufRead>(reader: R) -> Result<HashSet<String>, BuildError> {
    let mut ids = HashSet::new();
    for line in reader.lines() {
        let line = line.map_err(|err| BuildError::Filesystem(err.to_string()))?;
        let id = line.trim();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Copies the records whose id (first header token) is in `ids`. Returns the number kept.
pub fn extract<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    ids: &HashSet<String>,
) -> Result<usize, BuildError> {
    let mut keep = false;
    let mut kept = 0;
    let mut line = String::new();
    while read_raw_line(&mut input, &mut line)? {
        let (body, _) = split_terminator(&line);
        if let Some(header) = body.strip_prefix('>') {
            let id = header.split_whitespace().next().unwrap_or_default();
            keep = ids.contains(id);
            if keep {
                info!("found matching id: {id}");
                kept += 1;
            }
        }
        if keep {
            output
                .write_all(line.as_bytes())
                .map_err(|err| BuildError::Filesystem(err.to_string()))?;
        }
    }
    output
        .flush()
        .map_err(|err| BuildError::Filesystem(err.to_string()))?;
    Ok(kept)
}

pub fn extract_file(ids: &Path, input: &Path, destination: &Path) -> Result<usize, BuildError> {
    fs_util::require_non_empty(input)?;
    let ids = read_ids(fs_util::open_text(ids)?)?;
    let reader = fs_util::open_text(input)?;
    let mut kept = 0;
    fs_util::write_atomic(destination, |writer| {
        kept = extract(reader, writer, &ids)?;
        Ok(())
    })?;
    Ok(kept)
}
