use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::BuildError;

/// Opens a text input, decompressing transparently when the name ends in `.gz`.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>, BuildError> {
    if !path.exists() {
        return Err(BuildError::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)
        .map_err(|err| BuildError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gz = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Fails when `path` is missing or has zero length.
pub fn require_non_empty(path: &Path) -> Result<(), BuildError> {
    let metadata =
        fs::metadata(path).map_err(|_| BuildError::MissingInput(path.to_path_buf()))?;
    if metadata.len() == 0 {
        return Err(BuildError::EmptyInput(path.to_path_buf()));
    }
    Ok(())
}

/// Writes through a temp file in the destination directory, so `dest` only
/// appears once `write` has succeeded.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<(), BuildError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), BuildError>,
{
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| BuildError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".nextstrain-autobuild")
        .tempfile_in(parent)
        .map_err(|err| BuildError::Filesystem(err.to_string()))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|err| BuildError::Filesystem(err.to_string()))?;
    }
    temp.persist(dest)
        .map_err(|err| BuildError::Filesystem(format!("write {}: {err}", dest.display())))?;
    Ok(())
}
