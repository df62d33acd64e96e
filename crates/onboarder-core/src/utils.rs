//! Utils module.
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Joins an operator supplied file name onto a storage root.
///
/// Returns `None` for names that are empty, absolute or climb out of the root with `..`.
pub fn confined_path(root: &Path, name: &Path) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut depth = 0;
    for component in name.components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if depth == 0 {
        return None;
    }
    Some(path)
}

/// Replaces the file at `path` with `contents`.
///
/// The data is written to a temporary file in the target directory which is then renamed over
/// `path`, so an interrupted write never leaves a truncated file behind. Missing parent
/// directories are created.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Removes a single trailing line terminator (`\n` or `\r\n`).
pub fn strip_line_terminator(contents: &str) -> &str {
    contents
        .strip_suffix("\r\n")
        .or_else(|| contents.strip_suffix('\n'))
        .unwrap_or(contents)
}
