//! Expansion of CLI photo arguments (files or directories) into an ordered
//! image list.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::Error;

/// Return `true` if `path` has an extension the decode pipeline accepts.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    let exts: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "tif", "tiff"];
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| *e == ext)
        })
}

/// Expand each argument: files pass through unchanged (and in order),
/// directories are walked recursively with hidden dot-directories skipped.
pub fn collect_photos(args: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let mut out = Vec::new();
    for arg in args {
        if arg.is_file() {
            out.push(arg.clone());
            continue;
        }
        if !arg.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is neither a file nor a directory", arg.display()),
            )));
        }
        let mut found: Vec<PathBuf> = WalkDir::new(arg)
            .into_iter()
            .filter_entry(|e| !should_skip_dir(e))
            .flatten()
            .filter(|e| e.path().is_file() && is_supported_image(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

fn should_skip_dir(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 {
        return false;
    }
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}
