use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::ResourceError;
use crate::model::ResourceFormat;
use crate::services::encoding;

/// Read a resource file as text, tolerating legacy encodings.
pub fn read_text(path: &Path) -> Result<String, ResourceError> {
    let bytes = fs::read(path).map_err(|e| ResourceError::io(path, e))?;
    let decoded = encoding::decode(&bytes);

    if decoded.encoding != "utf-8" && decoded.encoding != "utf-8-sig" {
        warn!(
            "{} is not UTF-8, decoded as {}{}",
            path.display(),
            decoded.encoding,
            if decoded.had_errors { " (with replacement characters)" } else { "" }
        );
    }

    Ok(decoded.text)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ResourceError> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent).map_err(|e| ResourceError::io(parent, e))?;
    }

    fs::write(&tmp, bytes).map_err(|e| ResourceError::io(&tmp, e))?;

    if path.exists() {
        fs::remove_file(path).map_err(|e| ResourceError::io(path, e))?;
    }

    fs::rename(&tmp, path).map_err(|e| ResourceError::io(path, e))?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "resource".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}

/// Input files for `format`, as paths relative to `root`, sorted.
pub fn discover(root: &Path, format: ResourceFormat) -> Result<Vec<PathBuf>, ResourceError> {
    let mut out = Vec::new();
    walk(root, Path::new(""), &mut out)?;

    out.retain(|rel| format.accepts(rel));
    out.sort();
    Ok(out)
}

fn walk(dir: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> Result<(), ResourceError> {
    let entries = fs::read_dir(dir).map_err(|e| ResourceError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| ResourceError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| ResourceError::io(entry.path(), e))?;
        let rel = relative.join(entry.file_name());

        if file_type.is_dir() {
            walk(&entry.path(), &rel, out)?;
        } else if file_type.is_file() {
            out.push(rel);
        }
    }

    Ok(())
}
