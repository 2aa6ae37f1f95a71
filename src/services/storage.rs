use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FileError;

/// Mirror a directory into the target tree.
pub fn ensure_dir(path: &Path) -> Result<(), FileError> {
    fs::create_dir_all(path).map_err(|e| FileError::io(path, e))
}

/// Byte-for-byte copy, creating intermediate directories.
pub fn copy_file(source: &Path, target: &Path) -> Result<(), FileError> {
    if let Some(parent) = target.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(source, target).map_err(|e| FileError::io(target, e))?;
    Ok(())
}

/// Replace `path` with `bytes` so readers see either the old file or the
/// complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FileError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp = tmp_path(path);

    if let Err(e) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(FileError::io(&tmp, e));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FileError::io(path, e)
    })
}

/// Read a file that may legitimately be absent.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, FileError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FileError::io(path, e)),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "target".to_string(),
    };
    p.set_file_name(format!(".{file_name}.docsync-tmp"));
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn copy_is_byte_identical_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("logo.png");
        let bytes: Vec<u8> = (0..=255u8).collect();
        fs::write(&src, &bytes).unwrap();

        let dst = dir.path().join("out/assets/logo.png");
        copy_file(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), bytes);
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/a.md");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let names: Vec<String> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md".to_string()]);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_optional(&dir.path().join("nope.md")).unwrap(), None);
    }
}
