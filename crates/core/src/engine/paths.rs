//! Local destination paths for downloaded keys

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Target of a key downloaded as part of a recursive get.
///
/// Keeps the last segment of `original_prefix` as a directory under
/// `dest_root`, followed by the key relative to `original_prefix`:
/// getting `test/util/` into `out` writes `test/util/a/b` to `out/util/a/b`.
pub fn destination_path(
    dest_root: &Path,
    original_prefix: &str,
    key: &str,
    delimiter: &str,
) -> Result<PathBuf> {
    let mut target = dest_root.to_path_buf();

    let parent = original_prefix
        .strip_suffix(delimiter)
        .unwrap_or(original_prefix);
    let last_dir = last_segment(parent, delimiter);
    if !last_dir.is_empty() {
        push_segment(&mut target, last_dir, key)?;
    }

    let relative = key.strip_prefix(original_prefix).unwrap_or(key);
    let mut pushed = false;
    for segment in split_key(relative, delimiter) {
        push_segment(&mut target, segment, key)?;
        pushed = true;
    }
    if !pushed {
        return Err(Error::InvalidPath(format!(
            "key '{key}' has no file name below '{original_prefix}'"
        )));
    }

    Ok(target)
}

/// Target of a single key: its last segment directly under `dest_root`
pub fn single_key_path(dest_root: &Path, key: &str, delimiter: &str) -> Result<PathBuf> {
    let name = last_segment(key, delimiter);
    if name.is_empty() {
        return Err(Error::InvalidPath(format!("key '{key}' has no file name")));
    }
    let mut target = dest_root.to_path_buf();
    push_segment(&mut target, name, key)?;
    Ok(target)
}

fn last_segment<'a>(s: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return s;
    }
    s.rsplit(delimiter).next().unwrap_or(s)
}

fn split_key<'a>(relative: &'a str, delimiter: &'a str) -> impl Iterator<Item = &'a str> {
    let parts: Vec<&str> = if delimiter.is_empty() {
        vec![relative]
    } else {
        relative.split(delimiter).collect()
    };
    parts
        .into_iter()
        .flat_map(|p| p.split('/'))
        .filter(|p| !p.is_empty())
}

fn push_segment(target: &mut PathBuf, segment: &str, key: &str) -> Result<()> {
    if segment == "." || segment == ".." || segment.contains('\\') || segment.contains('\0') {
        return Err(Error::InvalidPath(format!(
            "key '{key}' contains unsafe path segment '{segment}'"
        )));
    }
    // a segment with a custom delimiter may still contain '/'
    for part in segment.split('/').filter(|p| !p.is_empty()) {
        if part == "." || part == ".." {
            return Err(Error::InvalidPath(format!(
                "key '{key}' contains unsafe path segment '{part}'"
            )));
        }
        target.push(part);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(original: &str, key: &str) -> PathBuf {
        destination_path(Path::new("out"), original, key, "/").unwrap()
    }

    #[test]
    fn test_keeps_last_prefix_segment() {
        assert_eq!(dest("dir/", "dir/b"), Path::new("out/dir/b"));
        assert_eq!(dest("test/", "test/util/a.txt"), Path::new("out/test/util/a.txt"));
        assert_eq!(
            dest("test/util/", "test/util/nested/deep/x"),
            Path::new("out/util/nested/deep/x")
        );
    }

    #[test]
    fn test_whole_bucket_has_no_prefix_dir() {
        assert_eq!(dest("", "a/b/c"), Path::new("out/a/b/c"));
    }

    #[test]
    fn test_rejects_traversal() {
        let err = destination_path(Path::new("out"), "dir/", "dir/../../etc/passwd", "/");
        assert!(matches!(err, Err(Error::InvalidPath(_))));
        assert!(single_key_path(Path::new("out"), "a/..", "/").is_err());
    }

    #[test]
    fn test_folder_marker_has_no_file_name() {
        assert!(destination_path(Path::new("out"), "dir/", "dir/", "/").is_err());
    }

    #[test]
    fn test_custom_delimiter() {
        let path = destination_path(Path::new("out"), "logs|", "logs|2024|jan", "|").unwrap();
        assert_eq!(path, Path::new("out/logs/2024/jan"));
    }

    #[test]
    fn test_single_key_uses_basename() {
        let path = single_key_path(Path::new("out"), "dir/sub/file.txt", "/").unwrap();
        assert_eq!(path, Path::new("out/file.txt"));
        assert!(single_key_path(Path::new("out"), "dir/", "/").is_err());
    }
}
