//! Filesystem helpers for copying, moving, removing, and fingerprinting trees.
//!
//! A "tree" is either a single file or a directory walked recursively.
//! Symlinks are followed when copying, so cached entries never hold links
//! back into the build root.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rollover_common::{ContentHash, ContentHasher};
use walkdir::WalkDir;

use crate::error::CacheError;

/// Summary of a fingerprinted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeDigest {
    /// Digest over every relative file name and file content, in name order.
    pub hash: ContentHash,
    /// Number of regular files.
    pub files: usize,
    /// Total size of all files in bytes.
    pub bytes: u64,
}

/// Lists every regular file below `root` as `(relative, absolute)` pairs,
/// sorted by relative path. A missing root yields an empty list; a root that
/// is itself a file yields one entry with an empty relative path.
pub fn list_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, CacheError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        files.push((relative, entry.into_path()));
    }
    Ok(files)
}

/// Copies `src` into `dest`, overwriting files that already exist there.
///
/// Existing files in `dest` that are not in `src` are kept. Returns the number
/// of files copied; a missing `src` copies nothing.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize, CacheError> {
    let files = list_files(src)?;
    for (relative, absolute) in &files {
        let target = if relative.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(relative)
        };
        copy_file(absolute, &target)?;
    }
    // Empty directories still mark a present entry.
    if src.is_dir() && !dest.exists() {
        std::fs::create_dir_all(dest).map_err(|e| CacheError::io(dest, e))?;
    }
    Ok(files.len())
}

/// Copies one file, creating parent directories as needed.
pub fn copy_file(src: &Path, dest: &Path) -> Result<(), CacheError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    std::fs::copy(src, dest).map_err(|e| CacheError::io(src, e))?;
    Ok(())
}

/// Removes `dest` and replaces it with a copy of `src`.
pub fn replace_tree(src: &Path, dest: &Path) -> Result<usize, CacheError> {
    remove_tree(dest)?;
    copy_tree(src, dest)
}

/// Moves `src` to `dest`, which must not exist.
///
/// Falls back to copy-then-remove when a rename is not possible, such as when
/// the two paths are on different filesystems.
pub fn move_tree(src: &Path, dest: &Path) -> Result<(), CacheError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    copy_tree(src, dest)?;
    remove_tree(src)?;
    Ok(())
}

/// Returns the sibling path used to assemble a replacement for `path`.
///
/// The name is hidden and fixed, so a copy left behind by an interrupted run
/// is found and discarded by the next one.
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.staging"))
}

/// Replaces `dest` with the fully assembled `staged` tree.
///
/// `dest` is only removed once the replacement exists, and the final step is
/// a rename within the same directory.
pub fn swap_in(staged: &Path, dest: &Path) -> Result<(), CacheError> {
    remove_tree(dest)?;
    move_tree(staged, dest)
}

/// Removes a file or directory tree. Returns `false` if nothing was there.
pub fn remove_tree(path: &Path) -> Result<bool, CacheError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(CacheError::io(path, e)),
    };
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| CacheError::io(path, e))?;
    Ok(true)
}

/// Fingerprints a tree. Files are hashed in parallel and folded in name order,
/// so the digest depends only on names and contents.
pub fn digest_tree(root: &Path) -> Result<TreeDigest, CacheError> {
    let files = list_files(root)?;
    let hashed: Vec<(String, ContentHash, u64)> = files
        .par_iter()
        .map(|(relative, absolute)| {
            let data = std::fs::read(absolute).map_err(|e| CacheError::io(absolute, e))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Ok((name, ContentHash::from_bytes(&data), data.len() as u64))
        })
        .collect::<Result<_, CacheError>>()?;

    let mut hasher = ContentHasher::new();
    let mut bytes = 0;
    for (name, hash, size) in &hashed {
        hasher.update(name.as_bytes());
        hasher.update(hash.to_string().as_bytes());
        bytes += size;
    }
    Ok(TreeDigest {
        hash: hasher.finish(),
        files: hashed.len(),
        bytes,
    })
}

fn walk_error(root: &Path, e: walkdir::Error) -> CacheError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    CacheError::io(path, source)
}
