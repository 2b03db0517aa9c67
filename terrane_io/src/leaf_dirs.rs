// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapping of leaf paths to directories.
//!
//! Leaf `p` of a dataset rooted at `root` lives in `root/<p as lowercase hex>/`. Paths encode the
//! full route from the tree root, so sibling leaves never share a directory.

use std::fs;
use std::io;
use std::path::{Path as FsPath, PathBuf};

use terrane_tree::Path;

use crate::error::{IoError, Result};

/// Directory layout of one partitioned dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafDirs {
    root: PathBuf,
}

impl LeafDirs {
    /// Layout under `root`. Nothing is created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Dataset root.
    pub fn root(&self) -> &FsPath {
        &self.root
    }

    /// Directory of leaf `path`.
    pub fn leaf_dir(&self, path: Path) -> PathBuf {
        self.root.join(format!("{path:x}"))
    }

    /// File `name` of leaf `path`. Nothing is created.
    pub fn leaf_file(&self, path: Path, name: &str) -> PathBuf {
        self.leaf_dir(path).join(name)
    }

    /// File `name` of leaf `path`, creating the leaf directory if needed.
    pub fn create_leaf_file(&self, path: Path, name: &str) -> io::Result<PathBuf> {
        let dir = self.leaf_dir(path);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(name))
    }

    /// Paths of every leaf directory present, ascending.
    ///
    /// Entries whose names are not hex paths are ignored.
    pub fn list_leaves(&self) -> Result<Vec<Path>> {
        let mut out = Vec::new();
        if !self.root.exists() {
            return Ok(out);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(p) = u64::from_str_radix(&name, 16)
                && p != 0
            {
                out.push(p);
            }
        }
        out.sort_unstable();
        Ok(out)
    }
}

/// Make sure `dir` exists and is empty, creating it if missing.
///
/// Fails with [`IoError::Precondition`] if `dir` is a file or already has entries.
pub fn ensure_empty_dir(dir: &FsPath) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(IoError::Precondition(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        if fs::read_dir(dir)?.next().is_some() {
            return Err(IoError::Precondition(format!(
                "output directory {} is not empty",
                dir.display()
            )));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| {
        IoError::Precondition(format!("cannot create {}: {e}", dir.display()))
    })
}
