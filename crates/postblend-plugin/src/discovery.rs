// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recursive scan of the plugin root for manifest files.
//!
//! Within a directory, `*.toml` files are read before descending into
//! subdirectories, and both are visited in name order. Each physical
//! directory is visited at most once, so symlink cycles terminate.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use postblend_core::PostblendError;
use tracing::{debug, warn};

use crate::manifest::{ManifestEntry, parse_manifest};

/// Entries exported by one manifest file.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub path: PathBuf,
    pub entries: Vec<ManifestEntry>,
}

/// Read every manifest under `root` in traversal order.
///
/// A missing root yields no manifests. Any unreadable directory or file, or
/// any manifest that fails to parse, aborts the scan.
pub fn scan(root: &Path) -> Result<Vec<ManifestSource>, PostblendError> {
    if !root.exists() {
        warn!(root = %root.display(), "plugin root does not exist, no plugins discovered");
        return Ok(Vec::new());
    }
    if !root.is_dir() {
        return Err(PostblendError::Discovery(format!(
            "plugin root {} is not a directory",
            root.display()
        )));
    }

    let mut visited = HashSet::new();
    let mut sources = Vec::new();
    walk(root, &mut visited, &mut sources)?;
    Ok(sources)
}

fn walk(
    dir: &Path,
    visited: &mut HashSet<PathBuf>,
    sources: &mut Vec<ManifestSource>,
) -> Result<(), PostblendError> {
    let canonical = fs::canonicalize(dir).map_err(|e| io_err(dir, e))?;
    if !visited.insert(canonical) {
        debug!(dir = %dir.display(), "directory already visited, skipping");
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io_err(dir, e))?;
    entries.sort();

    let (subdirs, files): (Vec<PathBuf>, Vec<PathBuf>) =
        entries.into_iter().partition(|p| p.is_dir());

    for path in files
        .into_iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
    {
        let content = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let manifest = parse_manifest(&content, &path.display().to_string())?;
        debug!(path = %path.display(), plugins = manifest.len(), "read plugin manifest");
        sources.push(ManifestSource {
            path,
            entries: manifest,
        });
    }

    for subdir in subdirs {
        walk(&subdir, visited, sources)?;
    }
    Ok(())
}

fn io_err(path: &Path, e: std::io::Error) -> PostblendError {
    PostblendError::Discovery(format!("cannot read {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manifest(id: &str) -> String {
        format!("[[plugin]]\nid = \"{id}\"\nversion = \"0.1.0\"\n")
    }

    fn ids(sources: &[ManifestSource]) -> Vec<String> {
        sources
            .iter()
            .flat_map(|s| s.entries.iter().map(|e| e.id.clone()))
            .collect()
    }

    #[test]
    fn files_before_subdirectories_in_name_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a_sub")).unwrap();
        fs::write(root.join("a_sub/inner.toml"), manifest("inner")).unwrap();
        fs::write(root.join("zeta.toml"), manifest("zeta")).unwrap();
        fs::write(root.join("beta.toml"), manifest("beta")).unwrap();
        fs::write(root.join("notes.txt"), "not a manifest").unwrap();

        let sources = scan(root).unwrap();
        assert_eq!(ids(&sources), vec!["beta", "zeta", "inner"]);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempdir().unwrap();
        assert!(scan(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.toml");
        fs::write(&file, manifest("x")).unwrap();
        assert!(matches!(scan(&file), Err(PostblendError::Discovery(_))));
    }

    #[test]
    fn parse_error_aborts_scan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.toml"), manifest("good")).unwrap();
        fs::write(dir.path().join("bad.toml"), "[[plugin]\nid = ").unwrap();
        assert!(scan(dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_terminates() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/p.toml"), manifest("p")).unwrap();
        std::os::unix::fs::symlink(root, root.join("sub/loop")).unwrap();

        let sources = scan(root).unwrap();
        assert_eq!(ids(&sources), vec!["p"]);
    }
}
