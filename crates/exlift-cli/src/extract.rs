//! Host-side extraction of files and directory trees
//!
//! Failures inside a tree are warnings, not fatal: a directory with a stale
//! cluster or one unreadable file should not abort the rest of the walk.

use chrono::{Local, NaiveDateTime, TimeZone};
use exlift_core::{ReadAt, Result};
use exlift_exfat::{normalize_path, ExfatVolume};
use log::warn;
use std::fs;
use std::path::Path;

/// Extract `src` into `dest_dir`. Files land at `dest_dir/<name>`;
/// directories are walked recursively with their contents placed directly
/// under `dest_dir`.
pub fn extract_path<R: ReadAt>(
    source: &mut R,
    volume: &ExfatVolume,
    src: &str,
    dest_dir: &Path,
) -> Result<()> {
    let src = normalize_path(src);
    let entry = volume.resolve(source, &src)?;

    if entry.is_dir {
        extract_tree(source, volume, &src, dest_dir)
    } else {
        extract_file(source, volume, &src, &dest_dir.join(&entry.name), entry.mtime)
    }
}

fn extract_tree<R: ReadAt>(
    source: &mut R,
    volume: &ExfatVolume,
    src: &str,
    dest: &Path,
) -> Result<()> {
    let entries = volume.list_dir(source, src)?;
    fs::create_dir_all(dest)?;

    for entry in entries {
        let src_child = join_image_path(src, &entry.name);
        let dest_child = dest.join(&entry.name);

        if entry.is_dir {
            if let Err(e) = fs::create_dir_all(&dest_child) {
                warn!("failed to create directory {}: {}", dest_child.display(), e);
                continue;
            }
            if let Err(e) = extract_tree(source, volume, &src_child, &dest_child) {
                // Empty or stale-cluster directories end up here; the
                // directory itself is already on disk.
                warn!("directory {} is empty or inaccessible: {}", entry.name, e);
            }
        } else if let Err(e) =
            extract_file(source, volume, &src_child, &dest_child, entry.mtime)
        {
            warn!("failed to extract {}: {}", src_child, e);
        }
    }

    Ok(())
}

fn extract_file<R: ReadAt>(
    source: &mut R,
    volume: &ExfatVolume,
    src: &str,
    dest: &Path,
    mtime: Option<NaiveDateTime>,
) -> Result<()> {
    let data = volume.read_file(source, src)?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, &data)?;

    if let Some(mtime) = mtime {
        apply_mtime(dest, mtime);
    }
    Ok(())
}

/// Best-effort: stamp the extracted file with the in-image modification
/// time, interpreted as local time.
fn apply_mtime(path: &Path, mtime: NaiveDateTime) {
    let Some(local) = Local.from_local_datetime(&mtime).single() else {
        return;
    };
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(local.into()));
    if let Err(e) = result {
        warn!("failed to set modification time on {}: {}", path.display(), e);
    }
}

fn join_image_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}
