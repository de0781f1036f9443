//! Archive naming and retention
//!
//! Archives live next to the active file as `<path>.<suffix>`, where the
//! suffix is the archive's interval formatted with the unit's pattern. The
//! patterns are zero-padded and ordered most significant first, so suffixes
//! of one unit sort chronologically as plain strings.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use super::RotationUnit;

/// Path of the archive covering `at`
pub fn archive_path(
    path: &Path,
    unit: RotationUnit,
    at: DateTime<Utc>,
    offset: FixedOffset,
) -> PathBuf {
    let suffix = at.with_timezone(&offset).format(unit.suffix_format());
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix.to_string());
    PathBuf::from(name)
}

/// Whether `suffix` is a well-formed archive suffix for `unit`
pub fn is_archive_suffix(suffix: &str, unit: RotationUnit) -> bool {
    match unit {
        RotationUnit::Hourly => {
            suffix.len() == 13
                && NaiveDateTime::parse_from_str(&format!("{}:00", suffix), "%Y-%m-%d_%H:%M")
                    .is_ok()
        }
        RotationUnit::Daily | RotationUnit::Weekly => {
            suffix.len() == 10 && NaiveDate::parse_from_str(suffix, "%Y-%m-%d").is_ok()
        }
    }
}

/// All archives of `path` for `unit`, oldest first
pub fn list_archives(path: &Path, unit: RotationUnit) -> io::Result<Vec<PathBuf>> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(suffix) = name
            .to_str()
            .and_then(|n| n.strip_prefix(file_name))
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            continue;
        };
        if is_archive_suffix(suffix, unit) {
            archives.push((suffix.to_string(), dir.join(&name)));
        }
    }

    archives.sort();
    Ok(archives.into_iter().map(|(_, path)| path).collect())
}

/// Remove the one archive that just left the retention window.
///
/// Exactly `retention` archives cover the intervals before the active one,
/// so the archive `retention + 1` intervals back is the one to drop. Missing
/// files are the common case and are not an error.
pub(crate) fn prune_expired(
    path: &Path,
    unit: RotationUnit,
    retention: u32,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> bool {
    let generations = i32::try_from(retention).unwrap_or(i32::MAX).saturating_add(1);
    let Some(expired_at) = unit
        .interval()
        .checked_mul(generations)
        .and_then(|age| now.checked_sub_signed(age))
    else {
        return false;
    };
    fs::remove_file(archive_path(path, unit, expired_at, offset)).is_ok()
}

/// Delete every archive of `path` older than the retention window.
///
/// Catches up on archives the per-rotation prune never saw, for example
/// after downtime spanning several intervals. Returns the number of files
/// deleted.
pub fn sweep_expired_archives(
    path: &Path,
    unit: RotationUnit,
    retention: u32,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> io::Result<usize> {
    let oldest_kept = unit
        .interval()
        .checked_mul(i32::try_from(retention).unwrap_or(i32::MAX))
        .and_then(|age| now.checked_sub_signed(age));
    let Some(oldest_kept) = oldest_kept else {
        return Ok(0);
    };
    let cutoff = oldest_kept
        .with_timezone(&offset)
        .format(unit.suffix_format())
        .to_string();

    let mut deleted_count = 0;
    for archive in list_archives(path, unit)? {
        let Some(suffix) = archive
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.rsplit('.').next())
        else {
            continue;
        };
        if suffix < cutoff.as_str() && fs::remove_file(&archive).is_ok() {
            deleted_count += 1;
        }
    }

    Ok(deleted_count)
}
