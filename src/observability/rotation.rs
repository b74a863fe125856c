//! Security log rotation.
//!
//! # Responsibilities
//! - Rename active `*.log` files that grew past `max_size`
//! - Optionally rename active files untouched for a day
//! - Keep at most `max_files` `.log` files in the directory
//!
//! Rotated files are named `<stem>.<YYYY-MM-DD-HH-MM-SS>.log`, with a `.<n>`
//! counter before `.log` when two rotations land in the same second. A file
//! whose stem already carries a dot is considered rotated and is never renamed again.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::LogRotationConfig;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Snapshot of the log directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub file_count: usize,
    pub total_size: u64,
    pub max_files: usize,
    pub max_size: u64,
    pub rotate_daily: bool,
}

#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    name: String,
    size: u64,
    modified: SystemTime,
}

impl LogFile {
    fn is_active(&self) -> bool {
        self.name
            .strip_suffix(".log")
            .is_some_and(|stem| !stem.contains('.'))
    }
}

#[derive(Debug, Clone)]
pub struct LogRotator {
    dir: PathBuf,
    max_files: usize,
    max_size: u64,
    rotate_daily: bool,
}

impl LogRotator {
    pub fn new(dir: impl Into<PathBuf>, max_files: usize, max_size: u64, rotate_daily: bool) -> Self {
        Self {
            dir: dir.into(),
            max_files,
            max_size,
            rotate_daily,
        }
    }

    pub fn from_config(config: &LogRotationConfig) -> Self {
        Self::new(&config.dir, config.max_files, config.max_size_bytes, config.rotate_daily)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run one rotation pass. Returns the number of files renamed.
    ///
    /// A file that cannot be renamed or removed is logged and skipped; only
    /// failing to create or list the directory aborts the pass.
    pub fn rotate(&self) -> io::Result<usize> {
        fs::create_dir_all(&self.dir)?;

        let rotated = self.rotate_files(&self.log_files()?, SystemTime::now());
        self.prune(&self.log_files()?);
        Ok(rotated)
    }

    fn rotate_files(&self, files: &[LogFile], now: SystemTime) -> usize {
        let mut rotated = 0;
        for file in files.iter().filter(|f| f.is_active()) {
            let oversized = file.size > self.max_size;
            let stale = self.rotate_daily
                && now
                    .duration_since(file.modified)
                    .is_ok_and(|age| age > DAY);

            if oversized || stale {
                let target = self.rotated_path(&file.name);
                tracing::info!(from = ?file.path, to = ?target, oversized, stale, "Rotating log file");
                match fs::rename(&file.path, &target) {
                    Ok(()) => rotated += 1,
                    Err(e) => tracing::warn!(path = ?file.path, error = %e, "Failed to rotate log file"),
                }
            }
        }
        rotated
    }

    /// Remove everything past the newest `max_files`. Returns the number removed.
    fn prune(&self, files: &[LogFile]) -> usize {
        let mut removed = 0;
        for file in files.iter().skip(self.max_files) {
            tracing::info!(path = ?file.path, "Removing old log file");
            match fs::remove_file(&file.path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = ?file.path, error = %e, "Failed to remove old log file"),
            }
        }
        removed
    }

    /// Current directory usage. A missing directory reports as empty.
    pub fn stats(&self) -> io::Result<LogStats> {
        let files = match self.log_files() {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        Ok(LogStats {
            file_count: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
            max_files: self.max_files,
            max_size: self.max_size,
            rotate_daily: self.rotate_daily,
        })
    }

    /// `.log` files in the directory, newest first.
    fn log_files(&self) -> io::Result<Vec<LogFile>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".log") {
                continue;
            }
            // Files can vanish between listing and stat; skip them.
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            files.push(LogFile {
                path: entry.path(),
                name,
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(files)
    }

    /// `<stem>.<stamp>.log`, or `<stem>.<stamp>.<n>.log` when that name is taken.
    fn rotated_path(&self, name: &str) -> PathBuf {
        let stem = name.strip_suffix(".log").unwrap_or(name);
        let stamp = DateTime::<Local>::from(SystemTime::now()).format("%Y-%m-%d-%H-%M-%S");
        let mut target = self.dir.join(format!("{stem}.{stamp}.log"));
        let mut n = 1;
        while target.exists() {
            target = self.dir.join(format!("{stem}.{stamp}.{n}.log"));
            n += 1;
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, bytes: usize) {
        fs::write(dir.join(name), vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn test_rotates_oversized_active_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "security.log", 200);
        write(dir.path(), "access.log", 10);

        let rotator = LogRotator::new(dir.path(), 10, 100, false);
        assert_eq!(rotator.rotate().unwrap(), 1);

        assert!(!dir.path().join("security.log").exists());
        assert!(dir.path().join("access.log").exists());
        let rotated: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("security.") && n.ends_with(".log"))
            .collect();
        assert_eq!(rotated.len(), 1);
    }

    #[test]
    fn test_rotated_files_are_not_renamed_again() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "security.2024-01-01-00-00-00.log", 500);

        let rotator = LogRotator::new(dir.path(), 10, 100, true);
        assert_eq!(rotator.rotate().unwrap(), 0);
        assert!(dir.path().join("security.2024-01-01-00-00-00.log").exists());
    }

    #[test]
    fn test_keeps_at_most_max_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(dir.path(), &format!("app{i}.log"), 1);
        }
        write(dir.path(), "notes.txt", 1);

        let rotator = LogRotator::new(dir.path(), 2, 1024, false);
        rotator.rotate().unwrap();

        let stats = rotator.stats().unwrap();
        assert_eq!(stats.file_count, 2);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_stats_on_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = LogRotator::new(dir.path().join("absent"), 10, 1024, true);

        let stats = rotator.stats().unwrap();
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.total_size, 0);
        assert!(stats.rotate_daily);
    }

    fn rotated_names(dir: &Path, prefix: &str) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(prefix) && n.ends_with(".log"))
            .collect()
    }

    #[test]
    fn test_rotations_within_one_second_keep_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let rotator = LogRotator::new(dir.path(), 10, 100, false);

        write(dir.path(), "security.log", 200);
        assert_eq!(rotator.rotate().unwrap(), 1);
        write(dir.path(), "security.log", 300);
        assert_eq!(rotator.rotate().unwrap(), 1);
        write(dir.path(), "security.log", 400);
        assert_eq!(rotator.rotate().unwrap(), 1);

        let mut sizes: Vec<u64> = rotated_names(dir.path(), "security.")
            .iter()
            .map(|n| fs::metadata(dir.path().join(n)).unwrap().len())
            .collect();
        sizes.sort();
        assert_eq!(sizes, vec![200, 300, 400]);

        // Counter-suffixed names still count as rotated.
        assert_eq!(rotator.rotate().unwrap(), 0);
    }

    #[test]
    fn test_rename_failure_does_not_stop_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "security.log", 200);
        let rotator = LogRotator::new(dir.path(), 10, 100, false);

        let mut files = vec![LogFile {
            path: dir.path().join("gone.log"),
            name: "gone.log".to_string(),
            size: 500,
            modified: SystemTime::now(),
        }];
        files.extend(rotator.log_files().unwrap());

        assert_eq!(rotator.rotate_files(&files, SystemTime::now()), 1);
        assert!(!dir.path().join("security.log").exists());
        assert_eq!(rotated_names(dir.path(), "security.").len(), 1);
    }

    #[test]
    fn test_remove_failure_does_not_stop_retention() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write(dir.path(), &format!("app{i}.log"), 1);
        }
        let rotator = LogRotator::new(dir.path(), 1, 1024, false);

        let mut files = rotator.log_files().unwrap();
        files.insert(
            1,
            LogFile {
                path: dir.path().join("gone.log"),
                name: "gone.log".to_string(),
                size: 1,
                modified: SystemTime::UNIX_EPOCH,
            },
        );

        assert_eq!(rotator.prune(&files), 2);
        assert_eq!(rotator.stats().unwrap().file_count, 1);
    }
}
