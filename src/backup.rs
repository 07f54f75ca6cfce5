use std::path::{Path, PathBuf};

/// Best-effort timestamped snapshots of a config file, taken before every
/// mutation and pruned to a retention cap. A failed backup is logged and
/// swallowed: losing a snapshot must never block a user-visible write.
#[derive(Clone, Debug)]
pub struct BackupManager {
    dir: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>, max_backups: usize) -> Self {
        Self {
            dir: dir.into(),
            max_backups,
        }
    }

    /// Copy `source` to `<dir>/<basename>.<timestamp>.backup`, then prune
    /// older snapshots of the same file. Returns the archive path, or None
    /// if anything went wrong.
    pub fn create_backup(&self, source: &Path) -> Option<PathBuf> {
        let result = self.try_create_backup(source);
        if let Err(ref err) = result {
            log::error!("failed to back up {}: {err}", source.display());
        }
        result.ok()
    }

    fn try_create_backup(&self, source: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let basename = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "config".to_string());
        let backup_name = format!("{basename}.{}.backup", filename_timestamp(unix_millis_now()));
        let backup_path = self.dir.join(&backup_name);
        std::fs::copy(source, &backup_path)?;
        log::info!("backup created: {backup_name}");

        // Pruning runs only after the copy completed, so the snapshot just
        // taken is always a deletion candidate ranked newest.
        self.prune(&basename);
        Ok(backup_path)
    }

    /// Delete snapshots of `basename` beyond the retention cap, newest
    /// kept. The ISO-style timestamp embedded in the name sorts
    /// lexicographically in chronological order.
    fn prune(&self, basename: &str) {
        let mut backups = self.list_backups(basename);
        if backups.len() <= self.max_backups {
            return;
        }
        backups.sort_by(|a, b| b.cmp(a));
        for name in backups.drain(self.max_backups..) {
            match std::fs::remove_file(self.dir.join(&name)) {
                Ok(()) => log::info!("deleted old backup: {name}"),
                Err(err) => log::error!("failed to delete old backup {name}: {err}"),
            }
        }
    }

    /// Snapshot filenames for `basename`, unordered.
    pub fn list_backups(&self, basename: &str) -> Vec<String> {
        let prefix = format!("{basename}.");
        let mut out = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with(&prefix) && name.ends_with(".backup") {
                    out.push(name);
                }
            }
        }
        out
    }
}

fn unix_millis_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// UTC timestamp shaped like an ISO-8601 instant with the characters that
/// are awkward in filenames (colons, dots) replaced by dashes:
/// `2026-08-25T12-34-56-789Z`.
pub fn filename_timestamp(unix_ms: u64) -> String {
    let secs = unix_ms / 1000;
    let millis = unix_ms % 1000;
    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}-{:02}-{:02}-{millis:03}Z",
        rem / 3600,
        (rem / 60) % 60,
        rem % 60
    )
}

// Days-since-epoch to Gregorian calendar date (Howard Hinnant's algorithm).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}
