//! Page-level copies between the working database and its durable file

use rusqlite::backup::{Backup, StepResult};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BackupConfig;
use crate::error::{Error, Result};

/// Copy the in-memory database to `path`, replacing its contents.
pub fn save(conn: &Connection, path: &Path, config: &BackupConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Error::FileWriteError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let wrap = |source| Error::Backup {
        path: path.to_path_buf(),
        source,
    };
    let mut target = Connection::open(path).map_err(wrap)?;
    copy(conn, &mut target, config, "backup", path).map_err(wrap)
}

/// Replace the in-memory database with the contents of `path`.
pub fn restore(conn: &mut Connection, path: &Path, config: &BackupConfig) -> Result<()> {
    let wrap = |source| Error::Restore {
        path: path.to_path_buf(),
        source,
    };
    let source = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(wrap)?;
    copy(&source, conn, config, "restore", path).map_err(wrap)
}

fn copy(
    from: &Connection,
    to: &mut Connection,
    config: &BackupConfig,
    operation: &'static str,
    path: &Path,
) -> rusqlite::Result<()> {
    let backup = Backup::new(from, to)?;
    let pause = Duration::from_millis(config.pause_ms);
    let mut steps = 0u32;
    loop {
        let result = backup.step(config.pages_per_step)?;
        steps += 1;
        let progress = backup.progress();
        match result {
            StepResult::Done => {
                info!(
                    operation,
                    path = %path.display(),
                    pages = progress.pagecount,
                    steps,
                    "database copy complete"
                );
                return Ok(());
            }
            StepResult::More => {
                let percent = percent_done(progress.remaining, progress.pagecount);
                if config.progress {
                    info!(operation, percent, "database copy in progress");
                } else {
                    debug!(operation, percent, "database copy in progress");
                }
            }
            other => {
                debug!(operation, state = ?other, "database busy, retrying");
                std::thread::sleep(pause);
            }
        }
    }
}

fn percent_done(remaining: i32, pagecount: i32) -> f64 {
    if pagecount <= 0 {
        return 100.0;
    }
    (1.0 - remaining as f64 / pagecount as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_restore() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("nested").join("task.db");
        let config = BackupConfig {
            pages_per_step: 1,
            progress: true,
            ..Default::default()
        };

        let source = Connection::open_in_memory().unwrap();
        source
            .execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT); INSERT INTO notes (body) VALUES ('a'), ('b');")
            .unwrap();
        save(&source, &file, &config).unwrap();
        assert!(file.exists());

        let mut target = Connection::open_in_memory().unwrap();
        restore(&mut target, &file, &config).unwrap();
        let count: i64 = target.query_row("SELECT COUNT(*) FROM notes", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_restore_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let mut target = Connection::open_in_memory().unwrap();
        let err = restore(&mut target, &tmp.path().join("absent.db"), &BackupConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Restore { .. }));
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent_done(0, 8), 100.0);
        assert_eq!(percent_done(4, 8), 50.0);
    }
}
