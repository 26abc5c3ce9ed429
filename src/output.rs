use chrono::Local;
use log::{info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::Semester;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ARCHIVE_DIR: &str = "archive";
const SNAPSHOTS_DIR: &str = "snapshots";
const LOGS_DIR: &str = "logs";

pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Directory tree of a single run.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub root: PathBuf,
    pub snapshots: PathBuf,
    pub logs: PathBuf,
}

impl RunLayout {
    /// Creates `<output_root>/<key>`, moving any previous run with the same
    /// key to `<output_root>/archive/<key>_<timestamp>` first.
    pub async fn prepare(output_root: &Path, key: &str) -> std::io::Result<Self> {
        let root = output_root.join(key);

        if fs::try_exists(&root).await? {
            let archive = output_root.join(ARCHIVE_DIR);
            fs::create_dir_all(&archive).await?;
            let mut destination = archive.join(format!("{}_{}", key, timestamp()));
            let mut n = 2;
            while fs::try_exists(&destination).await? {
                destination = archive.join(format!("{}_{}_{}", key, timestamp(), n));
                n += 1;
            }
            info!("Archiving previous run {} -> {}", root.display(), destination.display());
            fs::rename(&root, &destination).await?;
        }

        let layout = Self {
            snapshots: root.join(SNAPSHOTS_DIR),
            logs: root.join(LOGS_DIR),
            root,
        };

        for dir in [&layout.snapshots, &layout.logs] {
            fs::create_dir_all(dir).await?;
        }
        for semester in [Semester::First, Semester::Second, Semester::Unknown] {
            fs::create_dir_all(layout.semester_dir(semester)).await?;
        }

        Ok(layout)
    }

    pub fn semester_dir(&self, semester: Semester) -> PathBuf {
        self.root.join(semester.dir_name())
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs.join(format!("run_{}.log", timestamp()))
    }

    /// Writes a page verbatim for later inspection. Never fails the caller.
    pub async fn save_snapshot(&self, name: &str, body: &str) -> Option<PathBuf> {
        let path = self.snapshots.join(format!("{}_{}.html", name, timestamp()));
        match fs::write(&path, body).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to save snapshot {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// `dir/stem.ext`, or `dir/stem_2.ext`, `dir/stem_3.ext`... if taken.
pub async fn unique_path(dir: &Path, stem: &str, extension: &str) -> std::io::Result<PathBuf> {
    let mut path = dir.join(format!("{}.{}", stem, extension));
    let mut n = 2;
    while fs::try_exists(&path).await? {
        path = dir.join(format!("{}_{}.{}", stem, n, extension));
        n += 1;
    }
    Ok(path)
}
