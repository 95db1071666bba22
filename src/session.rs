//! Session management for sweep output directories.
//!
//! Each sweep writes into its own directory:
//! - Unique session directories under a global base location
//! - Automatic cleanup unless explicitly preserved
//! - Session metadata tracking (`.session.json`)

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config;
use crate::runner::SweepReport;
use crate::table::OutputTable;

const METADATA_FILE: &str = ".session.json";
const TABLE_FILE: &str = "table.json";
const SUMMARY_FILE: &str = "summary.json";

/// Output directory of one sweep
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Whether to keep files after session ends
    pub keep: bool,
}

#[derive(Serialize)]
struct SessionMetadata<'a> {
    id: &'a str,
    created: String,
    host: Option<String>,
    catalog: Option<&'a Path>,
}

impl Session {
    /// Create a new session with a unique ID
    pub fn new() -> Self {
        let id = generate_session_id();
        let dir = PathBuf::from(config::session_base_dir()).join(&id);

        Self { id, dir, keep: false }
    }

    /// Create a session with a specific name/prefix
    pub fn with_name(name: &str) -> Self {
        let id = format!("{}_{}", sanitize_name(name), generate_timestamp_suffix());
        let dir = PathBuf::from(config::session_base_dir()).join(&id);

        Self { id, dir, keep: false }
    }

    /// Use a caller-chosen directory; kept by default
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(generate_session_id);

        Self { id, dir, keep: true }
    }

    /// Set whether to keep files after session ends
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Create the directory and write session metadata
    pub fn init(&self, catalog: Option<&Path>) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let metadata = SessionMetadata {
            id: &self.id,
            created: chrono::Utc::now().to_rfc3339(),
            host: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
            catalog,
        };
        fs::write(self.dir.join(METADATA_FILE), serde_json::to_string_pretty(&metadata)?)?;
        Ok(())
    }

    pub fn table_path(&self) -> PathBuf {
        self.dir.join(TABLE_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// Persist the output table and the sweep summary
    pub fn save(&self, table: &OutputTable, report: &SweepReport) -> std::io::Result<()> {
        table.save(&self.table_path())?;
        fs::write(self.summary_path(), serde_json::to_string_pretty(report)?)
    }

    /// Clean up the session directory
    pub fn cleanup(&self) -> std::io::Result<()> {
        if self.dir.exists() && !self.keep {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("sweep_{}_{}", timestamp, std::process::id())
}

fn generate_timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Clean up sessions older than `max_age` under `base`
pub fn cleanup_sessions_in(base: &Path, max_age: std::time::Duration) -> std::io::Result<usize> {
    if !base.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > max_age) && fs::remove_dir_all(&path).is_ok() {
            cleaned += 1;
        }
    }
    Ok(cleaned)
}

/// List session directories under `base`
pub fn list_sessions_in(base: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base)? {
        let path = entry?.path();
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}

/// Clean up old sessions under the configured base directory
pub fn cleanup_old_sessions(max_age: std::time::Duration) -> std::io::Result<usize> {
    cleanup_sessions_in(Path::new(&config::session_base_dir()), max_age)
}

/// List all existing sessions under the configured base directory
pub fn list_sessions() -> std::io::Result<Vec<PathBuf>> {
    list_sessions_in(Path::new(&config::session_base_dir()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Outcome, RunRecord};
    use std::time::Duration;

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert!(session.id.starts_with("sweep_"));
        assert!(session.dir.starts_with(config::session_base_dir()));
        assert!(!session.keep);
    }

    #[test]
    fn test_session_with_name() {
        let session = Session::with_name("benefits screener");
        assert!(session.id.starts_with("benefits_screener_"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("hello world"), "hello_world");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name("catalog.yaml"), "catalog_yaml");
    }

    #[test]
    fn test_init_and_save_outputs() {
        let base = tempfile::tempdir().unwrap();
        let session = Session::in_dir(base.path().join("run"));
        session.init(Some(Path::new("catalog.yaml"))).unwrap();

        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(session.dir.join(METADATA_FILE)).unwrap()).unwrap();
        assert_eq!(metadata["id"], "run");
        assert_eq!(metadata["catalog"], "catalog.yaml");

        let mut table = OutputTable::new("Sweep");
        table.set_header(0, "Q");
        table.push_row();
        let now = chrono::Utc::now();
        let report = SweepReport {
            completed: true,
            error: None,
            exhaustive: Vec::new(),
            runs: vec![RunRecord { run: 1, combination: Vec::new(), outcome: Outcome::Success }],
            started: now,
            finished: now,
        };
        session.save(&table, &report).unwrap();

        assert_eq!(OutputTable::load(&session.table_path()).unwrap(), table);
        assert!(session.summary_path().exists());
    }

    #[test]
    fn test_list_and_cleanup_in_base() {
        let base = tempfile::tempdir().unwrap();
        fs::create_dir_all(base.path().join("b")).unwrap();
        fs::create_dir_all(base.path().join("a")).unwrap();
        fs::write(base.path().join("stray.txt"), "x").unwrap();

        let sessions = list_sessions_in(base.path()).unwrap();
        assert_eq!(sessions, vec![base.path().join("a"), base.path().join("b")]);

        assert_eq!(cleanup_sessions_in(base.path(), Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(list_sessions_in(&base.path().join("missing")).unwrap(), Vec::<PathBuf>::new());
    }

    #[test]
    fn test_unkept_session_is_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("temp");
        {
            let session = Session::in_dir(&dir).keep(false);
            session.init(None).unwrap();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
    }
}
