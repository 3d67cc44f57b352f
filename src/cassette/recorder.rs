//! Records interactions into a cassette file.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::format::{Cassette, Interaction};

/// Collects interactions in arrival order and writes them as one YAML file.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    cassette: Cassette,
}

impl CassetteRecorder {
    /// Start a session that will be written to `path` on [`finish`](Self::finish).
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self::started_at(path, name, commit, Utc::now())
    }

    fn started_at(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let cassette =
            Cassette { name: name.into(), recorded_at, commit: commit.into(), interactions: Vec::new() };
        Self { path: path.into(), cassette }
    }

    /// Append one interaction; `seq` is its arrival index.
    pub fn record(
        &mut self,
        port: impl Into<String>,
        method: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        let seq = self.cassette.interactions.len() as u64;
        let interaction = Interaction { seq, port: port.into(), method: method.into(), input, output };
        debug!("Recorded {}::{} as #{seq}", interaction.port, interaction.method);
        self.cassette.interactions.push(interaction);
    }

    /// Write the cassette, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, std::io::Error> {
        let yaml = serde_yaml::to_string(&self.cassette).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, yaml)?;
        debug!(
            "Wrote {} interactions to {}",
            self.cassette.interactions.len(),
            self.path.display()
        );
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_and_finish() {
        let dir = std::env::temp_dir().join("gemini_draw_cassette_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("http.cassette.yaml");

        let mut recorder = CassetteRecorder::new(&path, "test-recording", "deadbeef");
        recorder.record(
            "http",
            "get",
            json!({"method": "GET", "url": "https://img/cat.png"}),
            json!({"Ok": {"status": 200, "body": ""}}),
        );
        recorder.record(
            "http",
            "post",
            json!({"method": "POST", "url": "https://api/v1/chat/completions"}),
            json!({"Err": "Request timed out after 120s"}),
        );

        let result_path = recorder.finish().expect("finish should succeed");
        assert_eq!(result_path, path);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("https://img/cat.png"));
        assert!(content.contains("timed out"));

        let cassette: Cassette = serde_yaml::from_str(&content).unwrap();
        assert_eq!(cassette.commit, "deadbeef");
        assert_eq!(cassette.interactions.len(), 2);
        assert_eq!(cassette.interactions[0].seq, 0);
        assert_eq!(cassette.interactions[1].seq, 1);
        assert_eq!(cassette.interactions[1].method, "post");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn recorded_at_is_session_start() {
        let at = DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let path = std::env::temp_dir().join("gemini_draw_cassette_start_test.yaml");

        CassetteRecorder::started_at(&path, "empty", "unknown", at).finish().unwrap();

        let cassette: Cassette = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(cassette.recorded_at, at);
        assert!(cassette.interactions.is_empty());

        let _ = std::fs::remove_file(&path);
    }
}
