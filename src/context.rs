//! Service context that selects the HTTP adapter for this run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::adapters::live::http::ReqwestHttpClient;
use crate::adapters::recording::http::RecordingHttpClient;
use crate::adapters::replaying::http::ReplayingHttpClient;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::error::DrawError;
use crate::ports::HttpClient;

/// Environment variable holding a cassette path to replay.
pub const REPLAY_ENV: &str = "GEMINI_DRAW_REPLAY";

/// Environment variable enabling recording (`1` or `true`).
pub const RECORD_ENV: &str = "GEMINI_DRAW_REC";

/// Bundles the port trait objects used by the plugin.
pub struct ServiceContext {
    /// HTTP port shared by the normalizer, converter and generator.
    pub http: Arc<dyn HttpClient>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Finish the recording and write the cassette to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let recorder = Arc::try_unwrap(self.recorder)
            .map_err(|_| "Recording adapter still has references".to_string())?
            .into_inner()
            .map_err(|e| format!("Recorder lock poisoned: {e}"))?;
        recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Pick the mode from the environment: replay, record, or live.
    ///
    /// # Errors
    ///
    /// Returns an error if a replay cassette cannot be loaded.
    pub fn from_env() -> Result<(Self, Option<RecordingSession>), DrawError> {
        if let Ok(cassette_path) = std::env::var(REPLAY_ENV) {
            info!("Replaying from: {cassette_path}");
            return Ok((Self::replaying(Path::new(&cassette_path))?, None));
        }

        let is_recording = std::env::var(RECORD_ENV).is_ok_and(|v| v == "true" || v == "1");
        if is_recording {
            info!("Recording mode enabled");
            let (ctx, session) = Self::recording();
            return Ok((ctx, Some(session)));
        }

        Ok((Self::live(), None))
    }

    /// Live context backed by `reqwest`.
    #[must_use]
    pub fn live() -> Self {
        Self { http: Arc::new(ReqwestHttpClient::new()) }
    }

    /// Live context whose HTTP traffic is recorded to a new cassette.
    #[must_use]
    pub fn recording() -> (Self, RecordingSession) {
        let live_ctx = Self::live();

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let output_dir = PathBuf::from(".gemini-draw/cassettes").join(&timestamp);

        let commit = get_commit_hash();
        let path = output_dir.join("http.cassette.yaml");
        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::new(path, format!("{timestamp}-http"), &commit)));

        let http = Arc::new(RecordingHttpClient::new(live_ctx.http, Arc::clone(&recorder)));

        (Self { http }, RecordingSession { recorder })
    }

    /// Replaying context from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, DrawError> {
        let replayer = load_cassette(path)
            .map_err(|e| DrawError::Config(format!("Failed to load cassette: {e}")))?;
        let replayer = Arc::new(Mutex::new(replayer));
        Ok(Self { http: Arc::new(ReplayingHttpClient::new(replayer)) })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}
