//! Cassette loading for replay mode.

use std::path::Path;

use super::format::Cassette;
use super::replayer::CassetteReplayer;

/// Load a cassette file and create a replayer.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_cassette(path: &Path) -> Result<CassetteReplayer, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
    let cassette: Cassette = serde_yaml::from_str(&content)
        .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;
    Ok(CassetteReplayer::new(&cassette))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_handwritten_cassette() {
        let dir = std::env::temp_dir().join("gemini_draw_cassette_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("http.cassette.yaml");
        std::fs::write(
            &path,
            "name: handwritten\n\
             recorded_at: \"2026-02-01T00:00:00Z\"\n\
             commit: test\n\
             interactions:\n  \
               - seq: 0\n    \
                 port: http\n    \
                 method: post\n    \
                 output:\n      \
                   Ok:\n        \
                     status: 500\n        \
                     body: \"\"\n",
        )
        .unwrap();

        let mut replayer = load_cassette(&path).unwrap();
        let interaction = replayer.next_interaction("http", "post").unwrap();
        assert_eq!(interaction.seq, 0);
        assert_eq!(interaction.output["Ok"]["status"], 500);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_nonexistent_fails() {
        assert!(load_cassette(Path::new("/nonexistent/cassette.yaml")).is_err());
    }
}
