//! Configuration file loading with environment variable overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default generation endpoint (an OpenAI-compatible chat completions API).
pub const DEFAULT_API_URL: &str = "http://172.17.0.1:8000/v1/chat/completions";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "imagen-4.0-generate-preview-landscape";

/// Default third-party URL-to-base64 conversion endpoint.
pub const DEFAULT_CONVERT_API_URL: &str = "https://api.s01s.cn/API/url_ba64/";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Generation API configuration.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversion API configuration.
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Shortcut definitions in `"key: prompt"` form.
    #[serde(default)]
    pub prompt_list: Vec<String>,
}

/// Generation API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat completions endpoint.
    pub api_url: String,
    /// Bearer token for the endpoint.
    pub api_key: Option<String>,
    /// Default model identifier.
    pub model: String,
    /// Extra model identifier appended to the built-in list.
    pub custom_model: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            custom_model: None,
        }
    }
}

/// Conversion API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Conversion endpoint, called with a `url` query parameter.
    pub api_url: String,
    /// Whether the conversion fallback may be used at all.
    pub enabled: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_CONVERT_API_URL.to_string(), enabled: true }
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Get the generation API key, preferring the environment variable.
    ///
    /// Blank values count as unset.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var("GEMINI_DRAW_API_KEY")
            .ok()
            .or_else(|| self.generation.api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    /// The custom model identifier, if one is configured.
    #[must_use]
    pub fn custom_model(&self) -> Option<&str> {
        self.generation.custom_model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `GEMINI_DRAW_CONFIG` environment variable
/// 3. `~/.config/gemini-draw/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("GEMINI_DRAW_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/gemini-draw/config.toml")
    } else {
        PathBuf::from("gemini-draw.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.generation.api_url, DEFAULT_API_URL);
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert!(config.generation.api_key.is_none());
        assert!(config.custom_model().is_none());
        assert_eq!(config.convert.api_url, DEFAULT_CONVERT_API_URL);
        assert!(config.convert.enabled);
        assert!(config.prompt_list.is_empty());
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let config = Config::load(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.generation.model, DEFAULT_MODEL);
    }

    #[test]
    fn load_valid_toml() {
        let dir = std::env::temp_dir().join("gemini_draw_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
prompt_list = ["sketch: pencil sketch", "noir: film noir still"]

[generation]
api_url = "http://localhost:9000/v1/chat/completions"
api_key = "sk-test"
model = "gemini-3.0-pro-image-portrait"
custom_model = "  my-model  "

[convert]
api_url = "http://localhost:9001/convert"
enabled = false
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.generation.api_url, "http://localhost:9000/v1/chat/completions");
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.generation.model, "gemini-3.0-pro-image-portrait");
        assert_eq!(config.custom_model(), Some("my-model"));
        assert_eq!(config.convert.api_url, "http://localhost:9001/convert");
        assert!(!config.convert.enabled);
        assert_eq!(config.prompt_list.len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: Config = toml::from_str("[convert]\nenabled = false\n").unwrap();
        assert!(!config.convert.enabled);
        assert_eq!(config.convert.api_url, DEFAULT_CONVERT_API_URL);
        assert_eq!(config.generation.model, DEFAULT_MODEL);
    }

    #[test]
    fn load_invalid_toml() {
        let dir = std::env::temp_dir().join("gemini_draw_config_bad_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        assert!(Config::load(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn blank_custom_model_is_ignored() {
        let config = Config {
            generation: GenerationConfig {
                custom_model: Some("   ".into()),
                ..GenerationConfig::default()
            },
            ..Config::default()
        };
        assert!(config.custom_model().is_none());
    }

    #[test]
    fn discover_explicit_path() {
        let path = discover_config_path(Some("/tmp/my-config.toml"));
        assert_eq!(path, PathBuf::from("/tmp/my-config.toml"));
    }
}
