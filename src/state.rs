//! Mutable per-plugin state: model list, current model, shortcut prompts.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::Config;
use crate::model::AVAILABLE_MODELS;

/// State owned by one plugin instance for its whole lifetime.
#[derive(Debug, Clone)]
pub struct PluginState {
    available_models: Vec<String>,
    current_model: String,
    prompt_map: BTreeMap<String, String>,
}

/// Parse `"key: prompt"` items, splitting on the first `:`.
///
/// Items without a colon or with an empty key are skipped; later duplicates
/// replace earlier ones.
#[must_use]
pub fn parse_prompt_list(items: &[String]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for item in items {
        match item.split_once(':') {
            Some((key, prompt)) if !key.trim().is_empty() => {
                map.insert(key.trim().to_string(), prompt.trim().to_string());
            }
            _ => warn!("Skipping malformed prompt_list entry: {item}"),
        }
    }
    map
}

impl PluginState {
    /// Build the initial state from configuration.
    ///
    /// The configured model is used when it is available; otherwise the
    /// custom model, otherwise the first built-in one.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut available_models: Vec<String> =
            AVAILABLE_MODELS.iter().map(|m| (*m).to_string()).collect();
        let custom = config.custom_model();
        if let Some(custom) = custom {
            available_models.push(custom.to_string());
        }

        let configured = config.generation.model.trim();
        let current_model = if !configured.is_empty()
            && available_models.iter().any(|m| m == configured)
        {
            configured.to_string()
        } else if let Some(custom) = custom {
            custom.to_string()
        } else {
            available_models[0].clone()
        };

        let prompt_map = parse_prompt_list(&config.prompt_list);
        info!(
            "Plugin state ready: model {current_model}, {} models, {} shortcuts",
            available_models.len(),
            prompt_map.len()
        );

        Self { available_models, current_model, prompt_map }
    }

    /// All selectable models, in order.
    #[must_use]
    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// The model new requests use.
    #[must_use]
    pub fn current_model(&self) -> &str {
        &self.current_model
    }

    /// Shortcut name to prompt text.
    #[must_use]
    pub fn prompt_map(&self) -> &BTreeMap<String, String> {
        &self.prompt_map
    }

    /// Prompt for a shortcut name, if configured.
    #[must_use]
    pub fn shortcut(&self, name: &str) -> Option<&str> {
        self.prompt_map.get(name).map(String::as_str)
    }

    /// Advance to the next model, wrapping around. Returns the new model.
    pub fn cycle_model(&mut self) -> &str {
        let index = self.available_models.iter().position(|m| *m == self.current_model).unwrap_or(0);
        let next = (index + 1) % self.available_models.len();
        self.current_model = self.available_models[next].clone();
        info!("Switched model to {}", self.current_model);
        &self.current_model
    }

    /// Select a model by its 1-based position.
    ///
    /// # Errors
    ///
    /// Returns the number of available models when `number` is out of range.
    pub fn select_model(&mut self, number: usize) -> Result<&str, usize> {
        let count = self.available_models.len();
        if number == 0 || number > count {
            return Err(count);
        }
        self.current_model = self.available_models[number - 1].clone();
        info!("Selected model #{number}: {}", self.current_model);
        Ok(&self.current_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;

    fn config(model: &str, custom: Option<&str>, prompts: &[&str]) -> Config {
        Config {
            generation: GenerationConfig {
                model: model.into(),
                custom_model: custom.map(Into::into),
                ..GenerationConfig::default()
            },
            prompt_list: prompts.iter().map(|p| (*p).to_string()).collect(),
            ..Config::default()
        }
    }

    #[test]
    fn configured_model_is_used_when_available() {
        let state = PluginState::from_config(&config("gemini-3.0-pro-image-portrait", None, &[]));
        assert_eq!(state.current_model(), "gemini-3.0-pro-image-portrait");
        assert_eq!(state.available_models().len(), 6);
    }

    #[test]
    fn unknown_configured_model_falls_back_to_custom() {
        let state = PluginState::from_config(&config("nope", Some(" my-model "), &[]));
        assert_eq!(state.current_model(), "my-model");
        assert_eq!(state.available_models().len(), 7);
        assert_eq!(state.available_models()[6], "my-model");
    }

    #[test]
    fn unknown_model_without_custom_uses_first() {
        let state = PluginState::from_config(&config("nope", Some("  "), &[]));
        assert_eq!(state.current_model(), AVAILABLE_MODELS[0]);
        assert_eq!(state.available_models().len(), 6);
    }

    #[test]
    fn custom_model_can_be_the_configured_default() {
        let state = PluginState::from_config(&config("my-model", Some("my-model"), &[]));
        assert_eq!(state.current_model(), "my-model");
    }

    #[test]
    fn prompt_list_splits_on_first_colon() {
        let state = PluginState::from_config(&config(
            "",
            None,
            &["sketch: pencil sketch: soft", "no colon here", " anime :anime style", ": empty key"],
        ));
        assert_eq!(state.shortcut("sketch"), Some("pencil sketch: soft"));
        assert_eq!(state.shortcut("anime"), Some("anime style"));
        assert_eq!(state.prompt_map().len(), 2);
    }

    #[test]
    fn shortcut_keys_are_case_sensitive() {
        let state = PluginState::from_config(&config("", None, &["Sketch: a"]));
        assert_eq!(state.shortcut("sketch"), None);
        assert_eq!(state.shortcut("Sketch"), Some("a"));
    }

    #[test]
    fn cycle_wraps_around() {
        let mut state = PluginState::from_config(&config(AVAILABLE_MODELS[5], None, &[]));
        assert_eq!(state.cycle_model(), AVAILABLE_MODELS[0]);
        assert_eq!(state.cycle_model(), AVAILABLE_MODELS[1]);
    }

    #[test]
    fn select_is_one_based_and_bounded() {
        let mut state = PluginState::from_config(&Config::default());
        assert_eq!(state.select_model(2), Ok(AVAILABLE_MODELS[1]));
        assert_eq!(state.select_model(0), Err(6));
        assert_eq!(state.select_model(7), Err(6));
        assert_eq!(state.current_model(), AVAILABLE_MODELS[1]);
    }
}
