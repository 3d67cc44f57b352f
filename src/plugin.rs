//! Chat command dispatch and reply formatting.

use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::converter::{ImageOutcome, UrlConverter};
use crate::datauri;
use crate::error::DrawError;
use crate::generator::{GenerationRequest, GenerationResult, RetryGenerator};
use crate::locator::{ImageLocator, ImageReference};
use crate::message::ChatMessage;
use crate::model::{describe, ModelDescriptor};
use crate::normalizer::ImageNormalizer;
use crate::output::{format_elapsed, mask_key, preview, Reply, ReplySink};
use crate::ports::HttpClient;
use crate::state::PluginState;

const MISSING_PROMPT: &str = "Please enter a description";
const NO_PROMPTS: &str = "No custom prompts configured.";
const RULE: &str = "--------------";

/// What a built-in command does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Draw,
    Remix,
    SwitchModel,
    CurrentModel,
    ListModels,
    SelectModel,
    ListPrompts,
    ShowSettings,
}

#[derive(Clone, Copy, Debug)]
struct CommandSpec {
    command: &'static str,
    usage: &'static str,
    action: Action,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec { command: "draw", usage: "/draw <prompt>", action: Action::Draw },
    CommandSpec { command: "remix", usage: "/remix <prompt>", action: Action::Remix },
    CommandSpec { command: "switch-model", usage: "/switch-model", action: Action::SwitchModel },
    CommandSpec { command: "current-model", usage: "/current-model", action: Action::CurrentModel },
    CommandSpec { command: "models", usage: "/models", action: Action::ListModels },
    CommandSpec { command: "select-model", usage: "/select-model <n>", action: Action::SelectModel },
    CommandSpec { command: "prompts", usage: "/prompts", action: Action::ListPrompts },
    CommandSpec { command: "settings", usage: "/settings", action: Action::ShowSettings },
];

/// Split message text into its first word and the trimmed remainder.
fn split_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    })
}

fn builtin(word: &str) -> Option<&'static CommandSpec> {
    let name = word.strip_prefix('/')?;
    COMMANDS.iter().find(|spec| spec.command == name)
}

/// First 50 characters of the prompt, for progress replies.
fn prompt_head(prompt: &str) -> String {
    prompt.chars().take(50).collect()
}

fn model_summary(descriptor: &ModelDescriptor) -> String {
    format!(
        "- Name: {}\n- Type: {}\n- Orientation: {}\n- Description: {}",
        descriptor.name, descriptor.kind, descriptor.orientation, descriptor.description
    )
}

/// The image-generation chat plugin.
pub struct DrawPlugin {
    api_url: String,
    api_key: Option<String>,
    state: RwLock<PluginState>,
    locator: ImageLocator,
    normalizer: ImageNormalizer,
    generator: RetryGenerator,
}

impl DrawPlugin {
    /// Build a plugin from configuration, sending all HTTP through `http`.
    pub fn new(config: &Config, api_key: Option<String>, http: Arc<dyn HttpClient>) -> Self {
        let converter =
            UrlConverter::new(Arc::clone(&http), &config.convert.api_url, config.convert.enabled);
        info!(
            "Conversion API {}",
            if config.convert.enabled { "enabled" } else { "disabled" }
        );
        Self {
            api_url: config.generation.api_url.clone(),
            generator: RetryGenerator::new(
                Arc::clone(&http),
                &config.generation.api_url,
                api_key.clone(),
            ),
            api_key,
            state: RwLock::new(PluginState::from_config(config)),
            locator: ImageLocator::default(),
            normalizer: ImageNormalizer::new(http, converter),
        }
    }

    fn state(&self) -> RwLockReadGuard<'_, PluginState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, PluginState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_api_key(&self) -> Result<(), DrawError> {
        self.api_key.as_ref().map(|_| ()).ok_or(DrawError::MissingApiKey)
    }

    fn current_model(&self) -> String {
        self.state().current_model().to_string()
    }

    /// Handle one chat message, sending replies to `sink` as they happen.
    ///
    /// Returns `false` when the message is not addressed to this plugin.
    pub async fn handle(&self, message: &ChatMessage, sink: &mut dyn ReplySink) -> bool {
        let text = message.text();
        let Some((word, rest)) = split_command(&text) else {
            return false;
        };

        if let Some(spec) = builtin(word) {
            info!("Command /{} {}", spec.command, preview(rest, 50));
            match spec.action {
                Action::Draw => self.draw(rest, sink).await,
                Action::Remix => self.remix(message, rest, sink).await,
                Action::SwitchModel => self.switch_model(sink),
                Action::CurrentModel => self.show_current_model(sink),
                Action::ListModels => self.list_models(sink),
                Action::SelectModel => self.select_model(rest, sink),
                Action::ListPrompts => self.list_prompts(sink),
                Action::ShowSettings => self.show_settings(sink),
            }
            return true;
        }

        let name = word.trim_start_matches('/');
        let prompt = self.state().shortcut(name).map(str::to_string);
        match prompt {
            Some(prompt) => {
                info!("Shortcut [{name}]");
                self.shortcut(message, name, &prompt, sink).await;
                true
            }
            None => false,
        }
    }

    async fn draw(&self, prompt: &str, sink: &mut dyn ReplySink) {
        if prompt.is_empty() {
            sink.send(Reply::text(MISSING_PROMPT));
            return;
        }
        if let Err(e) = self.require_api_key() {
            sink.send(Reply::text(e.to_string()));
            return;
        }

        let start = Instant::now();
        sink.send(Reply::text(format!("Generating: {}...", prompt_head(prompt))));
        let request = GenerationRequest::text_to_image(self.current_model(), prompt);
        let result = self.generator.generate(&request).await;
        report(&result, start, sink);
    }

    async fn remix(&self, message: &ChatMessage, prompt: &str, sink: &mut dyn ReplySink) {
        if prompt.is_empty() {
            sink.send(Reply::text(MISSING_PROMPT));
            return;
        }
        if let Err(e) = self.require_api_key() {
            sink.send(Reply::text(e.to_string()));
            return;
        }

        let start = Instant::now();
        let image = match self.locator.locate(message) {
            None => {
                sink.send(Reply::text(
                    "No image found. Either:\n\
                     1. Send an image with /remix <prompt>\n\
                     2. Quote an image message with /remix <prompt>\n\
                     3. Mention a user with /remix <prompt> (uses their avatar)",
                ));
                return;
            }
            Some(ImageReference::Inline(data_uri)) => {
                sink.send(Reply::text(format!(
                    "Inline image detected (base64 length: {})",
                    datauri::payload(&data_uri).len()
                )));
                data_uri
            }
            Some(ImageReference::Remote(url)) => match self.normalizer.normalize(&url).await {
                ImageOutcome::Ready(data_uri) => data_uri,
                ImageOutcome::Failed(reason) => {
                    sink.send(Reply::text(format!(
                        "Image conversion failed\nReason: {reason}\nSource URL: {}",
                        preview(&url, 200)
                    )));
                    return;
                }
                ImageOutcome::Unavailable => {
                    sink.send(Reply::text(format!(
                        "Image conversion failed\nReason: the conversion API is disabled\nSource URL: {}",
                        preview(&url, 200)
                    )));
                    return;
                }
                ImageOutcome::Diagnostic(block) => {
                    sink.send(Reply::text(format!(
                        "Image conversion failed, debug information:\n{block}"
                    )));
                    return;
                }
            },
        };

        sink.send(Reply::text(format!(
            "Image ready (base64 length: {})\nGenerating from image: {}...",
            datauri::payload(&image).len(),
            prompt_head(prompt)
        )));
        let request = GenerationRequest::image_to_image(self.current_model(), prompt, image.as_str());
        let result = self.generator.generate(&request).await;

        if result.success {
            report(&result, start, sink);
        } else {
            sink.send(Reply::text(format!(
                "Image generation failed (elapsed: {})\n\
                 {RULE}\n\
                 Base64 diagnosis:\n\
                 - length: {}\n\
                 - head: {}\n\
                 {RULE}\n\
                 API error details:\n{}",
                format_elapsed(start.elapsed()),
                image.len(),
                preview(&image, 100),
                result.text
            )));
        }
    }

    async fn shortcut(
        &self,
        message: &ChatMessage,
        name: &str,
        prompt: &str,
        sink: &mut dyn ReplySink,
    ) {
        if let Err(e) = self.require_api_key() {
            sink.send(Reply::text(e.to_string()));
            return;
        }

        let start = Instant::now();
        let found = self.locator.locate(message);
        let found_any = found.is_some();
        let image = match found {
            None => None,
            Some(ImageReference::Inline(data_uri)) => Some(data_uri),
            Some(ImageReference::Remote(url)) => {
                match self.normalizer.converter().convert(&url).await {
                    ImageOutcome::Ready(data_uri) => Some(data_uri),
                    other => {
                        warn!("Shortcut [{name}]: image conversion failed ({other:?})");
                        None
                    }
                }
            }
        };

        let model = self.current_model();
        let request = match image {
            Some(data_uri) => {
                sink.send(Reply::text(format!("Running shortcut [{name}]... (image-to-image mode)")));
                GenerationRequest::image_to_image(model, prompt, data_uri)
            }
            None if found_any => {
                sink.send(Reply::text(format!(
                    "Running shortcut [{name}]... (text-to-image mode, image conversion failed)"
                )));
                GenerationRequest::text_to_image(model, prompt)
            }
            None => {
                sink.send(Reply::text(format!("Running shortcut [{name}]... (text-to-image mode)")));
                GenerationRequest::text_to_image(model, prompt)
            }
        };

        let result = self.generator.generate(&request).await;
        report(&result, start, sink);
    }

    fn switch_model(&self, sink: &mut dyn ReplySink) {
        let model = self.state_mut().cycle_model().to_string();
        sink.send(Reply::text(format!(
            "Model switched to: {model}\n\nModel info:\n{}\n\n\
             Tip: /current-model shows details, /models lists all available models",
            model_summary(&describe(&model))
        )));
    }

    fn show_current_model(&self, sink: &mut dyn ReplySink) {
        let model = self.current_model();
        let d = describe(&model);
        sink.send(Reply::text(format!(
            "Current model:\n\nIdentifier:\n{model}\n\nBasics:\n{}\n\n\
             Technical:\n- Supports: {}\n- Recommended use: {}",
            model_summary(&d),
            d.capabilities,
            d.recommended_use
        )));
    }

    fn list_models(&self, sink: &mut dyn ReplySink) {
        let state = self.state();
        let entries: Vec<String> = state
            .available_models()
            .iter()
            .enumerate()
            .map(|(i, model)| {
                let d = describe(model);
                let marker = if model == state.current_model() { " <- current" } else { "" };
                format!("{}. {model}{marker}\n   {} | {} | {}", i + 1, d.name, d.kind, d.orientation)
            })
            .collect();
        let text = format!(
            "Available models ({}):\n\n{}\n\nUsage:\n\
             - /switch-model - switch to the next model\n\
             - /current-model - show current model details\n\
             - /select-model <number> - select a model directly",
            entries.len(),
            entries.join("\n\n")
        );
        drop(state);
        sink.send(Reply::text(text));
    }

    fn select_model(&self, arg: &str, sink: &mut dyn ReplySink) {
        let mut state = self.state_mut();
        let count = state.available_models().len();
        let text = match arg.parse::<usize>() {
            Ok(number) => match state.select_model(number) {
                Ok(model) => format!(
                    "Selected model #{number}: {model}\n\nModel info:\n{}",
                    model_summary(&describe(model))
                ),
                Err(_) => format!("Please enter a number between 1 and {count}"),
            },
            Err(_) => format!("Please enter a number between 1 and {count}"),
        };
        drop(state);
        sink.send(Reply::text(text));
    }

    fn list_prompts(&self, sink: &mut dyn ReplySink) {
        let keys: Vec<String> = self.state().prompt_map().keys().cloned().collect();
        let Some(first) = keys.first() else {
            sink.send(Reply::text(NO_PROMPTS));
            return;
        };

        let mut text = format!("Loaded {} shortcut prompts:\n{RULE}\n", keys.len());
        for key in &keys {
            let _ = writeln!(text, "- {key}");
        }
        let _ = write!(text, "{RULE}\nUsage: send the shortcut name directly (e.g. /{first})");
        sink.send(Reply::text(text));
    }

    fn show_settings(&self, sink: &mut dyn ReplySink) {
        let state = self.state();
        let model = state.current_model().to_string();
        let shortcuts = state.prompt_map().len();
        drop(state);

        let d = describe(&model);
        let converter = self.normalizer.converter();
        let mut text = format!(
            "Gemini draw plugin v{}\n\n\
             Basic settings:\n\
             - API URL: {}\n\
             - API key: {}\n\
             - Current model: {model}\n\
             - Model name: {}\n\
             - Orientation: {}\n\
             - Custom shortcuts: {shortcuts}\n\n\
             Image pipeline:\n\
             - Conversion API: {}\n\
             - Conversion URL: {}\n\
             - Flow: URL -> local normalize (conversion API fallback) -> base64 -> generation API\n\n\
             Commands:",
            env!("CARGO_PKG_VERSION"),
            self.api_url,
            mask_key(self.api_key.as_deref()),
            d.name,
            d.orientation,
            if converter.enabled() { "enabled" } else { "disabled" },
            converter.endpoint(),
        );
        for spec in COMMANDS {
            let _ = write!(text, "\n- {}", spec.usage);
        }
        sink.send(Reply::text(text));
    }
}

/// Send the standard success or failure reply for a finished generation.
fn report(result: &GenerationResult, start: Instant, sink: &mut dyn ReplySink) {
    let elapsed = format_elapsed(start.elapsed());
    if result.success {
        sink.send(Reply::text(format!("Image generated!\nTotal time: {elapsed}")));
        sink.send(Reply::Image(result.text.clone()));
    } else {
        sink.send(Reply::text(format!(
            "Image generation failed (elapsed: {elapsed})\n\nError details:\n{}",
            result.text
        )));
    }
}
