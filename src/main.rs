//! gemini-draw - chat image generation plugin with a command-line host.

mod adapters;
mod cassette;
mod cli;
mod config;
mod context;
mod converter;
mod datauri;
mod error;
mod generator;
mod imaging;
mod locator;
mod message;
mod model;
mod normalizer;
mod output;
mod plugin;
mod ports;
mod state;
#[cfg(test)]
mod testing;

use std::process;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::context::ServiceContext;
use crate::error::DrawError;
use crate::message::ChatMessage;
use crate::output::StdoutSink;
use crate::plugin::DrawPlugin;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "gemini_draw=debug" } else { "gemini_draw=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), DrawError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    debug!("Config path: {}", config_path.display());
    let config = Config::load(&config_path).map_err(DrawError::Config)?;
    let single = cli.to_message()?;

    let (ctx, recording_session) = ServiceContext::from_env()?;
    let api_key = config.api_key();
    if api_key.is_none() {
        warn!("{}", DrawError::MissingApiKey);
    }
    let plugin = DrawPlugin::new(&config, api_key, ctx.http);
    let mut sink = StdoutSink;

    match single {
        Some(message) => {
            if !plugin.handle(&message, &mut sink).await {
                debug!("Message not handled: {}", message.text());
            }
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let message = ChatMessage::from_line(&line);
                if !plugin.handle(&message, &mut sink).await {
                    debug!("Message not handled: {}", message.text());
                }
            }
        }
    }

    drop(plugin);
    if let Some(session) = recording_session {
        match session.finish() {
            Ok(path) => info!("Cassette saved: {}", path.display()),
            Err(e) => warn!("Failed to save cassette: {e}"),
        }
    }

    Ok(())
}
