pub mod config;

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use ayunis_models::{
    build_handler_registries, AssistantContent, GetAvailableModelsUseCase, GetInferenceCommand,
    GetInferenceUseCase, Message, Model, ModelError, ModelProvider, StreamInferenceChunk,
    StreamInferenceUseCase,
};
use futures_util::StreamExt;
use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use config::{
    default_config_path, load_config, parse_config, AyunisConfig, ConfigError, LogConfig,
};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Inference(#[from] ModelError),

    #[error("write output failed: {0}")]
    Output(#[from] io::Error),

    #[error("encode output failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Models,
    Ask(PromptRequest),
    Stream(PromptRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub provider: ModelProvider,
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub timeout: Option<Duration>,
    /// Print the full response as JSON instead of plain text.
    pub json: bool,
}

impl PromptRequest {
    fn into_command(self) -> GetInferenceCommand {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.filter(|system| !system.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(self.prompt));
        let command = GetInferenceCommand::new(Model::new(self.model, self.provider), messages);
        match self.timeout {
            Some(timeout) => command.with_timeout(timeout),
            None => command,
        }
    }
}

pub fn init_tracing(config: &LogConfig) {
    static TRACE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    let file_layer = match config.file_path.as_deref().map(open_log_writer) {
        Some(Ok(writer)) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);
            let _ = TRACE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
        }
        Some(Err(error)) => {
            eprintln!("warning: failed to initialize ayunis tracing writer: {error}");
            None
        }
        None => None,
    };
    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(io::stderr)
    });
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if let Err(error) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("warning: failed to initialize ayunis tracing subscriber: {error}");
    }
}

fn open_log_writer(path: &Path) -> Result<RollingFileAppender, String> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("log path {} has no file name", path.display()))?;
    std::fs::create_dir_all(dir)
        .map_err(|error| format!("create {} failed: {error}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .map_err(|error| format!("open {} failed: {error}", path.display()))
}

pub async fn run_command<W: Write>(
    config: &AyunisConfig,
    command: CliCommand,
    out: &mut W,
) -> Result<(), CliError> {
    let models = Arc::new(config.models.clone());
    match command {
        CliCommand::Models => {
            for entry in GetAvailableModelsUseCase::new(models).execute() {
                let mut flags = Vec::new();
                if entry.config.can_stream {
                    flags.push("stream");
                }
                if entry.config.is_reasoning {
                    flags.push("reasoning");
                }
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    entry.model.provider,
                    entry.model.name,
                    entry.config.display_name,
                    flags.join(",")
                )?;
            }
        }
        CliCommand::Ask(request) => {
            let (inference, _) = build_handler_registries(&config.inference);
            let use_case = GetInferenceUseCase::new(models, Arc::new(inference));
            let json = request.json;
            let response = use_case.execute(request.into_command()).await?;
            info!(
                input_tokens = ?response.meta.input_tokens,
                output_tokens = ?response.meta.output_tokens,
                "inference finished"
            );
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
                return Ok(());
            }
            for part in &response.content {
                match part {
                    AssistantContent::Text(text) => writeln!(out, "{}", text.text)?,
                    AssistantContent::ToolUse(_) => {
                        writeln!(out, "{}", serde_json::to_string(part)?)?
                    }
                }
            }
        }
        CliCommand::Stream(request) => {
            let (_, streaming) = build_handler_registries(&config.inference);
            let use_case = StreamInferenceUseCase::new(models, Arc::new(streaming));
            let json = request.json;
            let mut stream = use_case.execute(request.into_command()).await?;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if json {
                    writeln!(out, "{}", serde_json::to_string(&chunk)?)?;
                    continue;
                }
                match &chunk {
                    StreamInferenceChunk::TextDelta { delta } => write!(out, "{delta}")?,
                    StreamInferenceChunk::ToolCallDelta { .. } => {
                        writeln!(out)?;
                        writeln!(out, "{}", serde_json::to_string(&chunk)?)?;
                    }
                    StreamInferenceChunk::Finished { finish_reason, meta } => {
                        writeln!(out)?;
                        info!(
                            finish_reason = ?finish_reason,
                            output_tokens = ?meta.output_tokens,
                            "stream finished"
                        );
                    }
                }
                out.flush()?;
            }
        }
    }
    Ok(())
}
