use std::path::PathBuf;
use std::time::Duration;

use ayunis_cli::{run_command, CliCommand, PromptRequest};
use ayunis_models::ModelProvider;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ayunis", version, about = "Ayunis model inference CLI")]
struct Cli {
    /// Defaults to ~/.ayunis/ayunis.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: AyunisSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
enum AyunisSubcommand {
    /// List the models this deployment can serve.
    Models,
    /// Send one prompt and print the answer.
    Ask(PromptArgs),
    /// Send one prompt and print the answer as it streams in.
    Stream(PromptArgs),
}

#[derive(Args, Debug, Clone)]
struct PromptArgs {
    #[arg(long, value_parser = parse_provider)]
    provider: ModelProvider,
    #[arg(long)]
    model: String,
    #[arg(long)]
    system: Option<String>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long, default_value_t = false)]
    json: bool,
    prompt: String,
}

impl From<PromptArgs> for PromptRequest {
    fn from(args: PromptArgs) -> Self {
        Self {
            provider: args.provider,
            model: args.model,
            system: args.system,
            prompt: args.prompt,
            timeout: args.timeout_ms.map(Duration::from_millis),
            json: args.json,
        }
    }
}

fn parse_provider(value: &str) -> Result<ModelProvider, String> {
    value.parse().map_err(|error: ayunis_models::ModelError| error.message)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match ayunis_cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    };
    ayunis_cli::init_tracing(&config.log);

    let command = match cli.command {
        AyunisSubcommand::Models => CliCommand::Models,
        AyunisSubcommand::Ask(args) => CliCommand::Ask(args.into()),
        AyunisSubcommand::Stream(args) => CliCommand::Stream(args.into()),
    };
    let mut stdout = std::io::stdout();
    if let Err(error) = run_command(&config, command, &mut stdout).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_ask_command() {
        let parsed = Cli::try_parse_from([
            "ayunis",
            "ask",
            "--provider",
            "OpenAI",
            "--model",
            "gpt-4o",
            "--timeout-ms",
            "5000",
            "What is 2+2?",
        ])
        .expect("ask should parse");

        let AyunisSubcommand::Ask(args) = parsed.command else {
            panic!("expected ask subcommand");
        };
        let request = PromptRequest::from(args);
        assert_eq!(request.provider, ModelProvider::OpenAi);
        assert_eq!(request.prompt, "What is 2+2?");
        assert_eq!(request.timeout, Some(Duration::from_millis(5_000)));
    }

    #[test]
    fn cli_rejects_unknown_provider() {
        let parsed = Cli::try_parse_from([
            "ayunis", "stream", "--provider", "cohere", "--model", "command-r", "hi",
        ]);
        assert!(parsed.is_err(), "cohere should not parse as a provider");
    }

    #[test]
    fn cli_parses_config_global_flag() {
        let parsed = Cli::try_parse_from(["ayunis", "models", "--config", "/tmp/ayunis.toml"])
            .expect("--config should parse as global flag");
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/ayunis.toml")));
    }
}
