use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use chatrelay_core_sdk::error::RegistryError;
use chatrelay_core_sdk::prelude::*;

/**
 * \brief CLI entry point: run the API or drive the same operations from a terminal.
 */
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about = "Single-user chat relay for LLM HTTP providers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief Start the HTTP API (and the static UI when CHATRELAY_UI_DIR is set).
     */
    Serve {
        #[arg(long)]
        addr: Option<String>,
    },

    /**
     * \brief Manage registered providers.
     */
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },

    /**
     * \brief Send one message, record both sides in the history and print the reply.
     */
    Chat {
        /** \brief Model name of the provider to use */
        #[arg(long)]
        provider: String,
        #[arg(long)]
        message: String,
    },

    /**
     * \brief Inspect or reset the stored history.
     */
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ProviderCommands {
    /**
     * \brief Add a provider, replacing any entry with the same model.
     * \param token literal secret or env reference such as `env:OPENAI_API_KEY`
     */
    Add {
        #[arg(long)]
        model: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::Config::load().context("read configuration failed")?;
    telemetry::configure(config.telemetry_enabled, &config.log_dir);

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.addr = addr;
            }
            server::run(&config).await?;
        }
        Commands::Provider { command } => {
            let state = server::AppState::from_config(&config)?;
            provider_command(&state, command)?;
        }
        Commands::Chat { provider, message } => {
            let state = server::AppState::from_config(&config)?;
            chat_command(&state, &provider, &message).await?;
        }
        Commands::History { command } => {
            let state = server::AppState::from_config(&config)?;
            history_command(&state, command)?;
        }
    }

    Ok(())
}

fn provider_command(state: &server::AppState, command: ProviderCommands) -> Result<()> {
    match command {
        ProviderCommands::Add { model, url, token } => {
            match state.registry.add_provider(&model, &url, &token) {
                Ok(saved) => {
                    telemetry::log_event("cli.provider", &format!("saved model={}", saved.model));
                    println!("Saved provider {} ({})", saved.model, saved.url);
                }
                Err(RegistryError::Validation(err)) => bail!("invalid provider: {}", err),
                Err(RegistryError::Storage(err)) => {
                    return Err(err).context("save provider failed");
                }
            }
        }
        ProviderCommands::List => {
            let providers = state
                .registry
                .list_valid_providers()
                .context("load providers failed")?;
            if providers.is_empty() {
                println!(
                    "No valid providers, run: chatrelay provider add --model ... --url ... --token ..."
                );
            }
            for p in providers {
                println!("{}\t{}", p.model, p.url);
            }
        }
    }
    Ok(())
}

async fn chat_command(state: &server::AppState, provider: &str, message: &str) -> Result<()> {
    let prompt = message.trim();
    if prompt.is_empty() {
        bail!("message must not be empty");
    }
    state
        .history
        .append(models::ChatMessage::user(prompt, provider))
        .context("record user message failed")?;

    telemetry::log_event(
        "cli.chat",
        &format!("provider={} prompt_len={}", provider, prompt.len()),
    );
    let outcome = state
        .relay
        .send_message(provider, prompt)
        .await
        .context("load providers failed")?;
    if let Some(failure) = outcome.failure() {
        telemetry::log_warn("cli.chat", &format!("degraded reply: {:?}", failure));
    }

    let reply = outcome.into_message();
    println!("{}", reply.content);
    state
        .history
        .append(reply)
        .context("record assistant message failed")?;
    Ok(())
}

fn history_command(state: &server::AppState, command: HistoryCommands) -> Result<()> {
    match command {
        HistoryCommands::Show => {
            let history = state.history.load().context("load history failed")?;
            for m in history {
                println!(
                    "[{}] {} ({}): {}",
                    m.timestamp,
                    m.role.as_str(),
                    m.provider,
                    m.content
                );
            }
        }
        HistoryCommands::Clear => {
            state.history.clear().context("clear history failed")?;
            println!("History cleared");
        }
    }
    Ok(())
}
