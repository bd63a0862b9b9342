use answerpipe::answer::SummarizeConfig;
use answerpipe::http::{app, AppState};
use anyhow::{Context, Result};
use answerpipe_local::{
    extract::ReadabilityExtractor, openai::OpenAiClient, serpapi::SerpApiProvider, LocalFetcher,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "answerpipe")]
#[command(about = "Web search answer service (SerpApi + OpenAI function calls)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server.
    Serve(ServeCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor,
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
    /// Timeout for each outbound call (search, fetch, model), in ms.
    #[arg(long, default_value_t = 30_000)]
    call_timeout_ms: u64,
    /// Overall deadline for one summary request, in ms.
    #[arg(long, default_value_t = 120_000)]
    deadline_ms: u64,
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => {
            let client = reqwest::Client::new();
            let provider =
                SerpApiProvider::from_env(client.clone()).context("search provider config")?;
            let model = OpenAiClient::from_env(client).context("language model config")?;
            let fetcher = LocalFetcher::new().context("page fetcher")?;
            let extractor =
                ReadabilityExtractor::new(fetcher).with_limits(args.call_timeout_ms, 2 * 1024 * 1024);

            let state = AppState {
                provider: Arc::new(provider),
                model: Arc::new(model),
                extractor: Arc::new(extractor),
                cfg: SummarizeConfig {
                    call_timeout_ms: Some(args.call_timeout_ms),
                    deadline_ms: Some(args.deadline_ms),
                    ..SummarizeConfig::default()
                },
            };

            let listener = tokio::net::TcpListener::bind(&args.bind)
                .await
                .with_context(|| format!("bind {}", args.bind))?;
            tracing::info!(addr = %args.bind, "answerpipe listening");
            axum::serve(listener, app(state)).await?;
        }
        Commands::Doctor => {
            // Env presence (booleans only; never print values).
            let serpapi_configured =
                has_env("ANSWERPIPE_SERPAPI_API_KEY") || has_env("SERPAPI_API_KEY");
            let openai_configured =
                has_env("ANSWERPIPE_OPENAI_API_KEY") || has_env("OPENAI_API_KEY");

            let mut checks: Vec<serde_json::Value> = Vec::new();
            checks.push(serde_json::json!({
                "name": "serpapi_key_present",
                "ok": serpapi_configured,
                "hint": if serpapi_configured { "" } else { "Set ANSWERPIPE_SERPAPI_API_KEY (or SERPAPI_API_KEY)." },
            }));
            checks.push(serde_json::json!({
                "name": "openai_key_present",
                "ok": openai_configured,
                "hint": if openai_configured { "" } else { "Set ANSWERPIPE_OPENAI_API_KEY (or OPENAI_API_KEY)." },
            }));

            let out = serde_json::json!({
                "ok": serpapi_configured && openai_configured,
                "serpapi_configured": serpapi_configured,
                "openai_configured": openai_configured,
                "checks": checks,
            });
            println!("{}", serde_json::to_string(&out)?);
        }
        Commands::Version => {
            let out = serde_json::json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            });
            println!("{}", serde_json::to_string(&out)?);
        }
    }
    Ok(())
}
