use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use ai_shorts_pipeline::api::{BackendClient, ConfigScope};
use ai_shorts_pipeline::config::Config;
use ai_shorts_pipeline::settings::SettingsStore;
use ai_shorts_pipeline::steps::PIPELINE;
use ai_shorts_pipeline::{
    GenerationError, GenerationRequest, LogSink, Orchestrator, init, platform,
};

const USAGE: &str = "usage: ai-shorts [--config PATH] [--mothership TEXT] [--prompt TEXT] \
[--genre NAME] [--agent TIER] [--open] [--no-retry]";

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    mothership: Option<String>,
    prompt: Option<String>,
    genre: Option<String>,
    agent: Option<String>,
    open: bool,
    no_retry: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{flag} needs a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--config" => out.config = Some(PathBuf::from(value("--config")?)),
            "--mothership" => out.mothership = Some(value("--mothership")?),
            "--prompt" => out.prompt = Some(value("--prompt")?),
            "--genre" => out.genre = Some(value("--genre")?),
            "--agent" => out.agent = Some(value("--agent")?),
            "--open" => out.open = true,
            "--no-retry" => out.no_retry = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}\n{USAGE}"),
        }
    }
    Ok(out)
}

async fn ask_retry() -> Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Retry? [y/N] ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let cfg = Config::load(args.config.clone().unwrap_or_else(|| PathBuf::from("config.json"))).await?;

    init::ensure_directories(&cfg).await?;

    let backend = BackendClient::new(&cfg)?;
    if !init::check_backend(backend.http(), backend.base_url()).await {
        tracing::warn!("Backend not reachable at {}", backend.base_url());
    }

    let genre = args.genre.clone().unwrap_or_else(|| cfg.default_genre.clone());
    let agent = args.agent.clone().unwrap_or_else(|| cfg.default_agent.clone());
    let settings = SettingsStore::new(
        backend.clone(),
        ConfigScope::new(genre.clone(), agent.clone()),
        cfg.settings_cache_path.clone(),
    );

    let (mut mothership, mut prompt) = (args.mothership.clone(), args.prompt.clone());
    if mothership.is_none() || prompt.is_none() {
        match settings.user().await {
            Ok(user) => {
                mothership = mothership.or(Some(user.last_used_mothership));
                prompt = prompt.or(Some(user.last_used_prompt));
            }
            Err(err) => tracing::warn!("Could not load last used inputs: {err}"),
        }
    }

    let request = GenerationRequest::new(mothership.unwrap_or_default(), prompt.unwrap_or_default())
        .with_genre(genre.clone())
        .with_agent(agent);

    let mut orchestrator = Orchestrator::from_config(backend, request.clone(), &cfg)?
        .with_sink(Arc::new(LogSink::new(PIPELINE.len())));

    let mut outcome = orchestrator.run().await;
    let video_url = loop {
        match outcome {
            Ok(url) => break url,
            Err(GenerationError::Validation(msg)) => {
                eprintln!("[ERROR] {msg}");
                std::process::exit(2);
            }
            Err(err) => {
                eprintln!("[ERROR] {err}");
                if args.no_retry || !ask_retry().await? {
                    std::process::exit(1);
                }
                outcome = orchestrator.retry().await;
            }
        }
    };

    let state = orchestrator.state();
    if let (Some(start), Some(end)) = (state.started_at(), state.finished_at()) {
        tracing::info!("Finished in {}s", (end - start).num_seconds());
    }

    match &video_url {
        Some(url) => {
            println!("{url}");
            if args.open {
                platform::open_url(url);
            }
        }
        None => println!("Video URL not available"),
    }

    if let Err(err) = settings
        .save_last_used(&request.mothership, &request.prompt, &genre)
        .await
    {
        tracing::warn!("Could not save last used inputs: {err}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags() {
        let parsed = parse_args(args(&[
            "--prompt", "p", "--mothership", "m", "--genre", "sci-fi", "--open", "--no-retry",
        ]))
        .unwrap();
        assert_eq!(parsed.prompt.as_deref(), Some("p"));
        assert_eq!(parsed.mothership.as_deref(), Some("m"));
        assert_eq!(parsed.genre.as_deref(), Some("sci-fi"));
        assert!(parsed.open);
        assert!(parsed.no_retry);
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn rejects_unknown_and_dangling_flags() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--prompt"])).is_err());
    }
}
