use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::auth::{resolve_token, FileSecretStore, MemorySecretStore, SecretStore, TOKEN_KEY};
use crate::builds::BuildView;
use crate::config::{Config, OutputFormat};
use crate::output::{
    bright_green, bright_red, dim, export_builds, print_builds, print_transitions, CycleProgress,
};
use crate::poller::{PollEvent, Poller};
use crate::providers::circleci::{CircleCiClient, CircleCiProvider};

#[derive(Parser)]
#[command(name = "circlewatch")]
#[command(author, version, about = "Watch current CircleCI builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./circlewatch.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write the build list as JSON to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Shorthand for output format `json`
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously; type `r` + Enter to refresh, `q` + Enter to quit
    Watch {
        #[arg(short, long, env = "CIRCLECI_TOKEN")]
        token: Option<String>,

        /// Organization slug, e.g. 'gh/acme'
        #[arg(long)]
        org: Option<String>,

        /// Seconds between polls
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Run a single poll cycle and print the result
    Builds {
        #[arg(short, long, env = "CIRCLECI_TOKEN")]
        token: Option<String>,

        #[arg(long)]
        org: Option<String>,
    },
    /// Check that the token is accepted by CircleCI
    Check {
        #[arg(short, long, env = "CIRCLECI_TOKEN")]
        token: Option<String>,
    },
    /// Manage the stored CircleCI token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    Set { token: String },
    Delete,
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        #[arg(default_value = "circlewatch.toml")]
        path: PathBuf,

        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
}

struct OutputSettings {
    format: OutputFormat,
    pretty: bool,
}

/// Terminal state of `watch` between poll events.
#[derive(Default)]
struct WatchView {
    generation: u64,
    progress: Option<CycleProgress>,
}

impl WatchView {
    /// Records `generation` as the newest seen; false when it is older.
    fn accept(&mut self, generation: u64) -> bool {
        if generation < self.generation {
            return false;
        }
        if generation > self.generation {
            self.generation = generation;
            self.clear_progress();
        }
        true
    }

    fn clear_progress(&mut self) {
        if let Some(progress) = self.progress.take() {
            progress.clear();
        }
    }
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Watch {
                token,
                org,
                interval,
            } => self.execute_watch(&config, token, org, *interval).await,
            Commands::Builds { token, org } => self.execute_builds(&config, token, org).await,
            Commands::Check { token } => self.execute_check(&config, token).await,
            Commands::Token { action } => execute_token(action),
            Commands::Config { action } => execute_config(action),
        }
    }

    fn output_settings(&self, config: &Config) -> OutputSettings {
        OutputSettings {
            format: if self.json {
                OutputFormat::Json
            } else {
                config.output.format
            },
            pretty: self.pretty || config.output.pretty,
        }
    }

    async fn execute_builds(
        &self,
        config: &Config,
        token: &Option<String>,
        org: &Option<String>,
    ) -> Result<()> {
        let client = build_client(config, token)?;
        let provider = CircleCiProvider::new(Arc::new(client));
        let cycle = config.cycle_config(org.clone());

        info!("Collecting current builds from {}", provider.api().api_url());
        let progress = CycleProgress::start();
        let outcome = provider
            .collect_builds(&cycle, &|fetched: usize| progress.set_fetched(fetched))
            .await;

        match outcome {
            Ok(builds) => {
                progress.finish(builds.len());
                self.emit(&builds, &self.output_settings(config))
            }
            Err(e) => {
                progress.clear();
                Err(anyhow!(e.user_message()))
            }
        }
    }

    async fn execute_watch(
        &self,
        config: &Config,
        token: &Option<String>,
        org: &Option<String>,
        interval: Option<u64>,
    ) -> Result<()> {
        let client = build_client(config, token)?;
        let mut polling = config.polling.clone();
        if let Some(seconds) = interval {
            polling.interval_seconds = seconds;
        }
        let cycle = config.cycle_config(org.clone());
        let settings = self.output_settings(config);

        let poller = Poller::new(
            CircleCiProvider::new(Arc::new(client)),
            cycle,
            polling.interval(),
        );
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let poll_task = tokio::spawn(poller.run(refresh_rx, events_tx));

        let mut commands = spawn_stdin_commands();
        let mut stdin_open = true;
        let mut view = WatchView::default();

        eprintln!("{}", dim("Type r + Enter to refresh, q + Enter to quit"));

        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.handle_event(event, &mut view, &settings)?,
                    None => break,
                },
                command = commands.recv(), if stdin_open => match command.as_deref().map(str::trim) {
                    Some("r") => {
                        if refresh_tx.try_send(()).is_err() {
                            info!("Refresh already pending");
                        }
                    }
                    Some("q") => break,
                    Some(_) => {}
                    None => stdin_open = false,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        view.clear_progress();
        drop(refresh_tx);
        poll_task.await?;
        Ok(())
    }

    fn handle_event(
        &self,
        event: PollEvent,
        view: &mut WatchView,
        settings: &OutputSettings,
    ) -> Result<()> {
        match event {
            PollEvent::Progress {
                generation,
                fetched,
            } => {
                if !view.accept(generation) {
                    debug!("Ignoring progress of superseded cycle {generation}");
                    return Ok(());
                }
                debug!("Cycle {generation}: fetched workflows for {fetched} pipelines");
                view.progress
                    .get_or_insert_with(CycleProgress::start)
                    .set_fetched(fetched);
            }
            PollEvent::Updated {
                generation,
                builds,
                transitions,
            } => {
                view.accept(generation);
                view.clear_progress();
                info!("Cycle {generation} produced {} builds", builds.len());
                if settings.format == OutputFormat::Summary {
                    let _ = console::Term::stdout().clear_screen();
                }
                self.emit(&builds, settings)?;
                if !transitions.is_empty() {
                    print_transitions(&transitions);
                }
            }
            PollEvent::Failed {
                generation,
                message,
            } => {
                view.accept(generation);
                view.clear_progress();
                warn!("Cycle {generation} failed");
                self.clear_results(settings)?;
                eprintln!("{} {}", bright_red("✗"), message);
            }
        }
        Ok(())
    }

    /// Drops the previous result everywhere it was shown or written.
    fn clear_results(&self, settings: &OutputSettings) -> Result<()> {
        if let Some(output_path) = &self.output {
            let mut file = File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            export_builds(&[], settings.pretty, &mut file)?;
        }

        match settings.format {
            OutputFormat::Summary => {
                let _ = console::Term::stdout().clear_screen();
            }
            OutputFormat::Json if self.output.is_none() => {
                export_builds(&[], settings.pretty, &mut std::io::stdout().lock())?;
            }
            OutputFormat::Json => {}
        }
        Ok(())
    }

    fn emit(&self, builds: &[BuildView], settings: &OutputSettings) -> Result<()> {
        if let Some(output_path) = &self.output {
            let mut file = File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            export_builds(builds, settings.pretty, &mut file)?;
            info!("Builds written to: {}", output_path.display());
        }

        match settings.format {
            OutputFormat::Summary => print_builds(builds, Utc::now()),
            OutputFormat::Json if self.output.is_none() => {
                export_builds(builds, settings.pretty, &mut std::io::stdout().lock())?;
            }
            OutputFormat::Json => {}
        }
        Ok(())
    }

    async fn execute_check(&self, config: &Config, token: &Option<String>) -> Result<()> {
        let client = build_client(config, token)?;
        let user = client
            .fetch_me()
            .await
            .map_err(|e| anyhow!(e.user_message()))?;

        let who = match &user.name {
            Some(name) => format!("{} ({name})", user.login),
            None => user.login.clone(),
        };
        println!(
            "{} Connected to {} as {}",
            bright_green("✓"),
            client.api_url(),
            who
        );
        Ok(())
    }
}

fn execute_token(action: &TokenAction) -> Result<()> {
    let store = FileSecretStore::open_default()?;

    match action {
        TokenAction::Set { token } => {
            if token.trim().is_empty() {
                bail!("Token must not be empty");
            }
            store.set(TOKEN_KEY, token.trim())?;
            println!("{} Token stored in {}", bright_green("✓"), store.path().display());
        }
        TokenAction::Delete => {
            store.delete(TOKEN_KEY)?;
            println!("{} Token removed", bright_green("✓"));
        }
        TokenAction::Status => match store.get(TOKEN_KEY)? {
            Some(_) => println!("Token stored in {}", store.path().display()),
            None => println!("No token stored"),
        },
    }
    Ok(())
}

fn execute_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite", path.display());
            }
            Config::default().save(path)?;
            println!("{} Wrote {}", bright_green("✓"), path.display());
        }
    }
    Ok(())
}

/// Falls back to an in-memory store when no config directory exists.
fn open_store() -> Box<dyn SecretStore> {
    match FileSecretStore::open_default() {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!("Stored token unavailable: {e}");
            Box::new(MemorySecretStore::default())
        }
    }
}

fn build_client(config: &Config, token: &Option<String>) -> Result<CircleCiClient> {
    let store = open_store();
    let token = resolve_token(token.as_deref(), store.as_ref())?;
    if token.is_none() {
        warn!("No CircleCI token configured");
    }
    Ok(CircleCiClient::new(config.client_settings(token))?)
}

/// Forwards stdin lines; the receiver closes at end of input.
///
/// Runs on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_commands() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
