use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use topcharts::config::{Credentials, expand_candidates, load_config};
use topcharts::fetch::{ReqwestTransport, Transport};
use topcharts::model::SourceKind;
use topcharts::pipeline::{ChartResolver, ResolveOptions};
use topcharts::server::{AppState, serve};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "topcharts", about = "Multi-source top-songs chart proxy")]
struct Cli {
    #[arg(long, global = true, env = "TOPCHARTS_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    #[arg(long, global = true, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    Resolve {
        #[arg(long, default_value = "es")]
        region: String,
        /// scrape, csv or api
        #[arg(long)]
        only: Option<String>,
    },
    Validate,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let credentials = Credentials::from_parts(cli.client_id, cli.client_secret);

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            // Built and finally dropped outside the async runtime; the blocking
            // client owns its own runtime.
            let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
            let state = Arc::new(AppState {
                config,
                credentials,
                transport: transport.clone(),
            });

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?;
            runtime.block_on(serve(state, &bind))?;
            drop(runtime);
            drop(transport);
        }
        Commands::Resolve { region, only } => {
            let only = match only.as_deref() {
                Some(value) => Some(
                    SourceKind::parse(value)
                        .ok_or_else(|| anyhow!("unknown source {value}; expected scrape, csv or api"))?,
                ),
                None => None,
            };
            let region = config
                .region(&region)
                .ok_or_else(|| anyhow!("invalid region: {region}"))?;

            let resolver = ChartResolver::for_region(
                &config,
                credentials.as_ref(),
                &region,
                &ResolveOptions { only },
            )?;
            info!(region = %region.code, phases = ?resolver.phases(), "resolving chart");

            let transport = ReqwestTransport::new()?;
            match resolver.resolve(&transport) {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(err) => {
                    eprintln!("{}", serde_json::to_string_pretty(err.phases())?);
                    bail!(err);
                }
            }
        }
        Commands::Validate => {
            println!("config ok");
            println!(
                "catalog credentials: {}",
                if credentials.is_some() { "PRESENT" } else { "MISSING" }
            );
            for (code, entry) in &config.regions {
                let Some(region) = config.region(code) else {
                    continue;
                };
                println!("region {code} ({})", entry.name);
                for candidate in expand_candidates(&config.scrape.candidates, &region) {
                    println!("  scrape {}", candidate.url);
                }
                for candidate in expand_candidates(&config.csv.candidates, &region) {
                    println!("  csv    {}", candidate.url);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
