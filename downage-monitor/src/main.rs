/**
 * DOWNAGE - Point d'entrée du moniteur de coupures Internet
 *
 * RÔLE : Lecture de la config (CLI + env + .env), ouverture du stockage,
 * puis soit export JSON (--dump), soit boucle de polling jusqu'à Ctrl-C.
 *
 * SORTIES : stdout = données (--dump uniquement), stderr = logs.
 * Toute erreur de config ou de stockage termine le processus en code != 0.
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use downage_monitor::{open_sink, Cli, EpisodeSink, Monitor, PingProber};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("downage=info,downage_monitor=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Écrit tous les épisodes sur stdout, un objet JSON par ligne
fn dump_all(sink: &dyn EpisodeSink) -> Result<()> {
    let episodes = sink.dump_all().context("Failed to read stored episodes")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for episode in &episodes {
        serde_json::to_writer(&mut out, episode).context("Failed to serialize episode")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let dump = cli.dump;
    let config = cli.into_config().context("Invalid configuration")?;

    let sink = open_sink(config.backend, &config.storage_path).with_context(|| {
        format!(
            "Failed to open {:?} storage at {}",
            config.backend,
            config.storage_path.display()
        )
    })?;

    if dump {
        return dump_all(sink.as_ref());
    }

    info!("Downage starting with {}", serde_json::to_string(&config)?);

    let prober = PingProber::new(config.probe_timeout);
    let mut monitor = Monitor::new(prober, sink, config.servers, config.poll_interval);
    monitor.run().await.context("Failed to record outage")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
