use clap::Parser;
use dropskeet_cli::{RunOutcome, TagRemoval, poster_from_config};
use dropskeet_common::AppConfig;
use dropskeet_common::telemetry::{self, TelemetryConfig};
use miette::Result;

/// Configuration is read from the environment (and `.env`); there are no flags.
#[derive(Parser)]
#[command(version, about = "dropskeet - Post the newest tagged Raindrop bookmark to Bluesky", long_about = None)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_miette();

    let _cli = Cli::parse();

    let config = AppConfig::from_env()?;
    telemetry::init(TelemetryConfig::new("dropskeet", config.log_level.clone()));

    tracing::debug!(
        tag = %config.skeet_tag,
        raindrop = %config.raindrop_api,
        bluesky = %config.bluesky_service,
        "configuration loaded"
    );

    let poster = poster_from_config(&config)?;
    match poster.run_once().await? {
        RunOutcome::NothingToPost => tracing::info!("nothing to do"),
        RunOutcome::Posted { uri, tag } => {
            if tag == TagRemoval::AlreadyAbsent {
                tracing::warn!(%uri, "posted, but the tag was already gone");
            }
            println!("{uri}");
        }
    }

    Ok(())
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
