//! 🚀 slx-cli: the front door, the bouncer, the maitre d' of slx.
//!
//! 🎬 *[narrator voice]* "It all started with a JSON file somebody copied out of
//! the Lambda console..."
//!
//! Feed it one storage notification and it runs the whole pipeline against the
//! real bucket: stream, judge, relocate, report. Then it prints a little table
//! so you know what happened without squinting at logs. Like a manager. 🦆
//!
//! ```text
//! slx-cli --config slx.toml event.json
//! cat event.json | slx-cli -
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use slx::{HandleOutcome, RunSummary};
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "slx-cli", version, about = "🪣 Process one storage notification end to end")]
struct Args {
    /// 🔧 Optional TOML config. Env vars (SLX_*) apply either way.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 📨 Notification JSON file, or `-` for stdin.
    event: PathBuf,
}

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("dispatch failure")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        // -- 📡 if it smells like a connection problem, it's probably a connection problem
        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: looks like the object store isn't reachable. \
                 Check the region, the endpoint override, and whether your credentials \
                 are the ones you think they are. MinIO/LocalStack users: is it running? ☕"
            );
        }

        if let Some(pipeline_error) = err.downcast_ref::<slx::PipelineError>() {
            if pipeline_error.left_partial_state() {
                error!("🚧 storage was left partially changed; see the cause above before re-running");
            }
        }

        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let the_payload = read_event(&args.event).await?;

    if let Some(config_file) = &args.config {
        let exists = config_file.try_exists().context(format!(
            "💀 Could not check whether the config file exists. Was checking here: '{}'",
            config_file.display()
        ))?;
        anyhow::ensure!(
            exists,
            "💀 Configuration file '{}' does not exist. Relative paths are relative to the cwd, \
             which may not be the directory you think it is.",
            config_file.display()
        );
    }

    let app_config = slx::load_config(args.config.as_deref())
        .context("💀 In slx-cli, main, we couldn't load the config. Make sure you didn't forget something obvious")?;

    match slx::run(&app_config, &the_payload).await? {
        HandleOutcome::Skipped => {
            info!("🚪 not a direct write into pending; nothing to do");
            println!("skipped: event is not a direct write into pending/");
        }
        HandleOutcome::Completed(summary) => println!("{}", render_summary(&summary)),
    }
    Ok(())
}

async fn read_event(path: &Path) -> Result<serde_json::Value> {
    let the_text = if path.as_os_str() == "-" {
        let mut the_text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut the_text)
            .await
            .context("💀 reading the event from stdin failed")?;
        the_text
    } else {
        tokio::fs::read_to_string(path)
            .await
            .context(format!("💀 reading event file '{}' failed", path.display()))?
    };
    serde_json::from_str(&the_text).context("💀 the event is not valid JSON")
}

/// 🍽️ Two columns, no borders. Minimalists.
fn render_summary(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut add = |label: &str, value: String| {
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(value),
        ]);
    };
    add("source", summary.source.to_string());
    add("rows ok", summary.success_count.to_string());
    add("rows failed", summary.failure_count.to_string());
    add("moved to", summary.relocation.destination.to_string());
    add(
        "error report",
        summary
            .report
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string),
    );
    table
}
