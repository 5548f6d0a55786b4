// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cutscene Player - plays a sequence file without a renderer
//!
//! Usage:
//!   cutscene-player <sequence.ron> [--config <player.ron>] [--loop] [--ping-pong]
//!                   [--rate <r>] [--skip-to <t>] [--trace <out.json>] [--max-duration <s>]

use clap::Parser;
use cutscene_player::{Player, PlayerConfig, SequenceDocument};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "cutscene-player")]
#[command(about = "Play a cutscene sequence headlessly and report what happened")]
struct Args {
    /// Path to the sequence document
    sequence: PathBuf,

    /// Player settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Loop the sequence
    #[arg(long = "loop")]
    looping: bool,

    /// Bounce at both ends
    #[arg(long)]
    ping_pong: bool,

    /// Playback rate
    #[arg(long, allow_hyphen_values = true)]
    rate: Option<f32>,

    /// Skip to this time right after starting
    #[arg(long)]
    skip_to: Option<f32>,

    /// Write the playback trace as JSON
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Stop after this much host time
    #[arg(long)]
    max_duration: Option<f32>,
}

impl Args {
    fn player_config(&self) -> cutscene_player::Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load(path)?,
            None => PlayerConfig::default(),
        };
        config.looping |= self.looping;
        config.ping_pong |= self.ping_pong;
        if let Some(rate) = self.rate {
            config.playback_rate = rate;
        }
        if self.skip_to.is_some() {
            config.skip_to = self.skip_to;
        }
        if self.trace.is_some() {
            config.trace_json.clone_from(&self.trace);
        }
        if let Some(max_duration) = self.max_duration {
            config.max_duration = max_duration;
        }
        Ok(config)
    }
}

fn run(args: &Args) -> cutscene_player::Result<()> {
    let config = args.player_config()?;
    let document = SequenceDocument::load(&args.sequence)?;
    let scene = document.build()?;

    let summary = Player::new(scene, config).run()?;

    println!("Sequence: {}", summary.name);
    println!("Ticks: {} ({:.2}s host time)", summary.ticks, summary.host_time);
    println!("Running time: {:.3}", summary.running_time);
    println!("Finished: {}", summary.finished);
    for (time, message) in &summary.messages {
        println!("  [{time:.2}] {} {:?}", message.name, message.kind);
    }
    for (target, members) in &summary.targets {
        println!("{target}:");
        for (member, value) in members {
            println!("  {member} = {value}");
        }
    }
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("cutscene_player=info,cutscene_sequencer=info")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cutscene Player v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    if let Err(e) = run(&args) {
        tracing::error!("Playback failed: {e}");
        std::process::exit(1);
    }
}
