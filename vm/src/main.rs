#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use mips_pipeline::config::{
    SimConfig, DEFAULT_LOAD_STALL_CYCLES, DEFAULT_STALL_CYCLES, DEFAULT_TIMELINE_WIDTH,
};
use mips_pipeline::ui::ui;

#[derive(Parser, Debug)]
#[command(version, about = "Five-stage MIPS pipeline simulator", long_about = None)]
struct SimArgs {
    /// Assembly file to load instead of the built-in program
    program: Option<PathBuf>,
    #[arg(long, default_value_t = 1500, help = "Milliseconds between automatic cycles")]
    interval_ms: u64,
    #[arg(long, default_value_t = DEFAULT_LOAD_STALL_CYCLES, help = "Stall cycles behind a load")]
    load_stall_cycles: usize,
    #[arg(long, default_value_t = DEFAULT_STALL_CYCLES, help = "Stall cycles behind any other producer")]
    stall_cycles: usize,
    #[arg(long, default_value_t = DEFAULT_TIMELINE_WIDTH, help = "Cycle columns in the timeline")]
    timeline_width: usize,
    #[arg(long, default_value = "warn", help = "Log level or flexi_logger spec")]
    log: String,
    #[arg(long, help = "Run to completion without prompting")]
    batch: bool,
    #[arg(long, help = "Skip the start-up banner")]
    no_banner: bool,
}

impl From<&SimArgs> for SimConfig {
    fn from(args: &SimArgs) -> Self {
        SimConfig {
            load_stall_cycles: args.load_stall_cycles,
            default_stall_cycles: args.stall_cycles,
            timeline_width: args.timeline_width,
            ..SimConfig::default()
        }
        .with_cycle_interval(Duration::from_millis(args.interval_ms))
    }
}

fn banner() {
    let banner = cfonts::render(cfonts::Options {
        text: String::from("MIPS"),
        font: cfonts::Fonts::FontBlock,
        colors: vec![cfonts::Colors::Yellow, cfonts::Colors::Blue],
        ..cfonts::Options::default()
    });
    print!("{}", banner.text);
}

fn main() -> Result<()> {
    let args = SimArgs::parse();
    flexi_logger::Logger::try_with_str(&args.log)?.start()?;

    let config = SimConfig::from(&args).validated()?;
    if !args.no_banner {
        banner();
    }

    if args.batch {
        ui::run_batch(config, args.program)
    } else {
        ui::enter(config, args.program)
    }
}
