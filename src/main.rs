mod colors;
mod config;
mod glow;
mod help;
mod input;
mod logging;
mod overlay;
mod settings;
mod sound;
mod terminal;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::OverlayConfig;
use settings::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keyglow")]
#[command(author = "Terminal Art Generator")]
#[command(version = "0.1.0")]
#[command(about = "On-screen keyboard overlay: glowing keys, a trigger sound and falling snow", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full-screen overlay
    Overlay {
        /// Key that plays the sound when pressed
        #[arg(short = 'k', long)]
        trigger_key: Option<String>,

        /// Sound file played by the trigger key
        #[arg(short = 'S', long)]
        sound: Option<PathBuf>,

        /// Start with the fixed yellow glow on
        #[arg(short, long)]
        fixed_glow: bool,

        /// Start with the random hue glow on
        #[arg(short, long)]
        random_glow: bool,

        /// Start with snowflakes falling
        #[arg(short = 'n', long)]
        snow: bool,

        /// Only mirror keys typed into this terminal
        #[arg(short, long)]
        local: bool,

        /// Frame time in seconds
        #[arg(short, long, default_value = "0.03")]
        time: f32,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Debug logging and input mode indicator
        #[arg(short, long)]
        debug: bool,

        /// Settings file to read instead of the default location
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the keyboard layout and exit
    Layout {
        /// Output width in columns
        #[arg(short, long, default_value = "80")]
        width: u16,

        /// No colours
        #[arg(short, long)]
        plain: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Overlay {
            trigger_key,
            sound,
            fixed_glow,
            random_glow,
            snow,
            local,
            time,
            seed,
            debug,
            config,
        } => {
            let _guard = logging::init(debug);
            let settings = match config {
                Some(path) => Settings::load_from(&path),
                None => Settings::load(),
            };

            let mut config = OverlayConfig::from_settings(settings);
            if let Some(key) = trigger_key {
                config.trigger_key = key;
            }
            if sound.is_some() {
                config.sound = sound;
            }
            config.fixed_glow = fixed_glow;
            config.random_glow = random_glow;
            config.snow = snow;
            config.local_only = local;
            config.time_step = time;
            config.seed = seed;
            config.debug = debug;

            overlay::run(config).context("overlay session failed")?;
        }
        Commands::Layout { width, plain } => {
            let palette = Settings::load().theme.palette();
            print!("{}", overlay::keyboard::print_layout(width, &palette, plain));
        }
    }

    Ok(())
}
