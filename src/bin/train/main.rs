use std::path::PathBuf;

use burn::backend::{Autodiff, Candle, candle::CandleDevice};
use clap::{Parser, ValueEnum};
use log::{error, info};
use playlist::{
    config::Settings,
    training::{
        factory::PlaylistFactory,
        prompt::Console,
        session::{Outcome, Session},
    },
};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum Retrain {
    /// ask on stdin when a model already exists
    #[default]
    Ask,
    Yes,
    No,
}

impl Retrain {
    fn answer(self) -> Option<bool> {
        match self {
            Retrain::Ask => None,
            Retrain::Yes => Some(true),
            Retrain::No => Some(false),
        }
    }
}

/// Train the playlist sequencing DQN
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of training episodes, asked for when omitted
    #[arg(short, long)]
    episodes: Option<usize>,

    /// Whether to retrain an existing model
    #[arg(long, value_enum, default_value_t = Retrain::Ask)]
    retrain: Retrain,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let settings = match Settings::load_or_default(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err:#}");
            return;
        }
    };

    let mut factory = PlaylistFactory::<Autodiff<Candle>>::new(CandleDevice::default());
    let mut prompt = Console::stdio()
        .with_retrain(cli.retrain.answer())
        .with_episodes(cli.episodes);

    match Session::new(settings).run(&mut factory, &mut prompt) {
        Outcome::Completed(summary) => info!(
            "Trained {} episodes ({} abandoned, {} failed to start)",
            summary.episodes,
            summary.report.abandoned(),
            summary.report.failures.len()
        ),
        Outcome::KeptModel => info!("Existing model kept"),
        Outcome::MissingDataset(path) => error!("Missing dataset {}", path.display()),
        Outcome::LoadFailed(err) => error!("Loading failed: {err:#}"),
        Outcome::Failed(err) => error!("Training failed: {err:#}"),
    }
}
