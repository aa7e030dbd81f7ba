use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use burn::backend::{Autodiff, Candle, candle::CandleDevice};
use clap::Parser;
use playlist::{
    config::Settings,
    environment::{Environment, PlaylistEnvironment},
    model::dqn::DqnAgent,
    training::factory::load_library,
};

mod print;

/// Sequence a playlist with a trained model
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Id of the first song, random when omitted
    #[arg(short, long)]
    seed_song: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load_or_default(cli.config.as_deref())?;

    let mut library = load_library(&settings)?;
    if library.embeddings().is_none() {
        library.create_embeddings(settings.data.embedding_dim);
    }

    let model_path = &settings.training.model_path;
    let mut agent = DqnAgent::<Autodiff<Candle>>::load(model_path, CandleDevice::default())
        .with_context(|| format!("loading the model from {}", model_path.display()))?;
    agent.set_epsilon(0.0);

    let mut env = PlaylistEnvironment::new(&library, &settings.environment)?;
    let mut state = match &cli.seed_song {
        Some(id) => {
            let song = library
                .position(id)
                .ok_or_else(|| anyhow!("no song with id {id:?}"))?;
            env.reset_with(song)?
        }
        None => env.reset()?,
    };

    let mut steps = Vec::new();
    loop {
        let action = agent.best(&state, env.available())?;
        let step = env.step(action)?;

        steps.push((action, step.reward, step.info.similarity));
        state = step.state;

        if step.done {
            break;
        }
    }

    print::print_playlist(&library, env.playlist(), &steps);

    Ok(())
}
