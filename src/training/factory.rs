use anyhow::{Context, Result};
use burn::{optim::AdamConfig, tensor::backend::AutodiffBackend};
use log::{info, warn};

use crate::{
    catalog::Library,
    config::Settings,
    environment::{Environment, PlaylistEnvironment},
    model::{
        Agent,
        dqn::{AgentConfig, DqnAgent, ModelConfig, Weights},
    },
};

/// Builds the collaborators of a training run.
pub trait Factory {
    type Env: Environment;
    type Agent: Agent<State = <Self::Env as Environment>::State>;

    fn library(&mut self, settings: &Settings) -> Result<Library>;

    fn environment(&mut self, library: &Library, settings: &Settings) -> Result<Self::Env>;

    fn agent(
        &mut self,
        state_size: usize,
        action_size: usize,
        settings: &Settings,
    ) -> Result<Self::Agent>;
}

pub fn agent_config(settings: &Settings, state_size: usize, action_size: usize) -> AgentConfig {
    let agent = &settings.agent;

    let model = ModelConfig::new(state_size, action_size).with_hidden_size(agent.hidden_size);
    let weights = Weights::new()
        .with_lr(agent.learning_rate)
        .with_gamma(agent.gamma)
        .with_target_update(agent.target_update);

    AgentConfig::new(model, AdamConfig::new(), weights)
        .with_epsilon(agent.epsilon)
        .with_epsilon_decay(agent.epsilon_decay)
        .with_epsilon_min(agent.epsilon_min)
        .with_memory_size(agent.memory_size)
        .with_seed(agent.seed)
}

/// Loads the catalog from disk and trains a burn [`DqnAgent`].
pub struct PlaylistFactory<B>
where
    B: AutodiffBackend,
{
    device: B::Device,
}

impl<B> PlaylistFactory<B>
where
    B: AutodiffBackend,
{
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

/// Loads the dataset and attaches cached embeddings when the cache is usable.
pub fn load_library(settings: &Settings) -> Result<Library> {
    let dataset = &settings.data.playlist_data_file;
    let mut library = Library::load(dataset)
        .with_context(|| format!("loading playlist data from {}", dataset.display()))?;

    if let Some(cache) = settings.data.embeddings_file.as_ref().filter(|cache| cache.exists()) {
        match library.load_embeddings(cache, settings.data.embedding_dim) {
            Ok(true) => info!("Loaded cached embeddings from {}", cache.display()),
            Ok(false) => {}
            Err(err) => warn!("Failed to read embeddings cache {}: {err}", cache.display()),
        }
    }

    Ok(library)
}

impl<B> Factory for PlaylistFactory<B>
where
    B: AutodiffBackend,
{
    type Env = PlaylistEnvironment;
    type Agent = DqnAgent<B>;

    fn library(&mut self, settings: &Settings) -> Result<Library> {
        load_library(settings)
    }

    fn environment(&mut self, library: &Library, settings: &Settings) -> Result<Self::Env> {
        Ok(PlaylistEnvironment::new(library, &settings.environment)?)
    }

    fn agent(
        &mut self,
        state_size: usize,
        action_size: usize,
        settings: &Settings,
    ) -> Result<Self::Agent> {
        let config = agent_config(settings, state_size, action_size);

        Ok(config.init(self.device.clone()))
    }
}
