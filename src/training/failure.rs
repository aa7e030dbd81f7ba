use thiserror::Error;

use crate::{environment::EnvError, model::AgentError};

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Environment(#[from] EnvError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// A failed unit of training work. Neither tier stops the run: a step
/// failure abandons its episode, an episode failure skips to the next one.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("error in step {step} of episode {episode}: {source}")]
    Step {
        episode: usize,
        step: usize,
        #[source]
        source: StepError,
    },

    #[error("error in episode {episode}: {source}")]
    Episode {
        episode: usize,
        #[source]
        source: StepError,
    },
}

impl Failure {
    pub fn episode(&self) -> usize {
        match self {
            Failure::Step { episode, .. } | Failure::Episode { episode, .. } => *episode,
        }
    }
}
