use std::path::Path;

use burn::{optim::GradientsParams, train::TrainOutput};
use thiserror::Error;

use crate::training::data::Transition;

pub mod dqn;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no songs are available to choose from")]
    NoActions,

    #[error("expected a state of size {expected}, got {actual}")]
    StateSize { expected: usize, actual: usize },

    #[error("action {action} is outside of the {actions} known songs")]
    ActionRange { action: usize, actions: usize },

    #[error("tensor data error: {0}")]
    Tensor(String),

    #[error("model record error: {0}")]
    Record(String),

    #[error("model config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A learning agent picking one of a set of discrete actions.
pub trait Agent {
    type State;

    fn act(&mut self, state: &Self::State, available: &[usize]) -> Result<usize, AgentError>;

    fn remember(&mut self, transition: Transition<Self::State>);

    /// Runs one learning update over a sampled batch. Returns the loss, or
    /// `None` when the replay memory holds fewer than `batch_size` items.
    fn replay(&mut self, batch_size: usize) -> Result<Option<f32>, AgentError>;

    fn memory_len(&self) -> usize;

    fn epsilon(&self) -> f32;

    fn save(&self, path: &Path) -> Result<(), AgentError>;
}

pub trait Train<Item> {
    type Batch;

    fn train_step(&self, batch: &Self::Batch) -> TrainOutput<Item>;

    fn fit(&mut self, grads: GradientsParams);
}
