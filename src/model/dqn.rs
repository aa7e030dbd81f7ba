use std::{fs, path::Path};

use burn::{
    module::AutodiffModule,
    nn::{
        Linear, LinearConfig,
        loss::{MseLoss, Reduction},
    },
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::{activation::relu, backend::AutodiffBackend, cast::ToElement},
    train::TrainOutput,
};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    environment::State,
    training::data::{ReplayMemory, Transition},
};

use super::{Agent, AgentError, Train};

#[derive(Config, Copy)]
pub struct Weights {
    #[config(default = 1e-3)]
    pub lr: f64,

    #[config(default = 0.95)]
    pub gamma: f32,

    /// learning updates between target network refreshes
    #[config(default = 100)]
    pub target_update: usize,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    pub num_inputs: usize,
    pub num_actions: usize,

    #[config(default = 128)]
    pub hidden_size: usize,
}

#[derive(Module, Debug)]
pub struct Dqn<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    value: Linear<B>,
}

impl ModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Dqn<B> {
        Dqn::new(self, device)
    }
}

impl<B> Dqn<B>
where
    B: Backend,
{
    pub fn new(config: &ModelConfig, device: &B::Device) -> Self {
        let fc1 = LinearConfig::new(config.num_inputs, config.hidden_size).init(device);
        let fc2 = LinearConfig::new(config.hidden_size, config.hidden_size).init(device);
        let value = LinearConfig::new(config.hidden_size, config.num_actions).init(device);

        Self { fc1, fc2, value }
    }

    pub fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(state);
        let x = relu(x);
        let x = self.fc2.forward(x);
        let x = relu(x);

        self.value.forward(x)
    }
}

#[derive(Clone, Debug)]
pub struct Batch<B: Backend> {
    pub state: Tensor<B, 2>,
    pub action: Tensor<B, 2, Int>,
    pub reward: Tensor<B, 2>,
    /// 0 for terminal transitions, 1 otherwise
    pub pending: Tensor<B, 2>,
    pub next_state: Tensor<B, 2>,
}

impl<B: Backend> Batch<B> {
    pub fn new(
        sample: &[&Transition<State>],
        state_size: usize,
        action_size: usize,
        device: &B::Device,
    ) -> Result<Self, AgentError> {
        let rows = sample.len();

        let mut state = Vec::with_capacity(rows * state_size);
        let mut next_state = Vec::with_capacity(rows * state_size);
        for item in sample {
            for features in [&item.state.features, &item.next_state.features] {
                if features.len() != state_size {
                    return Err(AgentError::StateSize {
                        expected: state_size,
                        actual: features.len(),
                    });
                }
            }
            if item.action >= action_size {
                return Err(AgentError::ActionRange {
                    action: item.action,
                    actions: action_size,
                });
            }

            state.extend_from_slice(&item.state.features);
            next_state.extend_from_slice(&item.next_state.features);
        }

        let action = sample.iter().map(|item| item.action as i64).collect();
        let reward = sample.iter().map(|item| item.reward).collect();
        let pending = sample
            .iter()
            .map(|item| !item.done as u8 as f32)
            .collect();

        Ok(Self {
            state: Tensor::from_data(TensorData::new(state, [rows, state_size]), device),
            action: Tensor::from_data(TensorData::new::<i64, _>(action, [rows, 1]), device),
            reward: Tensor::from_data(TensorData::new::<f32, _>(reward, [rows, 1]), device),
            pending: Tensor::from_data(TensorData::new::<f32, _>(pending, [rows, 1]), device),
            next_state: Tensor::from_data(TensorData::new(next_state, [rows, state_size]), device),
        })
    }
}

pub struct Learner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Dqn<B>, B>,
{
    model: Dqn<B>,
    target: Dqn<B>,
    optimizer: O,
    weights: Weights,
    updates: usize,
}

impl<B> Learner<B, OptimizerAdaptor<Adam, Dqn<B>, B>>
where
    B: AutodiffBackend,
{
    pub fn new(config: &AgentConfig, device: &B::Device) -> Self {
        let model = config.model.init(device);

        Self {
            target: model.clone(),
            model,
            optimizer: config.optimizer.init(),
            weights: config.weights,
            updates: 0,
        }
    }
}

impl<B, O> Learner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Dqn<B>, B>,
{
    pub fn model(&self) -> &Dqn<B> {
        &self.model
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    fn load_record(&mut self, record: DqnRecord<B>) {
        self.model = self.model.clone().load_record(record);
        self.target = self.model.clone();
    }
}

impl<B, O> Train<Tensor<B, 1>> for Learner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Dqn<B>, B>,
{
    type Batch = Batch<B>;

    fn train_step(&self, batch: &Batch<B>) -> TrainOutput<Tensor<B, 1>> {
        let q = self.model.forward(batch.state.clone());
        let chosen_q = q.gather(1, batch.action.clone());

        let next_q = self.target.forward(batch.next_state.clone()).detach();
        let max_next_q = next_q.max_dim(1);

        let target = batch.reward.clone() + batch.pending.clone() * self.weights.gamma * max_next_q;

        let loss = MseLoss::new().forward(chosen_q, target, Reduction::Mean);

        TrainOutput::new(&self.model, loss.backward(), loss)
    }

    fn fit(&mut self, grads: GradientsParams) {
        self.model = self
            .optimizer
            .step(self.weights.lr, self.model.clone(), grads);
        self.updates += 1;

        if self.updates % self.weights.target_update.max(1) == 0 {
            self.target = self.model.clone();
        }
    }
}

#[derive(Config)]
pub struct AgentConfig {
    pub model: ModelConfig,
    pub optimizer: AdamConfig,
    pub weights: Weights,

    /// exploration rate, decayed after every learning update
    #[config(default = 1.0)]
    pub epsilon: f32,

    #[config(default = 0.995)]
    pub epsilon_decay: f32,

    #[config(default = 0.01)]
    pub epsilon_min: f32,

    #[config(default = 2_000)]
    pub memory_size: usize,

    #[config(default = 0x12C0FFEE)]
    pub seed: u64,
}

impl AgentConfig {
    pub fn init<B: AutodiffBackend>(self, device: B::Device) -> DqnAgent<B> {
        DqnAgent::new(self, device)
    }
}

pub struct DqnAgent<B>
where
    B: AutodiffBackend,
{
    learner: Learner<B, OptimizerAdaptor<Adam, Dqn<B>, B>>,
    memory: ReplayMemory<Transition<State>>,
    epsilon: f32,
    rng: StdRng,
    config: AgentConfig,
    device: B::Device,
}

impl<B> DqnAgent<B>
where
    B: AutodiffBackend,
{
    pub fn new(config: AgentConfig, device: B::Device) -> Self {
        Self {
            learner: Learner::new(&config, &device),
            memory: ReplayMemory::new(config.memory_size),
            epsilon: config.epsilon,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            device,
        }
    }

    /// Restores an agent saved with [`Agent::save`].
    pub fn load(path: &Path, device: B::Device) -> Result<Self, AgentError> {
        let config = AgentConfig::load(path.with_extension("json"))
            .map_err(|err| AgentError::Config(format!("{err:?}")))?;

        let bytes = fs::read(path)?;
        let record: DqnRecord<B> = NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
            .load(bytes, &device)
            .map_err(|err| AgentError::Record(format!("{err:?}")))?;

        let mut agent = Self::new(config, device);
        agent.learner.load_record(record);

        Ok(agent)
    }

    pub fn state_size(&self) -> usize {
        self.config.model.num_inputs
    }

    pub fn action_size(&self) -> usize {
        self.config.model.num_actions
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
    }

    pub fn q_values(&self, state: &State) -> Result<Vec<f32>, AgentError> {
        self.check_state(state)?;

        let input = Tensor::<B::InnerBackend, 2>::from_data(
            TensorData::new(state.features.clone(), [1, self.state_size()]),
            &self.device,
        );

        self.learner
            .model()
            .valid()
            .forward(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| AgentError::Tensor(format!("{err:?}")))
    }

    /// Highest valued action among `available`, ignoring exploration.
    pub fn best(&self, state: &State, available: &[usize]) -> Result<usize, AgentError> {
        self.check_actions(available)?;
        let q = self.q_values(state)?;

        available
            .iter()
            .copied()
            .max_by(|a, b| q[*a].total_cmp(&q[*b]))
            .ok_or(AgentError::NoActions)
    }

    fn check_state(&self, state: &State) -> Result<(), AgentError> {
        if state.features.len() != self.state_size() {
            return Err(AgentError::StateSize {
                expected: self.state_size(),
                actual: state.features.len(),
            });
        }

        Ok(())
    }

    fn check_actions(&self, available: &[usize]) -> Result<(), AgentError> {
        if available.is_empty() {
            return Err(AgentError::NoActions);
        }

        match available.iter().find(|action| **action >= self.action_size()) {
            Some(action) => Err(AgentError::ActionRange {
                action: *action,
                actions: self.action_size(),
            }),
            None => Ok(()),
        }
    }
}

impl<B> Agent for DqnAgent<B>
where
    B: AutodiffBackend,
{
    type State = State;

    fn act(&mut self, state: &State, available: &[usize]) -> Result<usize, AgentError> {
        self.check_state(state)?;
        self.check_actions(available)?;

        if self.rng.random::<f32>() < self.epsilon {
            return available
                .choose(&mut self.rng)
                .copied()
                .ok_or(AgentError::NoActions);
        }

        self.best(state, available)
    }

    fn remember(&mut self, transition: Transition<State>) {
        self.memory.push(transition);
    }

    fn replay(&mut self, batch_size: usize) -> Result<Option<f32>, AgentError> {
        if batch_size == 0 || self.memory.len() < batch_size {
            return Ok(None);
        }

        let (state_size, action_size) = (self.state_size(), self.action_size());
        let sample = self.memory.sample(&mut self.rng, batch_size);
        let batch = Batch::new(&sample, state_size, action_size, &self.device)?;

        let output = self.learner.train_step(&batch);
        let loss = output.item.into_scalar().to_f32();
        self.learner.fit(output.grads);

        if self.epsilon > self.config.epsilon_min {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        }

        Ok(Some(loss))
    }

    fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn epsilon(&self) -> f32 {
        self.epsilon
    }

    fn save(&self, path: &Path) -> Result<(), AgentError> {
        let bytes = NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
            .record(self.learner.model().clone().into_record(), ())
            .map_err(|err| AgentError::Record(format!("{err:?}")))?;
        fs::write(path, bytes)?;

        self.config
            .clone()
            .with_epsilon(self.epsilon)
            .save(path.with_extension("json"))?;

        Ok(())
    }
}
