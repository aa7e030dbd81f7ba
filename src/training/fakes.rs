//! Scripted collaborators for exercising the training loop.

use std::{cell::RefCell, fs, path::Path, path::PathBuf, rc::Rc};

use anyhow::bail;

use crate::{
    catalog::{Library, Song},
    config::Settings,
    environment::{EnvError, Environment, Step, StepInfo},
    model::{Agent, AgentError},
};

use super::{data::Transition, factory::Factory};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    LoadLibrary,
    BuildEnvironment,
    BuildAgent { state_size: usize, action_size: usize },
    Reset,
    Step,
    Remember,
    Replay { memory: usize },
    Save(PathBuf),
}

#[derive(Clone, Default)]
pub struct Events(Rc<RefCell<Vec<Event>>>);

impl Events {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn all(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn count(&self, filter: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|event| filter(event)).count()
    }
}

pub struct FakeEnv {
    length: usize,
    events: Events,
    resets: usize,
    position: usize,
    available: Vec<usize>,
    failing_resets: Vec<usize>,
    failing_steps: Vec<(usize, usize)>,
}

impl FakeEnv {
    /// Every episode lasts `length` steps, each worth a reward of 1.
    pub fn new(length: usize, events: Events) -> Self {
        Self {
            length,
            events,
            resets: 0,
            position: 0,
            available: vec![0, 1, 2],
            failing_resets: Vec::new(),
            failing_steps: Vec::new(),
        }
    }

    pub fn fail_reset(mut self, episode: usize) -> Self {
        self.failing_resets.push(episode);
        self
    }

    pub fn fail_step(mut self, episode: usize, step: usize) -> Self {
        self.failing_steps.push((episode, step));
        self
    }
}

impl Environment for FakeEnv {
    type State = usize;

    fn reset(&mut self) -> Result<usize, EnvError> {
        let episode = self.resets;
        self.resets += 1;
        self.events.push(Event::Reset);

        if self.failing_resets.contains(&episode) {
            return Err(EnvError::Empty);
        }

        self.position = 0;
        Ok(self.position)
    }

    fn step(&mut self, action: usize) -> Result<Step<usize>, EnvError> {
        let episode = self.resets.saturating_sub(1);
        if self.failing_steps.contains(&(episode, self.position)) {
            return Err(EnvError::Unavailable(action));
        }

        self.position += 1;
        self.events.push(Event::Step);

        Ok(Step {
            state: self.position,
            reward: 1.0,
            done: self.position >= self.length,
            info: StepInfo {
                position: self.position,
                similarity: 1.0,
            },
        })
    }

    fn available(&self) -> &[usize] {
        &self.available
    }
}

pub struct FakeAgent {
    events: Events,
    memory: usize,
    acts: usize,
    epsilon: f32,
    pub fail_act_at: Option<usize>,
    pub fail_replay: bool,
    pub fail_save: bool,
}

impl FakeAgent {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            memory: 0,
            acts: 0,
            epsilon: 1.0,
            fail_act_at: None,
            fail_replay: false,
            fail_save: false,
        }
    }
}

impl Agent for FakeAgent {
    type State = usize;

    fn act(&mut self, _state: &usize, available: &[usize]) -> Result<usize, AgentError> {
        let call = self.acts;
        self.acts += 1;

        if self.fail_act_at == Some(call) {
            return Err(AgentError::NoActions);
        }

        available.first().copied().ok_or(AgentError::NoActions)
    }

    fn remember(&mut self, _transition: Transition<usize>) {
        self.memory += 1;
        self.events.push(Event::Remember);
    }

    fn replay(&mut self, _batch_size: usize) -> Result<Option<f32>, AgentError> {
        if self.fail_replay {
            return Err(AgentError::Tensor(String::from("shape mismatch")));
        }

        self.events.push(Event::Replay {
            memory: self.memory,
        });
        self.epsilon *= 0.99;

        Ok(Some(0.5))
    }

    fn memory_len(&self) -> usize {
        self.memory
    }

    fn epsilon(&self) -> f32 {
        self.epsilon
    }

    fn save(&self, path: &Path) -> Result<(), AgentError> {
        if self.fail_save {
            return Err(AgentError::Io(std::io::Error::other("disk full")));
        }

        fs::write(path, b"weights")?;
        self.events.push(Event::Save(path.to_path_buf()));

        Ok(())
    }
}

pub struct FakeFactory {
    pub events: Events,
    pub songs: usize,
    pub episode_length: usize,
    pub fail_library: bool,
    pub fail_agent: bool,
    pub fail_save: bool,
}

impl FakeFactory {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            songs: 3,
            episode_length: 4,
            fail_library: false,
            fail_agent: false,
            fail_save: false,
        }
    }
}

impl Factory for FakeFactory {
    type Env = FakeEnv;
    type Agent = FakeAgent;

    fn library(&mut self, _settings: &Settings) -> anyhow::Result<Library> {
        self.events.push(Event::LoadLibrary);

        if self.fail_library {
            bail!("corrupt dataset");
        }

        let songs = (0..self.songs)
            .map(|ndx| Song::new(&ndx.to_string(), "Song", "Artist"))
            .collect();

        Ok(Library::new(songs))
    }

    fn environment(&mut self, _library: &Library, _settings: &Settings) -> anyhow::Result<FakeEnv> {
        self.events.push(Event::BuildEnvironment);

        Ok(FakeEnv::new(self.episode_length, self.events.clone()))
    }

    fn agent(
        &mut self,
        state_size: usize,
        action_size: usize,
        _settings: &Settings,
    ) -> anyhow::Result<FakeAgent> {
        self.events.push(Event::BuildAgent {
            state_size,
            action_size,
        });

        if self.fail_agent {
            bail!("no device");
        }

        let mut agent = FakeAgent::new(self.events.clone());
        agent.fail_save = self.fail_save;

        Ok(agent)
    }
}
