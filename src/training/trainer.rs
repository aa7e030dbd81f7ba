use crate::{
    config,
    environment::{Environment, Step},
    model::Agent,
};

use super::{
    data::Transition,
    failure::{Failure, StepError},
    logbook::TrainingLog,
};

#[derive(Debug)]
pub enum EpisodeEnd {
    Done,
    /// a step failed and the rest of the episode was skipped
    Abandoned(Failure),
}

#[derive(Debug)]
pub struct EpisodeStats {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f32,
    pub epsilon: f32,
    pub end: EpisodeEnd,
}

#[derive(Debug, Default)]
pub struct Report {
    /// episodes that ran, including abandoned ones
    pub episodes: Vec<EpisodeStats>,
    /// episodes that failed before taking a step
    pub failures: Vec<Failure>,
}

impl Report {
    pub fn completed(&self) -> usize {
        self.episodes
            .iter()
            .filter(|stats| matches!(stats.end, EpisodeEnd::Done))
            .count()
    }

    pub fn abandoned(&self) -> usize {
        self.episodes.len() - self.completed()
    }

    pub fn attempted(&self) -> usize {
        self.episodes.len() + self.failures.len()
    }
}

pub struct Trainer<E, A> {
    env: E,
    agent: A,
    settings: config::Training,
}

impl<E, A> Trainer<E, A>
where
    E: Environment,
    A: Agent<State = E::State>,
{
    pub fn new(env: E, agent: A, settings: config::Training) -> Self {
        Self {
            env,
            agent,
            settings,
        }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn run(&mut self, episodes: usize, log: &mut TrainingLog) -> Report {
        let interval = self.settings.log_interval.max(1);
        let mut report = Report::default();

        for episode in 0..episodes {
            if episode % interval == 0 {
                let progress = episode as f64 / episodes as f64 * 100.0;
                log.push(format!("Episode {episode}/{episodes} ({progress:.1}%)"));
            }

            let stats = match self.episode(episode) {
                Ok(stats) => stats,
                Err(failure) => {
                    log.push(failure.to_string());
                    report.failures.push(failure);
                    continue;
                }
            };

            if let EpisodeEnd::Abandoned(failure) = &stats.end {
                log.push(failure.to_string());
            }
            log.push(format!(
                "Episode {episode}: completed with {} steps, reward = {:.2}",
                stats.steps, stats.total_reward
            ));

            if episode % interval == 0 && episode > 0 {
                log.push(format!(
                    "Episode {episode}: Total Reward = {:.2}, Steps = {}, Epsilon = {:.3}",
                    stats.total_reward, stats.steps, stats.epsilon
                ));
                log.push(format!(
                    "Memory size: {}, Available songs: {}",
                    self.agent.memory_len(),
                    self.env.available().len()
                ));
                println!("{}", "-".repeat(40));
            }

            report.episodes.push(stats);
        }

        report
    }

    fn episode(&mut self, episode: usize) -> Result<EpisodeStats, Failure> {
        let mut state = self.env.reset().map_err(|source| Failure::Episode {
            episode,
            source: source.into(),
        })?;

        let mut stats = EpisodeStats {
            episode,
            steps: 0,
            total_reward: 0.0,
            epsilon: self.agent.epsilon(),
            end: EpisodeEnd::Done,
        };

        loop {
            let step = match self.transition(&state) {
                Ok(step) => step,
                Err(source) => {
                    stats.end = EpisodeEnd::Abandoned(Failure::Step {
                        episode,
                        step: stats.steps,
                        source,
                    });
                    break;
                }
            };

            state = step.state;
            stats.total_reward += step.reward;
            stats.steps += 1;

            if let Err(source) = self.learn() {
                stats.end = EpisodeEnd::Abandoned(Failure::Step {
                    episode,
                    step: stats.steps,
                    source,
                });
                break;
            }

            if step.done {
                break;
            }
        }

        stats.epsilon = self.agent.epsilon();
        Ok(stats)
    }

    fn transition(&mut self, state: &E::State) -> Result<Step<E::State>, StepError> {
        let action = self.agent.act(state, self.env.available())?;
        let step = self.env.step(action)?;

        self.agent.remember(Transition {
            state: state.clone(),
            action,
            reward: step.reward,
            next_state: step.state.clone(),
            done: step.done,
        });

        Ok(step)
    }

    /// Learns from a batch once the memory holds more than one batch.
    fn learn(&mut self) -> Result<(), StepError> {
        let batch_size = self.settings.batch_size;

        if self.agent.memory_len() > batch_size {
            self.agent.replay(batch_size)?;
        }

        Ok(())
    }
}
