use std::{
    fs,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use burn::config::Config;
use log::{info, warn};
use num_format::{Locale, ToFormattedString};

use crate::{
    catalog::Library,
    config::Settings,
    environment::Environment,
    model::{Agent, dqn::AgentConfig},
};

use super::{
    factory::Factory,
    logbook::TrainingLog,
    prompt::Prompt,
    trainer::{Report, Trainer},
};

pub struct Summary {
    pub episodes: usize,
    pub elapsed: Duration,
    pub epsilon: f32,
    pub memory: usize,
    pub model_path: PathBuf,
    pub report: Report,
}

/// How a training run ended. Every variant is a normal return.
pub enum Outcome {
    /// the dataset is missing, nothing was loaded
    MissingDataset(PathBuf),
    /// an existing model was kept untouched
    KeptModel,
    LoadFailed(anyhow::Error),
    Completed(Summary),
    /// setup, embedding, construction or save failed
    Failed(anyhow::Error),
}

pub struct Session {
    settings: Settings,
    log: TrainingLog,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            log: TrainingLog::new(),
        }
    }

    pub fn with_log(mut self, log: TrainingLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &TrainingLog {
        &self.log
    }

    pub fn run<F, P>(&mut self, factory: &mut F, prompt: &mut P) -> Outcome
    where
        F: Factory,
        P: Prompt,
    {
        println!("🧠 CHECKING AND TRAINING THE DQN MODEL");
        println!("{}", "=".repeat(50));

        let dataset = &self.settings.data.playlist_data_file;
        if !dataset.exists() {
            println!("❌ Playlist data not found at {}!", dataset.display());
            println!("   Please run the data collection step first");
            return Outcome::MissingDataset(dataset.clone());
        }

        let mut library = None;

        let model_path = &self.settings.training.model_path;
        if model_path.exists() {
            println!("✅ Found existing model: {}", model_path.display());
            self.describe_model();

            match factory.library(&self.settings) {
                Ok(loaded) => {
                    println!("📊 Data: {} songs", count(loaded.len()));

                    if !prompt.confirm_retrain() {
                        println!("✅ Keeping the existing model!");
                        println!("🎉 The system is ready to use!");
                        return Outcome::KeptModel;
                    }

                    println!("🔄 Retraining the model...");
                    library = Some(loaded);
                }
                Err(err) => {
                    warn!("Preflight load failed: {err:#}");
                    println!("⚠️ Could not load data, starting a fresh training run...");
                }
            }
        } else {
            println!("📊 No model yet, starting training...");
        }

        let library = match library {
            Some(library) => library,
            None => {
                println!("\n📊 Loading data...");
                match factory.library(&self.settings) {
                    Ok(library) => library,
                    Err(err) => {
                        println!("❌ Could not load data: {err:#}");
                        return Outcome::LoadFailed(err);
                    }
                }
            }
        };
        println!("✅ Loaded {} songs", count(library.len()));

        let episodes = prompt.episodes(self.settings.training.default_episodes);
        println!("🎯 Training for {episodes} episodes");
        println!();

        match self.train(factory, library, episodes) {
            Ok(summary) => {
                println!();
                println!("✅ TRAINING COMPLETED SUCCESSFULLY!");
                println!("📁 Model saved to: {}", summary.model_path.display());
                println!(
                    "⏱️  Training time: {:.2} seconds",
                    summary.elapsed.as_secs_f64()
                );
                Outcome::Completed(summary)
            }
            Err(err) => {
                println!();
                println!("❌ TRAINING ERROR: {err:#}");
                self.log.push(format!("Training error: {err:#}"));
                Outcome::Failed(err)
            }
        }
    }

    fn describe_model(&self) {
        let metadata = self.settings.model_metadata_path();
        if !metadata.exists() {
            return;
        }

        match AgentConfig::load(&metadata) {
            Ok(config) => println!(
                "📦 Model: state_size={}, action_size={}, epsilon={:.3}",
                config.model.num_inputs, config.model.num_actions, config.epsilon
            ),
            Err(err) => warn!("Unreadable model metadata {}: {err:?}", metadata.display()),
        }
    }

    fn train<F: Factory>(
        &mut self,
        factory: &mut F,
        mut library: Library,
        episodes: usize,
    ) -> Result<Summary> {
        let dim = self.settings.data.embedding_dim;

        if library.embeddings().is_none() {
            println!("🔄 Creating embeddings...");
            self.log.push("Creating song embeddings...");
            library.create_embeddings(dim);

            if let Some(cache) = &self.settings.data.embeddings_file {
                match library.save_embeddings(cache) {
                    Ok(()) => info!("Cached embeddings in {}", cache.display()),
                    Err(err) => warn!("Failed to cache embeddings: {err:#}"),
                }
            }

            self.log.push("Embeddings complete!");
            println!();
        }

        println!("🔄 Creating environment...");
        self.log.push("Initializing environment and model...");
        let env = factory
            .environment(&library, &self.settings)
            .context("creating the playlist environment")?;
        println!(
            "✅ Environment has {} songs available",
            count(env.available().len())
        );

        let (state_size, action_size) = (dim, library.len());
        let agent = factory
            .agent(state_size, action_size, &self.settings)
            .context("creating the DQN agent")?;
        println!("✅ DQN model: state_size={state_size}, action_size={action_size}");
        println!();

        self.log
            .push(format!("Starting training for {episodes} episodes..."));
        println!("{}", "=".repeat(60));
        info!("Training {episodes} episodes over {action_size} songs");

        let start = Instant::now();
        let mut trainer = Trainer::new(env, agent, self.settings.training.clone());
        let report = trainer.run(episodes, &mut self.log);
        let elapsed = start.elapsed();

        self.log.push("Training complete!");

        self.log.push("Saving model...");
        let model_path = self.settings.training.model_path.clone();
        if let Some(parent) = model_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        trainer
            .agent()
            .save(&model_path)
            .with_context(|| format!("saving the model to {}", model_path.display()))?;
        self.log.push("Model saved successfully!");

        let agent = trainer.agent();
        let (epsilon, memory) = (agent.epsilon(), agent.memory_len());

        self.log.push("Final statistics:");
        self.log.push(format!("   - Total episodes: {episodes}"));
        self.log.push(format!(
            "   - Training time: {:.2} seconds",
            elapsed.as_secs_f64()
        ));
        self.log.push(format!("   - Final epsilon: {epsilon:.3}"));
        self.log.push(format!("   - Memory size: {}", count(memory)));

        Ok(Summary {
            episodes,
            elapsed,
            epsilon,
            memory,
            model_path,
            report,
        })
    }
}

fn count(value: usize) -> String {
    value.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, path::Path};

    use crate::training::{
        fakes::{Event, Events, FakeFactory},
        prompt::Console,
    };

    use super::*;

    struct Answers {
        retrain: bool,
        episodes: usize,
        asked_retrain: usize,
        asked_episodes: usize,
    }

    impl Answers {
        fn new(retrain: bool, episodes: usize) -> Self {
            Self {
                retrain,
                episodes,
                asked_retrain: 0,
                asked_episodes: 0,
            }
        }
    }

    impl Prompt for Answers {
        fn confirm_retrain(&mut self) -> bool {
            self.asked_retrain += 1;
            self.retrain
        }

        fn episodes(&mut self, _default: usize) -> usize {
            self.asked_episodes += 1;
            self.episodes
        }
    }

    fn settings(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.data.playlist_data_file = dir.join("data/playlist_data.json");
        settings.data.embeddings_file = Some(dir.join("data/embeddings.mpk"));
        settings.data.embedding_dim = 8;
        settings.training.model_path = dir.join("models/dqn_model.h5");
        settings
    }

    fn with_dataset(dir: &Path) -> Settings {
        let settings = settings(dir);
        fs::create_dir_all(dir.join("data")).unwrap();
        fs::write(&settings.data.playlist_data_file, "[]").unwrap();
        settings
    }

    fn session(settings: Settings) -> Session {
        Session::new(settings).with_log(TrainingLog::quiet())
    }

    #[test]
    fn missing_dataset_aborts_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        let mut answers = Answers::new(true, 3);

        let outcome = session(settings(dir.path())).run(&mut factory, &mut answers);

        assert!(matches!(outcome, Outcome::MissingDataset(_)));
        assert!(events.all().is_empty());
        assert_eq!(answers.asked_retrain + answers.asked_episodes, 0);
        assert!(!dir.path().join("models").exists());
    }

    #[test]
    fn declining_retrain_keeps_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());
        let model_path = settings.training.model_path.clone();
        fs::create_dir_all(model_path.parent().unwrap()).unwrap();
        fs::write(&model_path, b"trained").unwrap();

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        let mut answers = Answers::new(false, 3);

        let outcome = session(settings).run(&mut factory, &mut answers);

        assert!(matches!(outcome, Outcome::KeptModel));
        assert_eq!(fs::read(&model_path).unwrap(), b"trained");
        assert_eq!(events.all(), vec![Event::LoadLibrary]);
        assert_eq!(answers.asked_retrain, 1);
        assert_eq!(answers.asked_episodes, 0);
    }

    #[test]
    fn confirmed_retrain_reuses_the_preflight_load() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());
        let model_path = settings.training.model_path.clone();
        fs::create_dir_all(model_path.parent().unwrap()).unwrap();
        fs::write(&model_path, b"trained").unwrap();

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        let mut answers = Answers::new(true, 2);

        let outcome = session(settings).run(&mut factory, &mut answers);

        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(events.count(|event| *event == Event::LoadLibrary), 1);
        assert_eq!(fs::read(&model_path).unwrap(), b"weights");
    }

    #[test]
    fn preflight_load_failure_falls_through_to_training() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());
        let model_path = settings.training.model_path.clone();
        fs::create_dir_all(model_path.parent().unwrap()).unwrap();
        fs::write(&model_path, b"trained").unwrap();

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        factory.fail_library = true;
        let mut answers = Answers::new(true, 2);

        let outcome = session(settings).run(&mut factory, &mut answers);

        assert!(matches!(outcome, Outcome::LoadFailed(_)));
        assert_eq!(answers.asked_retrain, 0);
        assert_eq!(events.all(), vec![Event::LoadLibrary, Event::LoadLibrary]);
        assert_eq!(fs::read(&model_path).unwrap(), b"trained");
    }

    #[test]
    fn fresh_run_trains_and_saves_once_after_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());
        let model_path = settings.training.model_path.clone();

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        let mut answers = Answers::new(false, 5);

        let mut session = session(settings);
        let outcome = session.run(&mut factory, &mut answers);

        let Outcome::Completed(summary) = outcome else {
            panic!("training did not complete");
        };
        assert_eq!(summary.episodes, 5);
        assert_eq!(summary.report.completed(), 5);
        assert_eq!(summary.memory, 20);
        assert_eq!(summary.model_path, model_path);

        // retrain is only asked about when a model exists
        assert_eq!(answers.asked_retrain, 0);
        assert!(dir.path().join("models").is_dir());
        assert!(model_path.exists());

        let events = events.all();
        let saves: Vec<_> = events
            .iter()
            .enumerate()
            .filter(|(_, event)| matches!(event, Event::Save(_)))
            .collect();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, events.len() - 1);
        assert_eq!(*saves[0].1, Event::Save(model_path));

        assert_eq!(
            events[..3],
            [
                Event::LoadLibrary,
                Event::BuildEnvironment,
                Event::BuildAgent {
                    state_size: 8,
                    action_size: 3
                },
            ]
        );
        assert_eq!(
            events.iter().filter(|event| **event == Event::Reset).count(),
            5
        );

        let messages: Vec<_> = session.log().messages().collect();
        assert_eq!(messages.first(), Some(&"Creating song embeddings..."));
        assert!(messages.contains(&"Model saved successfully!"));
        assert!(messages.contains(&"   - Total episodes: 5"));
        assert!(messages.contains(&"   - Memory size: 20"));
    }

    #[test]
    fn blank_episode_answer_trains_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        let mut console = Console::new(Cursor::new(b"\n".to_vec()), Vec::new());

        let outcome = session(settings).run(&mut factory, &mut console);

        assert!(matches!(outcome, Outcome::Completed(Summary { episodes: 20, .. })));
        assert_eq!(events.count(|event| *event == Event::Reset), 20);
    }

    #[test]
    fn embeddings_are_cached_when_computed() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());
        let cache = settings.data.embeddings_file.clone().unwrap();

        let mut factory = FakeFactory::new(Events::default());
        let mut answers = Answers::new(false, 1);

        let outcome = session(settings.clone()).run(&mut factory, &mut answers);
        assert!(matches!(outcome, Outcome::Completed(_)));
        assert!(cache.exists());

        let mut library = factory.library(&settings).unwrap();
        assert!(library.load_embeddings(&cache, 8).unwrap());
    }

    #[test]
    fn unwritable_embeddings_cache_does_not_stop_training() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = with_dataset(dir.path());
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        settings.data.embeddings_file = Some(blocker.join("embeddings.mpk"));
        let model_path = settings.training.model_path.clone();

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        let mut answers = Answers::new(false, 2);

        let outcome = session(settings).run(&mut factory, &mut answers);

        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(events.count(|event| *event == Event::Reset), 2);
        assert!(model_path.exists());
        assert!(blocker.is_file());
    }

    #[test]
    fn construction_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());
        let model_path = settings.training.model_path.clone();

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        factory.fail_agent = true;
        let mut answers = Answers::new(false, 3);

        let mut session = session(settings);
        let outcome = session.run(&mut factory, &mut answers);

        let Outcome::Failed(err) = outcome else {
            panic!("expected a failed run");
        };
        assert!(format!("{err:#}").contains("no device"));
        assert_eq!(events.count(|event| *event == Event::Reset), 0);
        assert!(!model_path.exists());
        assert!(
            session
                .log()
                .messages()
                .last()
                .is_some_and(|message| message.starts_with("Training error: creating the DQN agent"))
        );
    }

    #[test]
    fn save_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let settings = with_dataset(dir.path());

        let events = Events::default();
        let mut factory = FakeFactory::new(events.clone());
        factory.fail_save = true;
        let mut answers = Answers::new(false, 2);

        let outcome = session(settings).run(&mut factory, &mut answers);

        let Outcome::Failed(err) = outcome else {
            panic!("expected a failed run");
        };
        assert!(format!("{err:#}").contains("disk full"));
        assert_eq!(events.count(|event| *event == Event::Reset), 2);
    }
}
