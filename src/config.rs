use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Data {
    pub playlist_data_file: PathBuf,
    /// msgpack cache of song embeddings, skipped when unset
    pub embeddings_file: Option<PathBuf>,
    pub embedding_dim: usize,
}

impl Default for Data {
    fn default() -> Self {
        Self {
            playlist_data_file: PathBuf::from("data/playlist_data.json"),
            embeddings_file: Some(PathBuf::from("data/embeddings.mpk")),
            embedding_dim: 64,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub playlist_length: usize,
    /// number of trailing songs averaged into the state
    pub context: usize,
    pub genre_bonus: f32,
    pub artist_penalty: f32,
    pub seed: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            playlist_length: 10,
            context: 3,
            genre_bonus: 0.2,
            artist_penalty: 0.3,
            seed: 0x5EED,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Agent {
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub gamma: f32,
    pub epsilon: f32,
    pub epsilon_decay: f32,
    pub epsilon_min: f32,
    pub memory_size: usize,
    pub target_update: usize,
    pub seed: u64,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            hidden_size: 128,
            learning_rate: 1e-3,
            gamma: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            memory_size: 2_000,
            target_update: 100,
            seed: 0x12C0FFEE,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Training {
    pub model_path: PathBuf,
    pub default_episodes: usize,
    pub batch_size: usize,
    pub log_interval: usize,
}

impl Default for Training {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/dqn_model.h5"),
            default_episodes: 20,
            batch_size: 32,
            log_interval: 10,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: Data,
    pub environment: Environment,
    pub agent: Agent,
    pub training: Training,
}

impl Settings {
    pub fn load(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();
        let contents = fs::read_to_string(filename)
            .with_context(|| format!("reading settings from {}", filename.display()))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("parsing settings in {}", filename.display()))?;

        Ok(settings)
    }

    /// Loads `filename` when given, otherwise falls back to the defaults.
    pub fn load_or_default(filename: Option<&Path>) -> Result<Self> {
        match filename {
            Some(filename) => Self::load(filename),
            None => Ok(Self::default()),
        }
    }

    /// Sidecar holding the agent configuration next to the weights.
    pub fn model_metadata_path(&self) -> PathBuf {
        self.training.model_path.with_extension("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.toml");
        fs::write(
            &path,
            r#"
            [data]
            embedding_dim = 16

            [training]
            batch_size = 8
            "#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();

        assert_eq!(settings.data.embedding_dim, 16);
        assert_eq!(
            settings.data.playlist_data_file,
            PathBuf::from("data/playlist_data.json")
        );
        assert_eq!(settings.training.batch_size, 8);
        assert_eq!(settings.training.default_episodes, 20);
        assert_eq!(settings.agent.memory_size, 2_000);
    }

    #[test]
    fn defaults_match_the_training_script() {
        let settings = Settings::load_or_default(None).unwrap();

        assert_eq!(
            settings.training.model_path,
            PathBuf::from("models/dqn_model.h5")
        );
        assert_eq!(
            settings.model_metadata_path(),
            PathBuf::from("models/dqn_model.json")
        );
        assert_eq!(settings.training.batch_size, 32);
        assert_eq!(settings.training.log_interval, 10);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(dir.path().join("nope.toml")).unwrap_err();

        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
