use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::{
    catalog::{
        Library, Song,
        embedding::{cosine, normalize},
    },
    config,
};

#[derive(Debug, Error, PartialEq)]
pub enum EnvError {
    #[error("the catalog has no songs")]
    Empty,

    #[error("a playlist needs at least 2 songs, the catalog has {0}")]
    TooFewSongs(usize),

    #[error("playlist length must be at least 2, got {0}")]
    PlaylistTooShort(usize),

    #[error("song embeddings have not been created")]
    MissingEmbeddings,

    #[error("the environment must be reset before stepping")]
    NotReset,

    #[error("the playlist is already complete")]
    Finished,

    #[error("song {0} is not available")]
    Unavailable(usize),

    #[error("song {0} is not in the catalog")]
    UnknownSong(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepInfo {
    /// playlist length after the step
    pub position: usize,
    pub similarity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step<S> {
    pub state: S,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

pub trait Environment {
    type State: Clone;

    fn reset(&mut self) -> Result<Self::State, EnvError>;
    fn step(&mut self, action: usize) -> Result<Step<Self::State>, EnvError>;

    /// Actions that may be taken from the current state.
    fn available(&self) -> &[usize];
}

#[derive(Clone, Debug, PartialEq)]
pub struct State {
    /// last song in the playlist
    pub song: usize,
    pub features: Vec<f32>,
}

pub struct PlaylistEnvironment {
    songs: Vec<Song>,
    embeddings: Vec<Vec<f32>>,
    settings: config::Environment,
    playlist: Vec<usize>,
    available: Vec<usize>,
    rng: StdRng,
}

impl PlaylistEnvironment {
    pub fn new(library: &Library, settings: &config::Environment) -> Result<Self, EnvError> {
        if library.is_empty() {
            return Err(EnvError::Empty);
        }
        if library.len() < 2 {
            return Err(EnvError::TooFewSongs(library.len()));
        }
        if settings.playlist_length < 2 {
            return Err(EnvError::PlaylistTooShort(settings.playlist_length));
        }

        let embeddings = library
            .embeddings()
            .ok_or(EnvError::MissingEmbeddings)?
            .to_vec();

        Ok(Self {
            songs: library.songs().to_vec(),
            embeddings,
            settings: settings.clone(),
            playlist: Vec::new(),
            available: (0..library.len()).collect(),
            rng: StdRng::seed_from_u64(settings.seed),
        })
    }

    pub fn playlist(&self) -> &[usize] {
        &self.playlist
    }

    pub fn song(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    /// Starts a playlist from a chosen song.
    pub fn reset_with(&mut self, song: usize) -> Result<State, EnvError> {
        if song >= self.songs.len() {
            return Err(EnvError::UnknownSong(song));
        }

        self.playlist.clear();
        self.playlist.push(song);
        self.available = (0..self.songs.len()).filter(|s| *s != song).collect();

        Ok(self.state())
    }

    fn state(&self) -> State {
        let context = self.settings.context.max(1);
        let recent = &self.playlist[self.playlist.len().saturating_sub(context)..];

        let mut features = vec![0.0f32; self.embeddings[0].len()];
        for song in recent {
            for (feature, value) in features.iter_mut().zip(&self.embeddings[*song]) {
                *feature += value;
            }
        }
        features
            .iter_mut()
            .for_each(|feature| *feature /= recent.len() as f32);
        normalize(&mut features);

        State {
            song: *recent.last().unwrap_or(&0),
            features,
        }
    }

    fn reward(&self, previous: usize, next: usize) -> (f32, f32) {
        let similarity = cosine(&self.embeddings[previous], &self.embeddings[next]);
        let (previous, next) = (&self.songs[previous], &self.songs[next]);

        let mut reward = similarity;
        if previous.same_genre(next) {
            reward += self.settings.genre_bonus;
        }
        if previous.same_artist(next) {
            reward -= self.settings.artist_penalty;
        }

        (reward, similarity)
    }
}

impl Environment for PlaylistEnvironment {
    type State = State;

    fn reset(&mut self) -> Result<State, EnvError> {
        let start = self.rng.random_range(0..self.songs.len());
        self.reset_with(start)
    }

    fn step(&mut self, action: usize) -> Result<Step<State>, EnvError> {
        let previous = *self.playlist.last().ok_or(EnvError::NotReset)?;
        if self.playlist.len() >= self.settings.playlist_length {
            return Err(EnvError::Finished);
        }

        let slot = self
            .available
            .iter()
            .position(|song| *song == action)
            .ok_or(EnvError::Unavailable(action))?;
        self.available.remove(slot);

        let (reward, similarity) = self.reward(previous, action);
        self.playlist.push(action);

        let done =
            self.playlist.len() >= self.settings.playlist_length || self.available.is_empty();

        Ok(Step {
            state: self.state(),
            reward,
            done,
            info: StepInfo {
                position: self.playlist.len(),
                similarity,
            },
        })
    }

    fn available(&self) -> &[usize] {
        &self.available
    }
}
