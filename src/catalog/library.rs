use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use super::{embedding, song::Song};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid playlist data in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode embeddings: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode embeddings: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("no songs in {0}")]
    Empty(PathBuf),
}

/// The dataset is either a bare list of songs or an object holding one.
#[derive(Deserialize)]
#[serde(untagged)]
enum Dataset {
    Songs(Vec<Song>),
    Wrapped { songs: Vec<Song> },
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    songs: Vec<Song>,
    embeddings: Option<Vec<Vec<f32>>>,
}

impl Library {
    pub fn new(songs: Vec<Song>) -> Self {
        let mut seen = HashSet::new();
        let songs = songs
            .into_iter()
            .filter(|song| {
                let fresh = seen.insert(song.id.clone());
                if !fresh {
                    warn!("Skipping duplicate song id {}", song.id);
                }
                fresh
            })
            .collect();

        Self {
            songs,
            embeddings: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dataset: Dataset =
            serde_json::from_str(&contents).map_err(|source| CatalogError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let songs = match dataset {
            Dataset::Songs(songs) => songs,
            Dataset::Wrapped { songs } => songs,
        };

        let library = Self::new(songs);
        if library.is_empty() {
            return Err(CatalogError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} songs from {}", library.len(), path.display());
        Ok(library)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn song(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.songs.iter().position(|song| song.id == id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// One embedding per song, in catalog order. `None` until computed or loaded.
    pub fn embeddings(&self) -> Option<&[Vec<f32>]> {
        self.embeddings.as_deref()
    }

    pub fn embedding_dim(&self) -> Option<usize> {
        self.embeddings()
            .and_then(|embeddings| embeddings.first())
            .map(Vec::len)
    }

    pub fn create_embeddings(&mut self, dim: usize) {
        let embeddings = self
            .songs
            .par_iter()
            .map(|song| embedding::embed(song, dim))
            .collect();

        self.embeddings = Some(embeddings);
    }

    /// Attaches a cached set of embeddings. The cache is ignored unless it
    /// covers every song with vectors of length `dim`.
    pub fn load_embeddings(
        &mut self,
        path: impl AsRef<Path>,
        dim: usize,
    ) -> Result<bool, CatalogError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cache: HashMap<String, Vec<f32>> = rmp_serde::from_slice(&bytes)?;

        let embeddings: Option<Vec<_>> = self
            .songs
            .iter()
            .map(|song| cache.remove(&song.id).filter(|vector| vector.len() == dim))
            .collect();

        match embeddings {
            Some(embeddings) => {
                self.embeddings = Some(embeddings);
                Ok(true)
            }
            None => {
                warn!(
                    "Ignoring embeddings cache {}: incomplete or not {dim}-dimensional",
                    path.display()
                );
                Ok(false)
            }
        }
    }

    pub fn save_embeddings(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let Some(embeddings) = self.embeddings() else {
            return Ok(());
        };

        let cache: HashMap<&str, &Vec<f32>> = self
            .songs
            .iter()
            .map(|song| song.id.as_str())
            .zip(embeddings)
            .collect();
        let bytes = rmp_serde::to_vec(&cache)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, bytes).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
