//! Feature-hashed song embeddings.
//!
//! Every field of a song is split into tokens, each token is hashed into one
//! of `dim` slots with a signed weight, and the result is L2 normalised. The
//! hash is FNV-1a so embeddings are stable across runs and platforms, which
//! keeps the on-disk cache valid.

use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use super::song::Song;

#[derive(Debug, Clone, Copy, PartialEq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Title,
    Artist,
    Genre,
    Tags,
    Era,
    Popularity,
}

impl Field {
    pub fn weight(&self) -> f32 {
        match self {
            Field::Title => 0.5,
            Field::Artist => 1.5,
            Field::Genre => 2.0,
            Field::Tags => 1.0,
            Field::Era => 0.75,
            Field::Popularity => 0.5,
        }
    }

    fn tokens(&self, song: &Song) -> Vec<String> {
        match self {
            Field::Title => song
                .title
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .map(str::to_lowercase)
                .collect(),
            Field::Artist => token(&song.artist).into_iter().collect(),
            Field::Genre => song.genre.as_deref().and_then(token).into_iter().collect(),
            Field::Tags => song.tags.iter().filter_map(|tag| token(tag)).collect(),
            Field::Era => song
                .year
                .map(|year| format!("{}s", year / 10 * 10))
                .into_iter()
                .collect(),
            Field::Popularity => song
                .popularity
                .map(|popularity| {
                    let bucket = (popularity.clamp(0.0, 100.0) / 20.0).floor().min(4.0);
                    format!("p{}", bucket as u8)
                })
                .into_iter()
                .collect(),
        }
    }
}

fn token(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_lowercase())
}

fn fnv1a(field: &str, token: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    field
        .bytes()
        .chain(std::iter::once(0xff))
        .chain(token.bytes())
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

pub fn embed(song: &Song, dim: usize) -> Vec<f32> {
    let mut embedding = vec![0.0f32; dim];
    if dim == 0 {
        return embedding;
    }

    for field in Field::iter() {
        let name: &'static str = field.into();

        for token in field.tokens(song) {
            let hash = fnv1a(name, &token);
            let slot = (hash % dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };

            embedding[slot] += sign * field.weight();
        }
    }

    normalize(&mut embedding);
    embedding
}

pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Cosine similarity, 0 when either side is the zero vector.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(a, b)| a * b).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
