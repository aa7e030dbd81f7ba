use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,

    #[serde(default)]
    pub genre: Option<String>,

    #[serde(default, deserialize_with = "tags")]
    pub tags: Vec<String>,

    /// 0 - 100
    #[serde(default)]
    pub popularity: Option<f32>,

    #[serde(default)]
    pub year: Option<u16>,
}

impl Song {
    pub fn new(id: &str, title: &str, artist: &str) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            artist: artist.to_owned(),
            genre: None,
            tags: Vec::new(),
            popularity: None,
            year: None,
        }
    }

    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_owned());
        self
    }

    pub fn same_genre(&self, other: &Song) -> bool {
        match (&self.genre, &other.genre) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    pub fn same_artist(&self, other: &Song) -> bool {
        self.artist.trim().eq_ignore_ascii_case(other.artist.trim())
    }
}

impl Display for Song {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Tags come either as a list or as a single comma separated string.
fn tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    let tags = match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::List(tags)) => tags,
        Some(Tags::Joined(tags)) => tags.split(',').map(str::to_owned).collect(),
        None => Vec::new(),
    };

    Ok(tags
        .into_iter()
        .map(|tag| tag.trim().to_owned())
        .filter(|tag| !tag.is_empty())
        .collect())
}
