use std::io::Write;

use chrono::Local;

/// In-memory training log. Every entry is stamped with the wall-clock time
/// and echoed to stdout as soon as it is appended.
#[derive(Debug, Default)]
pub struct TrainingLog {
    entries: Vec<String>,
    quiet: bool,
}

impl TrainingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps entries without echoing them.
    pub fn quiet() -> Self {
        Self {
            entries: Vec::new(),
            quiet: true,
        }
    }

    pub fn push(&mut self, message: impl AsRef<str>) {
        let entry = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.as_ref());

        if !self.quiet {
            println!("{entry}");
            let _ = std::io::stdout().flush();
        }

        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with the timestamp stripped.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|entry| entry.split_once("] ").map_or(entry.as_str(), |(_, message)| message))
    }
}
