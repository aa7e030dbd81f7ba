use std::io::{self, BufRead, Stdout, StdinLock, Write};

use log::warn;

/// Decisions a training run needs from the operator.
pub trait Prompt {
    fn confirm_retrain(&mut self) -> bool;
    fn episodes(&mut self, default: usize) -> usize;
}

/// Only an explicit "y" confirms.
pub fn parse_confirmation(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

pub fn parse_episodes(answer: &str, default: usize) -> usize {
    answer.trim().parse().unwrap_or(default)
}

/// Answers from command-line flags where given, otherwise asks on the terminal.
pub struct Console<R, W> {
    input: R,
    output: W,
    retrain: Option<bool>,
    episodes: Option<usize>,
}

impl Console<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            retrain: None,
            episodes: None,
        }
    }

    pub fn with_retrain(mut self, retrain: Option<bool>) -> Self {
        self.retrain = retrain;
        self
    }

    pub fn with_episodes(mut self, episodes: Option<usize>) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        if let Err(err) = write!(self.output, "{question}").and_then(|()| self.output.flush()) {
            warn!("Failed to write prompt: {err}");
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => None,
            Ok(_) => Some(answer),
            Err(err) => {
                warn!("Failed to read answer: {err}");
                None
            }
        }
    }
}

impl<R, W> Prompt for Console<R, W>
where
    R: BufRead,
    W: Write,
{
    fn confirm_retrain(&mut self) -> bool {
        if let Some(retrain) = self.retrain {
            return retrain;
        }

        self.ask("\n❓ Do you want to retrain the model? (y/N): ")
            .is_some_and(|answer| parse_confirmation(&answer))
    }

    fn episodes(&mut self, default: usize) -> usize {
        if let Some(episodes) = self.episodes {
            return episodes;
        }

        self.ask(&format!("Number of training episodes (default {default}): "))
            .map_or(default, |answer| parse_episodes(&answer, default))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn only_y_confirms() {
        for answer in ["y", "Y", " y \n", "\ty"] {
            assert!(parse_confirmation(answer), "{answer:?}");
        }
        for answer in ["", "n", "yes", "N", "x", "yy"] {
            assert!(!parse_confirmation(answer), "{answer:?}");
        }
    }

    #[test]
    fn episodes_fall_back_to_default() {
        assert_eq!(parse_episodes("", 20), 20);
        assert_eq!(parse_episodes("   \n", 20), 20);
        assert_eq!(parse_episodes("abc", 20), 20);
        assert_eq!(parse_episodes("-5", 20), 20);
        assert_eq!(parse_episodes("2.5", 20), 20);
        assert_eq!(parse_episodes(" 35\n", 20), 35);
        assert_eq!(parse_episodes("0", 20), 0);
    }

    #[test]
    fn console_reads_answers_in_order() {
        let mut console = console("Y\n\n");

        assert!(console.confirm_retrain());
        assert_eq!(console.episodes(20), 20);

        let output = String::from_utf8(console.into_output()).unwrap();
        assert!(output.contains("retrain"));
        assert!(output.contains("default 20"));
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("terminal closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::other("terminal closed"))
        }
    }

    #[test]
    fn unwritable_output_still_reads_answers() {
        let mut console = Console::new(Cursor::new(b"y\n42\n".to_vec()), Broken);

        assert!(console.confirm_retrain());
        assert_eq!(console.episodes(20), 42);
    }

    #[test]
    fn closed_input_keeps_the_model() {
        let mut console = console("");

        assert!(!console.confirm_retrain());
        assert_eq!(console.episodes(12), 12);
    }

    #[test]
    fn flags_skip_the_terminal() {
        let mut console = console("n\n7\n")
            .with_retrain(Some(true))
            .with_episodes(Some(3));

        assert!(console.confirm_retrain());
        assert_eq!(console.episodes(20), 3);
        assert!(console.into_output().is_empty());
    }
}
