//! Operator input: line sources and command parsing.
//!
//! Each line of input is either a control token or a code:
//!
//! | Input (trimmed, any case) | Command                  |
//! |---------------------------|--------------------------|
//! | `quit`, `exit`, `q`       | [`InputCommand::Quit`]     |
//! | `test`                    | [`InputCommand::TestPulse`] |
//! | empty                     | [`InputCommand::Empty`]    |
//! | anything else             | [`InputCommand::Code`]     |

#![allow(async_fn_in_trait)]

use crate::error::{AgentError, Result};
use gatepulse_core::Code;
use gatepulse_core::constants::{QUIT_TOKENS, TEST_TOKEN};
use std::collections::VecDeque;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

/// What one line of input asks the agent to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// End the session.
    Quit,

    /// Pulse the relay without validation.
    TestPulse,

    /// Blank line, ignored.
    Empty,

    /// A code to validate.
    Code(Code),
}

impl InputCommand {
    /// Classify a raw line.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatepulse_agent::InputCommand;
    ///
    /// assert_eq!(InputCommand::parse("  QUIT \n"), InputCommand::Quit);
    /// assert_eq!(InputCommand::parse("Test"), InputCommand::TestPulse);
    /// assert_eq!(InputCommand::parse("   "), InputCommand::Empty);
    /// assert!(matches!(InputCommand::parse(" ABC123 "), InputCommand::Code(c) if c.as_str() == "ABC123"));
    /// ```
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if QUIT_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) {
            return Self::Quit;
        }
        if trimmed.eq_ignore_ascii_case(TEST_TOKEN) {
            return Self::TestPulse;
        }
        match Code::new(trimmed) {
            Ok(code) => Self::Code(code),
            Err(_) => Self::Empty,
        }
    }
}

/// A source of operator input lines.
pub trait InputSource: Send {
    /// Next line, without its terminator. `Ok(None)` at end of input.
    ///
    /// Must be cancel-safe: the pipeline races it against the interrupt
    /// signal.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Lines from any buffered async reader (stdin in production).
#[derive(Debug)]
pub struct LineSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl LineSource<tokio::io::BufReader<tokio::io::Stdin>> {
    /// Lines from the process's standard input.
    pub fn stdin() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> InputSource for LineSource<R> {
    async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines.next_line().await.map_err(AgentError::Input)
    }
}

/// Scripted input for tests.
///
/// Lines can be preloaded and fed later through a [`MockInputHandle`]. Input
/// ends once the preloaded lines are consumed and every handle is dropped.
#[derive(Debug)]
pub struct MockInput {
    preloaded: VecDeque<String>,
    rx: mpsc::UnboundedReceiver<MockLine>,
}

#[derive(Debug)]
enum MockLine {
    Line(String),
    Fail(String),
}

impl MockInput {
    /// Input with no preloaded lines.
    pub fn new() -> (Self, MockInputHandle) {
        Self::from_lines(Vec::<String>::new())
    }

    /// Input that yields `lines` first.
    pub fn from_lines<I, S>(lines: I) -> (Self, MockInputHandle)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                preloaded: lines.into_iter().map(Into::into).collect(),
                rx,
            },
            MockInputHandle { tx },
        )
    }
}

impl InputSource for MockInput {
    async fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.preloaded.pop_front() {
            return Ok(Some(line));
        }
        match self.rx.recv().await {
            Some(MockLine::Line(line)) => Ok(Some(line)),
            Some(MockLine::Fail(message)) => Err(AgentError::Input(std::io::Error::other(message))),
            None => Ok(None),
        }
    }
}

/// Feeds lines into a [`MockInput`].
#[derive(Debug, Clone)]
pub struct MockInputHandle {
    tx: mpsc::UnboundedSender<MockLine>,
}

impl MockInputHandle {
    /// Queue a line. Returns `false` if the input was dropped.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.tx.send(MockLine::Line(line.into())).is_ok()
    }

    /// Make the next read fail with an I/O error.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.tx.send(MockLine::Fail(message.into())).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("quit")]
    #[case("EXIT")]
    #[case(" q ")]
    #[case("Quit\r\n")]
    fn test_quit_tokens(#[case] line: &str) {
        assert_eq!(InputCommand::parse(line), InputCommand::Quit);
    }

    #[rstest]
    #[case("test")]
    #[case("TEST")]
    #[case("\ttest ")]
    fn test_test_token(#[case] line: &str) {
        assert_eq!(InputCommand::parse(line), InputCommand::TestPulse);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn test_empty(#[case] line: &str) {
        assert_eq!(InputCommand::parse(line), InputCommand::Empty);
    }

    #[rstest]
    #[case("ABC123", "ABC123")]
    #[case("  PA_42  ", "PA_42")]
    #[case("quitter", "quitter")]
    #[case("testing", "testing")]
    fn test_codes(#[case] line: &str, #[case] expected: &str) {
        match InputCommand::parse(line) {
            InputCommand::Code(code) => assert_eq!(code.as_str(), expected),
            other => panic!("expected code, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_line_source() {
        let reader = tokio::io::BufReader::new(&b"ABC123\r\ntest\nquit"[..]);
        let mut source = LineSource::new(reader);

        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("ABC123"));
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("test"));
        assert_eq!(source.next_line().await.unwrap().as_deref(), Some("quit"));
        assert_eq!(source.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_input_ends_when_handles_dropped() {
        let (mut input, handle) = MockInput::from_lines(["first"]);
        handle.send("second");
        drop(handle);

        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_input_failure() {
        let (mut input, handle) = MockInput::new();
        handle.fail("device unplugged");

        assert!(matches!(
            input.next_line().await,
            Err(AgentError::Input(_))
        ));
    }
}
