//! Console presenter for status signals.

use gatepulse_core::{PulseOrigin, StatusEvent, StatusSignal};
use std::io::{self, Write};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

const PROMPT: &str = "Enter code: ";

/// Render status events on stdout until every sender is gone.
pub fn spawn(mut events: UnboundedReceiver<StatusEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut console = Console::default();
        while let Some(event) = events.recv().await {
            let mut out = io::stdout().lock();
            let _ = console.write(&event.signal, &mut out).and_then(|()| out.flush());
        }
    })
}

pub fn banner(mock_relay: bool) -> String {
    let mut text = String::from(
        "gatepulse access agent\n\
         Enter codes and press ENTER to validate\n\
         Type 'test' to pulse the relay, 'quit' or 'exit' to stop\n",
    );
    if mock_relay {
        text.push_str("(mock relay: no GPIO is driven)\n");
    }
    text.push_str(&"-".repeat(40));
    text
}

/// Tracks whether the prompt is the last thing on screen.
#[derive(Debug, Default)]
struct Console {
    prompt_open: bool,
}

impl Console {
    fn write(&mut self, signal: &StatusSignal, out: &mut impl Write) -> io::Result<()> {
        match render(signal) {
            Line::Prompt => {
                self.prompt_open = true;
                write!(out, "{PROMPT}")
            }
            // Pulse results arrive while the operator may be typing: move
            // off the prompt line and put the prompt back afterwards.
            Line::Text(text) if self.prompt_open && is_background(signal) => {
                write!(out, "\n{text}\n{PROMPT}")
            }
            Line::Text(text) => {
                self.prompt_open = false;
                writeln!(out, "{text}")
            }
            Line::Nothing => Ok(()),
        }
    }
}

/// Signals produced by the relay worker rather than in reply to input.
fn is_background(signal: &StatusSignal) -> bool {
    matches!(
        signal,
        StatusSignal::PulseCompleted { .. } | StatusSignal::PulseFailed { .. }
    )
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Prompt,
    Text(String),
    Nothing,
}

fn render(signal: &StatusSignal) -> Line {
    let text = match signal {
        StatusSignal::Ready => return Line::Prompt,
        StatusSignal::ValidationStarted { code } => format!("Validating code: {code}"),
        StatusSignal::CodeAccepted { detail, .. } => match detail {
            Some(detail) => format!("✓ Code validated successfully ({detail})"),
            None => "✓ Code validated successfully".to_string(),
        },
        StatusSignal::CodeDenied { reason, .. } => format!("✗ Invalid code: {reason}"),
        StatusSignal::CodeFiltered { code } => format!("✗ Code {code} is not accepted here"),
        StatusSignal::PulseQueued {
            origin: PulseOrigin::Diagnostic,
        } => "Testing relay...".to_string(),
        StatusSignal::PulseQueued { .. } => return Line::Nothing,
        StatusSignal::PulseDropped { origin } => {
            format!("⚠ Relay busy, {origin} pulse dropped")
        }
        StatusSignal::PulseCompleted { active_for, .. } => {
            format!("Relay pulsed for {} ms", active_for.as_millis())
        }
        StatusSignal::PulseFailed { error, .. } => format!("⚠ Relay error: {error}"),
        StatusSignal::CleanupPerformed => "GPIO released".to_string(),
        StatusSignal::CleanupFailed { error } => format!("⚠ GPIO cleanup error: {error}"),
        _ => return Line::Nothing,
    };
    Line::Text(text)
}
