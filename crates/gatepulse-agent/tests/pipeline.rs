//! Integration tests for InputPipeline
//!
//! These drive the full read-validate-actuate loop with scripted input, a
//! scripted validator and a mock relay line, on a paused Tokio clock so
//! pulse timing is exact.

use gatepulse_agent::{CodeFilter, InputPipeline, MockInput, StopReason};
use gatepulse_core::{PulseOrigin, StatusSignal, StatusSink};
use gatepulse_hardware::mock::{MockLineHandle, MockOutputLine};
use gatepulse_hardware::{AnyOutputLine, Level, Polarity, RelayController, RelayHandle, RelayWorker};
use gatepulse_network::{MockValidator, ValidationFailure, ValidationOutcome};
use std::future;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const PULSE: Duration = Duration::from_millis(200);

struct Rig {
    relay: RelayHandle,
    line: MockLineHandle,
    status: StatusSink,
    events: UnboundedReceiver<gatepulse_core::StatusEvent>,
}

fn rig(queue_capacity: usize) -> Rig {
    let (line, line_handle) = MockOutputLine::new();
    let controller =
        RelayController::new(AnyOutputLine::Mock(line), Polarity::ActiveHigh, PULSE);
    let (status, events) = StatusSink::channel();
    let relay = RelayWorker::new(controller, queue_capacity).spawn(status.clone());
    Rig {
        relay,
        line: line_handle,
        status,
        events,
    }
}

fn drain(events: &mut UnboundedReceiver<gatepulse_core::StatusEvent>) -> Vec<StatusSignal> {
    let mut signals = Vec::new();
    while let Ok(event) = events.try_recv() {
        signals.push(event.signal);
    }
    signals
}

fn count(signals: &[StatusSignal], pred: impl Fn(&StatusSignal) -> bool) -> usize {
    signals.iter().filter(|s| pred(s)).count()
}

fn assert_no_overlap(line: &MockLineHandle) {
    let intervals = line.active_intervals(Polarity::ActiveHigh);
    for pair in intervals.windows(2) {
        let end = pair[0].end.expect("relay left active");
        assert!(end <= pair[1].start, "overlapping pulses: {intervals:?}");
    }
}

/// Valid code, relay test, quit
#[tokio::test(start_paused = true)]
async fn test_code_test_quit_sequence() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["ABC123", "test", "quit"]);
    let (validator, validator_handle) = MockValidator::new();
    validator_handle.accept("ABC123");

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(report.reason, StopReason::Quit);
    assert!(report.cleanup.is_ok());
    assert_eq!(validator_handle.calls(), vec!["ABC123"]);
    assert_eq!(report.counts.validations, 1);
    assert_eq!(report.counts.pulses_requested, 2);

    let intervals = rig.line.active_intervals(Polarity::ActiveHigh);
    assert_eq!(intervals.len(), 2);
    assert_no_overlap(&rig.line);
    assert_eq!(rig.line.level(), Level::Low);
    assert_eq!(rig.line.release_count(), 1);

    let signals = drain(&mut rig.events);
    assert_eq!(
        count(&signals, |s| matches!(s, StatusSignal::PulseCompleted { .. })),
        2
    );
    assert!(signals.contains(&StatusSignal::PulseQueued {
        origin: PulseOrigin::Diagnostic
    }));
    assert_eq!(count(&signals, |s| *s == StatusSignal::CleanupPerformed), 1);
    assert_eq!(signals.last(), Some(&StatusSignal::CleanupPerformed));
}

/// Interrupt while waiting for input
#[tokio::test(start_paused = true)]
async fn test_interrupt_releases_once() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::new();
    let (validator, validator_handle) = MockValidator::new();

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(tokio::time::sleep(Duration::from_secs(1)))
        .await;

    assert_eq!(report.reason, StopReason::Interrupted);
    assert!(validator_handle.calls().is_empty());
    assert_eq!(rig.line.release_count(), 1);

    let signals = drain(&mut rig.events);
    assert_eq!(count(&signals, |s| *s == StatusSignal::CleanupPerformed), 1);
}

/// Interrupt mid-pulse lets the pulse finish, drops the queued one
#[tokio::test(start_paused = true)]
async fn test_interrupt_during_pulse() {
    let rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["test", "test"]);
    let (validator, _validator_handle) = MockValidator::new();

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(tokio::time::sleep(PULSE / 2))
        .await;

    assert_eq!(report.reason, StopReason::Interrupted);

    let intervals = rig.line.active_intervals(Polarity::ActiveHigh);
    assert_eq!(intervals.len(), 1);
    assert_eq!(intervals[0].end.unwrap() - intervals[0].start, PULSE);
    assert_eq!(rig.line.level(), Level::Low);
    assert_eq!(rig.line.release_count(), 1);
}

/// Interrupt while a validation is outstanding
#[tokio::test(start_paused = true)]
async fn test_interrupt_during_validation() {
    let rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["ABC123"]);
    let (validator, validator_handle) = MockValidator::new();
    validator_handle.accept("ABC123");
    validator_handle.set_latency(Duration::from_secs(1));

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await;

    assert_eq!(report.reason, StopReason::Interrupted);
    assert_eq!(validator_handle.calls(), vec!["ABC123"]);
    assert_eq!(report.counts.accepted, 0);
    assert_eq!(report.counts.pulses_requested, 0);
    assert!(rig.line.active_intervals(Polarity::ActiveHigh).is_empty());
    assert_eq!(rig.line.release_count(), 1);
}

/// A blank line brings the prompt back
#[tokio::test(start_paused = true)]
async fn test_blank_line_reprompts() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["", "  ", "quit"]);
    let (validator, _validator_handle) = MockValidator::new();

    InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    let signals = drain(&mut rig.events);
    assert_eq!(count(&signals, |s| *s == StatusSignal::Ready), 3);
}

/// An unreachable service denies every code and never pulses
#[tokio::test(start_paused = true)]
async fn test_service_outage_denies_all() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["A1", "B2", "quit"]);
    let (validator, validator_handle) = MockValidator::new();
    validator_handle.set_fallback(ValidationOutcome::Error(ValidationFailure::Network(
        "connection refused".to_string(),
    )));

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(report.reason, StopReason::Quit);
    assert_eq!(report.counts.denied, 2);
    assert_eq!(report.counts.pulses_requested, 0);
    assert!(rig.line.active_intervals(Polarity::ActiveHigh).is_empty());

    let signals = drain(&mut rig.events);
    assert_eq!(
        count(&signals, |s| matches!(
            s,
            StatusSignal::CodeDenied { reason, .. } if reason.contains("connection refused")
        )),
        2
    );
}

/// Blank lines and the test token never reach the validator
#[tokio::test(start_paused = true)]
async fn test_empty_and_test_skip_validation() {
    let rig = rig(4);
    let (input, input_handle) = MockInput::from_lines(["", "   ", "test", "TEST"]);
    drop(input_handle);
    let (validator, validator_handle) = MockValidator::new();

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(report.reason, StopReason::EndOfInput);
    assert!(validator_handle.calls().is_empty());
    assert_eq!(report.counts.pulses_requested, 2);
    assert_eq!(rig.line.active_intervals(Polarity::ActiveHigh).len(), 2);
    assert_eq!(rig.line.release_count(), 1);
}

/// Validations run one at a time, in input order
#[tokio::test(start_paused = true)]
async fn test_validations_in_order() {
    let rig = rig(4);
    let (input, input_handle) = MockInput::from_lines(["A1", "B2", "C3"]);
    drop(input_handle);
    let (validator, validator_handle) = MockValidator::new();
    validator_handle.set_latency(Duration::from_millis(50));
    validator_handle.accept("A1");
    validator_handle.accept("C3");

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(validator_handle.calls(), vec!["A1", "B2", "C3"]);
    assert_eq!(validator_handle.max_in_flight(), 1);
    assert_eq!(report.counts.accepted, 2);
    assert_eq!(report.counts.denied, 1);
    assert_eq!(rig.line.active_intervals(Polarity::ActiveHigh).len(), 2);
}

/// A validation timeout is a denial with no pulse
#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_pulse() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["SLOW", "quit"]);
    let (validator, validator_handle) = MockValidator::new();
    validator_handle.time_out("SLOW", Duration::from_secs(5));

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(report.counts.denied, 1);
    assert_eq!(report.counts.pulses_requested, 0);
    assert!(rig.line.active_intervals(Polarity::ActiveHigh).is_empty());

    let signals = drain(&mut rig.events);
    assert!(signals.iter().any(|s| matches!(
        s,
        StatusSignal::CodeDenied { code, reason } if code == "SLOW" && reason.contains("timed out")
    )));
}

/// Rapid valid codes are serialized on the relay
#[tokio::test(start_paused = true)]
async fn test_rapid_valid_codes_never_overlap() {
    let rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["V1", "V2", "V3", "q"]);
    let (validator, validator_handle) = MockValidator::new();
    for code in ["V1", "V2", "V3"] {
        validator_handle.accept(code);
    }

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(report.counts.pulses_requested, 3);
    let intervals = rig.line.active_intervals(Polarity::ActiveHigh);
    assert_eq!(intervals.len(), 3);
    assert_no_overlap(&rig.line);
    for interval in &intervals {
        assert_eq!(interval.end.unwrap() - interval.start, PULSE);
    }
}

/// Codes outside the permitted prefixes are refused locally
#[tokio::test(start_paused = true)]
async fn test_prefix_filter() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["PA_1001", "4006381333931", "exit"]);
    let (validator, validator_handle) = MockValidator::new();
    validator_handle.accept("PA_1001");

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .with_filter(CodeFilter::new(["PA_", "SU_"]))
        .run(future::pending())
        .await;

    assert_eq!(validator_handle.calls(), vec!["PA_1001"]);
    assert_eq!(report.counts.filtered, 1);
    assert_eq!(report.counts.pulses_requested, 1);

    let signals = drain(&mut rig.events);
    assert!(signals.contains(&StatusSignal::CodeFiltered {
        code: "4006381333931".to_string()
    }));
}

/// A failing input source ends the session cleanly
#[tokio::test(start_paused = true)]
async fn test_input_error_releases_relay() {
    let rig = rig(4);
    let (input, input_handle) = MockInput::from_lines(["test"]);
    input_handle.fail("device unplugged");
    let (validator, _validator_handle) = MockValidator::new();

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert!(matches!(report.reason, StopReason::InputError(ref e) if e.contains("device unplugged")));
    assert!(report.cleanup.is_ok());
    assert_eq!(rig.line.active_intervals(Polarity::ActiveHigh).len(), 1);
    assert_eq!(rig.line.release_count(), 1);
}

/// A relay that cannot be released is reported, not fatal
#[tokio::test(start_paused = true)]
async fn test_cleanup_failure_is_reported() {
    let mut rig = rig(4);
    let (input, _input_handle) = MockInput::from_lines(["quit"]);
    let (validator, _validator_handle) = MockValidator::new();
    rig.line.fail_next_writes(u32::MAX);
    rig.line.fail_forced_writes(true);

    let report = InputPipeline::new(input, validator, rig.relay, rig.status)
        .run(future::pending())
        .await;

    assert_eq!(report.reason, StopReason::Quit);
    assert!(report.cleanup.is_err());

    let signals = drain(&mut rig.events);
    assert!(signals.iter().any(|s| matches!(s, StatusSignal::CleanupFailed { .. })));
}
