//! Upload/result controller: submission state machine.
//!
//! The original interaction model is a user-triggered upload whose asynchronous
//! result mutates shared loading flags. Here that is an explicit state machine:
//! every submission gets a monotonically increasing sequence number, state is
//! an immutable snapshot value, and a completion is applied only when its
//! ticket is still the latest. Late results for superseded submissions are
//! silently discarded (last-submission-wins), so stale network responses can
//! never overwrite a newer result.

use crate::annotate::{annotate, DetectionRecorder};
use crate::classify::{classify, Alert};
use crate::remote::{typed_detections, DetectionReport, DetectionService, TransportError};
use crate::surface::{PixelSource, Surface};

/// Sequence token tying an asynchronous completion to the submission that
/// issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionTicket {
    seq: u64,
}

impl SubmissionTicket {
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

/// Immutable controller state snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmissionState {
    Idle,
    Submitting {
        seq: u64,
    },
    ResultReady {
        seq: u64,
        outcome: SubmissionOutcome,
    },
    Failed {
        seq: u64,
        error: String,
    },
}

/// Classified result of one completed submission.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmissionOutcome {
    /// Ordered alert list (accident before crime; all-clear stands alone).
    pub alerts: Vec<Alert>,
    /// Normalized label universe the alerts were derived from.
    pub labels: Vec<String>,
    /// Typed detections carried by the response.
    pub detections: usize,
    /// Detections drawn/recorded by the annotation pipeline (0 when no render
    /// target was supplied).
    pub rendered: usize,
    /// Wire records and pipeline entries dropped as malformed.
    pub skipped: usize,
    /// Optional diagnostic line (model timing).
    pub diagnostics: Option<String>,
}

impl SubmissionOutcome {
    /// Human-readable alert messages in presentation order.
    pub fn messages(&self) -> Vec<&'static str> {
        self.alerts.iter().map(|a| a.message()).collect()
    }
}

/// What happened to a completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionDisposition {
    /// The completion belonged to the latest submission and was applied.
    Applied,
    /// The completion was superseded (or duplicated) and was discarded.
    Stale,
}

/// Surfaces and recorder for one annotation pass.
///
/// Exclusively borrowed for the duration of the pass; the borrow checker
/// enforces that nothing else mutates the surfaces mid-annotation.
pub struct RenderTarget<'a> {
    pub overlay: &'a mut dyn Surface,
    pub source: &'a dyn PixelSource,
    pub recorder: &'a mut DetectionRecorder,
}

/// Submission state machine with last-submission-wins semantics.
///
/// Single-threaded: one controller drives one UI surface. The controller never
/// cancels in-flight transport work; it merely refuses to apply its result
/// once a newer submission exists.
#[derive(Debug, Default)]
pub struct SubmissionController {
    last_seq: u64,
    state: SubmissionState,
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::Idle
    }
}

impl SubmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Start a new submission, superseding any in-flight one.
    pub fn begin(&mut self) -> SubmissionTicket {
        self.last_seq += 1;
        let seq = self.last_seq;
        self.state = SubmissionState::Submitting { seq };
        SubmissionTicket { seq }
    }

    /// True while the ticket's submission is the latest one issued.
    pub fn is_current(&self, ticket: SubmissionTicket) -> bool {
        ticket.seq == self.last_seq
    }

    /// Apply a completion for `ticket`.
    ///
    /// Applied only when the ticket is the latest submission and the
    /// controller is still waiting on it; anything else is a stale completion
    /// and is discarded without touching the current state.
    pub fn complete(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<SubmissionOutcome, TransportError>,
    ) -> CompletionDisposition {
        match self.state {
            SubmissionState::Submitting { seq } if seq == ticket.seq => {
                self.state = match result {
                    Ok(outcome) => {
                        log::info!(
                            "submission #{} ready: {} alert(s), {} detection(s), {} skipped",
                            ticket.seq,
                            outcome.alerts.len(),
                            outcome.detections,
                            outcome.skipped
                        );
                        SubmissionState::ResultReady {
                            seq: ticket.seq,
                            outcome,
                        }
                    }
                    Err(err) => {
                        log::warn!("submission #{} failed: {}", ticket.seq, err);
                        SubmissionState::Failed {
                            seq: ticket.seq,
                            error: err.to_string(),
                        }
                    }
                };
                CompletionDisposition::Applied
            }
            _ => {
                log::debug!("discarding stale completion for submission #{}", ticket.seq);
                CompletionDisposition::Stale
            }
        }
    }

    /// Drive one submission synchronously: detect, classify and (when a render
    /// target is supplied) annotate, then apply the completion.
    pub fn submit_media(
        &mut self,
        service: &dyn DetectionService,
        file_name: &str,
        media: &[u8],
        render: Option<RenderTarget<'_>>,
    ) -> &SubmissionState {
        let ticket = self.begin();
        log::info!(
            "submission #{}: '{}' ({} bytes) via {}",
            ticket.sequence(),
            file_name,
            media.len(),
            service.name()
        );
        let result = service
            .detect(file_name, media)
            .map(|report| outcome_from_report(&report, render));
        self.complete(ticket, result);
        self.state()
    }
}

/// Derive a submission outcome from a validated report.
///
/// Labels feed the alert classifier; typed detections feed the annotation
/// pipeline when a render target is present. Skip counts from wire conversion
/// and from the pipeline are merged.
pub fn outcome_from_report(
    report: &DetectionReport,
    render: Option<RenderTarget<'_>>,
) -> SubmissionOutcome {
    let labels = report.summary_labels();
    let alerts = classify(&labels);
    let typed = typed_detections(report);

    let mut rendered = 0;
    let mut skipped = typed.skipped;
    if let Some(target) = render {
        let pass = annotate(&typed.detections, target.overlay, target.source, target.recorder);
        rendered = pass.drawn;
        skipped += pass.skipped;
    }

    SubmissionOutcome {
        alerts,
        labels,
        detections: typed.detections.len(),
        rendered,
        skipped,
        diagnostics: report.diagnostics(),
    }
}
