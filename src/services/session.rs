use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::dto::attempt_dto::{SubmitAnswerRequest, ViolationOutcome};
use crate::error::{Error, Result};
use crate::models::answer::AnswerValue;
use crate::models::attempt::Attempt;
use crate::models::violation::{SessionLogEntry, ViolationKind};
use crate::platform::{ExamSurface, SurfaceEvent, SurfaceEvents};
use crate::services::attempt_api::AttemptApi;
use crate::services::countdown::{CountdownTimer, TimerTick};
use crate::services::integrity::IntegrityMonitor;
use crate::services::navigator::AnswerNavigator;
use crate::utils::time::format_clock;

/// Fallback when the service omits `seconds_remaining` on a running attempt.
const DEFAULT_SECONDS_REMAINING: u64 = 3600;

/// How the session is entered: starting fresh against an exam, or resuming
/// an attempt the student already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTarget {
    Start { exam_id: Uuid },
    Resume { attempt_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Answer { question_id: Uuid, value: AnswerValue },
    Next,
    Previous,
    RequestSubmit,
    ConfirmSubmit,
    CancelSubmit,
    /// The student navigated away; tear down without finishing.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Active,
    AwaitingSubmitConfirmation,
    Submitting,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    UserSubmitted,
    TimeExpired,
    ViolationLimit,
    /// A resumed attempt was already finalized server-side.
    AlreadyFinished,
}

impl FinishReason {
    /// The server reports violation terminations as plain completions; this
    /// is the client-side record that the end was not the student's choice.
    pub fn is_forced(&self) -> bool {
        matches!(self, FinishReason::TimeExpired | FinishReason::ViolationLimit)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub attempt: Attempt,
    pub reason: FinishReason,
    pub log: Vec<SessionLogEntry>,
}

/// How the session loop ended.
#[derive(Debug, Clone)]
pub enum SessionExit {
    /// Attempt finalized; route to the result view.
    Finished(SessionOutcome),
    /// Navigation away mid-attempt; the attempt stays STARTED server-side.
    Left,
}

enum LoopExit {
    Finished,
    Left,
}

/// Responses from calls the controller fired without waiting. They re-enter
/// the session loop as events so a stale response can be dropped instead of
/// re-entering a state machine that already reached its terminal path.
#[derive(Debug)]
enum NetEvent {
    AnswerSaved {
        question_id: Uuid,
        next_question_id: Option<Uuid>,
    },
    AnswerFailed {
        question_id: Uuid,
        detail: String,
    },
    ViolationRecorded {
        kind: ViolationKind,
        outcome: ViolationOutcome,
    },
    ViolationFailed {
        kind: ViolationKind,
        detail: String,
    },
}

/// Owns the attempt lifecycle: composes the countdown timer, the integrity
/// monitor and the answer navigator, talks to the remote attempt service and
/// decides when the attempt gets submitted.
pub struct SessionController<S: ExamSurface, A: AttemptApi> {
    config: SessionConfig,
    api: A,
    target: SessionTarget,
    state: SessionState,
    attempt: Option<Attempt>,
    timer: CountdownTimer,
    monitor: IntegrityMonitor<S>,
    navigator: AnswerNavigator,
    log: Vec<SessionLogEntry>,
    finish_reason: Option<FinishReason>,
    /// Set on the first transition toward Terminal; checked at the top of
    /// every handler so racing ticks, events and stale responses are no-ops.
    finishing: bool,
    net_tx: mpsc::UnboundedSender<NetEvent>,
    net_rx: Option<mpsc::UnboundedReceiver<NetEvent>>,
}

impl<S: ExamSurface, A: AttemptApi> SessionController<S, A> {
    pub fn new(config: SessionConfig, api: A, surface: S, target: SessionTarget) -> Self {
        let monitor = IntegrityMonitor::new(
            surface,
            Duration::from_millis(config.esc_grace_ms),
            Duration::from_millis(config.fullscreen_recovery_ms),
        );
        let (net_tx, net_rx) = mpsc::unbounded_channel();
        Self {
            config,
            api,
            target,
            state: SessionState::Initializing,
            attempt: None,
            timer: CountdownTimer::new(),
            monitor,
            navigator: AnswerNavigator::default(),
            log: Vec::new(),
            finish_reason: None,
            finishing: false,
            net_tx,
            net_rx: Some(net_rx),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    pub fn navigator(&self) -> &AnswerNavigator {
        &self.navigator
    }

    pub fn log(&self) -> &[SessionLogEntry] {
        &self.log
    }

    pub fn time_remaining(&self) -> u64 {
        self.timer.remaining()
    }

    pub fn violation_count(&self) -> u32 {
        self.attempt.as_ref().map(|a| a.violation_count).unwrap_or(0)
    }

    /// Fetch or create the attempt. If it is still running, seed the timer
    /// from the server's remaining seconds and arm the integrity monitor; a
    /// fetched attempt that already left STARTED routes straight to the
    /// result view instead.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state != SessionState::Initializing {
            return Err(Error::Internal("Session already initialized".to_string()));
        }
        let attempt = match self.target {
            SessionTarget::Start { exam_id } => self.api.start_attempt(exam_id).await?,
            SessionTarget::Resume { attempt_id } => self.api.get_attempt(attempt_id).await?,
        };
        if !attempt.is_started() {
            info!(
                "Attempt {} is already {:?}, routing to result view",
                attempt.id, attempt.status
            );
            self.attempt = Some(attempt);
            self.finish_reason = Some(FinishReason::AlreadyFinished);
            self.finishing = true;
            self.state = SessionState::Terminal;
            return Ok(());
        }
        let initial = attempt.seconds_remaining.unwrap_or(DEFAULT_SECONDS_REMAINING);
        self.navigator = AnswerNavigator::new(attempt.questions.clone().unwrap_or_default());
        self.timer.start(initial);
        self.monitor.start();
        self.push_status(format!(
            "{} started, {} on the clock",
            attempt.exam_title,
            format_clock(initial)
        ));
        self.attempt = Some(attempt);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Drive the session to its end. Timer ticks, surface events, user
    /// commands and network responses all funnel through here one at a time;
    /// the loop only returns once the attempt is finalized or the view is
    /// left.
    pub async fn run(
        mut self,
        mut events: SurfaceEvents,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Result<SessionExit> {
        if self.state == SessionState::Initializing {
            self.initialize().await?;
        }
        if self.state == SessionState::Terminal {
            return Ok(SessionExit::Finished(self.into_outcome()));
        }
        let result = self.drive(&mut events, &mut commands).await;
        self.teardown();
        match result {
            Ok(LoopExit::Finished) => Ok(SessionExit::Finished(self.into_outcome())),
            Ok(LoopExit::Left) => {
                info!("Session view left before completion");
                Ok(SessionExit::Left)
            }
            Err(e) => Err(e),
        }
    }

    async fn drive(
        &mut self,
        events: &mut SurfaceEvents,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Result<LoopExit> {
        let mut net_rx = self
            .net_rx
            .take()
            .ok_or_else(|| Error::Internal("Session already driven".to_string()))?;
        let period = Duration::from_secs(1);
        let mut clock = interval_at(Instant::now() + period, period);
        loop {
            if self.state == SessionState::Terminal {
                return Ok(LoopExit::Finished);
            }
            let recovery = self.monitor.recovery_deadline();
            tokio::select! {
                _ = clock.tick() => self.on_clock_tick().await?,
                event = events.recv() => match event {
                    Some(event) => self.on_surface_event(event)?,
                    // Surface feed gone: same as navigating away.
                    None => return Ok(LoopExit::Left),
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::Leave) | None => return Ok(LoopExit::Left),
                    Some(command) => self.on_command(command).await?,
                },
                net = net_rx.recv() => {
                    if let Some(net) = net {
                        self.on_net_event(net).await?;
                    }
                }
                _ = sleep_until_deadline(recovery) => self.on_recovery_deadline()?,
            }
        }
    }

    async fn on_clock_tick(&mut self) -> Result<()> {
        if self.finishing {
            return Ok(());
        }
        if self.state == SessionState::AwaitingSubmitConfirmation
            && self.config.pause_clock_during_confirmation
        {
            return Ok(());
        }
        match self.timer.tick() {
            TimerTick::Expired => {
                info!("Time budget exhausted, forcing submission");
                self.push_status("Time is up, submitting".to_string());
                self.finish(FinishReason::TimeExpired).await
            }
            TimerTick::Running(60) => {
                self.push_status("One minute remaining".to_string());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_surface_event(&mut self, event: SurfaceEvent) -> Result<()> {
        if self.finishing {
            return Ok(());
        }
        if let Some(kind) = self.monitor.observe(event) {
            self.report_violation(kind);
        }
        Ok(())
    }

    fn on_recovery_deadline(&mut self) -> Result<()> {
        if self.finishing {
            return Ok(());
        }
        if let Some(kind) = self.monitor.poll_recovery() {
            self.report_violation(kind);
        }
        Ok(())
    }

    async fn on_command(&mut self, command: SessionCommand) -> Result<()> {
        if self.finishing {
            return Ok(());
        }
        match command {
            SessionCommand::Answer { question_id, value } => self.on_answer(question_id, value),
            SessionCommand::Next => {
                if self.state == SessionState::Active {
                    self.navigator.next();
                }
                Ok(())
            }
            SessionCommand::Previous => {
                if self.state == SessionState::Active {
                    self.navigator.previous();
                }
                Ok(())
            }
            SessionCommand::RequestSubmit => {
                if self.state == SessionState::Active {
                    self.state = SessionState::AwaitingSubmitConfirmation;
                }
                Ok(())
            }
            SessionCommand::CancelSubmit => {
                if self.state == SessionState::AwaitingSubmitConfirmation {
                    self.state = SessionState::Active;
                }
                Ok(())
            }
            SessionCommand::ConfirmSubmit => {
                if self.state == SessionState::AwaitingSubmitConfirmation {
                    self.finish(FinishReason::UserSubmitted).await?;
                }
                Ok(())
            }
            // The loop intercepts Leave before dispatching here.
            SessionCommand::Leave => Ok(()),
        }
    }

    fn on_answer(&mut self, question_id: Uuid, value: AnswerValue) -> Result<()> {
        if self.state != SessionState::Active {
            return Ok(());
        }
        let Some(attempt_id) = self.attempt.as_ref().map(|a| a.id) else {
            return Ok(());
        };
        // Local write first: the view reflects the choice immediately,
        // regardless of how the remote call goes.
        self.navigator.record(question_id, value.clone());
        let request = SubmitAnswerRequest {
            question_id,
            selected_choice_id: value.choice_id(),
            answer_text: value.text().map(str::to_string),
        };
        let api = self.api.clone();
        let tx = self.net_tx.clone();
        tokio::spawn(async move {
            let event = match api.submit_answer(attempt_id, request).await {
                Ok(response) => NetEvent::AnswerSaved {
                    question_id,
                    next_question_id: response.next_question_id,
                },
                Err(e) => NetEvent::AnswerFailed {
                    question_id,
                    detail: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
        Ok(())
    }

    /// Forward a confirmed violation to the attempt service. The response
    /// comes back through the net-event channel with the authoritative count.
    fn report_violation(&mut self, kind: ViolationKind) {
        let Some(attempt_id) = self.attempt.as_ref().map(|a| a.id) else {
            return;
        };
        warn!("Integrity violation detected: {}", kind);
        self.push_violation(format!("Violation: {}", kind));
        let api = self.api.clone();
        let tx = self.net_tx.clone();
        tokio::spawn(async move {
            let event = match api.record_violation(attempt_id).await {
                Ok(outcome) => NetEvent::ViolationRecorded { kind, outcome },
                Err(e) => NetEvent::ViolationFailed {
                    kind,
                    detail: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    async fn on_net_event(&mut self, event: NetEvent) -> Result<()> {
        if self.finishing {
            // Stale response racing a finished session.
            return Ok(());
        }
        match event {
            NetEvent::AnswerSaved {
                question_id,
                next_question_id,
            } => {
                debug!("Answer for question {} saved", question_id);
                if let Some(next_id) = next_question_id {
                    if self.navigator.apply_adaptive_jump(next_id) {
                        self.push_status(format!(
                            "Adaptive jump to question {}",
                            self.navigator.position() + 1
                        ));
                    }
                }
                Ok(())
            }
            NetEvent::AnswerFailed { question_id, detail } => {
                // The local buffer stays as-is; the next edit retries.
                warn!("Failed to save answer for question {}: {}", question_id, detail);
                Ok(())
            }
            NetEvent::ViolationRecorded { kind, outcome } => {
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.violation_count = outcome.count;
                }
                let terminated =
                    outcome.terminated || outcome.count >= self.config.violation_limit;
                if terminated {
                    self.push_violation(
                        "Violation limit reached, exam terminated".to_string(),
                    );
                    self.finish(FinishReason::ViolationLimit).await
                } else {
                    self.push_status(format!(
                        "Warning: {} recorded ({}/{})",
                        kind, outcome.count, self.config.violation_limit
                    ));
                    Ok(())
                }
            }
            NetEvent::ViolationFailed { kind, detail } => {
                // Not itself a violation; the local count stays unchanged
                // until the next successful report.
                warn!("Failed to report {}: {}", kind, detail);
                Ok(())
            }
        }
    }

    /// Final transition. Guarded so a timeout and a late violation response
    /// cannot double-submit; the finish call completes and the outcome is
    /// recorded before the monitor drops fullscreen.
    async fn finish(&mut self, reason: FinishReason) -> Result<()> {
        if self.finishing {
            return Ok(());
        }
        self.finishing = true;
        self.state = SessionState::Submitting;
        self.timer.stop();

        let attempt_id = match self.attempt.as_ref() {
            Some(attempt) => attempt.id,
            None => return Err(Error::Internal("No attempt to finish".to_string())),
        };
        let finalized = self.api.finish_attempt(attempt_id).await?;
        info!(
            "Attempt {} finished ({:?}), score {}",
            finalized.id, reason, finalized.score
        );
        self.attempt = Some(finalized);
        self.finish_reason = Some(reason);
        self.push_status(match reason {
            FinishReason::UserSubmitted => "Exam submitted".to_string(),
            FinishReason::TimeExpired => "Time expired, exam submitted automatically".to_string(),
            FinishReason::ViolationLimit => {
                "Exam terminated after repeated violations".to_string()
            }
            FinishReason::AlreadyFinished => "Attempt already finalized".to_string(),
        });
        self.state = SessionState::Terminal;
        self.monitor.stop();
        Ok(())
    }

    fn teardown(&mut self) {
        self.timer.stop();
        self.monitor.stop();
    }

    fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            attempt: self
                .attempt
                .expect("terminal session holds the finalized attempt"),
            reason: self.finish_reason.unwrap_or(FinishReason::AlreadyFinished),
            log: self.log,
        }
    }

    fn push_status(&mut self, message: String) {
        self.log.push(SessionLogEntry::status(message));
    }

    fn push_violation(&mut self, message: String) {
        self.log.push(SessionLogEntry::violation(message));
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
