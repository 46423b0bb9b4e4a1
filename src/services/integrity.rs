use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::violation::ViolationKind;
use crate::platform::{ExamSurface, SurfaceEvent, Visibility};

/// Watches the violation feed for signs the student left the secure exam
/// surface. A fullscreen exit inside the ESC grace window counts as a
/// deliberate, unpenalized exit; any other loss is penalized once and
/// auto-recovered after a short delay.
pub struct IntegrityMonitor<S: ExamSurface> {
    surface: S,
    esc_grace: Duration,
    recovery_delay: Duration,
    active: bool,
    esc_held: bool,
    esc_grace_until: Option<Instant>,
    pending_recovery: Option<PendingRecovery>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRecovery {
    deadline: Instant,
    penalized: bool,
}

impl<S: ExamSurface> IntegrityMonitor<S> {
    pub fn new(surface: S, esc_grace: Duration, recovery_delay: Duration) -> Self {
        Self {
            surface,
            esc_grace,
            recovery_delay,
            active: false,
            esc_held: false,
            esc_grace_until: None,
            pending_recovery: None,
        }
    }

    /// Arm the monitor and move the surface into its secure shape.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.surface.set_capture_guards(true);
        self.surface.request_fullscreen();
    }

    /// Idempotent teardown: clears pending timers, releases the capture
    /// guards and leaves fullscreen if still engaged.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.esc_held = false;
        self.esc_grace_until = None;
        self.pending_recovery = None;
        self.surface.set_capture_guards(false);
        if self.surface.is_fullscreen() {
            self.surface.exit_fullscreen();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deadline of the scheduled fullscreen re-entry attempt, if one is
    /// pending. The session loop sleeps on it and then calls
    /// [`poll_recovery`](Self::poll_recovery).
    pub fn recovery_deadline(&self) -> Option<Instant> {
        self.pending_recovery.map(|p| p.deadline)
    }

    /// Feed one normalized surface event through the violation rules.
    pub fn observe(&mut self, event: SurfaceEvent) -> Option<ViolationKind> {
        if !self.active {
            return None;
        }
        match event {
            SurfaceEvent::VisibilityChanged(Visibility::Hidden) => Some(ViolationKind::TabSwitch),
            SurfaceEvent::VisibilityChanged(Visibility::Visible) => None,
            SurfaceEvent::EscapeKeyDown => {
                self.esc_held = true;
                None
            }
            SurfaceEvent::EscapeKeyUp => {
                self.esc_held = false;
                self.esc_grace_until = Some(Instant::now() + self.esc_grace);
                None
            }
            SurfaceEvent::FullscreenChanged(false) => {
                let deliberate = self.esc_recently_pressed();
                if deliberate {
                    debug!("Fullscreen exited via ESC, not penalized");
                } else {
                    warn!("Fullscreen exited unexpectedly, scheduling recovery");
                }
                // One pending recovery per loss; a newer loss replaces it.
                self.pending_recovery = Some(PendingRecovery {
                    deadline: Instant::now() + self.recovery_delay,
                    penalized: !deliberate,
                });
                None
            }
            SurfaceEvent::FullscreenChanged(true) => {
                self.pending_recovery = None;
                None
            }
            SurfaceEvent::CaptureBlocked(kind) => {
                debug!("Blocked capture attempt: {:?}", kind);
                None
            }
        }
    }

    /// Run the deferred re-entry check. Emits the loss's violation (if it
    /// was penalized) at most once; a failed re-entry never produces a
    /// second one.
    pub fn poll_recovery(&mut self) -> Option<ViolationKind> {
        if !self.active {
            self.pending_recovery = None;
            return None;
        }
        let pending = self.pending_recovery.take()?;
        if self.surface.is_fullscreen() {
            return None;
        }
        self.surface.request_fullscreen();
        pending.penalized.then_some(ViolationKind::FullscreenExit)
    }

    fn esc_recently_pressed(&self) -> bool {
        if self.esc_held {
            return true;
        }
        match self.esc_grace_until {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }
}
