use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Copy,
    Paste,
    ContextMenu,
}

/// Normalized browser-boundary events. The surface implementation wraps the
/// raw platform listeners into this feed; it carries no exam semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    VisibilityChanged(Visibility),
    FullscreenChanged(bool),
    EscapeKeyDown,
    EscapeKeyUp,
    CaptureBlocked(CaptureKind),
}

/// Injected capability set for the secure exam surface. Production wires the
/// real browser bindings; tests substitute a deterministic fake.
#[cfg_attr(test, mockall::automock)]
pub trait ExamSurface: Send + 'static {
    /// Best-effort; a refused request is handled at the next state change.
    fn request_fullscreen(&self);
    fn exit_fullscreen(&self);
    fn is_fullscreen(&self) -> bool;
    /// Toggle copy/paste/context-menu interception. A deterrent, not a
    /// security boundary.
    fn set_capture_guards(&self, enabled: bool);
}

pub type SurfaceEvents = mpsc::UnboundedReceiver<SurfaceEvent>;
pub type SurfaceEventSender = mpsc::UnboundedSender<SurfaceEvent>;

pub fn surface_channel() -> (SurfaceEventSender, SurfaceEvents) {
    mpsc::unbounded_channel()
}
