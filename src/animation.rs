//! Per-grid transition state for container open/close and bump feedback.
//!
//! A transition is plain data advanced by [`Transition::tick`]. Replacing a
//! running transition always goes through [`Transition::snap`] first, so a
//! new one never starts from a stale partial value.

use std::time::Duration;

/// Easing curve: maps linear progress in `[0, 1]` to eased progress.
pub type EasingFn = fn(f32) -> f32;

pub fn linear(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

pub fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

pub fn ease_in(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    /// Scale and alpha 0 to 1.
    Open,
    /// Scale 1 to 0.
    Close,
    /// Short pulse on a container that received items while closed.
    Bump,
}

#[derive(Clone, Debug)]
pub struct Transition {
    pub kind: TransitionKind,
    elapsed: Duration,
    duration: Duration,
    from: f32,
    to: f32,
    easing: EasingFn,
}

impl Transition {
    pub fn new(kind: TransitionKind, duration: Duration) -> Self {
        let (from, to, easing): (f32, f32, EasingFn) = match kind {
            TransitionKind::Open => (0.0, 1.0, ease_out),
            TransitionKind::Close => (1.0, 0.0, ease_in),
            TransitionKind::Bump => (1.2, 1.0, ease_out),
        };
        Transition { kind, elapsed: Duration::ZERO, duration, from, to, easing }
    }

    pub fn from_secs(kind: TransitionKind, secs: f32) -> Self {
        Transition::new(kind, Duration::from_secs_f32(secs.max(0.0)))
    }

    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0) as f32
    }

    /// Eased value between `from` and `to`.
    pub fn value(&self) -> f32 {
        let t = (self.easing)(self.progress());
        self.from + (self.to - self.from) * t
    }

    /// Advances by `dt`; true once the terminal value is reached.
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Jumps straight to the terminal value.
    pub fn snap(&mut self) -> f32 {
        self.elapsed = self.duration;
        self.to
    }

    pub fn terminal_value(&self) -> f32 {
        self.to
    }
}
