//! Single-slot guard for the current render task.
//!
//! Each page view owns exactly one [`RenderSlot`]. Issuing a new render goes
//! through `begin()`, which cancels whatever occupied the slot and installs a
//! fresh token under a new generation number. When a worker's completion
//! arrives (tagged with the generation it started under), `accept()` decides
//! whether it may be composited: only the current generation, and only if the
//! slot was not cancelled in the meantime. Everything else is a terminal,
//! ignorable event.

use crate::CancellationToken;

/// Monotonically increasing identifier for render requests issued by a slot.
pub type RenderGeneration = u64;

/// The "current render task" owned by a page view.
///
/// A non-reentrant guard, not a general scheduler: at most one task is live,
/// and starting a new one supersedes the old one atomically from the owner's
/// point of view.
#[derive(Debug, Default)]
pub struct RenderSlot {
    generation: RenderGeneration,
    current: Option<CancellationToken>,
}

impl RenderSlot {
    /// Create an empty slot. The first `begin()` yields generation 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new render, superseding any in-flight one.
    ///
    /// The previous occupant's token is cancelled before the new token is
    /// installed, so a worker still running observes the cancellation no
    /// later than its next stage boundary.
    pub fn begin(&mut self) -> (RenderGeneration, CancellationToken) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }

        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        (self.generation, token)
    }

    /// Decide whether a completion for `generation` may be composited.
    ///
    /// Returns `true` exactly once per accepted render: the slot empties so
    /// a duplicate completion for the same generation is also rejected.
    /// Completions for superseded generations and for renders cancelled via
    /// [`RenderSlot::cancel`] return `false`.
    pub fn accept(&mut self, generation: RenderGeneration) -> bool {
        if generation != self.generation {
            return false;
        }

        let live = self
            .current
            .as_ref()
            .is_some_and(|token| !token.is_cancelled());
        if live {
            self.current = None;
        }
        live
    }

    /// Cancel the in-flight render, if any, without starting a new one.
    ///
    /// Used when the view surface goes away (page view closed).
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    /// Whether a render begun through this slot is still awaiting acceptance.
    pub fn in_flight(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// The generation of the most recent `begin()`.
    pub fn generation(&self) -> RenderGeneration {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_increments_generation() {
        let mut slot = RenderSlot::new();
        let (g1, _) = slot.begin();
        let (g2, _) = slot.begin();

        assert_eq!(g1, 1);
        assert_eq!(g2, 2);
    }

    #[test]
    fn test_begin_cancels_previous_token() {
        let mut slot = RenderSlot::new();
        let (_, first) = slot.begin();
        let (_, second) = slot.begin();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_superseded_completion_is_rejected() {
        let mut slot = RenderSlot::new();
        let (first, _) = slot.begin();
        let (second, _) = slot.begin();

        assert!(!slot.accept(first));
        assert!(slot.accept(second));
    }

    #[test]
    fn test_completion_is_accepted_at_most_once() {
        let mut slot = RenderSlot::new();
        let (generation, _) = slot.begin();

        assert!(slot.accept(generation));
        assert!(!slot.accept(generation), "second delivery must be dropped");
    }

    #[test]
    fn test_cancel_rejects_current_generation() {
        let mut slot = RenderSlot::new();
        let (generation, token) = slot.begin();

        slot.cancel();

        assert!(token.is_cancelled());
        assert!(!slot.accept(generation));
    }

    #[test]
    fn test_in_flight_tracks_slot_state() {
        let mut slot = RenderSlot::new();
        assert!(!slot.in_flight());

        let (generation, _) = slot.begin();
        assert!(slot.in_flight());

        assert!(slot.accept(generation));
        assert!(!slot.in_flight());
    }

    #[test]
    fn test_empty_slot_accepts_nothing() {
        let mut slot = RenderSlot::new();
        assert!(!slot.accept(0));
        assert!(!slot.accept(1));
    }
}
