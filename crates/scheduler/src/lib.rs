//! Render scheduling primitives for the reader.
//!
//! The viewer re-renders a page whenever the page, the zoom factor, or the
//! annotation set changes. Only one raster render may be in flight per view
//! surface; a newer request supersedes the older one. This crate provides the
//! two pieces that discipline relies on:
//!
//! - [`CancellationToken`]: a shared flag a render worker checks between
//!   stages so a superseded render can stop early.
//! - [`RenderSlot`]: the single-slot guard owned by a page view. Beginning a
//!   render cancels and replaces whatever occupied the slot, and completions
//!   are accepted only if they still belong to the slot's current generation.
//!
//! # Example
//!
//! ```
//! use marginalia_scheduler::RenderSlot;
//!
//! let mut slot = RenderSlot::new();
//!
//! let (first, _token) = slot.begin();
//! let (second, _token) = slot.begin(); // supersedes `first`
//!
//! assert!(!slot.accept(first), "superseded completion is dropped");
//! assert!(slot.accept(second));
//! ```

mod cancel;
mod slot;

pub use cancel::CancellationToken;
pub use slot::{RenderGeneration, RenderSlot};
