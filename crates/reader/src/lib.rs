//! Reader runtime: viewer state, the render pipeline state machine, the
//! annotation overlay compositor, and gesture capture.
//!
//! No windowing code lives here. The reader is a library the CLI (and any
//! future shell) drives: it owns which page is visible at which zoom, keeps
//! at most one render in flight per view surface, and turns pointer and
//! selection events into annotation records in page units.

pub mod input;
pub mod overlay;
pub mod pipeline;
pub mod viewer;

pub use input::{InputCapture, SelectionOutcome, Tool};
pub use overlay::{composite_annotations, StrokePreview};
pub use pipeline::{FrameState, PageView};
pub use viewer::{ViewerSession, DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM, ZOOM_STEP};
