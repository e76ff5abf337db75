//! Render pipeline state machine.
//!
//! Each page view owns one [`PageView`]: a worker thread holding the engine
//! and the open document, a single-slot render guard, and the last good
//! composited frame. Requests supersede each other through the slot; the
//! worker renders, composites the annotation snapshot, and reports back
//! over a channel. A completion is applied only if it still belongs to the
//! slot's current generation, so a stale frame can never flicker back onto
//! the screen. Failures freeze the last good frame instead of blanking.

use std::sync::mpsc;
use std::thread;

use marginalia_core::AnnotationSet;
use marginalia_engine::{DocumentHandle, PdfEngine, RenderRequest, RgbaImage};
use marginalia_scheduler::{CancellationToken, RenderGeneration, RenderSlot};
use tracing::{debug, warn};

use crate::overlay;

/// Lifecycle of the page view's current render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Rendering,
    Composited,
    Cancelled,
    Failed,
}

struct RenderJob {
    generation: RenderGeneration,
    /// 1-based page, matching annotation addressing.
    page: u32,
    scale: f32,
    annotations: AnnotationSet,
    token: CancellationToken,
}

enum RenderOutcome {
    Frame(RgbaImage),
    Cancelled,
    Failed(String),
}

struct RenderCompletion {
    generation: RenderGeneration,
    outcome: RenderOutcome,
}

pub struct PageView {
    slot: RenderSlot,
    state: FrameState,
    frame: Option<RgbaImage>,
    jobs: Option<mpsc::Sender<RenderJob>>,
    completions: mpsc::Receiver<RenderCompletion>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PageView {
    /// Spawn the render worker. The engine and the open document move onto
    /// the worker thread for the lifetime of the view.
    pub fn spawn<E>(engine: E, document: DocumentHandle) -> Self
    where
        E: PdfEngine + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel();
        let (completion_tx, completion_rx) = mpsc::channel();
        let worker = thread::spawn(move || worker_loop(engine, document, job_rx, completion_tx));
        Self {
            slot: RenderSlot::new(),
            state: FrameState::Idle,
            frame: None,
            jobs: Some(job_tx),
            completions: completion_rx,
            worker: Some(worker),
        }
    }

    /// Ask for a fresh composite of `page` (1-based) at `scale` with the
    /// given annotation snapshot, superseding any in-flight render.
    pub fn request_render(&mut self, page: u32, scale: f32, annotations: AnnotationSet) {
        let (generation, token) = self.slot.begin();
        self.state = FrameState::Rendering;

        let job = RenderJob { generation, page, scale, annotations, token };
        let sent = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            warn!("render worker is gone; keeping the last composited frame");
            self.state = FrameState::Failed;
        }
    }

    /// Drain completions that have already arrived, without blocking.
    pub fn pump(&mut self) -> FrameState {
        while let Ok(completion) = self.completions.try_recv() {
            self.apply(completion);
        }
        self.state
    }

    /// Block until the in-flight render resolves. Superseded completions
    /// arriving along the way are dropped.
    pub fn wait(&mut self) -> FrameState {
        while self.state == FrameState::Rendering {
            match self.completions.recv() {
                Ok(completion) => self.apply(completion),
                Err(_) => {
                    warn!("render worker is gone; keeping the last composited frame");
                    self.state = FrameState::Failed;
                }
            }
        }
        self.state
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// The last successfully composited frame. Stays in place across failed
    /// and cancelled renders.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    /// Cancel the in-flight render without starting a new one (the view
    /// surface is going away).
    pub fn close(&mut self) {
        self.slot.cancel();
        if self.state == FrameState::Rendering {
            self.state = FrameState::Cancelled;
        }
    }

    fn apply(&mut self, completion: RenderCompletion) {
        if !self.slot.accept(completion.generation) {
            debug!(generation = completion.generation, "dropping superseded render completion");
            return;
        }
        match completion.outcome {
            RenderOutcome::Frame(frame) => {
                self.frame = Some(frame);
                self.state = FrameState::Composited;
            }
            RenderOutcome::Cancelled => {
                self.state = FrameState::Cancelled;
            }
            RenderOutcome::Failed(error) => {
                warn!(%error, "page render failed; keeping the last composited frame");
                self.state = FrameState::Failed;
            }
        }
    }
}

impl Drop for PageView {
    fn drop(&mut self) {
        self.slot.cancel();
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop<E: PdfEngine>(
    engine: E,
    document: DocumentHandle,
    jobs: mpsc::Receiver<RenderJob>,
    completions: mpsc::Sender<RenderCompletion>,
) {
    while let Ok(job) = jobs.recv() {
        let generation = job.generation;
        let outcome = render_one(&engine, document, job);
        if completions.send(RenderCompletion { generation, outcome }).is_err() {
            break;
        }
    }
}

fn render_one<E: PdfEngine>(engine: &E, document: DocumentHandle, job: RenderJob) -> RenderOutcome {
    let request = RenderRequest { page_index: job.page.saturating_sub(1), scale: job.scale };
    match engine.render_page(document, request, &job.token) {
        Ok(Some(mut frame)) => {
            if job.token.is_cancelled() {
                return RenderOutcome::Cancelled;
            }
            overlay::composite_annotations(&mut frame, job.page, &job.annotations, job.scale);
            if job.token.is_cancelled() {
                return RenderOutcome::Cancelled;
            }
            RenderOutcome::Frame(frame)
        }
        Ok(None) => RenderOutcome::Cancelled,
        Err(error) => RenderOutcome::Failed(error.to_string()),
    }
}
