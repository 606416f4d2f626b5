//! Render synchronization: one cancelable rasterization in flight per page
//! display, with generation tagging so late results never reach the screen.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use doc_model::PixelSize;
use log::{debug, error, warn};

use crate::cancel::CancellationToken;
use crate::raster::{Bitmap, RasterError, RenderTarget, Rasterizer};

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Idle,
    Rendering { generation: u64, target: RenderTarget },
    Rendered { generation: u64, target: RenderTarget, bitmap: Arc<Bitmap> },
    Cancelled { generation: u64 },
    Failed { generation: u64, message: String },
}

impl RenderState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, RenderState::Rendering { .. })
    }
}

/// Message from a render worker, tagged with the generation it was started for.
#[derive(Debug)]
pub enum RenderEvent {
    Viewport { generation: u64, size: PixelSize },
    Finished { generation: u64, result: Result<Bitmap, RasterError> },
}

impl RenderEvent {
    pub fn generation(&self) -> u64 {
        match self {
            RenderEvent::Viewport { generation, .. } | RenderEvent::Finished { generation, .. } => {
                *generation
            }
        }
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct RenderController {
    rasterizer: Arc<dyn Rasterizer>,
    generation: u64,
    state: RenderState,
    target: Option<RenderTarget>,
    display: PixelSize,
    in_flight: Option<InFlight>,
    sender: Sender<RenderEvent>,
    receiver: Receiver<RenderEvent>,
}

impl std::fmt::Debug for RenderController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderController")
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

impl RenderController {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            rasterizer,
            generation: 0,
            state: RenderState::Idle,
            target: None,
            display: PixelSize::ZERO,
            in_flight: None,
            sender,
            receiver,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Last requested target, if the display is showing or loading a page.
    pub fn target(&self) -> Option<RenderTarget> {
        self.target
    }

    /// Size of the display region. `(0, 0)` while the viewport is unknown.
    pub fn display_size(&self) -> PixelSize {
        self.display
    }

    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        match &self.state {
            RenderState::Rendered { bitmap, .. } => Some(Arc::clone(bitmap)),
            _ => None,
        }
    }

    /// Starts rendering `target` under a new generation, after cancelling and
    /// awaiting whatever render was in flight.
    pub fn request(&mut self, target: RenderTarget) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.settle_in_flight();

        debug!("render generation {generation}: page {} at {}x", target.page_number, target.scale);
        self.target = Some(target);
        self.display = PixelSize::ZERO;
        self.state = RenderState::Rendering { generation, target };

        let token = CancellationToken::new();
        let worker_token = token.clone();
        let rasterizer = Arc::clone(&self.rasterizer);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("page-render-{generation}"))
            .spawn(move || run_render(rasterizer.as_ref(), target, generation, &worker_token, &sender));

        match spawned {
            Ok(handle) => self.in_flight = Some(InFlight { generation, token, handle }),
            Err(err) => {
                error!("unable to start render worker: {err}");
                self.state = RenderState::Failed { generation, message: err.to_string() };
            }
        }
        generation
    }

    /// Cancels the current render without starting another. The state becomes
    /// `Cancelled` once the worker acknowledges.
    pub fn cancel(&self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.token.cancel();
        }
    }

    /// Drops whatever is displayed and returns to `Idle`, e.g. on teardown or
    /// when the displayed page is deleted.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.settle_in_flight();
        self.target = None;
        self.display = PixelSize::ZERO;
        self.state = RenderState::Idle;
    }

    /// Applies every pending worker event. Returns whether anything visible changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.receiver.try_recv() {
            changed |= self.handle_event(event);
        }
        changed
    }

    /// Blocks until the current render settles or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> &RenderState {
        let deadline = Instant::now() + timeout;
        while !self.state.is_settled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => {
                    self.handle_event(event);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        &self.state
    }

    /// Applies one worker event. Events from any generation other than the
    /// current one are discarded.
    pub fn handle_event(&mut self, event: RenderEvent) -> bool {
        let generation = event.generation();
        if generation != self.generation {
            warn!("discarding render event for generation {generation}, current is {}", self.generation);
            return false;
        }
        let RenderState::Rendering { target, .. } = self.state else {
            debug!("ignoring render event for settled generation {generation}");
            return false;
        };

        match event {
            RenderEvent::Viewport { size, .. } => {
                self.display = size;
                true
            }
            RenderEvent::Finished { result, .. } => {
                self.reap(generation);
                match result {
                    Ok(bitmap) => {
                        self.display = bitmap.size;
                        self.state = RenderState::Rendered { generation, target, bitmap: Arc::new(bitmap) };
                    }
                    Err(RasterError::Cancelled) => {
                        debug!("render generation {generation} cancelled");
                        self.state = RenderState::Cancelled { generation };
                    }
                    Err(err) => {
                        error!("render generation {generation} failed: {err}");
                        self.display = PixelSize::ZERO;
                        self.state = RenderState::Failed { generation, message: err.to_string() };
                    }
                }
                true
            }
        }
    }

    fn settle_in_flight(&mut self) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        in_flight.token.cancel();
        if in_flight.handle.join().is_err() {
            error!("render worker for generation {} panicked", in_flight.generation);
        }
    }

    fn reap(&mut self, generation: u64) {
        if self.in_flight.as_ref().is_some_and(|in_flight| in_flight.generation == generation) {
            self.settle_in_flight();
        }
    }
}

impl Drop for RenderController {
    fn drop(&mut self) {
        self.settle_in_flight();
    }
}

fn run_render(
    rasterizer: &dyn Rasterizer,
    target: RenderTarget,
    generation: u64,
    token: &CancellationToken,
    sender: &Sender<RenderEvent>,
) {
    let result = render_once(rasterizer, target, generation, token, sender);
    // The receiver only disappears when the controller is dropped.
    let _ = sender.send(RenderEvent::Finished { generation, result });
}

fn render_once(
    rasterizer: &dyn Rasterizer,
    target: RenderTarget,
    generation: u64,
    token: &CancellationToken,
    sender: &Sender<RenderEvent>,
) -> Result<Bitmap, RasterError> {
    if token.is_cancelled() {
        return Err(RasterError::Cancelled);
    }
    let size = rasterizer.viewport(&target)?;
    let _ = sender.send(RenderEvent::Viewport { generation, size });
    if token.is_cancelled() {
        return Err(RasterError::Cancelled);
    }
    rasterizer.render(&target, size, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::Rotation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Page 1 blocks until cancelled, page 3 fails, everything else renders at once.
    #[derive(Default)]
    struct ScriptedRasterizer {
        renders: AtomicUsize,
    }

    impl Rasterizer for ScriptedRasterizer {
        fn page_count(&self) -> u32 {
            3
        }

        fn viewport(&self, target: &RenderTarget) -> Result<PixelSize, RasterError> {
            if target.page_number > self.page_count() {
                return Err(RasterError::PageOutOfRange { page_number: target.page_number, page_count: 3 });
            }
            let base = (100.0 * target.scale) as u32;
            Ok(PixelSize::new(base, base * 2))
        }

        fn render(
            &self,
            target: &RenderTarget,
            viewport: PixelSize,
            token: &CancellationToken,
        ) -> Result<Bitmap, RasterError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            match target.page_number {
                1 => {
                    while !token.is_cancelled() {
                        thread::sleep(Duration::from_millis(1));
                    }
                    Err(RasterError::Cancelled)
                }
                3 => Err(RasterError::Backend("broken page".to_owned())),
                _ => Ok(Bitmap::new(viewport, vec![255; (viewport.width * viewport.height * 4) as usize])),
            }
        }
    }

    fn target(page_number: u32) -> RenderTarget {
        RenderTarget { page_number, scale: 1.0, rotation: Rotation::NONE }
    }

    fn controller() -> RenderController {
        RenderController::new(Arc::new(ScriptedRasterizer::default()))
    }

    #[test]
    fn starts_idle_with_unknown_display() {
        let controller = controller();
        assert_eq!(controller.state(), &RenderState::Idle);
        assert_eq!(controller.display_size(), PixelSize::ZERO);
    }

    #[test]
    fn completed_render_sizes_display() {
        let mut controller = controller();
        let generation = controller.request(target(2));
        assert_eq!(controller.display_size(), PixelSize::ZERO);

        let state = controller.wait(TIMEOUT).clone();
        assert!(matches!(state, RenderState::Rendered { generation: g, .. } if g == generation));
        assert_eq!(controller.display_size(), PixelSize::new(100, 200));
    }

    #[test]
    fn new_request_cancels_and_supersedes_previous() {
        let mut controller = controller();
        let first = controller.request(target(1));
        let second = controller.request(target(2));
        assert!(second > first);

        let state = controller.wait(TIMEOUT).clone();
        assert!(matches!(state, RenderState::Rendered { generation, target, .. }
            if generation == second && target.page_number == 2));
        // Leftover events of the superseded generation are discarded.
        assert!(!controller.pump());
        assert!(matches!(controller.state(), RenderState::Rendered { .. }));
    }

    #[test]
    fn explicit_cancel_is_swallowed() {
        let mut controller = controller();
        let generation = controller.request(target(1));
        controller.cancel();

        let state = controller.wait(TIMEOUT).clone();
        assert_eq!(state, RenderState::Cancelled { generation });
    }

    #[test]
    fn failure_resets_display_and_reports_message() {
        let mut controller = controller();
        controller.request(target(3));

        let state = controller.wait(TIMEOUT).clone();
        match state {
            RenderState::Failed { message, .. } => assert!(message.contains("broken page")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(controller.display_size(), PixelSize::ZERO);
    }

    #[test]
    fn stale_events_are_discarded_even_when_delivered_late() {
        let mut controller = controller();
        let stale = controller.request(target(2));
        controller.wait(TIMEOUT);
        let current = controller.request(target(2));
        controller.wait(TIMEOUT);

        let late = RenderEvent::Finished {
            generation: stale,
            result: Err(RasterError::Backend("late".to_owned())),
        };
        assert!(!controller.handle_event(late));
        assert!(matches!(controller.state(), RenderState::Rendered { generation, .. } if *generation == current));
    }

    #[test]
    fn viewport_event_sizes_display_before_pixels_arrive() {
        let mut controller = controller();
        controller.request(target(1));
        let generation = controller.generation();

        assert!(controller.handle_event(RenderEvent::Viewport { generation, size: PixelSize::new(10, 20) }));
        assert_eq!(controller.display_size(), PixelSize::new(10, 20));
        assert!(matches!(controller.state(), RenderState::Rendering { .. }));
        controller.reset();
        assert_eq!(controller.state(), &RenderState::Idle);
    }

    #[test]
    fn out_of_range_page_fails() {
        let mut controller = controller();
        controller.request(target(9));
        assert!(matches!(controller.wait(TIMEOUT), RenderState::Failed { .. }));
    }
}
