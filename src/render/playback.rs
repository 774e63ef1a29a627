use crate::render::plan::RenderPlan;

#[derive(Clone, Copy, Debug, PartialEq)]
/// What the host should do after a [`Playback::tick`].
pub enum Tick {
    /// Playback is stopped; nothing to draw.
    Stopped,
    /// Still showing the current frame until `next_at_ms`.
    Idle {
        /// Time the next frame is due.
        next_at_ms: f64,
    },
    /// Draw `frame` now.
    Render {
        /// Timeline index to compose.
        frame: usize,
    },
}

/// Time-driven flipbook playback.
///
/// The host calls [`Playback::tick`] from whatever timer it has with a monotonic `now` in
/// milliseconds. Each tick yields at most one frame to compose.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Playback {
    playing: bool,
    current: usize,
    next_at_ms: f64,
}

impl Playback {
    /// Stopped at frame 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Frame the next render will show.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Start playing; the next tick renders immediately.
    pub fn play(&mut self) {
        self.playing = true;
        self.next_at_ms = 0.0;
    }

    /// Stop advancing.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Flip between playing and stopped. Returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.playing {
            self.stop();
        } else {
            self.play();
        }
        self.playing
    }

    /// Jump to `frame`, wrapped into the plan's timeline.
    pub fn seek(&mut self, frame: usize, plan: &RenderPlan) {
        self.current = wrap(frame, plan.frame_count());
    }

    /// Move by `delta` frames, wrapping in both directions.
    pub fn step(&mut self, delta: isize, plan: &RenderPlan) {
        let n = plan.frame_count();
        if n == 0 {
            self.current = 0;
            return;
        }
        let n = n as isize;
        let cur = wrap(self.current, plan.frame_count()) as isize;
        self.current = (cur + delta).rem_euclid(n) as usize;
    }

    /// Back to frame 0, stopped.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance the clock to `now_ms`.
    ///
    /// When the current frame is due it is returned for rendering and the next frame is
    /// scheduled after its duration. Without a plan or frames, playback stops.
    pub fn tick(&mut self, now_ms: f64, plan: Option<&RenderPlan>) -> Tick {
        if !self.playing {
            return Tick::Stopped;
        }
        let Some(plan) = plan.filter(|p| p.frame_count() > 0) else {
            tracing::debug!("nothing to play; stopping");
            self.playing = false;
            return Tick::Stopped;
        };
        if now_ms < self.next_at_ms {
            return Tick::Idle {
                next_at_ms: self.next_at_ms,
            };
        }
        let frame = wrap(self.current, plan.frame_count());
        let duration = plan.frame_duration_ms(frame).unwrap_or(1.0);
        self.next_at_ms = now_ms + duration;
        self.current = (frame + 1) % plan.frame_count();
        Tick::Render { frame }
    }
}

fn wrap(frame: usize, count: usize) -> usize {
    if count == 0 { 0 } else { frame % count }
}

#[cfg(test)]
#[path = "../../tests/unit/render/playback.rs"]
mod tests;
