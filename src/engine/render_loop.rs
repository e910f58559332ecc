//! Dedicated render thread.
//!
//! Frames are paced at a target rate; commands arrive over a channel and are
//! handled between frames, so `stop` never interrupts a frame in flight.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Commands sent to the render thread.
#[derive(Debug)]
pub enum LoopCommand {
    /// Change the frame pacing.
    SetTargetFps(f32),
    /// Finish the current frame and exit.
    Stop,
}

/// Handle to a running render thread.
pub struct RenderLoop {
    tx: Sender<LoopCommand>,
    handle: Option<JoinHandle<()>>,
}

fn frame_period(fps: f32) -> Duration {
    Duration::from_secs_f32(1.0 / fps.clamp(1.0, 480.0))
}

impl RenderLoop {
    /// Spawn a thread calling `frame(dt_seconds)` at `target_fps`.
    pub fn spawn<F>(target_fps: f32, mut frame: F) -> std::io::Result<Self>
    where
        F: FnMut(f32) + Send + 'static,
    {
        let (tx, rx) = channel::<LoopCommand>();
        let handle = thread::Builder::new().name("lightsim-render".into()).spawn(move || {
            let mut period = frame_period(target_fps);
            let mut last = Instant::now();
            let mut next = last + period;
            tracing::debug!("render loop started");
            loop {
                let wait = next.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(LoopCommand::SetTargetFps(fps)) => {
                        period = frame_period(fps);
                        next = last + period;
                    }
                    Ok(LoopCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let now = Instant::now();
                        frame(now.duration_since(last).as_secs_f32());
                        last = now;
                        // Don't try to catch up after a slow frame
                        next = (next + period).max(now);
                    }
                }
            }
            tracing::debug!("render loop stopped");
        })?;

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn set_target_fps(&self, fps: f32) {
        let _ = self.tx.send(LoopCommand::SetTargetFps(fps));
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it; no frame runs after this returns.
    pub fn stop(&mut self) {
        let _ = self.tx.send(LoopCommand::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("render thread panicked");
            }
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
