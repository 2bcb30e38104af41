// ============================================================================
// FRAME LOOP — fixed-interval repeating task with an explicit stop handle
// ============================================================================

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cloneable, thread-safe stop switch for a running `FrameLoop`.
#[derive(Clone, Debug, Default)]
pub struct FrameLoopHandle {
    stopped: Arc<AtomicBool>,
}

impl FrameLoopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

pub struct FrameLoop {
    interval: Duration,
    handle: FrameLoopHandle,
}

impl FrameLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: FrameLoopHandle::default(),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn handle(&self) -> FrameLoopHandle {
        self.handle.clone()
    }

    /// Call `frame` once per interval on the current thread until the
    /// handle is stopped or `frame` breaks.  Returns the number of frames
    /// run.  Frames that overrun the interval are not made up.
    pub fn run<E>(&self, mut frame: impl FnMut(u64) -> ControlFlow<Result<(), E>>) -> Result<u64, E> {
        let mut frames = 0u64;
        let mut next = Instant::now();
        while !self.handle.is_stopped() {
            let flow = frame(frames);
            frames += 1;
            if let ControlFlow::Break(result) = flow {
                return result.map(|()| frames);
            }

            next += self.interval;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                next = now;
            }
        }
        tracing::debug!(frames, "frame loop stopped");
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_before_start_runs_nothing() {
        let fl = FrameLoop::from_millis(1);
        fl.handle().stop();
        let ran = fl.run::<()>(|_| panic!("frame ran after stop")).unwrap();
        assert_eq!(ran, 0);
    }

    #[test]
    fn stop_from_inside_a_frame() {
        let fl = FrameLoop::from_millis(1);
        let handle = fl.handle();
        let ran = fl
            .run::<()>(|n| {
                if n == 4 {
                    handle.stop();
                }
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(ran, 5);
    }

    #[test]
    fn stop_from_another_thread() {
        let fl = FrameLoop::from_millis(2);
        let handle = fl.handle();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.stop();
        });
        let ran = fl.run::<()>(|_| ControlFlow::Continue(())).unwrap();
        stopper.join().unwrap();
        assert!(ran >= 1);
    }

    #[test]
    fn frame_errors_end_the_loop() {
        let fl = FrameLoop::from_millis(1);
        let err = fl
            .run(|n| if n == 2 { ControlFlow::Break(Err("lost surface")) } else { ControlFlow::Continue(()) })
            .unwrap_err();
        assert_eq!(err, "lost surface");
    }

    #[test]
    fn interval_is_respected() {
        let fl = FrameLoop::from_millis(5);
        let start = Instant::now();
        fl.run::<()>(|n| if n == 3 { ControlFlow::Break(Ok(())) } else { ControlFlow::Continue(()) })
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
