// ============================================================================
// INPUT — pointer gestures to painter commands
// ============================================================================
//
// One gesture = one restore point.  Each move paints a stroke that starts
// at the PREVIOUS sample, then remembers the new one.
// ============================================================================

use crate::error::PainterResult;
use crate::gpu::Painter;
use crate::stroke::StrokeSettings;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Start { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    End,
}

/// The painter commands a gesture needs.
pub trait StrokeTarget {
    fn capture_restore_point(&mut self, limit: usize) -> PainterResult<()>;
    fn paint_stroke(&mut self, from_x: f32, from_y: f32, settings: &StrokeSettings) -> PainterResult<()>;
}

impl StrokeTarget for Painter {
    fn capture_restore_point(&mut self, limit: usize) -> PainterResult<()> {
        Painter::capture_restore_point(self, limit)
    }

    fn paint_stroke(&mut self, from_x: f32, from_y: f32, settings: &StrokeSettings) -> PainterResult<()> {
        Painter::paint_stroke(self, from_x, from_y, settings)
    }
}

pub struct StrokeSession {
    history_limit: usize,
    last: Option<(f32, f32)>,
}

impl StrokeSession {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit,
            last: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }

    /// Feed one gesture event.  Moves outside a gesture are ignored.
    pub fn handle<T: StrokeTarget + ?Sized>(
        &mut self,
        target: &mut T,
        gesture: Gesture,
        settings: &StrokeSettings,
    ) -> PainterResult<()> {
        match gesture {
            Gesture::Start { x, y } => {
                target.capture_restore_point(self.history_limit)?;
                self.last = Some((x, y));
            }
            Gesture::Move { x, y } => {
                if let Some((lx, ly)) = self.last {
                    target.paint_stroke(lx, ly, settings)?;
                    self.last = Some((x, y));
                }
            }
            Gesture::End => self.last = None,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PainterError;

    #[derive(Default)]
    struct Recorder {
        captures: Vec<usize>,
        strokes: Vec<(f32, f32)>,
        fail_capture: bool,
    }

    impl StrokeTarget for Recorder {
        fn capture_restore_point(&mut self, limit: usize) -> PainterResult<()> {
            if self.fail_capture {
                return Err(PainterError::exhausted("test"));
            }
            self.captures.push(limit);
            Ok(())
        }

        fn paint_stroke(&mut self, from_x: f32, from_y: f32, _settings: &StrokeSettings) -> PainterResult<()> {
            self.strokes.push((from_x, from_y));
            Ok(())
        }
    }

    #[test]
    fn moves_paint_from_previous_sample() {
        let mut rec = Recorder::default();
        let mut session = StrokeSession::new(12);
        let s = StrokeSettings::default();
        for g in [
            Gesture::Start { x: 1.0, y: 1.0 },
            Gesture::Move { x: 5.0, y: 2.0 },
            Gesture::Move { x: 9.0, y: 3.0 },
            Gesture::End,
        ] {
            session.handle(&mut rec, g, &s).unwrap();
        }
        assert_eq!(rec.captures, vec![12]);
        assert_eq!(rec.strokes, vec![(1.0, 1.0), (5.0, 2.0)]);
        assert!(!session.is_active());
    }

    #[test]
    fn moves_outside_a_gesture_are_ignored() {
        let mut rec = Recorder::default();
        let mut session = StrokeSession::new(4);
        let s = StrokeSettings::default();
        session.handle(&mut rec, Gesture::Move { x: 3.0, y: 3.0 }, &s).unwrap();
        session.handle(&mut rec, Gesture::End, &s).unwrap();
        assert!(rec.strokes.is_empty());
        assert!(rec.captures.is_empty());
    }

    #[test]
    fn failed_capture_does_not_start_gesture() {
        let mut rec = Recorder {
            fail_capture: true,
            ..Recorder::default()
        };
        let mut session = StrokeSession::new(12);
        let s = StrokeSettings::default();
        assert!(session.handle(&mut rec, Gesture::Start { x: 0.0, y: 0.0 }, &s).is_err());
        assert!(!session.is_active());
        session.handle(&mut rec, Gesture::Move { x: 1.0, y: 1.0 }, &s).unwrap();
        assert!(rec.strokes.is_empty());
    }
}
