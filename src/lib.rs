//! Procedural-brush painting on the GPU: random-walk ink strokes rasterized
//! as instanced capsules, softened with a separable Gaussian blur, blended
//! over a persistent canvas, with snapshot undo/redo and graded display.

pub mod cli;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod gpu;
pub mod grade;
pub mod history;
pub mod input;
pub mod logger;
pub mod stroke;

pub use config::{BrushControls, PainterConfig};
pub use error::{PainterError, PainterResult};
pub use gpu::Painter;
pub use stroke::{Stamp, StrokeSettings};
