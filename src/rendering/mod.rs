pub mod context;
pub mod painter;
pub mod pipeline;
pub mod renderer;

// Re-export main types
pub use context::{Canvas, DrawCommand, DrawContext, RecordedCommand, RecordingContext};
pub use painter::{NetworkPainter, PaintStyle};
pub use pipeline::{RenderChain, RenderQueue, RenderTask, TaskState};
pub use renderer::{MapRenderer, RenderEvent};
