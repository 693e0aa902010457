use std::sync::{Arc, Mutex, MutexGuard};

use crate::data::network::Color;
use crate::Result;

/// Immediate-mode 2D drawing surface supplied by the presentation layer.
///
/// Coordinates are canvas pixels with the origin in the top-left corner.
/// Angles of [`fill_arc`](Self::fill_arc) are in degrees.
pub trait DrawContext: Send {
    fn draw_image(&mut self, image: &[u8], x: f64, y: f64) -> Result<()>;

    fn stroke_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()>;

    fn fill_arc(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        start_angle: f64,
        arc_extent: f64,
    ) -> Result<()>;

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> Result<()>;

    fn set_stroke_color(&mut self, color: Color);

    fn set_fill_color(&mut self, color: Color);

    fn set_line_width(&mut self, width: f64);

    /// Called before the graphics of one network layer are painted
    fn begin_layer(&mut self, _draw_order: i32) {}
}

/// A drawing surface shared between render tasks.
///
/// Only one task holds the surface at a time. A task that panicked while
/// drawing does not make the canvas unusable; the next task just carries on.
pub struct Canvas<C> {
    inner: Arc<Mutex<C>>,
}

impl<C> Clone for Canvas<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Canvas<C> {
    pub fn new(context: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// Exclusive access to the drawing context
    pub fn lock(&self) -> MutexGuard<'_, C> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Runs `f` with exclusive access to the drawing context
    pub fn with<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.lock())
    }

    /// Whether both handles point at the same surface
    pub fn same_as(&self, other: &Canvas<C>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Commands that can be issued to a [`RecordingContext`]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Image {
        len: usize,
        x: f64,
        y: f64,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
    },
    Arc {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        start_angle: f64,
        arc_extent: f64,
    },
    Clear {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    StrokeColor(Color),
    FillColor(Color),
    LineWidth(f64),
}

impl DrawCommand {
    /// Whether the command puts pixels on the canvas
    pub fn is_paint(&self) -> bool {
        matches!(
            self,
            DrawCommand::Image { .. } | DrawCommand::Line { .. } | DrawCommand::Arc { .. }
        )
    }
}

/// One recorded command and the network layer that was being painted
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub layer: Option<i32>,
    pub command: DrawCommand,
}

/// Draw context that records every call instead of rasterising.
///
/// Used headless and in tests to check what a render pass painted and in
/// which order.
#[derive(Debug, Default)]
pub struct RecordingContext {
    pub width: f64,
    pub height: f64,
    commands: Vec<RecordedCommand>,
    layer: Option<i32>,
}

impl RecordingContext {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Painting commands only, setters and clears left out
    pub fn paint_commands(&self) -> impl Iterator<Item = &RecordedCommand> {
        self.commands.iter().filter(|c| c.command.is_paint())
    }

    /// Layers in the order their first paint call was recorded, without
    /// repeats
    pub fn layer_trace(&self) -> Vec<i32> {
        let mut trace: Vec<i32> = Vec::new();
        for layer in self.paint_commands().filter_map(|c| c.layer) {
            if trace.last() != Some(&layer) {
                trace.push(layer);
            }
        }
        trace
    }

    pub fn images_drawn(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c.command, DrawCommand::Image { .. }))
            .count()
    }

    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    fn record(&mut self, command: DrawCommand) {
        self.commands.push(RecordedCommand {
            layer: self.layer,
            command,
        });
    }
}

impl DrawContext for RecordingContext {
    fn draw_image(&mut self, image: &[u8], x: f64, y: f64) -> Result<()> {
        self.record(DrawCommand::Image {
            len: image.len(),
            x,
            y,
        });
        Ok(())
    }

    fn stroke_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.record(DrawCommand::Line {
            from: (x1, y1),
            to: (x2, y2),
        });
        Ok(())
    }

    fn fill_arc(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        start_angle: f64,
        arc_extent: f64,
    ) -> Result<()> {
        self.record(DrawCommand::Arc {
            x,
            y,
            width,
            height,
            start_angle,
            arc_extent,
        });
        Ok(())
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        // Clearing starts a new picture
        self.layer = None;
        self.record(DrawCommand::Clear {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn set_stroke_color(&mut self, color: Color) {
        self.record(DrawCommand::StrokeColor(color));
    }

    fn set_fill_color(&mut self, color: Color) {
        self.record(DrawCommand::FillColor(color));
    }

    fn set_line_width(&mut self, width: f64) {
        self.record(DrawCommand::LineWidth(width));
    }

    fn begin_layer(&mut self, draw_order: i32) {
        self.layer = Some(draw_order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_tags_layers() {
        let mut ctx = RecordingContext::new(100.0, 100.0);
        ctx.draw_image(&[1, 2, 3], 0.0, 0.0).unwrap();
        ctx.begin_layer(2);
        ctx.set_stroke_color(Color::BLACK);
        ctx.stroke_line(0.0, 0.0, 10.0, 10.0).unwrap();
        ctx.begin_layer(5);
        ctx.fill_arc(1.0, 1.0, 4.0, 4.0, 0.0, 360.0).unwrap();

        assert_eq!(ctx.commands().len(), 4);
        assert_eq!(ctx.commands()[0].layer, None);
        assert_eq!(ctx.commands()[2].layer, Some(2));
        assert_eq!(ctx.layer_trace(), vec![2, 5]);
        assert_eq!(ctx.images_drawn(), 1);
        assert_eq!(ctx.paint_commands().count(), 3);
    }

    #[test]
    fn test_clear_resets_layer() {
        let mut ctx = RecordingContext::new(10.0, 10.0);
        ctx.begin_layer(1);
        ctx.clear_rect(0.0, 0.0, 10.0, 10.0).unwrap();
        ctx.stroke_line(0.0, 0.0, 1.0, 1.0).unwrap();
        assert_eq!(ctx.commands()[1].layer, None);
    }

    #[test]
    fn test_canvas_survives_panicking_user() {
        let canvas = Canvas::new(RecordingContext::new(10.0, 10.0));
        let other = canvas.clone();
        let result = std::thread::spawn(move || {
            other.with(|ctx| {
                ctx.stroke_line(0.0, 0.0, 1.0, 1.0).unwrap();
                panic!("boom");
            })
        })
        .join();

        assert!(result.is_err());
        assert_eq!(canvas.lock().commands().len(), 1);
    }
}
