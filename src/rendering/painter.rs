use serde::{Deserialize, Serialize};

use crate::core::geo::Coordinate;
use crate::core::viewport::ViewTransform;
use crate::data::network::{BranchGraphic, NetworkGraphic, SegmentGraphic, SubstationGraphic};
use crate::rendering::context::DrawContext;
use crate::Result;

/// Sizes used when turning network graphics into drawing calls, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintStyle {
    pub substation_radius: f64,
    pub line_width: f64,
    /// Pylons get a dot from this zoom level on
    pub pylon_min_zoom: u8,
    pub pylon_radius: f64,
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self {
            substation_radius: 4.0,
            line_width: 1.5,
            pylon_min_zoom: 14,
            pylon_radius: 1.5,
        }
    }
}

/// Paints network graphics for one viewport snapshot.
#[derive(Debug, Clone, Copy)]
pub struct NetworkPainter {
    transform: ViewTransform,
    style: PaintStyle,
}

impl NetworkPainter {
    pub fn new(transform: ViewTransform, style: PaintStyle) -> Self {
        Self { transform, style }
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn paint(&self, ctx: &mut dyn DrawContext, graphic: &NetworkGraphic) -> Result<()> {
        match graphic {
            NetworkGraphic::Substation(substation) => self.paint_substation(ctx, substation),
            NetworkGraphic::Branch(branch) => self.paint_branch(ctx, branch),
            NetworkGraphic::Segment(segment) => self.paint_segment(ctx, segment),
        }
    }

    /// Paints one whole layer; the first failing graphic stops the layer
    pub fn paint_layer<'a>(
        &self,
        ctx: &mut dyn DrawContext,
        draw_order: i32,
        graphics: impl IntoIterator<Item = &'a NetworkGraphic>,
    ) -> Result<usize> {
        ctx.begin_layer(draw_order);
        let mut painted = 0;
        for graphic in graphics {
            self.paint(ctx, graphic)?;
            painted += 1;
        }
        Ok(painted)
    }

    fn paint_substation(
        &self,
        ctx: &mut dyn DrawContext,
        substation: &SubstationGraphic,
    ) -> Result<()> {
        ctx.set_fill_color(substation.color);
        self.dot(ctx, &substation.position, self.style.substation_radius)
    }

    fn paint_branch(&self, ctx: &mut dyn DrawContext, branch: &BranchGraphic) -> Result<()> {
        let line = branch.line();
        ctx.set_stroke_color(line.color);
        ctx.set_line_width(self.style.line_width);

        let points: Vec<(f64, f64)> = branch
            .pylons()
            .iter()
            .map(|pylon| self.transform.to_canvas(pylon))
            .collect();
        for pair in points.windows(2) {
            ctx.stroke_line(pair[0].0, pair[0].1, pair[1].0, pair[1].1)?;
        }

        if self.transform.zoom >= self.style.pylon_min_zoom {
            ctx.set_fill_color(line.color);
            for pylon in branch.pylons() {
                self.dot(ctx, pylon, self.style.pylon_radius)?;
            }
        }
        Ok(())
    }

    fn paint_segment(&self, ctx: &mut dyn DrawContext, segment: &SegmentGraphic) -> Result<()> {
        ctx.set_stroke_color(segment.line.color);
        ctx.set_line_width(self.style.line_width);
        let (x1, y1) = self.transform.to_canvas(&segment.start);
        let (x2, y2) = self.transform.to_canvas(&segment.end);
        ctx.stroke_line(x1, y1, x2, y2)
    }

    fn dot(&self, ctx: &mut dyn DrawContext, at: &Coordinate, radius: f64) -> Result<()> {
        let (x, y) = self.transform.to_canvas(at);
        ctx.fill_arc(x - radius, y - radius, radius * 2.0, radius * 2.0, 0.0, 360.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::viewport::Viewport;
    use crate::data::network::{Color, LineGraphic};
    use crate::rendering::context::{DrawCommand, RecordingContext};
    use crate::tiles::source::ServerInfo;

    fn painter(zoom: u8) -> NetworkPainter {
        let view = Viewport::new(Coordinate::new(0.0, 0.0), zoom, 256.0, 256.0);
        NetworkPainter::new(view.transform(&ServerInfo::openstreetmap()), PaintStyle::default())
    }

    #[test]
    fn test_substation_is_a_circle_around_its_position() {
        let mut ctx = RecordingContext::new(256.0, 256.0);
        let red = Color::rgb(255, 0, 0);
        let substation = SubstationGraphic::new("S", red, Coordinate::new(0.0, 0.0));

        painter(3).paint(&mut ctx, &substation.into()).unwrap();

        let commands: Vec<_> = ctx.commands().iter().map(|c| c.command.clone()).collect();
        assert_eq!(commands[0], DrawCommand::FillColor(red));
        match &commands[1] {
            DrawCommand::Arc { x, y, width, arc_extent, .. } => {
                assert!((x - 124.0).abs() < 1e-6);
                assert!((y - 124.0).abs() < 1e-6);
                assert_eq!(*width, 8.0);
                assert_eq!(*arc_extent, 360.0);
            }
            other => panic!("expected an arc, got {:?}", other),
        }
    }

    #[test]
    fn test_branch_is_a_polyline() {
        let mut ctx = RecordingContext::new(256.0, 256.0);
        let branch = BranchGraphic::new(
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.0, 1.0),
                Coordinate::new(2.0, 0.0),
            ],
            LineGraphic::new("L", 1, Color::BLACK),
        )
        .unwrap();

        painter(5).paint(&mut ctx, &branch.clone().into()).unwrap();
        let lines = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c.command, DrawCommand::Line { .. }))
            .count();
        assert_eq!(lines, 2);
        assert!(!ctx.commands().iter().any(|c| matches!(c.command, DrawCommand::Arc { .. })));

        // Pylons show up when zoomed in
        let mut ctx = RecordingContext::new(256.0, 256.0);
        painter(15).paint(&mut ctx, &branch.into()).unwrap();
        let dots = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c.command, DrawCommand::Arc { .. }))
            .count();
        assert_eq!(dots, 3);
    }

    #[test]
    fn test_paint_layer_tags_commands() {
        let mut ctx = RecordingContext::new(256.0, 256.0);
        let segment: NetworkGraphic = SegmentGraphic::new(
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            LineGraphic::new("L", 4, Color::WHITE),
        )
        .into();

        let painted = painter(4).paint_layer(&mut ctx, 4, [&segment]).unwrap();
        assert_eq!(painted, 1);
        assert_eq!(ctx.layer_trace(), vec![4]);
    }
}
