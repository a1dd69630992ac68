use std::collections::HashMap;

use anyhow::Result;

use super::{
    overlay::OverlayFrame,
    raster::Surface,
    text::{HAlign, TextRenderer, TextStyle, VAlign},
};
use crate::types::{Color, Frame, GeometryTool, ModuleError, OverlayPoint, ToolKind};

pub const DEFAULT_SURFACE_WIDTH: u32 = 1920;
pub const DEFAULT_SURFACE_HEIGHT: u32 = 1200;
pub const HIT_RADIUS: f32 = 40.0;

const CONNECTION_COLOR: Color = Color([0, 255, 0, 153]);
const CONNECTION_WIDTH: f32 = 4.0;

const TOOL_LINE_WIDTH: f32 = 3.0;
const TOOL_FONT_SIZE: f32 = 24.0;
const TOOL_LABEL_BACKGROUND: Color = Color([0, 0, 0, 179]);
const TOOL_LABEL_PAD_X: f32 = 6.0;
const TOOL_LABEL_HEIGHT: f32 = 28.0;
const ANGLE_LABEL_RAISE: f32 = 35.0;

const POINT_RADIUS: f32 = 9.0;
const POINT_OUTLINE_WIDTH: f32 = 3.0;
const POINT_LABEL_SIZE: f32 = 28.0;
const POINT_LABEL_GAP: f32 = 5.0;
const POINT_LABEL_OUTLINE: f32 = 6.0;

const ERROR_FONT_SIZE: f32 = 24.0;
const ERROR_TOP: f32 = 40.0;
const ERROR_LEFT: f32 = 20.0;
const ERROR_TEXT_LEFT: f32 = 40.0;
const ERROR_TEXT_INSET: f32 = 8.0;
const ERROR_HEIGHT: f32 = 36.0;
const ERROR_STEP: f32 = 45.0;
const ERROR_BACKGROUND: Color = Color([220, 38, 38, 230]);

/// Composites the current frame and its overlay onto one surface, and
/// remembers the drawn points for pointer hit-testing.
pub struct CompositeRenderer {
    surface: Surface,
    text: TextRenderer,
    follow_frame_size: bool,
    last_points: Vec<OverlayPoint>,
    last_tools: Vec<GeometryTool>,
}

impl CompositeRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            surface: Surface::new(width, height),
            text: TextRenderer::new()?,
            follow_frame_size: true,
            last_points: Vec::new(),
            last_tools: Vec::new(),
        })
    }

    /// When set (the default), the surface adopts each frame's dimensions.
    /// Otherwise frames are stretched onto the fixed surface.
    pub fn set_follow_frame_size(&mut self, follow: bool) {
        self.follow_frame_size = follow;
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn native_size(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }

    pub fn last_points(&self) -> &[OverlayPoint] {
        &self.last_points
    }

    pub fn last_tools(&self) -> &[GeometryTool] {
        &self.last_tools
    }

    /// Redraws everything: background, frame, connections, tools, points, errors.
    pub fn draw(&mut self, frame: Option<&Frame>, overlay: OverlayFrame) {
        if let Some(frame) = frame {
            if self.follow_frame_size {
                self.surface.resize(frame.width, frame.height);
            }
        }
        self.surface.clear(Color::BLACK);

        if let Some(frame) = frame {
            if let Err(err) = self.surface.blit_scaled(frame) {
                log::warn!("skipping frame {}: {err:#}", frame.frame_id);
            }
        }

        let OverlayFrame {
            points,
            connections,
            tools,
            errors,
        } = overlay;

        let by_id: HashMap<&str, &OverlayPoint> =
            points.iter().map(|p| (p.id.as_str(), p)).collect();

        for (a, b) in &connections {
            if let (Some(pa), Some(pb)) = (by_id.get(a.as_str()), by_id.get(b.as_str())) {
                self.surface.draw_line(
                    (pa.x, pa.y),
                    (pb.x, pb.y),
                    CONNECTION_COLOR,
                    CONNECTION_WIDTH,
                );
            }
        }

        for tool in &tools {
            self.draw_tool(tool, &by_id);
        }

        for point in &points {
            self.draw_point(point);
        }

        self.draw_errors(&errors);

        self.last_points = points;
        self.last_tools = tools;
    }

    /// Nearest drawn point strictly within `HIT_RADIUS` of native `(x, y)`.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<&OverlayPoint> {
        nearest_point(&self.last_points, x, y, HIT_RADIUS)
    }

    fn draw_tool(&mut self, tool: &GeometryTool, by_id: &HashMap<&str, &OverlayPoint>) {
        // Tools referencing a point that is not on screen are skipped entirely.
        let Some(coords) = tool
            .point_ids
            .iter()
            .map(|id| by_id.get(id.as_str()).map(|p| (p.x, p.y)))
            .collect::<Option<Vec<_>>>()
        else {
            return;
        };
        if coords.len() != tool.kind.required_points() {
            return;
        }

        for pair in coords.windows(2) {
            self.surface
                .draw_line(pair[0], pair[1], tool.color, TOOL_LINE_WIDTH);
        }

        let (label, anchor) = match tool.kind {
            ToolKind::Distance => {
                let (a, b) = (coords[0], coords[1]);
                let mid = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
                (format!("{:.0}", tool.current_value), mid)
            }
            ToolKind::Angle => {
                let vertex = coords[1];
                let above = (vertex.0, vertex.1 - ANGLE_LABEL_RAISE);
                (format!("{:.1}°", tool.current_value), above)
            }
        };
        self.draw_tool_label(&label, anchor, tool.color);
    }

    /// Centred label on a translucent dark box.
    fn draw_tool_label(&mut self, label: &str, center: (f32, f32), color: Color) {
        let (text_w, _) = self.text.measure(label, TOOL_FONT_SIZE);
        self.surface.fill_rect(
            center.0 - text_w / 2.0 - TOOL_LABEL_PAD_X,
            center.1 - TOOL_LABEL_HEIGHT / 2.0,
            text_w + TOOL_LABEL_PAD_X * 2.0,
            TOOL_LABEL_HEIGHT,
            TOOL_LABEL_BACKGROUND,
        );
        let style = TextStyle::new(TOOL_FONT_SIZE, color).align(HAlign::Center, VAlign::Middle);
        self.text.draw(&mut self.surface, label, center, &style);
    }

    fn draw_point(&mut self, point: &OverlayPoint) {
        let center = (point.x, point.y);
        self.surface.fill_circle(center, POINT_RADIUS, point.color);
        self.surface
            .stroke_circle(center, POINT_RADIUS, POINT_OUTLINE_WIDTH, Color::BLACK);

        let style = TextStyle::new(POINT_LABEL_SIZE, Color::WHITE)
            .align(HAlign::Center, VAlign::Bottom)
            .outline(Color::BLACK, POINT_LABEL_OUTLINE);
        self.text.draw(
            &mut self.surface,
            &point.label,
            (point.x, point.y - (POINT_RADIUS + POINT_LABEL_GAP)),
            &style,
        );
    }

    fn draw_errors(&mut self, errors: &[ModuleError]) {
        let style = TextStyle::new(ERROR_FONT_SIZE, Color::WHITE);
        let mut y = ERROR_TOP;
        for error in errors {
            let text = format!("! {}: {}", error.source, error.message);
            let (text_w, _) = self.text.measure(&text, ERROR_FONT_SIZE);
            self.surface.fill_rect(
                ERROR_LEFT,
                y,
                text_w + (ERROR_TEXT_LEFT - ERROR_LEFT) * 2.0,
                ERROR_HEIGHT,
                ERROR_BACKGROUND,
            );
            let anchor = (ERROR_TEXT_LEFT, y + ERROR_TEXT_INSET);
            self.text.draw(&mut self.surface, &text, anchor, &style);
            y += ERROR_STEP;
        }
    }
}

pub fn nearest_point(
    points: &[OverlayPoint],
    x: f32,
    y: f32,
    radius: f32,
) -> Option<&OverlayPoint> {
    points
        .iter()
        .map(|p| (p, ((p.x - x).powi(2) + (p.y - y).powi(2)).sqrt()))
        .filter(|(_, d)| *d < radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}
