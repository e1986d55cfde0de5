use crate::drawer::{DebugDrawerContext, EnqueueOutcome};
use crate::record::{
    Circle, Color, Cone, DottedLine, DottedWireCube, Label, LabelStyle, Line, Log,
    LogLevel, MAX_POLYGON_POINTS, Polygon, Ray, RectangleWithOutline, Sphere, Vec3, WireCube,
};
use crate::text::FixedText;

/// Half-angle of the cone drawn at an arrow's tip, in degrees.
const ARROW_HEAD_ANGLE: f32 = 20.0;
/// Arrow head length relative to the arrow's length.
const ARROW_HEAD_SCALE: f32 = 0.15;

/// Thread id stamped on log records queued without a thread index.
pub const UNINDEXED_THREAD_ID: u32 = u32::MAX;

/// Every helper builds one or more records and queues them through
/// [`push`](DebugDrawerContext::push). The returned outcome is that of the
/// last record queued; ignoring it is fine.
impl DebugDrawerContext<'_> {
    pub fn draw_sphere(&self, center: Vec3, radius: f32, color: Color) -> EnqueueOutcome {
        self.push(Sphere {
            center,
            radius,
            color,
        })
    }

    /// Filled quad with an outline. `corners` are in winding order.
    pub fn draw_rectangle_with_outline(
        &self,
        corners: [Vec3; 4],
        face_color: Color,
        outline_color: Color,
    ) -> EnqueueOutcome {
        self.push(RectangleWithOutline {
            corners,
            face_color,
            outline_color,
        })
    }

    /// Convex polygon translated by `offset`. Points past
    /// [`MAX_POLYGON_POINTS`] are dropped.
    pub fn draw_polygon(&self, points: &[Vec3], offset: Vec3, color: Color) -> EnqueueOutcome {
        if points.len() > MAX_POLYGON_POINTS {
            log::warn!(
                "Debug polygon with {} points truncated to {}",
                points.len(),
                MAX_POLYGON_POINTS
            );
        }
        let count = points.len().min(MAX_POLYGON_POINTS);
        let mut inline = [[0.0; 3]; MAX_POLYGON_POINTS];
        inline[..count].copy_from_slice(&points[..count]);
        self.push(Polygon {
            points: inline,
            count: count as u32,
            offset,
            color,
        })
    }

    /// Draw a single line segment.
    pub fn draw_line(&self, start: Vec3, end: Vec3, color: Color) -> EnqueueOutcome {
        self.push(Line { start, end, color })
    }

    /// Draw a line from `origin` to `origin + direction * length`.
    /// `duration` is how long the host keeps it on screen, in seconds; zero
    /// draws it for one frame.
    pub fn draw_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        length: f32,
        color: Color,
        duration: f32,
        depth_test: bool,
    ) -> EnqueueOutcome {
        self.push(Ray {
            origin,
            direction,
            length,
            duration,
            depth_test: u32::from(depth_test),
            color,
        })
    }

    /// Wire cone with its apex at `position`. `angle` is the half-angle in
    /// degrees.
    pub fn draw_cone(
        &self,
        position: Vec3,
        direction: Vec3,
        angle: f32,
        scale: f32,
        color: Color,
        duration: f32,
        depth_test: bool,
    ) -> EnqueueOutcome {
        self.push(Cone {
            position,
            direction,
            angle,
            scale,
            duration,
            depth_test: u32::from(depth_test),
            color,
        })
    }

    /// Circle around `position` in the plane whose normal is `up`.
    pub fn draw_circle(
        &self,
        position: Vec3,
        up: Vec3,
        radius: f32,
        color: Color,
        duration: f32,
        depth_test: bool,
    ) -> EnqueueOutcome {
        self.push(Circle {
            position,
            up,
            radius,
            duration,
            depth_test: u32::from(depth_test),
            color,
        })
    }

    pub fn draw_dotted_line(
        &self,
        start: Vec3,
        end: Vec3,
        gap_size: f32,
        color: Color,
    ) -> EnqueueOutcome {
        self.push(DottedLine {
            start,
            end,
            gap_size,
            color,
        })
    }

    pub fn draw_dotted_wire_cube(
        &self,
        center: Vec3,
        size: Vec3,
        gap_size: f32,
        color: Color,
    ) -> EnqueueOutcome {
        self.push(DottedWireCube {
            center,
            size,
            gap_size,
            color,
        })
    }

    /// Wire box of full extents `size` centered on `center`.
    pub fn draw_wire_cube(&self, center: Vec3, size: Vec3, color: Color) -> EnqueueOutcome {
        let half = size.map(|s| s * 0.5);
        let min = [center[0] - half[0], center[1] - half[1], center[2] - half[2]];
        let max = [center[0] + half[0], center[1] + half[1], center[2] + half[2]];
        self.draw_aabb(min, max, color)
    }

    /// Axis-aligned box from its min and max corners.
    pub fn draw_aabb(&self, min: Vec3, max: Vec3, color: Color) -> EnqueueOutcome {
        let corners = [
            [min[0], min[1], min[2]],
            [max[0], min[1], min[2]],
            [max[0], min[1], max[2]],
            [min[0], min[1], max[2]],
            [min[0], max[1], min[2]],
            [max[0], max[1], min[2]],
            [max[0], max[1], max[2]],
            [min[0], max[1], max[2]],
        ];
        self.push(WireCube { corners, color })
    }

    /// A ray with a cone at its tip pointing back along the shaft.
    pub fn draw_arrow(
        &self,
        origin: Vec3,
        direction: Vec3,
        length: f32,
        color: Color,
        duration: f32,
    ) -> EnqueueOutcome {
        self.draw_ray(origin, direction, length, color, duration, false);
        let tip = [
            origin[0] + direction[0] * length,
            origin[1] + direction[1] * length,
            origin[2] + direction[2] * length,
        ];
        let back = direction.map(|d| -d);
        self.draw_cone(
            tip,
            back,
            ARROW_HEAD_ANGLE,
            length * ARROW_HEAD_SCALE,
            color,
            duration,
            false,
        )
    }

    /// Three axis-aligned lines through `center`, each `size` long.
    pub fn draw_cross(&self, center: Vec3, size: f32, color: Color) -> EnqueueOutcome {
        let h = size * 0.5;
        let [x, y, z] = center;
        self.draw_line([x - h, y, z], [x + h, y, z], color);
        self.draw_line([x, y - h, z], [x, y + h, z], color);
        self.draw_line([x, y, z - h], [x, y, z + h], color)
    }

    /// Screen-facing text at `position`. Text longer than the fixed
    /// capacity is truncated.
    pub fn draw_label(&self, position: Vec3, text: &str, style: LabelStyle) -> EnqueueOutcome {
        self.push(Label::new(position, FixedText::new(text), style))
    }

    pub fn log(&self, message: &str) -> EnqueueOutcome {
        self.log_with_level(message, LogLevel::Info)
    }

    pub fn log_warning(&self, message: &str) -> EnqueueOutcome {
        self.log_with_level(message, LogLevel::Warning)
    }

    pub fn log_error(&self, message: &str) -> EnqueueOutcome {
        self.log_with_level(message, LogLevel::Error)
    }

    /// Queue a message for the consumer. Messages from indexed contexts are
    /// flagged as coming from a job.
    pub fn log_with_level(&self, message: &str, level: LogLevel) -> EnqueueOutcome {
        let thread_id = self
            .thread_index()
            .map_or(UNINDEXED_THREAD_ID, |index| index as u32);
        self.push(Log::new(
            FixedText::new(message),
            level,
            self.thread_index().is_some(),
            thread_id,
        ))
    }
}
