//! Fixed-layout draw and log commands.
//!
//! Every command kind has a `#[repr(C)]` [`Pod`](bytemuck::Pod) payload.
//! On the stream a record is encoded as its [`RecordTag`] (a native-endian
//! `u32`) immediately followed by the payload bytes. The payload size is a
//! function of the tag alone, so a reader can walk a partition without any
//! length prefix.

use crate::error::DecodeError;
use crate::text::FixedText;

/// Position or direction in world space.
pub type Vec3 = [f32; 3];

/// Linear RGBA color.
pub type Color = [f32; 4];

/// Color used when the caller does not pick one.
pub const DEFAULT_COLOR: Color = [1.0, 1.0, 1.0, 1.0];

/// Maximum number of points stored inline in a [`Polygon`].
pub const MAX_POLYGON_POINTS: usize = 16;

/// Size of the tag that prefixes every encoded record.
pub const TAG_SIZE: usize = size_of::<u32>();

/// Command kind. Zero is reserved so that zeroed memory never decodes.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordTag {
    Sphere = 1,
    RectangleWithOutline = 2,
    Polygon = 3,
    Line = 4,
    Ray = 5,
    Cone = 6,
    Circle = 7,
    DottedLine = 8,
    DottedWireCube = 9,
    Label = 10,
    Log = 11,
    WireCube = 12,
}

impl RecordTag {
    /// All command kinds, in tag order.
    pub const ALL: [RecordTag; 12] = [
        RecordTag::Sphere,
        RecordTag::RectangleWithOutline,
        RecordTag::Polygon,
        RecordTag::Line,
        RecordTag::Ray,
        RecordTag::Cone,
        RecordTag::Circle,
        RecordTag::DottedLine,
        RecordTag::DottedWireCube,
        RecordTag::Label,
        RecordTag::Log,
        RecordTag::WireCube,
    ];

    /// Look up a tag by its numeric value.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| *tag as u32 == value)
    }

    /// Size of this kind's payload in bytes.
    pub const fn payload_size(self) -> usize {
        match self {
            RecordTag::Sphere => size_of::<Sphere>(),
            RecordTag::RectangleWithOutline => size_of::<RectangleWithOutline>(),
            RecordTag::Polygon => size_of::<Polygon>(),
            RecordTag::Line => size_of::<Line>(),
            RecordTag::Ray => size_of::<Ray>(),
            RecordTag::Cone => size_of::<Cone>(),
            RecordTag::Circle => size_of::<Circle>(),
            RecordTag::DottedLine => size_of::<DottedLine>(),
            RecordTag::DottedWireCube => size_of::<DottedWireCube>(),
            RecordTag::Label => size_of::<Label>(),
            RecordTag::Log => size_of::<Log>(),
            RecordTag::WireCube => size_of::<WireCube>(),
        }
    }

    /// Size of a tag-prefixed record of this kind.
    pub const fn encoded_len(self) -> usize {
        TAG_SIZE + self.payload_size()
    }
}

impl TryFrom<u32> for RecordTag {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value).ok_or(value)
    }
}

/// How a label is presented.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LabelStyle {
    None,
    #[default]
    Default,
}

impl LabelStyle {
    fn to_raw(self) -> u32 {
        match self {
            LabelStyle::None => 0,
            LabelStyle::Default => 1,
        }
    }

    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => LabelStyle::Default,
            _ => LabelStyle::None,
        }
    }
}

/// Severity of a queued log message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    None,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn to_raw(self) -> u32 {
        match self {
            LogLevel::None => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
        }
    }

    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            3 => LogLevel::Error,
            _ => LogLevel::None,
        }
    }
}

/// Wire sphere.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub color: Color,
}

/// Filled quad with an outline. Corners are in winding order.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RectangleWithOutline {
    pub corners: [Vec3; 4],
    pub face_color: Color,
    pub outline_color: Color,
}

/// Anti-aliased convex polygon with up to [`MAX_POLYGON_POINTS`] points.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Polygon {
    pub points: [Vec3; MAX_POLYGON_POINTS],
    pub count: u32,
    pub offset: Vec3,
    pub color: Color,
}

impl Polygon {
    /// The populated points.
    pub fn points(&self) -> &[Vec3] {
        let count = (self.count as usize).min(MAX_POLYGON_POINTS);
        &self.points[..count]
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Line {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Color,
}

/// Ray from `origin` along `direction`, scaled by `length`.
///
/// `depth_test` is nonzero when the ray is occluded by scene geometry.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub length: f32,
    pub duration: f32,
    pub depth_test: u32,
    pub color: Color,
}

/// Wire cone with its apex at `position`, opening along `direction`.
/// `angle` is the half-angle in degrees.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Cone {
    pub position: Vec3,
    pub direction: Vec3,
    pub angle: f32,
    pub scale: f32,
    pub duration: f32,
    pub depth_test: u32,
    pub color: Color,
}

/// Circle in the plane whose normal is `up`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Circle {
    pub position: Vec3,
    pub up: Vec3,
    pub radius: f32,
    pub duration: f32,
    pub depth_test: u32,
    pub color: Color,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DottedLine {
    pub start: Vec3,
    pub end: Vec3,
    pub gap_size: f32,
    pub color: Color,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DottedWireCube {
    pub center: Vec3,
    pub size: Vec3,
    pub gap_size: f32,
    pub color: Color,
}

/// Screen-facing text anchored at a world position.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Label {
    pub position: Vec3,
    style: u32,
    pub text: FixedText,
}

impl Label {
    pub fn new(position: Vec3, text: FixedText, style: LabelStyle) -> Self {
        Self {
            position,
            style: style.to_raw(),
            text,
        }
    }

    pub fn style(&self) -> LabelStyle {
        LabelStyle::from_raw(self.style)
    }
}

/// Message forwarded to the host's log on the consumer thread.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Log {
    pub message: FixedText,
    level: u32,
    from_job: u32,
    pub thread_id: u32,
}

impl Log {
    pub fn new(message: FixedText, level: LogLevel, from_job: bool, thread_id: u32) -> Self {
        Self {
            message,
            level: level.to_raw(),
            from_job: u32::from(from_job),
            thread_id,
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_raw(self.level)
    }

    /// Whether the message was queued from a worker thread.
    pub fn from_job(&self) -> bool {
        self.from_job != 0
    }
}

/// Wire box given by its eight corners.
///
/// Corner order: bottom face `[left-back, right-back, right-front,
/// left-front]`, then the top face in the same order.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WireCube {
    pub corners: [Vec3; 8],
    pub color: Color,
}

const fn max(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

/// One queued command.
///
/// The consumer receives records by reference and dispatches on the variant;
/// the set of kinds is closed, so host renderers can match exhaustively.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Record {
    Sphere(Sphere),
    RectangleWithOutline(RectangleWithOutline),
    Polygon(Polygon),
    Line(Line),
    Ray(Ray),
    Cone(Cone),
    Circle(Circle),
    DottedLine(DottedLine),
    DottedWireCube(DottedWireCube),
    Label(Label),
    Log(Log),
    WireCube(WireCube),
}

impl Record {
    /// Size of the largest encoded record.
    pub const MAX_ENCODED_LEN: usize = TAG_SIZE
        + max(
            max(size_of::<Label>(), size_of::<Log>()),
            max(size_of::<Polygon>(), size_of::<WireCube>()),
        );

    pub fn tag(&self) -> RecordTag {
        match self {
            Record::Sphere(_) => RecordTag::Sphere,
            Record::RectangleWithOutline(_) => RecordTag::RectangleWithOutline,
            Record::Polygon(_) => RecordTag::Polygon,
            Record::Line(_) => RecordTag::Line,
            Record::Ray(_) => RecordTag::Ray,
            Record::Cone(_) => RecordTag::Cone,
            Record::Circle(_) => RecordTag::Circle,
            Record::DottedLine(_) => RecordTag::DottedLine,
            Record::DottedWireCube(_) => RecordTag::DottedWireCube,
            Record::Label(_) => RecordTag::Label,
            Record::Log(_) => RecordTag::Log,
            Record::WireCube(_) => RecordTag::WireCube,
        }
    }

    /// Size of this record on the stream, tag included.
    pub fn encoded_len(&self) -> usize {
        self.tag().encoded_len()
    }

    fn payload_bytes(&self) -> &[u8] {
        match self {
            Record::Sphere(p) => bytemuck::bytes_of(p),
            Record::RectangleWithOutline(p) => bytemuck::bytes_of(p),
            Record::Polygon(p) => bytemuck::bytes_of(p),
            Record::Line(p) => bytemuck::bytes_of(p),
            Record::Ray(p) => bytemuck::bytes_of(p),
            Record::Cone(p) => bytemuck::bytes_of(p),
            Record::Circle(p) => bytemuck::bytes_of(p),
            Record::DottedLine(p) => bytemuck::bytes_of(p),
            Record::DottedWireCube(p) => bytemuck::bytes_of(p),
            Record::Label(p) => bytemuck::bytes_of(p),
            Record::Log(p) => bytemuck::bytes_of(p),
            Record::WireCube(p) => bytemuck::bytes_of(p),
        }
    }

    /// Write the tag-prefixed record to the front of `out`.
    ///
    /// Returns the number of bytes written. Panics if `out` is shorter than
    /// [`encoded_len`](Self::encoded_len).
    pub fn encode_into(&self, out: &mut [u8]) -> usize {
        let payload = self.payload_bytes();
        let len = TAG_SIZE + payload.len();
        assert!(
            out.len() >= len,
            "record of {len} bytes does not fit in {} bytes",
            out.len()
        );
        out[..TAG_SIZE].copy_from_slice(&(self.tag() as u32).to_ne_bytes());
        out[TAG_SIZE..len].copy_from_slice(payload);
        len
    }

    /// Decode the record starting at `offset` in `bytes`.
    ///
    /// Returns the record and the offset just past it.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<(Record, usize), DecodeError> {
        let available = bytes.len().saturating_sub(offset);
        if available < TAG_SIZE {
            return Err(DecodeError::Truncated {
                tag: 0,
                offset,
                needed: TAG_SIZE,
                available,
            });
        }
        let raw: u32 = bytemuck::pod_read_unaligned(&bytes[offset..offset + TAG_SIZE]);
        let tag = RecordTag::from_u32(raw).ok_or(DecodeError::UnknownTag { tag: raw, offset })?;

        let needed = tag.encoded_len();
        if available < needed {
            return Err(DecodeError::Truncated {
                tag: raw,
                offset,
                needed,
                available,
            });
        }
        let payload = &bytes[offset + TAG_SIZE..offset + needed];
        let record = match tag {
            RecordTag::Sphere => Record::Sphere(bytemuck::pod_read_unaligned(payload)),
            RecordTag::RectangleWithOutline => {
                Record::RectangleWithOutline(bytemuck::pod_read_unaligned(payload))
            }
            RecordTag::Polygon => Record::Polygon(bytemuck::pod_read_unaligned(payload)),
            RecordTag::Line => Record::Line(bytemuck::pod_read_unaligned(payload)),
            RecordTag::Ray => Record::Ray(bytemuck::pod_read_unaligned(payload)),
            RecordTag::Cone => Record::Cone(bytemuck::pod_read_unaligned(payload)),
            RecordTag::Circle => Record::Circle(bytemuck::pod_read_unaligned(payload)),
            RecordTag::DottedLine => Record::DottedLine(bytemuck::pod_read_unaligned(payload)),
            RecordTag::DottedWireCube => {
                Record::DottedWireCube(bytemuck::pod_read_unaligned(payload))
            }
            RecordTag::Label => Record::Label(bytemuck::pod_read_unaligned(payload)),
            RecordTag::Log => Record::Log(bytemuck::pod_read_unaligned(payload)),
            RecordTag::WireCube => Record::WireCube(bytemuck::pod_read_unaligned(payload)),
        };
        Ok((record, offset + needed))
    }
}

macro_rules! impl_from_payload {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Record {
                fn from(payload: $kind) -> Self {
                    Record::$kind(payload)
                }
            }
        )*
    };
}

impl From<&Record> for Record {
    fn from(record: &Record) -> Self {
        *record
    }
}

impl_from_payload!(
    Sphere,
    RectangleWithOutline,
    Polygon,
    Line,
    Ray,
    Cone,
    Circle,
    DottedLine,
    DottedWireCube,
    Label,
    Log,
    WireCube,
);
