//! Thread-safe debug command stream for RedLilium Engine.
//!
//! Any thread can queue debug draw commands and log messages while a frame
//! is being simulated; once per rendered frame the render thread drains
//! everything queued during the previous frame, in a deterministic order,
//! and dispatches it to the host's renderers. Producers never block each
//! other and nothing is allocated on the hot path once blocks are warm.
//!
//! # Architecture
//!
//! - [`DebugDrawer`]: Context object owning the stream (store as a shared resource)
//! - [`DebugDrawerContext`]: Lightweight drawing handle bound to one thread index
//! - Stream internals: three generation buffers rotating current → processing → available,
//!   each a set of per-thread partitions of fixed-size blocks holding encoded [`Record`]s.
//!   Rotation and draining only happen inside [`DebugDrawer::on_frame_tick`].
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use redlilium_debug_drawer::{DebugDrawer, Record, StreamConfig, WorkerPool};
//!
//! // Setup (once)
//! let drawer = Arc::new(DebugDrawer::new(StreamConfig::default().with_max_producers(4)).unwrap());
//! drawer.allocate();
//!
//! // During the frame, from any worker (each with its own index):
//! WorkerPool::new(4).scope(|s| {
//!     for _ in 0..4 {
//!         let drawer = &drawer;
//!         s.spawn(move |index| {
//!             let ctx = drawer.context(index);
//!             ctx.draw_line([0.0; 3], [1.0, 1.0, 1.0], [1.0, 0.0, 0.0, 1.0]);
//!             ctx.draw_aabb([-1.0; 3], [1.0; 3], [0.0, 1.0, 0.0, 1.0]);
//!         });
//!     }
//! });
//!
//! // On the render thread, once per frame:
//! let report = drawer.on_frame_tick(1, &mut |record: &Record| {
//!     // dispatch to renderers
//!     let _ = record.tag();
//! });
//! assert_eq!(report.executed, 8);
//! ```

mod config;
mod draw_api;
mod drawer;
mod error;
mod frame_gate;
mod generation;
mod record;
mod rotation;
mod segment;
mod text;
mod workers;

pub use config::{DEFAULT_BLOCK_SIZE, StreamConfig};
pub use draw_api::UNINDEXED_THREAD_ID;
pub use drawer::{CommandExecutor, DebugDrawer, DebugDrawerContext, EnqueueOutcome, FrameReport};
pub use error::{ConfigError, DecodeError};
pub use frame_gate::TickDecision;
pub use record::{
    Circle, Color, Cone, DEFAULT_COLOR, DottedLine, DottedWireCube, Label, LabelStyle, Line, Log,
    LogLevel, MAX_POLYGON_POINTS, Polygon, Ray, Record, RecordTag, RectangleWithOutline, Sphere,
    TAG_SIZE, Vec3, WireCube,
};
pub use text::{FIXED_TEXT_CAPACITY, FixedText};
pub use workers::{WorkerPool, WorkerScope};
