use parking_lot::Mutex;

use crate::config::StreamConfig;
use crate::error::ConfigError;
use crate::frame_gate::{FrameGate, TickDecision};
use crate::generation::AppendRejected;
use crate::record::Record;
use crate::rotation::StreamRotation;

/// Receives drained records on the consumer thread.
///
/// Implemented for every `FnMut(&Record)`, so a closure that matches on the
/// record and forwards it to the host's renderers is usually enough.
pub trait CommandExecutor {
    fn execute(&mut self, record: &Record);
}

impl<F: FnMut(&Record)> CommandExecutor for F {
    fn execute(&mut self, record: &Record) {
        self(record)
    }
}

/// Result of queuing one record. Dropped records are never an error; the
/// outcome only tells the caller why.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// [`DebugDrawer::allocate`] has not been called yet.
    Unallocated,
    /// A transition window is open.
    Suppressed,
    /// The generation's record budget is used up.
    Throttled,
}

impl EnqueueOutcome {
    pub fn is_accepted(self) -> bool {
        self == EnqueueOutcome::Accepted
    }
}

/// Summary of one consumer tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub decision: TickDecision,
    /// Generation that was drained, if the tick rotated.
    pub generation: Option<u64>,
    /// Records handed to the executor.
    pub executed: usize,
    /// Partitions cut short by a decode error.
    pub corrupt_partitions: usize,
}

/// Thread-safe debug command stream.
///
/// Producers on any thread queue fixed-layout [`Record`]s into a partition
/// chosen by their thread index; different indices never contend. Once per
/// rendered frame the host calls [`on_frame_tick`](Self::on_frame_tick) on
/// its render thread, which rotates the stream's three generation buffers
/// and hands the previous generation's records to a [`CommandExecutor`].
///
/// There is no hidden global: the host constructs one drawer (typically in
/// an `Arc`) and passes it to everything that draws.
pub struct DebugDrawer {
    config: StreamConfig,
    gate: FrameGate,
    stream: StreamRotation,
    consumer: Mutex<()>,
}

impl DebugDrawer {
    /// Create an unallocated drawer.
    pub fn new(config: StreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            gate: FrameGate::new(),
            stream: StreamRotation::new(),
            consumer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Allocate the stream for `config.max_producers` producers.
    ///
    /// Returns `false` if the stream was already allocated.
    pub fn allocate(&self) -> bool {
        self.allocate_partitions(self.config.partition_count())
    }

    /// Allocate the stream for thread indices `0..max_producers`, plus one
    /// reserved index for callers that have none. A no-op returning `false`
    /// if the stream was already allocated.
    pub fn allocate_with(&self, max_producers: usize) -> bool {
        self.allocate_partitions(max_producers.max(1) + 1)
    }

    fn allocate_partitions(&self, partition_count: usize) -> bool {
        let created = self.stream.allocate(
            partition_count,
            self.config.block_size,
            self.config.frame_record_budget,
        );
        if created {
            log::info!(
                "Debug stream allocated: {} producer partitions + 1 reserved, {} byte blocks",
                partition_count - 1,
                self.config.block_size
            );
        }
        created
    }

    pub fn is_allocated(&self) -> bool {
        self.stream.is_allocated()
    }

    /// Partitions per generation, including the reserved one. Zero before
    /// allocation.
    pub fn partition_count(&self) -> usize {
        self.stream
            .current()
            .map_or(0, |buffer| buffer.segment().partition_count())
    }

    /// Thread index used by [`enqueue_unindexed`](Self::enqueue_unindexed).
    pub fn unindexed_thread_index(&self) -> Option<usize> {
        self.partition_count().checked_sub(1)
    }

    /// Rotations performed so far.
    pub fn generation(&self) -> u64 {
        self.stream.rotation_count()
    }

    pub fn current_frame(&self) -> u64 {
        self.gate.current_frame()
    }

    pub fn last_queued_frame(&self) -> u64 {
        self.gate.last_queued_frame()
    }

    /// Frame of the most recent tick that rotated and drained.
    pub fn last_processed_frame(&self) -> Option<u64> {
        self.gate.last_processed_frame()
    }

    /// Records accepted into the generation currently being written.
    pub fn queued_records(&self) -> usize {
        self.stream.current().map_or(0, |buffer| buffer.record_count())
    }

    pub(crate) fn stream(&self) -> &StreamRotation {
        &self.stream
    }

    /// Queue `record` from the producer that owns `thread_index`.
    ///
    /// Never blocks on other producers. Silently dropped while unallocated,
    /// during a transition, or once the generation budget is exhausted.
    ///
    /// Panics if `thread_index` is not below [`partition_count`](Self::partition_count).
    pub fn enqueue(&self, thread_index: usize, record: impl Into<Record>) -> EnqueueOutcome {
        if self.gate.is_transitioning() {
            return EnqueueOutcome::Suppressed;
        }
        let record = record.into();
        match self.stream.append(thread_index, &record) {
            Ok(_) => {
                self.gate.note_queued();
                EnqueueOutcome::Accepted
            }
            Err(AppendRejected::Unallocated) => EnqueueOutcome::Unallocated,
            Err(AppendRejected::Throttled) => EnqueueOutcome::Throttled,
            Err(AppendRejected::Closed) => {
                log::trace!(
                    "Debug record raced {} rotations; dropped",
                    crate::rotation::SLOT_COUNT
                );
                EnqueueOutcome::Suppressed
            }
        }
    }

    /// Queue `record` through the reserved partition.
    ///
    /// All unindexed callers share one partition, so they must not call this
    /// concurrently with each other; give worker threads their own index.
    pub fn enqueue_unindexed(&self, record: impl Into<Record>) -> EnqueueOutcome {
        match self.unindexed_thread_index() {
            Some(index) => self.enqueue(index, record),
            None => EnqueueOutcome::Unallocated,
        }
    }

    /// Create a drawing context bound to `thread_index`.
    pub fn context(&self, thread_index: usize) -> DebugDrawerContext<'_> {
        DebugDrawerContext {
            drawer: self,
            thread_index: Some(thread_index),
        }
    }

    /// Create a drawing context that writes through the reserved partition.
    pub fn context_unindexed(&self) -> DebugDrawerContext<'_> {
        DebugDrawerContext {
            drawer: self,
            thread_index: None,
        }
    }

    /// Open a transition window: writes are dropped and ticks do nothing
    /// until [`end_transition`](Self::end_transition).
    pub fn begin_transition(&self) {
        self.gate.begin_transition();
    }

    pub fn end_transition(&self) {
        self.gate.end_transition();
    }

    pub fn is_transitioning(&self) -> bool {
        self.gate.is_transitioning()
    }

    /// Consumer entry point, called once per rendered frame.
    ///
    /// Detects the frame boundary, rotates the buffers when a new frame has
    /// started and something was queued, and passes every record of the
    /// drained generation to `executor`. Concurrent calls are serialized.
    pub fn on_frame_tick<E: CommandExecutor + ?Sized>(
        &self,
        frame: u64,
        executor: &mut E,
    ) -> FrameReport {
        let _consumer = self.consumer.lock();
        let mut report = FrameReport {
            frame,
            decision: TickDecision::Unallocated,
            generation: None,
            executed: 0,
            corrupt_partitions: 0,
        };
        if !self.stream.is_allocated() {
            return report;
        }

        report.decision = self.gate.observe_frame_boundary(frame);
        if !report.decision.rotates() {
            log::trace!("Frame {} tick skipped: {:?}", frame, report.decision);
            return report;
        }

        self.stream.rotate();
        if let Some(processing) = self.stream.processing() {
            report.generation = Some(processing.generation());
            let mut drain = processing.drain();
            for record in drain.by_ref() {
                executor.execute(&record);
                report.executed += 1;
            }
            report.corrupt_partitions = drain.corrupt_partitions();
        }
        self.gate.mark_processed(frame);

        log::debug!(
            "Frame {}: drained generation {:?} ({} records, {} corrupt partitions)",
            frame,
            report.generation,
            report.executed,
            report.corrupt_partitions
        );
        report
    }
}

impl Default for DebugDrawer {
    fn default() -> Self {
        Self {
            config: StreamConfig::default(),
            gate: FrameGate::new(),
            stream: StreamRotation::new(),
            consumer: Mutex::new(()),
        }
    }
}

/// A lightweight drawing handle bound to one thread index.
///
/// Obtain via [`DebugDrawer::context()`] on worker threads, or
/// [`DebugDrawer::context_unindexed()`] on the main thread. Records are
/// queued immediately; there is nothing to flush.
#[derive(Clone, Copy)]
pub struct DebugDrawerContext<'a> {
    drawer: &'a DebugDrawer,
    thread_index: Option<usize>,
}

impl DebugDrawerContext<'_> {
    /// Thread index this context writes to, if it has one.
    pub fn thread_index(&self) -> Option<usize> {
        self.thread_index
    }

    /// Queue a prebuilt record.
    #[inline]
    pub fn push(&self, record: impl Into<Record>) -> EnqueueOutcome {
        match self.thread_index {
            Some(index) => self.drawer.enqueue(index, record),
            None => self.drawer.enqueue_unindexed(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Line, RecordTag};
    use crate::segment::Segment;

    fn drawer() -> DebugDrawer {
        let drawer =
            DebugDrawer::new(StreamConfig::default().with_max_producers(2)).unwrap();
        drawer.allocate();
        drawer
    }

    fn line(x: f32) -> Line {
        Line {
            start: [x, 0.0, 0.0],
            end: [0.0; 3],
            color: [1.0; 4],
        }
    }

    fn collect(drawer: &DebugDrawer, frame: u64) -> (FrameReport, Vec<Record>) {
        let mut records = Vec::new();
        let report = drawer.on_frame_tick(frame, &mut |record: &Record| records.push(*record));
        (report, records)
    }

    #[test]
    fn test_new_drawer() {
        let drawer = DebugDrawer::new(StreamConfig::default().with_max_producers(4)).unwrap();
        assert!(!drawer.is_allocated());
        assert_eq!(drawer.partition_count(), 0);
        assert_eq!(drawer.generation(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(DebugDrawer::new(StreamConfig::default().with_block_size(16)).is_err());
    }

    #[test]
    fn test_allocate_idempotent() {
        let drawer = DebugDrawer::new(StreamConfig::default().with_max_producers(2)).unwrap();
        assert!(drawer.allocate());
        assert!(!drawer.allocate_with(16));
        assert_eq!(drawer.partition_count(), 3);
        assert_eq!(drawer.unindexed_thread_index(), Some(2));

        let drawer = DebugDrawer::new(StreamConfig::default().with_max_producers(2)).unwrap();
        assert!(drawer.allocate_with(5));
        assert_eq!(drawer.partition_count(), 6);
    }

    #[test]
    fn test_unallocated_drops_silently() {
        let drawer = DebugDrawer::default();
        assert_eq!(drawer.enqueue(0, line(0.0)), EnqueueOutcome::Unallocated);
        assert_eq!(
            drawer.enqueue_unindexed(line(0.0)),
            EnqueueOutcome::Unallocated
        );
        let (report, records) = collect(&drawer, 1);
        assert_eq!(report.decision, TickDecision::Unallocated);
        assert!(records.is_empty());
    }

    #[test]
    fn test_records_arrive_next_tick() {
        let drawer = drawer();
        collect(&drawer, 1);

        assert!(drawer.enqueue(0, line(1.0)).is_accepted());
        assert!(drawer.enqueue_unindexed(&Record::Line(line(2.0))).is_accepted());
        assert_eq!(drawer.queued_records(), 2);

        let (report, records) = collect(&drawer, 2);
        assert!(report.decision.rotates());
        assert_eq!(drawer.last_processed_frame(), Some(2));
        assert_eq!(drawer.queued_records(), 0);
        assert_eq!(report.executed, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], Record::Line(line(1.0)));
        assert_eq!(records[1], Record::Line(line(2.0)));
    }

    #[test]
    fn test_executor_trait_object() {
        struct Counter(usize);
        impl CommandExecutor for Counter {
            fn execute(&mut self, record: &Record) {
                assert_eq!(record.tag(), RecordTag::Line);
                self.0 += 1;
            }
        }

        let drawer = drawer();
        drawer.enqueue(1, line(0.0));
        let mut counter = Counter(0);
        let executor: &mut dyn CommandExecutor = &mut counter;
        drawer.on_frame_tick(1, executor);
        assert_eq!(counter.0, 1);
    }

    #[test]
    fn test_transition_drops_writes_and_skips_ticks() {
        let drawer = drawer();
        collect(&drawer, 1);
        drawer.enqueue(0, line(1.0));

        drawer.begin_transition();
        assert!(drawer.is_transitioning());
        assert_eq!(drawer.enqueue(0, line(2.0)), EnqueueOutcome::Suppressed);
        let generation = drawer.generation();
        let (report, records) = collect(&drawer, 2);
        assert_eq!(report.decision, TickDecision::Suppressed);
        assert!(records.is_empty());
        assert_eq!(drawer.generation(), generation);

        drawer.end_transition();
        let (_, records) = collect(&drawer, 3);
        assert_eq!(records, vec![Record::Line(line(1.0))]);
    }

    #[test]
    fn test_budget_throttles() {
        let drawer = DebugDrawer::new(
            StreamConfig::default()
                .with_max_producers(1)
                .with_frame_record_budget(Some(2)),
        )
        .unwrap();
        drawer.allocate();
        assert!(drawer.enqueue(0, line(0.0)).is_accepted());
        assert!(drawer.enqueue(0, line(1.0)).is_accepted());
        assert_eq!(drawer.enqueue(0, line(2.0)), EnqueueOutcome::Throttled);

        let (_, records) = collect(&drawer, 1);
        assert_eq!(records.len(), 2);
        // the budget applies per generation
        assert!(drawer.enqueue(0, line(3.0)).is_accepted());
    }

    #[test]
    fn test_repeat_tick_does_not_rotate_twice() {
        let drawer = drawer();
        collect(&drawer, 1);
        drawer.enqueue(0, line(1.0));
        let before = drawer.generation();
        let (report, _) = collect(&drawer, 1);
        assert_eq!(report.decision, TickDecision::AlreadyProcessed);
        assert_eq!(drawer.generation(), before);
    }

    #[test]
    fn test_corrupt_partition_reported() {
        let drawer = drawer();
        drawer.enqueue(0, line(0.0));
        drawer.enqueue(1, line(1.0));
        {
            let segment: &Segment = drawer.stream().current().unwrap().segment();
            let mut writer = segment.writer(0);
            writer.append_raw(&1234u32.to_ne_bytes());
        }
        let (report, records) = collect(&drawer, 1);
        assert_eq!(report.corrupt_partitions, 1);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_empty_rotations_are_idempotent() {
        let drawer = drawer();
        for _ in 0..9 {
            assert!(drawer.stream().rotate());
            let processing = drawer.stream().processing().unwrap();
            assert_eq!(processing.drain().count(), 0);
            assert!(processing.segment().active_indices().is_empty());
        }

        drawer.enqueue(2, line(7.0));
        let (_, records) = collect(&drawer, 1);
        assert_eq!(records, vec![Record::Line(line(7.0))]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_thread_index_beyond_allocation_panics() {
        let drawer = drawer();
        drawer.enqueue(3, line(0.0));
    }

    #[test]
    fn test_context_routes_to_its_partition() {
        let drawer = drawer();
        drawer.context(1).push(line(1.0));
        drawer.context_unindexed().push(line(2.0));
        drawer.context(0).push(line(0.0));
        assert_eq!(
            drawer
                .stream()
                .current()
                .map(|b| b.segment().active_indices()),
            Some(vec![0, 1, 2])
        );
        let (_, records) = collect(&drawer, 1);
        assert_eq!(
            records,
            vec![
                Record::Line(line(0.0)),
                Record::Line(line(1.0)),
                Record::Line(line(2.0)),
            ]
        );
    }
}
