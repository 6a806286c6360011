//! LIFO stack of open spans
//!
//! [`SpanStack`] is generic over the frame type so the same depth guard,
//! stale-frame purge and exclusive-time bookkeeping serve both engine spans
//! and script call frames.

use echo_types::constants::MAX_STACK_DEPTH;
use echo_types::MeasurementPoint;
use serde::{Deserialize, Serialize};

/// A frame that can live on a [`SpanStack`]
pub trait StackFrame {
    /// Monotonic start time
    fn start_nanos(&self) -> u64;

    /// Time already attributed to finished children
    fn child_nanos(&self) -> u64;

    /// Attribute a finished child's elapsed time to this frame
    fn add_child_nanos(&mut self, nanos: u64);
}

/// A frame removed from the stack together with its timings
#[derive(Debug)]
pub struct PoppedFrame<F> {
    pub frame: F,
    pub elapsed_nanos: u64,
    pub self_nanos: u64,
}

/// Bounded LIFO of open frames for one execution context
///
/// An empty stack is a normal state: the matching push was filtered out
/// upstream.
#[derive(Debug)]
pub struct SpanStack<F> {
    frames: Vec<F>,
    max_depth: usize,
}

impl<F: StackFrame> SpanStack<F> {
    /// Stack with the default depth limit
    pub fn new() -> Self {
        Self::with_max_depth(MAX_STACK_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            frames: Vec::with_capacity(max_depth.min(MAX_STACK_DEPTH)),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.max_depth
    }

    /// Innermost open frame
    pub fn top(&self) -> Option<&F> {
        self.frames.last()
    }

    /// Open frames, outermost first
    pub fn frames(&self) -> &[F] {
        &self.frames
    }

    /// Push a frame, handing it back if the stack is full
    pub fn push(&mut self, frame: F) -> Result<(), F> {
        if self.is_full() {
            return Err(frame);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the innermost frame and compute its total and exclusive time
    ///
    /// The elapsed time is charged to the new top as child time.
    pub fn pop_completed(&mut self, now_nanos: u64) -> Option<PoppedFrame<F>> {
        let frame = self.frames.pop()?;
        let elapsed_nanos = now_nanos.saturating_sub(frame.start_nanos());
        let self_nanos = elapsed_nanos.saturating_sub(frame.child_nanos());

        if let Some(parent) = self.frames.last_mut() {
            parent.add_child_nanos(elapsed_nanos);
        }

        Some(PoppedFrame {
            frame,
            elapsed_nanos,
            self_nanos,
        })
    }

    /// Remove frames older than `ttl_nanos`, oldest first
    ///
    /// Frames are pushed in start order, so purging stops at the first frame
    /// that is still fresh.
    pub fn purge_stale(&mut self, now_nanos: u64, ttl_nanos: u64) -> Vec<F> {
        let stale = self
            .frames
            .iter()
            .take_while(|f| now_nanos.saturating_sub(f.start_nanos()) > ttl_nanos)
            .count();
        self.frames.drain(..stale).collect()
    }

    /// Remove every frame
    pub fn drain(&mut self) -> Vec<F> {
        std::mem::take(&mut self.frames)
    }
}

impl<F: StackFrame> Default for SpanStack<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque identifier of one pushed span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(pub u64);

/// One open measurement on the engine stack
#[derive(Debug)]
pub struct Span {
    id: SpanId,
    point: MeasurementPoint,
    label: Option<String>,
    start_nanos: u64,
    child_nanos: u64,
}

impl Span {
    pub fn new(id: SpanId, point: MeasurementPoint, label: Option<String>, start_nanos: u64) -> Self {
        Self {
            id,
            point,
            label,
            start_nanos,
            child_nanos: 0,
        }
    }

    pub fn id(&self) -> SpanId {
        self.id
    }

    pub fn point(&self) -> MeasurementPoint {
        self.point
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Take the label buffer out of the span
    pub fn take_label(&mut self) -> Option<String> {
        self.label.take()
    }
}

impl StackFrame for Span {
    fn start_nanos(&self) -> u64 {
        self.start_nanos
    }

    fn child_nanos(&self) -> u64 {
        self.child_nanos
    }

    fn add_child_nanos(&mut self, nanos: u64) {
        self.child_nanos += nanos;
    }
}

/// Result of a successful pop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSpan {
    pub id: SpanId,
    /// Point of the span that was actually open
    pub point: MeasurementPoint,
    pub elapsed_nanos: u64,
    pub self_nanos: u64,
}

impl CompletedSpan {
    pub fn elapsed_micros(&self) -> u64 {
        self.elapsed_nanos / 1_000
    }

    pub fn self_micros(&self) -> u64 {
        self.self_nanos / 1_000
    }
}

/// An open span as seen from outside its thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSpan {
    pub point: MeasurementPoint,
    pub label: Option<String>,
    pub elapsed_nanos: u64,
}

impl ActiveSpan {
    /// `"Display Name [label] (12.34ms)"`
    pub fn describe(&self) -> String {
        let ms = self.elapsed_nanos as f64 / 1_000_000.0;
        match &self.label {
            Some(label) => format!("{} [{}] ({:.2}ms)", self.point.display_name(), label, ms),
            None => format!("{} ({:.2}ms)", self.point.display_name(), ms),
        }
    }
}
