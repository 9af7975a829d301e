//! The rolling window of monitored frames.

use sparsewatch_types::SparsityFrame;

/// Fill state of a [`MonitorWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// No frames.
    Empty,
    /// Some frames, fewer than the period.
    Accumulating,
    /// Exactly `period` frames; a reporting cycle is due.
    Full,
}

/// Bounded, append-only sequence of frames for the current window.
///
/// The window never holds more than `capacity` frames: `push` refuses a
/// frame once full, and the owner drains it with [`MonitorWindow::take`].
#[derive(Debug, Clone)]
pub struct MonitorWindow {
    frames: Vec<SparsityFrame>,
    capacity: usize,
}

impl MonitorWindow {
    /// Create an empty window holding up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames held.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the window holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether the window holds `capacity` frames.
    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    /// Current fill state.
    pub fn state(&self) -> WindowState {
        if self.frames.is_empty() {
            WindowState::Empty
        } else if self.is_full() {
            WindowState::Full
        } else {
            WindowState::Accumulating
        }
    }

    /// Append a frame.
    ///
    /// Returns the new state, or hands the frame back if the window is
    /// already full.
    pub fn push(&mut self, frame: SparsityFrame) -> Result<WindowState, SparsityFrame> {
        if self.is_full() {
            return Err(frame);
        }
        self.frames.push(frame);
        Ok(self.state())
    }

    /// Frames in arrival order.
    pub fn frames(&self) -> &[SparsityFrame] {
        &self.frames
    }

    /// Step of the oldest frame.
    pub fn first_step(&self) -> Option<u64> {
        self.frames.first().map(|f| f.step)
    }

    /// Step of the newest frame.
    pub fn last_step(&self) -> Option<u64> {
        self.frames.last().map(|f| f.step)
    }

    /// Remove and return every frame, leaving the window empty.
    pub fn take(&mut self) -> Vec<SparsityFrame> {
        std::mem::replace(&mut self.frames, Vec::with_capacity(self.capacity))
    }

    /// Discard every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
