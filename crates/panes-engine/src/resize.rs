//! Resize coordination: percent regions become cell sizes, debounced per session.
//!
//! A drag on a splitter produces a burst of layout changes. Each visible
//! session keeps one pending size and one debounce deadline; only the size
//! still pending after the quiet period reaches the process host.

use std::collections::HashMap;

use panes_core::{Region, SessionId, Topology};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::timer::{earliest, Deadline};

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    pub cols: u16,
    pub rows: u16,
}

impl CellSize {
    /// Size used before the container size is known.
    pub const FALLBACK: CellSize = CellSize { cols: 80, rows: 24 };

    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// Cells taken by a pane's frame in each direction.
const PANE_FRAME: u16 = 2;

#[derive(Debug)]
struct PendingResize {
    size: CellSize,
    deadline: Deadline,
}

/// Debounces size updates to backing processes.
#[derive(Debug)]
pub struct ResizeCoordinator {
    container: Option<CellSize>,
    debounce: Duration,
    pending: HashMap<SessionId, PendingResize>,
    last_sent: HashMap<SessionId, CellSize>,
}

impl ResizeCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            container: None,
            debounce,
            pending: HashMap::new(),
            last_sent: HashMap::new(),
        }
    }

    /// Records the container size. Returns true if it changed.
    pub fn set_container(&mut self, cols: u16, rows: u16) -> bool {
        let size = CellSize::new(cols, rows);
        let changed = self.container != Some(size);
        self.container = Some(size);
        changed
    }

    /// Inner cell size of a pane occupying `region`.
    pub fn cell_size(&self, region: &Region) -> CellSize {
        let Some(container) = self.container else {
            return CellSize::FALLBACK;
        };
        let scale = |total: u16, percent: f32| -> u16 {
            let cells = (f32::from(total) * percent / 100.0).floor();
            // Region percentages are within 0..=100, so this stays in range.
            (cells as u16).saturating_sub(PANE_FRAME).max(1)
        };
        CellSize::new(
            scale(container.cols, region.width),
            scale(container.rows, region.height),
        )
    }

    /// Queues `size` for `id`, restarting its debounce.
    ///
    /// A size equal to what the process already has cancels any pending update.
    pub fn request(&mut self, id: SessionId, size: CellSize, now: Instant) {
        if self.last_sent.get(&id) == Some(&size) {
            self.pending.remove(&id);
            return;
        }
        let entry = self.pending.entry(id).or_insert_with(|| PendingResize {
            size,
            deadline: Deadline::default(),
        });
        entry.size = size;
        entry.deadline.arm(now, self.debounce);
    }

    /// Queues the size of every placement in `topology` whose id passes `include`.
    pub fn plan(&mut self, topology: &Topology, now: Instant, include: impl Fn(SessionId) -> bool) {
        for placement in &topology.placements {
            if include(placement.session_id) {
                let size = self.cell_size(&placement.region);
                self.request(placement.session_id, size, now);
            }
        }
    }

    /// Records a size handed over outside the debounce, e.g. at spawn.
    pub fn mark_sent(&mut self, id: SessionId, size: CellSize) {
        self.pending.remove(&id);
        self.last_sent.insert(id, size);
    }

    pub fn forget(&mut self, id: SessionId) {
        self.pending.remove(&id);
        self.last_sent.remove(&id);
    }

    /// Takes the sizes whose quiet period has passed.
    pub fn poll_due(&mut self, now: Instant) -> Vec<(SessionId, CellSize)> {
        let mut due: Vec<(SessionId, CellSize)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline.is_due(now))
            .map(|(id, p)| (*id, p.size))
            .collect();
        due.sort_by_key(|(id, _)| *id);

        for (id, size) in &due {
            self.pending.remove(id);
            self.last_sent.insert(*id, *size);
            debug!(session_id = %id, cols = size.cols, rows = size.rows, "Resize due");
        }
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.pending.values().map(|p| p.deadline.deadline()))
    }
}
