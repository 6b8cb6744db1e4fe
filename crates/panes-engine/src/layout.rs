//! Layout engine: arrangement choice, split ratios, visual order and tabs.
//!
//! Rendering is a pure projection of what this engine holds: the visual
//! order plus the mode, arrangement, and ratios feed
//! [`panes_core::compute_topology`]. Reordering only ever touches the visual
//! order; session metadata stays with the session id.

use std::collections::HashMap;
use std::str::FromStr;

use panes_core::{
    compute_topology, Arrangement, DomainError, DomainResult, LayoutMode, LayoutSnapshot,
    MoveDirection, Placement, Region, SessionId, SplitHandle, SplitRatio, Topology,
};
use tracing::{debug, error};

use crate::config::LayoutConfig;

/// Process-wide layout state.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    mode: LayoutMode,
    two: Arrangement,
    three: Arrangement,
    ratios: HashMap<(Arrangement, SplitHandle), SplitRatio>,
    visual_order: Vec<SessionId>,
    active_tab: Option<SessionId>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(&LayoutConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            mode: config.mode,
            two: config.two,
            three: config.three,
            ratios: HashMap::new(),
            visual_order: Vec::new(),
            active_tab: None,
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn visual_order(&self) -> &[SessionId] {
        &self.visual_order
    }

    pub fn active_tab(&self) -> Option<SessionId> {
        self.active_tab
    }

    pub fn position_of(&self, id: SessionId) -> Option<usize> {
        self.visual_order.iter().position(|s| *s == id)
    }

    /// Grid arrangement for the current session count.
    pub fn arrangement(&self) -> Arrangement {
        match self.visual_order.len() {
            2 => self.two,
            3 => self.three,
            n => Arrangement::default_for(n),
        }
    }

    /// Switches between grid and tabs.
    ///
    /// Entering tabbed mode selects `focused` if it is laid out, else keeps a
    /// valid tab. Returns true if the mode changed.
    pub fn set_mode(&mut self, mode: LayoutMode, focused: Option<SessionId>) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        if mode == LayoutMode::Tabbed {
            if let Some(id) = focused.filter(|id| self.visual_order.contains(id)) {
                self.active_tab = Some(id);
            }
        }
        self.repair_active_tab();
        debug!(mode = %mode, active_tab = ?self.active_tab, "Layout mode changed");
        true
    }

    /// Picks the arrangement by name for its session count.
    ///
    /// Fixed arrangements (single, 2x2, rows) are accepted and change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidFieldValue`] for an unknown name.
    pub fn set_arrangement(&mut self, name: &str) -> DomainResult<bool> {
        let arrangement = Arrangement::from_str(name)?;
        Ok(self.apply_arrangement(arrangement))
    }

    /// Advances the arrangement for the current count to its next variant.
    pub fn cycle_arrangement(&mut self) -> Arrangement {
        let next = self.arrangement().next_variant();
        self.apply_arrangement(next);
        self.arrangement()
    }

    fn apply_arrangement(&mut self, arrangement: Arrangement) -> bool {
        let slot = if Arrangement::TWO_WAY.contains(&arrangement) {
            &mut self.two
        } else if Arrangement::THREE_WAY.contains(&arrangement) {
            &mut self.three
        } else {
            debug!(arrangement = %arrangement, "Fixed arrangement requested, nothing to change");
            return false;
        };
        let changed = *slot != arrangement;
        *slot = arrangement;
        changed
    }

    /// Ratio of a splitter, defaulting to 50/50.
    pub fn split_ratio(&self, arrangement: Arrangement, handle: SplitHandle) -> SplitRatio {
        self.ratios
            .get(&(arrangement, handle))
            .copied()
            .unwrap_or(SplitRatio::DEFAULT)
    }

    /// Drags a splitter of the current arrangement. The stored ratio is clamped.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidFieldValue`] if the current arrangement
    /// has no such splitter (including in tabbed mode).
    pub fn set_split_ratio(&mut self, handle: SplitHandle, percent: f32) -> DomainResult<SplitRatio> {
        let arrangement = self.arrangement();
        if self.mode == LayoutMode::Tabbed || !arrangement.handles().contains(&handle) {
            return Err(DomainError::invalid(
                "split handle",
                format!("{handle:?}"),
                "a splitter of the current grid arrangement",
            ));
        }
        let ratio = SplitRatio::new(percent);
        self.ratios.insert((arrangement, handle), ratio);
        debug!(arrangement = %arrangement, ?handle, requested = percent, stored = ratio.first(), "Split ratio set");
        Ok(ratio)
    }

    /// What is on screen for the current state.
    pub fn topology(&self) -> Topology {
        match self.mode {
            LayoutMode::Grid => compute_topology(self.arrangement(), &self.visual_order, |a, h| {
                self.split_ratio(a, h)
            }),
            LayoutMode::Tabbed => match self.active_tab.zip(self.active_position()) {
                Some((id, position)) => Topology {
                    arrangement: Arrangement::Single,
                    placements: vec![Placement {
                        position,
                        session_id: id,
                        region: Region::FULL,
                    }],
                    handles: Vec::new(),
                },
                None => Topology::empty(),
            },
        }
    }

    fn active_position(&self) -> Option<usize> {
        self.active_tab.and_then(|id| self.position_of(id))
    }

    /// Moves the pane at `position` one step, wrapping at both ends.
    ///
    /// Inner moves swap with the neighbour. Moving past an end rotates the
    /// pane to the other end, so `n` moves in one direction restore the order.
    /// Returns the pane's new position.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidFieldValue`] if `position` is out of range.
    pub fn move_by_position(&mut self, position: usize, direction: MoveDirection) -> DomainResult<usize> {
        let len = self.visual_order.len();
        if position >= len {
            return Err(DomainError::invalid(
                "position",
                position,
                &format!("a position below {len}"),
            ));
        }
        if len < 2 {
            return Ok(position);
        }

        let last = len - 1;
        let new_position = match (direction, position) {
            (MoveDirection::Left, 0) => {
                self.visual_order.rotate_left(1);
                last
            }
            (MoveDirection::Right, p) if p == last => {
                self.visual_order.rotate_right(1);
                0
            }
            (MoveDirection::Left, p) => {
                self.visual_order.swap(p, p - 1);
                p - 1
            }
            (MoveDirection::Right, p) => {
                self.visual_order.swap(p, p + 1);
                p + 1
            }
        };
        debug!(from = position, to = new_position, ?direction, order = ?self.visual_order, "Pane moved");
        Ok(new_position)
    }

    /// Exchanges the screen positions of two sessions.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::StaleReference`] if either id is not laid out.
    pub fn swap(&mut self, a: SessionId, b: SessionId) -> DomainResult<()> {
        let pa = self
            .position_of(a)
            .ok_or(DomainError::StaleReference { session_id: a })?;
        let pb = self
            .position_of(b)
            .ok_or(DomainError::StaleReference { session_id: b })?;
        self.visual_order.swap(pa, pb);
        debug!(a = %a, b = %b, order = ?self.visual_order, "Panes swapped");
        Ok(())
    }

    /// Reconciles the visual order with the registry's ids.
    ///
    /// Departed ids drop out, new ids join at the end in id order, and a
    /// dangling active tab moves to the lowest remaining id. Returns true if
    /// anything changed.
    pub fn sync(&mut self, active_ids: &[SessionId]) -> bool {
        let before = (self.visual_order.clone(), self.active_tab);

        self.visual_order.retain(|id| active_ids.contains(id));
        let mut joined: Vec<SessionId> = active_ids
            .iter()
            .copied()
            .filter(|id| !self.visual_order.contains(id))
            .collect();
        joined.sort();
        self.visual_order.extend(joined);

        self.repair_active_tab();
        (self.visual_order.clone(), self.active_tab) != before
    }

    fn repair_active_tab(&mut self) {
        let valid = self
            .active_tab
            .is_some_and(|id| self.visual_order.contains(&id));
        if !valid {
            self.active_tab = self.visual_order.iter().min().copied();
        }
    }

    /// Selects the visible tab.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::StaleReference`] if `id` is not laid out.
    pub fn select_tab(&mut self, id: SessionId) -> DomainResult<bool> {
        if !self.visual_order.contains(&id) {
            return Err(DomainError::StaleReference { session_id: id });
        }
        let changed = self.active_tab != Some(id);
        self.active_tab = Some(id);
        Ok(changed)
    }

    /// Verifies the active-tab invariant, healing it if broken.
    ///
    /// A broken invariant is a bug: debug builds stop here, release builds
    /// log it and pick the lowest remaining id.
    pub fn ensure_valid(&mut self) {
        let valid = match self.active_tab {
            Some(id) => self.visual_order.contains(&id),
            None => self.visual_order.is_empty(),
        };
        debug_assert!(
            valid,
            "active tab {:?} not in visual order {:?}",
            self.active_tab, self.visual_order
        );
        if !valid {
            error!(
                active_tab = ?self.active_tab,
                order = ?self.visual_order,
                "Active tab invariant violated, re-picking"
            );
            self.active_tab = None;
            self.repair_active_tab();
        }
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            mode: self.mode,
            visual_order: self.visual_order.clone(),
            active_tab: self.active_tab,
            topology: self.topology(),
        }
    }

    /// Corrupts the active tab so the self-heal path can be exercised.
    #[cfg(test)]
    fn force_active_tab(&mut self, id: Option<SessionId>) {
        self.active_tab = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    fn ids(ns: &[u8]) -> Vec<SessionId> {
        ns.iter().map(|n| id(*n)).collect()
    }

    fn engine_with(n: u8) -> LayoutEngine {
        let mut engine = LayoutEngine::default();
        engine.sync(&ids(&(0..n).collect::<Vec<_>>()));
        engine
    }

    #[test]
    fn test_arrangement_follows_count() {
        let mut engine = LayoutEngine::default();
        assert_eq!(engine.arrangement(), Arrangement::Single);
        for (n, expected) in [
            (1, Arrangement::Single),
            (2, Arrangement::Horizontal),
            (3, Arrangement::ThreeTop1),
            (4, Arrangement::Quad),
            (5, Arrangement::Rows),
            (6, Arrangement::Rows),
        ] {
            engine.sync(&ids(&(0..n).collect::<Vec<_>>()));
            assert_eq!(engine.arrangement(), expected, "{n} sessions");
            assert_eq!(engine.topology().placements.len(), n as usize);
        }
    }

    #[test]
    fn test_set_arrangement() {
        let mut engine = engine_with(3);
        assert!(engine.set_arrangement("3-right2").unwrap());
        assert_eq!(engine.arrangement(), Arrangement::ThreeRight2);
        assert!(!engine.set_arrangement("3-right2").unwrap());
        assert!(!engine.set_arrangement("2x2").unwrap());
        assert!(engine.set_arrangement("diagonal").is_err());

        // Two-way choice is remembered for when the count drops.
        engine.set_arrangement("vertical").unwrap();
        engine.sync(&ids(&[0, 1]));
        assert_eq!(engine.arrangement(), Arrangement::Vertical);
    }

    #[test]
    fn test_cycle_arrangement() {
        let mut engine = engine_with(2);
        assert_eq!(engine.cycle_arrangement(), Arrangement::Vertical);
        assert_eq!(engine.cycle_arrangement(), Arrangement::Horizontal);

        let mut engine = engine_with(4);
        assert_eq!(engine.cycle_arrangement(), Arrangement::Quad);
    }

    #[test]
    fn test_split_ratio_clamps() {
        let mut engine = engine_with(2);
        let stored = engine.set_split_ratio(SplitHandle::Main, 10.0).unwrap();
        assert_eq!(stored.first(), 25.0);
        assert_eq!(stored.second(), 75.0);

        let stored = engine.set_split_ratio(SplitHandle::Main, 95.0).unwrap();
        assert_eq!(stored.first(), 75.0);

        let topology = engine.topology();
        assert_eq!(topology.placements[0].region.width, 75.0);
    }

    #[test]
    fn test_split_ratio_rejects_foreign_handle() {
        let mut engine = engine_with(2);
        assert!(engine.set_split_ratio(SplitHandle::Left, 40.0).is_err());

        engine.set_mode(LayoutMode::Tabbed, None);
        assert!(engine.set_split_ratio(SplitHandle::Main, 40.0).is_err());
    }

    #[test]
    fn test_ratios_are_per_arrangement() {
        let mut engine = engine_with(2);
        engine.set_split_ratio(SplitHandle::Main, 30.0).unwrap();
        engine.set_arrangement("vertical").unwrap();
        assert_eq!(
            engine.split_ratio(Arrangement::Vertical, SplitHandle::Main),
            SplitRatio::DEFAULT
        );
        assert_eq!(
            engine
                .split_ratio(Arrangement::Horizontal, SplitHandle::Main)
                .first(),
            30.0
        );
    }

    #[test]
    fn test_move_wraps_both_ways() {
        let mut engine = engine_with(3);
        assert_eq!(engine.move_by_position(0, MoveDirection::Left).unwrap(), 2);
        assert_eq!(engine.visual_order(), ids(&[1, 2, 0]).as_slice());

        assert_eq!(engine.move_by_position(2, MoveDirection::Right).unwrap(), 0);
        assert_eq!(engine.visual_order(), ids(&[0, 1, 2]).as_slice());

        assert_eq!(engine.move_by_position(1, MoveDirection::Right).unwrap(), 2);
        assert_eq!(engine.visual_order(), ids(&[0, 2, 1]).as_slice());
    }

    #[test]
    fn test_n_moves_restore_order() {
        for n in 2..=6u8 {
            for start in 0..n as usize {
                for direction in [MoveDirection::Right, MoveDirection::Left] {
                    let mut engine = engine_with(n);
                    let original = engine.visual_order().to_vec();
                    let mut position = start;
                    for _ in 0..n {
                        position = engine.move_by_position(position, direction).unwrap();
                    }
                    assert_eq!(position, start);
                    assert_eq!(engine.visual_order(), original.as_slice(), "n={n} p={start}");
                }
            }
        }
    }

    #[test]
    fn test_move_rejects_bad_position() {
        let mut engine = engine_with(2);
        assert!(engine.move_by_position(2, MoveDirection::Left).is_err());

        let mut single = engine_with(1);
        assert_eq!(single.move_by_position(0, MoveDirection::Right).unwrap(), 0);
    }

    #[test]
    fn test_swap_changes_positions_only() {
        let mut engine = engine_with(3);
        engine.set_arrangement("3-top1").unwrap();
        engine.swap(id(0), id(2)).unwrap();

        let topology = engine.topology();
        assert_eq!(topology.placements[0].session_id, id(2));
        assert_eq!(topology.placements[1].session_id, id(1));
        assert_eq!(topology.placements[2].session_id, id(0));

        assert!(engine.swap(id(0), id(4)).unwrap_err().is_stale());
    }

    #[test]
    fn test_sync_appends_and_drops() {
        let mut engine = engine_with(3);
        engine.swap(id(0), id(2)).unwrap();
        engine.sync(&ids(&[0, 1]));
        assert_eq!(engine.visual_order(), ids(&[1, 0]).as_slice());

        engine.sync(&ids(&[0, 1, 2]));
        assert_eq!(engine.visual_order(), ids(&[1, 0, 2]).as_slice());
    }

    #[test]
    fn test_tabbed_topology_shows_active_tab() {
        let mut engine = engine_with(3);
        engine.set_mode(LayoutMode::Tabbed, Some(id(1)));
        assert_eq!(engine.active_tab(), Some(id(1)));

        let topology = engine.topology();
        assert_eq!(topology.visible_ids(), vec![id(1)]);
        assert_eq!(topology.placements[0].region, Region::FULL);
        assert!(topology.handles.is_empty());

        engine.select_tab(id(2)).unwrap();
        assert_eq!(engine.topology().visible_ids(), vec![id(2)]);
    }

    #[test]
    fn test_closing_active_tab_picks_lowest() {
        let mut engine = engine_with(4);
        engine.set_mode(LayoutMode::Tabbed, Some(id(2)));
        engine.sync(&ids(&[1, 3]));
        assert_eq!(engine.active_tab(), Some(id(1)));

        engine.sync(&[]);
        assert_eq!(engine.active_tab(), None);
        assert_eq!(engine.topology(), Topology::empty());
    }

    #[test]
    fn test_tab_always_valid_after_random_removals() {
        let mut engine = engine_with(6);
        engine.set_mode(LayoutMode::Tabbed, Some(id(5)));
        let mut alive: Vec<u8> = (0..6).collect();
        for victim in [5, 0, 3, 1, 4, 2] {
            alive.retain(|n| *n != victim);
            engine.sync(&ids(&alive));
            match engine.active_tab() {
                Some(tab) => assert!(alive.contains(&tab.index())),
                None => assert!(alive.is_empty()),
            }
        }
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "active tab"))]
    fn test_ensure_valid_heals() {
        let mut engine = engine_with(3);
        engine.force_active_tab(Some(id(5)));
        engine.ensure_valid();
        assert_eq!(engine.active_tab(), Some(id(0)));
    }
}
