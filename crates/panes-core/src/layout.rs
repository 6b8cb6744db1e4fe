//! Layout value types and the pure topology computation.
//!
//! A topology is a function of the ordered session ids and the chosen
//! arrangement. Regions are expressed in percent of the container so the
//! same result can drive any renderer.

use crate::{DomainError, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Mode
// ============================================================================

/// How sessions share the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Every session visible in split panes.
    #[default]
    Grid,
    /// One session visible at a time, chosen by the active tab.
    Tabbed,
}

impl LayoutMode {
    #[must_use]
    pub fn toggled(&self) -> LayoutMode {
        match self {
            Self::Grid => Self::Tabbed,
            Self::Tabbed => Self::Grid,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Tabbed => "tabbed",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(Self::Grid),
            "tabbed" | "tabs" => Ok(Self::Tabbed),
            other => Err(DomainError::invalid("layout mode", other, "grid|tabbed")),
        }
    }
}

/// Direction of a position-based move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Left,
    Right,
}

// ============================================================================
// Arrangement
// ============================================================================

/// Named grid topology.
///
/// Two- and three-session arrangements are user-selectable; the others are
/// the only option for their session count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arrangement {
    /// One pane filling the container.
    #[serde(rename = "single")]
    Single,
    /// Two panes side by side.
    #[serde(rename = "horizontal")]
    Horizontal,
    /// Two panes stacked.
    #[serde(rename = "vertical")]
    Vertical,
    /// One pane on top, two below.
    #[serde(rename = "3-top1")]
    ThreeTop1,
    /// Two panes on top, one below.
    #[serde(rename = "3-top2")]
    ThreeTop2,
    /// Two panes stacked on the left, one on the right.
    #[serde(rename = "3-left2")]
    ThreeLeft2,
    /// One pane on the left, two stacked on the right.
    #[serde(rename = "3-right2")]
    ThreeRight2,
    /// Two independently resizable rows of two.
    #[serde(rename = "2x2")]
    Quad,
    /// Two row bands of uniform columns.
    #[serde(rename = "rows")]
    Rows,
}

impl Arrangement {
    /// Selectable two-session arrangements.
    pub const TWO_WAY: [Arrangement; 2] = [Arrangement::Horizontal, Arrangement::Vertical];

    /// Selectable three-session arrangements.
    pub const THREE_WAY: [Arrangement; 4] = [
        Arrangement::ThreeTop1,
        Arrangement::ThreeTop2,
        Arrangement::ThreeLeft2,
        Arrangement::ThreeRight2,
    ];

    const ALL: [Arrangement; 9] = [
        Arrangement::Single,
        Arrangement::Horizontal,
        Arrangement::Vertical,
        Arrangement::ThreeTop1,
        Arrangement::ThreeTop2,
        Arrangement::ThreeLeft2,
        Arrangement::ThreeRight2,
        Arrangement::Quad,
        Arrangement::Rows,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::ThreeTop1 => "3-top1",
            Self::ThreeTop2 => "3-top2",
            Self::ThreeLeft2 => "3-left2",
            Self::ThreeRight2 => "3-right2",
            Self::Quad => "2x2",
            Self::Rows => "rows",
        }
    }

    /// Returns true if this arrangement can lay out `count` sessions.
    #[must_use]
    pub fn fits(&self, count: usize) -> bool {
        match self {
            Self::Single => count <= 1,
            Self::Horizontal | Self::Vertical => count == 2,
            Self::ThreeTop1 | Self::ThreeTop2 | Self::ThreeLeft2 | Self::ThreeRight2 => count == 3,
            Self::Quad => count == 4,
            Self::Rows => count >= 5,
        }
    }

    /// Arrangement used for `count` sessions when nothing was chosen.
    #[must_use]
    pub fn default_for(count: usize) -> Arrangement {
        match count {
            0 | 1 => Self::Single,
            2 => Self::Horizontal,
            3 => Self::ThreeTop1,
            4 => Self::Quad,
            _ => Self::Rows,
        }
    }

    /// Returns true for arrangements the user can pick between.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        Self::TWO_WAY.contains(self) || Self::THREE_WAY.contains(self)
    }

    /// Next selectable variant for the same session count, wrapping around.
    #[must_use]
    pub fn next_variant(&self) -> Arrangement {
        let group: &[Arrangement] = if Self::TWO_WAY.contains(self) {
            &Self::TWO_WAY
        } else if Self::THREE_WAY.contains(self) {
            &Self::THREE_WAY
        } else {
            return *self;
        };
        let pos = group.iter().position(|a| a == self).unwrap_or(0);
        group
            .get((pos + 1) % group.len())
            .copied()
            .unwrap_or(*self)
    }

    /// Splitters present in this arrangement.
    #[must_use]
    pub fn handles(&self) -> &'static [SplitHandle] {
        match self {
            Self::Single => &[],
            Self::Horizontal | Self::Vertical | Self::Rows => &[SplitHandle::Main],
            Self::ThreeTop1 => &[SplitHandle::Main, SplitHandle::Bottom],
            Self::ThreeTop2 => &[SplitHandle::Main, SplitHandle::Top],
            Self::ThreeLeft2 => &[SplitHandle::Main, SplitHandle::Left],
            Self::ThreeRight2 => &[SplitHandle::Main, SplitHandle::Right],
            Self::Quad => &[SplitHandle::Main, SplitHandle::Top, SplitHandle::Bottom],
        }
    }
}

impl fmt::Display for Arrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arrangement {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| {
                DomainError::invalid(
                    "arrangement",
                    s,
                    "horizontal|vertical|3-top1|3-top2|3-left2|3-right2|2x2|rows",
                )
            })
    }
}

// ============================================================================
// Splitters
// ============================================================================

/// A resizer element inside an arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitHandle {
    /// The outermost split of the arrangement.
    Main,
    /// Split inside the top row.
    Top,
    /// Split inside the bottom row.
    Bottom,
    /// Split inside the left column.
    Left,
    /// Split inside the right column.
    Right,
}

impl fmt::Display for SplitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(name)
    }
}

/// Direction a splitter divides its container in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAxis {
    /// Side-by-side regions; the ratio is the first column's width.
    Columns,
    /// Stacked regions; the ratio is the first row's height.
    Rows,
}

/// Share of a split given to its first region, in percent.
///
/// Always within [`SplitRatio::MIN`]..=[`SplitRatio::MAX`] so neither side
/// collapses to a zero-width pane.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct SplitRatio(f32);

impl SplitRatio {
    pub const MIN: f32 = 25.0;
    pub const MAX: f32 = 75.0;
    pub const DEFAULT: SplitRatio = SplitRatio(50.0);

    /// Creates a ratio, clamping into the allowed range.
    pub fn new(percent: f32) -> Self {
        if percent.is_nan() {
            return Self::DEFAULT;
        }
        Self(percent.clamp(Self::MIN, Self::MAX))
    }

    /// Percent given to the first region.
    #[must_use]
    pub fn first(&self) -> f32 {
        self.0
    }

    /// Percent given to the second region.
    #[must_use]
    pub fn second(&self) -> f32 {
        100.0 - self.0
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<f32> for SplitRatio {
    fn from(percent: f32) -> Self {
        Self::new(percent)
    }
}

impl From<SplitRatio> for f32 {
    fn from(ratio: SplitRatio) -> Self {
        ratio.0
    }
}

// ============================================================================
// Topology
// ============================================================================

/// Rectangle in percent of the container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    /// The whole container.
    pub const FULL: Region = Region {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };

    fn split(&self, axis: SplitAxis, ratio: SplitRatio) -> (Region, Region) {
        match axis {
            SplitAxis::Columns => {
                let first = self.width * ratio.first() / 100.0;
                (
                    Region { width: first, ..*self },
                    Region {
                        x: self.x + first,
                        width: self.width - first,
                        ..*self
                    },
                )
            }
            SplitAxis::Rows => {
                let first = self.height * ratio.first() / 100.0;
                (
                    Region { height: first, ..*self },
                    Region {
                        y: self.y + first,
                        height: self.height - first,
                        ..*self
                    },
                )
            }
        }
    }

    /// Splits into `count` equal columns.
    fn columns(&self, count: usize) -> Vec<Region> {
        let count = count.max(1);
        let width = self.width / count as f32;
        (0..count)
            .map(|i| Region {
                x: self.x + width * i as f32,
                width,
                ..*self
            })
            .collect()
    }
}

/// One session's slot in a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Position in the visual order.
    pub position: usize,
    pub session_id: SessionId,
    pub region: Region,
}

/// A resizer between regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeHandleSpec {
    pub handle: SplitHandle,
    pub axis: SplitAxis,
    pub ratio: SplitRatio,
    /// The region this splitter divides.
    pub bounds: Region,
}

/// Slots and resizers for one arrangement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub arrangement: Arrangement,
    pub placements: Vec<Placement>,
    pub handles: Vec<ResizeHandleSpec>,
}

impl Topology {
    /// An empty topology (no sessions).
    pub fn empty() -> Self {
        Self {
            arrangement: Arrangement::Single,
            placements: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// Placement of a session, if visible.
    pub fn placement_for(&self, id: SessionId) -> Option<&Placement> {
        self.placements.iter().find(|p| p.session_id == id)
    }

    /// Visible session ids in position order.
    pub fn visible_ids(&self) -> Vec<SessionId> {
        self.placements.iter().map(|p| p.session_id).collect()
    }
}

/// Serializable view of the layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub mode: LayoutMode,
    /// Ids in visual order.
    pub visual_order: Vec<SessionId>,
    /// Selected tab; only meaningful in tabbed mode.
    pub active_tab: Option<SessionId>,
    /// What is on screen right now. In tabbed mode this holds the active tab only.
    pub topology: Topology,
}

/// Computes the topology for `ordered` sessions.
///
/// Pure: depends only on the ids (in visual order), the arrangement, and the
/// ratio of each splitter. An arrangement that does not fit the session count
/// falls back to [`Arrangement::default_for`].
pub fn compute_topology(
    arrangement: Arrangement,
    ordered: &[SessionId],
    ratio_of: impl Fn(Arrangement, SplitHandle) -> SplitRatio,
) -> Topology {
    let count = ordered.len();
    if count == 0 {
        return Topology::empty();
    }

    let arrangement = if arrangement.fits(count) {
        arrangement
    } else {
        Arrangement::default_for(count)
    };

    let mut handles = Vec::new();
    let mut split = |handle: SplitHandle, axis: SplitAxis, bounds: Region| {
        let ratio = ratio_of(arrangement, handle);
        handles.push(ResizeHandleSpec {
            handle,
            axis,
            ratio,
            bounds,
        });
        bounds.split(axis, ratio)
    };

    let full = Region::FULL;
    let regions: Vec<Region> = match arrangement {
        Arrangement::Single => vec![full],
        Arrangement::Horizontal => {
            let (left, right) = split(SplitHandle::Main, SplitAxis::Columns, full);
            vec![left, right]
        }
        Arrangement::Vertical => {
            let (top, bottom) = split(SplitHandle::Main, SplitAxis::Rows, full);
            vec![top, bottom]
        }
        Arrangement::ThreeTop1 => {
            let (top, bottom) = split(SplitHandle::Main, SplitAxis::Rows, full);
            let (bl, br) = split(SplitHandle::Bottom, SplitAxis::Columns, bottom);
            vec![top, bl, br]
        }
        Arrangement::ThreeTop2 => {
            let (top, bottom) = split(SplitHandle::Main, SplitAxis::Rows, full);
            let (tl, tr) = split(SplitHandle::Top, SplitAxis::Columns, top);
            vec![tl, tr, bottom]
        }
        Arrangement::ThreeLeft2 => {
            let (left, right) = split(SplitHandle::Main, SplitAxis::Columns, full);
            let (lt, lb) = split(SplitHandle::Left, SplitAxis::Rows, left);
            vec![lt, lb, right]
        }
        Arrangement::ThreeRight2 => {
            let (left, right) = split(SplitHandle::Main, SplitAxis::Columns, full);
            let (rt, rb) = split(SplitHandle::Right, SplitAxis::Rows, right);
            vec![left, rt, rb]
        }
        Arrangement::Quad => {
            let (top, bottom) = split(SplitHandle::Main, SplitAxis::Rows, full);
            let (tl, tr) = split(SplitHandle::Top, SplitAxis::Columns, top);
            let (bl, br) = split(SplitHandle::Bottom, SplitAxis::Columns, bottom);
            vec![tl, tr, bl, br]
        }
        Arrangement::Rows => {
            let (top, bottom) = split(SplitHandle::Main, SplitAxis::Rows, full);
            let top_count = count.div_ceil(2);
            let mut regions = top.columns(top_count);
            regions.extend(bottom.columns(count - top_count));
            regions
        }
    };

    let placements = ordered
        .iter()
        .zip(regions)
        .enumerate()
        .map(|(position, (&session_id, region))| Placement {
            position,
            session_id,
            region,
        })
        .collect();

    Topology {
        arrangement,
        placements,
        handles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u8) -> Vec<SessionId> {
        (0..n).filter_map(SessionId::new).collect()
    }

    fn even(_: Arrangement, _: SplitHandle) -> SplitRatio {
        SplitRatio::DEFAULT
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_split_ratio_clamps() {
        assert_eq!(SplitRatio::new(10.0).first(), 25.0);
        assert_eq!(SplitRatio::new(10.0).second(), 75.0);
        assert_eq!(SplitRatio::new(90.0).first(), 75.0);
        assert_eq!(SplitRatio::new(40.0).first(), 40.0);
        assert_eq!(SplitRatio::new(f32::NAN), SplitRatio::DEFAULT);
    }

    #[test]
    fn test_split_ratio_deserialize_clamps() {
        let ratio: SplitRatio = serde_json::from_str("5.0").unwrap();
        assert_eq!(ratio.first(), 25.0);
    }

    #[test]
    fn test_arrangement_names_roundtrip() {
        for a in Arrangement::ALL {
            assert_eq!(a.name().parse::<Arrangement>().unwrap(), a);
            let json = serde_json::to_string(&a).unwrap();
            assert_eq!(json, format!("\"{}\"", a.name()));
        }
        assert!("diagonal".parse::<Arrangement>().is_err());
    }

    #[test]
    fn test_default_arrangement_fits() {
        for count in 0..=6 {
            assert!(Arrangement::default_for(count).fits(count), "count {count}");
        }
    }

    #[test]
    fn test_next_variant_cycles_within_group() {
        assert_eq!(Arrangement::Horizontal.next_variant(), Arrangement::Vertical);
        assert_eq!(Arrangement::Vertical.next_variant(), Arrangement::Horizontal);
        assert_eq!(Arrangement::ThreeRight2.next_variant(), Arrangement::ThreeTop1);
        assert_eq!(Arrangement::Quad.next_variant(), Arrangement::Quad);
    }

    #[test]
    fn test_empty_topology() {
        let topo = compute_topology(Arrangement::Horizontal, &[], even);
        assert!(topo.placements.is_empty());
        assert!(topo.handles.is_empty());
    }

    #[test]
    fn test_two_horizontal() {
        let topo = compute_topology(Arrangement::Horizontal, &ids(2), |_, _| SplitRatio::new(30.0));
        assert_eq!(topo.placements.len(), 2);
        assert_eq!(topo.handles.len(), 1);
        let left = topo.placements[0].region;
        let right = topo.placements[1].region;
        assert!(approx(left.width, 30.0));
        assert!(approx(right.x, 30.0));
        assert!(approx(right.width, 70.0));
        assert!(approx(left.height, 100.0));
    }

    #[test]
    fn test_two_vertical() {
        let topo = compute_topology(Arrangement::Vertical, &ids(2), even);
        let top = topo.placements[0].region;
        let bottom = topo.placements[1].region;
        assert!(approx(top.height, 50.0));
        assert!(approx(bottom.y, 50.0));
        assert_eq!(topo.handles[0].axis, SplitAxis::Rows);
    }

    #[test]
    fn test_three_top1_has_independent_resizers() {
        let topo = compute_topology(Arrangement::ThreeTop1, &ids(3), |_, h| match h {
            SplitHandle::Main => SplitRatio::new(60.0),
            _ => SplitRatio::new(30.0),
        });
        assert_eq!(topo.arrangement, Arrangement::ThreeTop1);
        let handles: Vec<SplitHandle> = topo.handles.iter().map(|h| h.handle).collect();
        assert_eq!(handles, vec![SplitHandle::Main, SplitHandle::Bottom]);

        let top = topo.placements[0].region;
        let bl = topo.placements[1].region;
        let br = topo.placements[2].region;
        assert!(approx(top.width, 100.0));
        assert!(approx(top.height, 60.0));
        assert!(approx(bl.y, 60.0));
        assert!(approx(bl.width, 30.0));
        assert!(approx(br.x, 30.0));
        assert!(approx(br.width, 70.0));
    }

    #[test]
    fn test_three_way_variants() {
        let right2 = compute_topology(Arrangement::ThreeRight2, &ids(3), even);
        assert!(approx(right2.placements[0].region.height, 100.0));
        assert!(approx(right2.placements[2].region.y, 50.0));

        let left2 = compute_topology(Arrangement::ThreeLeft2, &ids(3), even);
        assert!(approx(left2.placements[2].region.height, 100.0));
        assert!(approx(left2.placements[2].region.x, 50.0));

        let top2 = compute_topology(Arrangement::ThreeTop2, &ids(3), even);
        assert!(approx(top2.placements[2].region.width, 100.0));
    }

    #[test]
    fn test_quad_rows_resize_independently() {
        let topo = compute_topology(Arrangement::Quad, &ids(4), |_, h| match h {
            SplitHandle::Top => SplitRatio::new(30.0),
            SplitHandle::Bottom => SplitRatio::new(70.0),
            _ => SplitRatio::DEFAULT,
        });
        assert_eq!(topo.handles.len(), 3);
        assert!(approx(topo.placements[0].region.width, 30.0));
        assert!(approx(topo.placements[2].region.width, 70.0));
    }

    #[test]
    fn test_rows_for_five_and_six() {
        let five = compute_topology(Arrangement::Rows, &ids(5), even);
        assert_eq!(five.handles.len(), 1);
        let top_row = five.placements.iter().filter(|p| p.region.y < 1.0).count();
        assert_eq!(top_row, 3);

        let six = compute_topology(Arrangement::Rows, &ids(6), even);
        assert_eq!(six.placements.len(), 6);
        for p in &six.placements {
            assert!(approx(p.region.width, 100.0 / 3.0));
            assert!(approx(p.region.height, 50.0));
        }
    }

    #[test]
    fn test_mismatched_arrangement_falls_back() {
        let topo = compute_topology(Arrangement::Horizontal, &ids(3), even);
        assert_eq!(topo.arrangement, Arrangement::ThreeTop1);
    }

    #[test]
    fn test_placements_follow_given_order() {
        let order: Vec<SessionId> = [2, 0, 1].into_iter().filter_map(SessionId::new).collect();
        let topo = compute_topology(Arrangement::ThreeTop1, &order, even);
        assert_eq!(topo.visible_ids(), order);
        assert_eq!(topo.placement_for(order[0]).map(|p| p.position), Some(0));
    }
}
