// Clock timeline simulator. Both boards run two clocks concurrently against one shared
// elapsed-time axis: the wall-clock delta between consecutive recorded half-moves is
// charged to the running side of board A *and* of board B, whichever board actually
// moved. Recorded timestamps come from external sources and are repaired, never
// rejected: regressions clamp to a zero delta and underflows clamp to zero, with both
// anomaly kinds counted in `TimelineMeta`.

use enum_map::{enum_map, EnumMap};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::force::Force;
use crate::game::BughouseBoard;


/// Elapsed game time or remaining clock time, in tenths of a second.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct DeciSeconds(pub u32);

impl DeciSeconds {
    pub const ZERO: Self = DeciSeconds(0);

    pub fn saturating_sub(self, other: Self) -> Self {
        DeciSeconds(self.0.saturating_sub(other.0))
    }
}

/// Remaining time per board per force at one instant.
pub type ClockSnapshot = EnumMap<BughouseBoard, EnumMap<Force, DeciSeconds>>;

/// One recorded half-move as the timeline sees it: which board moved and when,
/// as elapsed time since game start. The move itself is irrelevant here.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TimedMove {
    pub board_idx: BughouseBoard,
    pub timestamp: DeciSeconds,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct TimelineMeta {
    pub non_monotonic_move_timestamps: u32,
    pub clamped_to_zero_events: u32,
}

/// Derived, read-only clock history for one recorded move list. Rebuilt from scratch
/// whenever the authoritative move list changes; meaningful for live replay only while
/// the analysis mainline still matches the loaded game (see `replay`).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ClockTimeline {
    // timeline[0] is the starting clocks; timeline[i + 1] the state after move i.
    timeline: Vec<ClockSnapshot>,
    // Time the mover's own clock lost on move i. Not the global delta: the mover's clock
    // may already be at zero.
    move_durations: Vec<DeciSeconds>,
    // Repaired, non-decreasing elapsed timestamps, one per move.
    monotonic_timestamps: Vec<DeciSeconds>,
    // Side to move on each board before move i; index n is the final state.
    active_forces: Vec<EnumMap<BughouseBoard, Force>>,
    meta: TimelineMeta,
}

impl ClockTimeline {
    pub fn build(initial_time: DeciSeconds, moves: &[TimedMove]) -> Self {
        let mut timeline = vec![enum_map! { _ => enum_map! { _ => initial_time } }];
        let mut active_forces: Vec<EnumMap<BughouseBoard, Force>> =
            vec![enum_map! { _ => Force::White }];
        let mut move_durations = Vec::with_capacity(moves.len());
        let mut monotonic_timestamps = Vec::with_capacity(moves.len());
        let mut meta = TimelineMeta::default();

        let mut anchor = DeciSeconds::ZERO;
        for m in moves {
            let timestamp = if m.timestamp < anchor {
                meta.non_monotonic_move_timestamps += 1;
                anchor
            } else {
                m.timestamp
            };
            let delta = DeciSeconds(timestamp.0 - anchor.0);
            anchor = timestamp;
            monotonic_timestamps.push(timestamp);

            let mut clocks = *timeline.last().unwrap();
            let sides = *active_forces.last().unwrap();
            let mover_before = clocks[m.board_idx][sides[m.board_idx]];
            for board_idx in BughouseBoard::iter() {
                let cell = &mut clocks[board_idx][sides[board_idx]];
                if *cell < delta {
                    meta.clamped_to_zero_events += 1;
                    *cell = DeciSeconds::ZERO;
                } else {
                    *cell = cell.saturating_sub(delta);
                }
            }
            move_durations.push(mover_before.saturating_sub(clocks[m.board_idx][sides[m.board_idx]]));

            let mut next_sides = sides;
            next_sides[m.board_idx] = sides[m.board_idx].opponent();
            timeline.push(clocks);
            active_forces.push(next_sides);
        }

        ClockTimeline { timeline, move_durations, monotonic_timestamps, active_forces, meta }
    }

    /// `timeline()[0]` is the starting clocks; `timeline()[i + 1]` the state after move `i`.
    pub fn timeline(&self) -> &[ClockSnapshot] { &self.timeline }
    pub fn move_durations(&self) -> &[DeciSeconds] { &self.move_durations }
    pub fn monotonic_timestamps(&self) -> &[DeciSeconds] { &self.monotonic_timestamps }
    pub fn meta(&self) -> TimelineMeta { self.meta }

    /// Clocks at an arbitrary elapsed time, for continuous rendering between discrete
    /// move events. Binary search over the repaired timestamps, then the residual time is
    /// charged to both boards' running sides exactly like a move delta. O(log n).
    pub fn clocks_at(&self, elapsed: DeciSeconds) -> ClockSnapshot {
        let idx = self.monotonic_timestamps.partition_point(|&t| t <= elapsed);
        let mut clocks = self.timeline[idx];
        let sides = self.active_forces[idx];
        let last_timestamp =
            if idx == 0 { DeciSeconds::ZERO } else { self.monotonic_timestamps[idx - 1] };
        let residual = elapsed.saturating_sub(last_timestamp);
        for board_idx in BughouseBoard::iter() {
            let cell = &mut clocks[board_idx][sides[board_idx]];
            *cell = cell.saturating_sub(residual);
        }
        clocks
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use BughouseBoard::{A, B};

    fn mv(board_idx: BughouseBoard, timestamp: u32) -> TimedMove {
        TimedMove { board_idx, timestamp: DeciSeconds(timestamp) }
    }

    fn clocks(
        a_white: u32, a_black: u32, b_white: u32, b_black: u32,
    ) -> ClockSnapshot {
        enum_map! {
            A => enum_map! {
                Force::White => DeciSeconds(a_white),
                Force::Black => DeciSeconds(a_black),
            },
            B => enum_map! {
                Force::White => DeciSeconds(b_white),
                Force::Black => DeciSeconds(b_black),
            },
        }
    }

    #[test]
    fn shared_axis_charges_both_boards() {
        let timeline =
            ClockTimeline::build(DeciSeconds(600), &[mv(A, 50), mv(B, 80), mv(A, 100)]);
        assert_eq!(timeline.timeline(), &[
            clocks(600, 600, 600, 600),
            // 1. board A moved, but board B's white clock was running too.
            clocks(550, 600, 550, 600),
            clocks(550, 570, 520, 600),
            clocks(550, 550, 520, 580),
        ]);
        // Each move is charged to the mover's own clock, not the global delta.
        assert_eq!(timeline.move_durations(), &[
            DeciSeconds(50),
            DeciSeconds(30),
            DeciSeconds(20),
        ]);
        assert_eq!(timeline.meta(), TimelineMeta::default());
    }

    #[test]
    fn timestamp_regression_clamps_to_previous_anchor() {
        let timeline = ClockTimeline::build(DeciSeconds(600), &[mv(A, 50), mv(B, 30)]);
        assert_eq!(timeline.monotonic_timestamps(), &[DeciSeconds(50), DeciSeconds(50)]);
        assert_eq!(timeline.meta().non_monotonic_move_timestamps, 1);
        // The regressed move consumed no time at all.
        assert_eq!(timeline.move_durations()[1], DeciSeconds::ZERO);
        assert_eq!(timeline.timeline()[2], timeline.timeline()[1]);
    }

    #[test]
    fn underflow_clamps_to_zero_and_is_counted() {
        let timeline = ClockTimeline::build(DeciSeconds(10), &[mv(A, 50)]);
        // Both boards' white clocks ran out of the 10 available deciseconds.
        assert_eq!(timeline.timeline()[1], clocks(0, 10, 0, 10));
        assert_eq!(timeline.meta().clamped_to_zero_events, 2);
        assert_eq!(timeline.move_durations(), &[DeciSeconds(10)]);
    }

    #[test]
    fn query_at_move_timestamp_matches_discrete_timeline() {
        let timeline =
            ClockTimeline::build(DeciSeconds(600), &[mv(A, 50), mv(B, 80), mv(A, 100)]);
        for (i, &t) in timeline.monotonic_timestamps().iter().enumerate() {
            assert_eq!(timeline.clocks_at(t), timeline.timeline()[i + 1]);
        }
    }

    #[test]
    fn query_between_moves_charges_running_sides_only() {
        let timeline =
            ClockTimeline::build(DeciSeconds(600), &[mv(A, 50), mv(B, 80), mv(A, 100)]);
        // After move 2 it is black to move on both boards; 10 deciseconds elapsed since.
        assert_eq!(timeline.clocks_at(DeciSeconds(90)), clocks(550, 560, 520, 590));
        // Before the first move both whites are running.
        assert_eq!(timeline.clocks_at(DeciSeconds(20)), clocks(580, 600, 580, 600));
        // Far past the last move: running sides flag-fall, the others keep their time.
        assert_eq!(timeline.clocks_at(DeciSeconds(100_000)), clocks(0, 550, 520, 0));
    }
}
