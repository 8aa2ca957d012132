// Ingestion of recorded games: replays a timestamped move list through the rules engine
// into a fresh analysis tree, builds the clock timeline, and owns the pristine-mainline
// predicate that decides whether live clock replay is still authoritative.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis_tree::AnalysisTree;
use crate::clock::{ClockTimeline, DeciSeconds, TimedMove};
use crate::force::Force;
use crate::game::BughouseBoard;
use crate::once_cell_regex;
use crate::position::BughousePositionSnapshot;
use crate::rules::{ApplyOptions, ApplyOutcome, TurnError};


/// One half-move as an ingestion adapter delivers it: seat, SAN-ish string and
/// elapsed-time-since-game-start timestamp.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RecordedMove {
    pub board_idx: BughouseBoard,
    pub force: Force,
    pub notation: String,
    pub timestamp: DeciSeconds,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RecordedGame {
    pub initial_time: DeciSeconds,
    pub moves: Vec<RecordedMove>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum LoadError {
    BadMove { move_idx: usize, error: TurnError },
    // The recorded notation was a bare pawn push to the last rank with no "=" piece.
    MissingPromotion { move_idx: usize },
    BadGameLog { token: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::BadMove { move_idx, error } => {
                write!(f, "move {move_idx}: {error}")
            }
            LoadError::MissingPromotion { move_idx } => {
                write!(f, "move {move_idx}: promotion piece not recorded")
            }
            LoadError::BadGameLog { token } => write!(f, "bad game log token: {token:?}"),
        }
    }
}

/// A fully ingested game: the original record, the analysis tree whose mainline is the
/// recorded move list, and the derived clock timeline.
#[derive(Clone, Debug)]
pub struct LoadedGame {
    pub recorded: RecordedGame,
    pub tree: AnalysisTree,
    pub timeline: ClockTimeline,
}

/// Replays `recorded` from the initial position. Checkmate checks are bypassed during
/// replay: a recorded move can be time-stamped at the instant the partner board's mate
/// occurred. Each move's seat is still verified against the side to move on its board.
pub fn load_recorded_game(recorded: RecordedGame) -> Result<LoadedGame, LoadError> {
    let opts = ApplyOptions { bypass_checkmate_check: true };
    let mut tree = AnalysisTree::new(BughousePositionSnapshot::initial());
    let mut cursor = tree.root();
    for (move_idx, m) in recorded.moves.iter().enumerate() {
        let position = &tree.get(cursor).unwrap().position;
        if position.active_force(m.board_idx) != m.force {
            return Err(LoadError::BadMove {
                move_idx,
                error: TurnError::WrongTurnOrder { force: m.force },
            });
        }
        match position.apply_notation(m.board_idx, &m.notation, &opts) {
            Ok(ApplyOutcome::Applied(applied)) => {
                cursor = tree
                    .insert(cursor, applied.half_move, applied.position)
                    .expect("replay cursor is always a live node");
            }
            Ok(ApplyOutcome::PromotionNeeded(_)) => {
                return Err(LoadError::MissingPromotion { move_idx });
            }
            Err(error) => return Err(LoadError::BadMove { move_idx, error }),
        }
    }

    let timed: Vec<TimedMove> = recorded
        .moves
        .iter()
        .map(|m| TimedMove { board_idx: m.board_idx, timestamp: m.timestamp })
        .collect();
    let timeline = ClockTimeline::build(recorded.initial_time, &timed);
    let meta = timeline.meta();
    if meta != Default::default() {
        debug!(
            "clock timeline repaired: {} non-monotonic timestamps, {} zero clamps",
            meta.non_monotonic_move_timestamps, meta.clamped_to_zero_events
        );
    }
    Ok(LoadedGame { recorded, tree, timeline })
}

/// True while the tree's mainline still matches the recorded move list move-for-move
/// (board, side and SAN). Walks both in lockstep and fails on the first mismatch, on a
/// mainline that ends before the list does, and on a mainline that continues past it.
/// Re-check after every tree mutation that can touch the mainline.
pub fn is_pristine_mainline(tree: &AnalysisTree, moves: &[RecordedMove]) -> bool {
    let mut mainline = tree.mainline();
    mainline.next(); // the root carries no move
    let mut recorded = moves.iter();
    loop {
        match (mainline.next(), recorded.next()) {
            (None, None) => return true,
            (None, Some(_)) | (Some(_), None) => return false,
            (Some(node), Some(m)) => {
                let half_move = tree.get(node).unwrap().half_move.as_ref().unwrap();
                let envoy = half_move.envoy;
                let recorded_san = normalized_san(&m.notation);
                if envoy.board_idx != m.board_idx
                    || envoy.force != m.force
                    || normalized_san(&half_move.san) != recorded_san
                {
                    return false;
                }
            }
        }
    }
}

// Engine SAN is canonical ("Ngf3", suffixed); recorded SAN strings are close but may
// omit check marks. Compare modulo suffix.
fn normalized_san(san: &str) -> &str {
    san.trim_end_matches(['+', '#'])
}

impl LoadedGame {
    pub fn is_pristine_mainline(&self) -> bool {
        is_pristine_mainline(&self.tree, &self.recorded.moves)
    }
}

/// Parses a compact test-oriented game log: whitespace-separated tokens of the form
/// `<n><board>.<notation>[:<timestamp>]`, e.g. `1A.e4 1a.e5:12 2B.d4`. An uppercase
/// board letter means white moved, lowercase black. A missing timestamp reuses the
/// previous one (the move consumed no measurable time).
pub fn parse_game_log(log: &str, initial_time: DeciSeconds) -> Result<RecordedGame, LoadError> {
    let token_re = once_cell_regex!(r"^(\d+)([AaBb])\.([^:\s]+)(?::(\d+))?$");
    let mut moves = Vec::new();
    let mut last_timestamp = DeciSeconds::ZERO;
    for token in log.split_whitespace() {
        let cap = token_re
            .captures(token)
            .ok_or_else(|| LoadError::BadGameLog { token: token.to_owned() })?;
        let board_letter = cap.get(2).unwrap().as_str();
        let board_idx = match board_letter.to_ascii_uppercase().as_str() {
            "A" => BughouseBoard::A,
            _ => BughouseBoard::B,
        };
        let force = if board_letter.chars().next().unwrap().is_ascii_uppercase() {
            Force::White
        } else {
            Force::Black
        };
        if let Some(timestamp) = cap.get(4) {
            let value = timestamp
                .as_str()
                .parse()
                .map_err(|_| LoadError::BadGameLog { token: token.to_owned() })?;
            last_timestamp = DeciSeconds(value);
        }
        moves.push(RecordedMove {
            board_idx,
            force,
            notation: cap.get(3).unwrap().as_str().to_owned(),
            timestamp: last_timestamp,
        });
    }
    Ok(RecordedGame { initial_time, moves })
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_compact_game_log() {
        let game = parse_game_log("1A.e4:10 1a.e5:25 1B.d4 1b.P@e4", DeciSeconds(600)).unwrap();
        assert_eq!(game.initial_time, DeciSeconds(600));
        assert_eq!(game.moves.len(), 4);
        assert_eq!(game.moves[0], RecordedMove {
            board_idx: BughouseBoard::A,
            force: Force::White,
            notation: "e4".to_owned(),
            timestamp: DeciSeconds(10),
        });
        assert_eq!(game.moves[1].force, Force::Black);
        // Missing timestamps carry the previous anchor forward.
        assert_eq!(game.moves[2].timestamp, DeciSeconds(25));
        assert_eq!(game.moves[3], RecordedMove {
            board_idx: BughouseBoard::B,
            force: Force::Black,
            notation: "P@e4".to_owned(),
            timestamp: DeciSeconds(25),
        });
    }

    #[test]
    fn rejects_malformed_log_tokens() {
        assert_eq!(
            parse_game_log("1C.e4", DeciSeconds(600)),
            Err(LoadError::BadGameLog { token: "1C.e4".to_owned() })
        );
        assert!(matches!(
            parse_game_log("1A.e4 oops", DeciSeconds(600)),
            Err(LoadError::BadGameLog { .. })
        ));
    }
}
