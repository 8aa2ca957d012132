// The bughouse rules engine: validates one attempted half-move against an immutable
// position snapshot and produces the canonical move record plus the next snapshot.
// Single-board legality is delegated to `chess`; this layer owns everything that makes
// bughouse bughouse: reserves and drops, the cross-board capture feed, promoted-piece
// reversion and the two-board game-over rule.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::chess::{NotationError, SingleBoard};
use crate::coord::Coord;
use crate::force::Force;
use crate::game::{BughouseBoard, BughouseEnvoy};
use crate::once_cell_regex;
use crate::piece::PieceKind;
use crate::position::BughousePositionSnapshot;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Turn {
    Move {
        from: Coord,
        to: Coord,
        promote_to: Option<PieceKind>,
    },
    Drop {
        piece_kind: PieceKind,
        to: Coord,
    },
}

/// Canonical record of one applied half-move, as stored in the analysis tree.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct BughouseHalfMove {
    pub envoy: BughouseEnvoy,
    pub turn: Turn,
    // Display string, already bughouse-annotated: check/mate suffix, `PIECE@square` drops.
    pub san: String,
    // Deterministic identity, e.g. "A:normal:e2-e4" or "B:drop:white:n@f7". Used to
    // recognize "the same move" when it is re-entered at the same tree cursor.
    pub key: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ApplyOptions {
    // Only for replaying recorded games: a move can be time-stamped at the instant the
    // partner board's checkmate occurred, before either player could know about it.
    pub bypass_checkmate_check: bool,
}

#[derive(Clone, PartialEq, Debug)]
pub struct TurnApplied {
    pub half_move: BughouseHalfMove,
    pub position: BughousePositionSnapshot,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ApplyOutcome {
    Applied(TurnApplied),
    // A pawn reached the last rank and no promotion piece was supplied. Contains the
    // legal promotion choices for this exact from/to pair (disambiguation can restrict
    // the set below the usual four).
    PromotionNeeded(Vec<PieceKind>),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TurnError {
    GameOver,
    WrongTurnOrder { force: Force },
    PieceMissing { from: Coord },
    IllegalMove { from: Option<Coord>, to: Option<Coord> },
    DropBlocked { to: Coord },
    DropPosition { to: Coord },
    DropPieceMissing { piece_kind: PieceKind, force: Force },
    UnprotectedKing { force: Force },
    AmbiguousNotation,
    InvalidNotation,
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::GameOver => write!(f, "the game is already over"),
            TurnError::WrongTurnOrder { force } => write!(f, "it is not {force}'s turn"),
            TurnError::PieceMissing { from } => write!(f, "no piece at {from}"),
            TurnError::IllegalMove { from: Some(from), to: Some(to) } => {
                write!(f, "illegal move: {from}-{to}")
            }
            TurnError::IllegalMove { .. } => write!(f, "illegal move"),
            TurnError::DropBlocked { to } => write!(f, "{to} is not empty"),
            TurnError::DropPosition { to } => {
                write!(f, "pawns cannot be dropped on {to}")
            }
            TurnError::DropPieceMissing { piece_kind, force } => {
                write!(f, "{force} has no {piece_kind:?} in reserve")
            }
            TurnError::UnprotectedKing { force } => {
                write!(f, "the drop leaves {force}'s king in check")
            }
            TurnError::AmbiguousNotation => write!(f, "ambiguous notation"),
            TurnError::InvalidNotation => write!(f, "unparseable notation"),
        }
    }
}


fn move_key(
    board_idx: BughouseBoard, from: Coord, to: Coord, promote_to: Option<PieceKind>,
) -> String {
    let promotion = match promote_to {
        Some(piece_kind) => format!("={}", piece_kind.to_full_algebraic()),
        None => String::new(),
    };
    format!("{board_idx}:normal:{from}-{to}{promotion}")
}

fn drop_key(board_idx: BughouseBoard, force: Force, piece_kind: PieceKind, to: Coord) -> String {
    format!(
        "{board_idx}:drop:{force}:{}@{to}",
        piece_kind.to_full_algebraic().to_ascii_lowercase()
    )
}


impl BughousePositionSnapshot {
    /// The bughouse game-over predicate: the whole match ends the instant *either* board
    /// reaches checkmate on that board, independent of the other board's state.
    pub fn checkmated_board(&self) -> Option<BughouseBoard> {
        BughouseBoard::iter().find(|&board_idx| self.board(board_idx).is_checkmate())
    }

    /// Validates and applies one half-move for the board's side to move. On success the
    /// snapshot itself is untouched; the outcome carries the next snapshot.
    pub fn apply_turn(
        &self, board_idx: BughouseBoard, turn: Turn, opts: &ApplyOptions,
    ) -> Result<ApplyOutcome, TurnError> {
        if !opts.bypass_checkmate_check && self.checkmated_board().is_some() {
            return Err(TurnError::GameOver);
        }
        let board = self.board(board_idx);
        match turn {
            Turn::Move { from, to, promote_to } => {
                self.apply_move(board_idx, &board, from, to, promote_to)
            }
            Turn::Drop { piece_kind, to } => self.apply_drop(board_idx, &board, piece_kind, to),
        }
    }

    /// Like `apply_turn`, but on behalf of a specific seat: rejects the attempt when it is
    /// not that envoy's turn on their board.
    pub fn apply_turn_by(
        &self, envoy: BughouseEnvoy, turn: Turn, opts: &ApplyOptions,
    ) -> Result<ApplyOutcome, TurnError> {
        if self.active_force(envoy.board_idx) != envoy.force {
            return Err(TurnError::WrongTurnOrder { force: envoy.force });
        }
        self.apply_turn(envoy.board_idx, turn, opts)
    }

    /// Notation-based entry point for bulk-loading recorded games: parses drop syntax
    /// directly and otherwise normalizes the SAN-ish string via the chess primitive
    /// before delegating to `apply_turn`.
    pub fn apply_notation(
        &self, board_idx: BughouseBoard, notation: &str, opts: &ApplyOptions,
    ) -> Result<ApplyOutcome, TurnError> {
        let notation = notation.trim();
        let drop_re = once_cell_regex!(r"^([PNBRQK])@([a-h][1-8])$");
        if let Some(cap) = drop_re.captures(notation) {
            let piece_kind = PieceKind::from_algebraic(cap.get(1).unwrap().as_str()).unwrap();
            let to = Coord::from_algebraic(cap.get(2).unwrap().as_str()).unwrap();
            return self.apply_turn(board_idx, Turn::Drop { piece_kind, to }, opts);
        }
        let (from, to, promote_to) =
            self.board(board_idx).resolve_san(notation).map_err(|e| match e {
                NotationError::Unparseable => TurnError::InvalidNotation,
                NotationError::Ambiguous => TurnError::AmbiguousNotation,
                NotationError::Illegal => TurnError::IllegalMove { from: None, to: None },
            })?;
        self.apply_turn(board_idx, Turn::Move { from, to, promote_to }, opts)
    }

    fn apply_move(
        &self, board_idx: BughouseBoard, board: &SingleBoard, from: Coord, to: Coord,
        promote_to: Option<PieceKind>,
    ) -> Result<ApplyOutcome, TurnError> {
        let force = board.active_force();
        let Some((_, piece_force)) = board.piece_at(from) else {
            return Err(TurnError::PieceMissing { from });
        };
        if piece_force != force {
            return Err(TurnError::WrongTurnOrder { force: piece_force });
        }

        let candidates = board.candidate_promotions(from, to);
        if candidates.is_empty() {
            return Err(TurnError::IllegalMove { from: Some(from), to: Some(to) });
        }
        let promote_to = match promote_to {
            Some(piece_kind) => {
                if !candidates.contains(&Some(piece_kind)) {
                    return Err(TurnError::IllegalMove { from: Some(from), to: Some(to) });
                }
                Some(piece_kind)
            }
            None => {
                if candidates.iter().all(|p| p.is_some()) {
                    let mut options: Vec<PieceKind> = candidates.into_iter().flatten().collect();
                    options.sort();
                    options.dedup();
                    return Ok(ApplyOutcome::PromotionNeeded(options));
                }
                None
            }
        };

        let applied = board
            .apply_move(from, to, promote_to)
            .expect("move vetted against candidate list must apply");

        let mut next = self.clone();
        next.fens[board_idx] = applied.next.to_fen();

        let promoted = &mut next.promoted[board_idx];
        let mover_was_promoted = promoted.remove(&from);
        let fed_kind = applied.capture.map(|capture| {
            // Promoted-piece-reverts-to-pawn: the partner reserve receives the true type.
            if promoted.remove(&capture.at) {
                PieceKind::Pawn
            } else {
                capture.piece_kind
            }
        });
        if applied.promoted_to.is_some() || mover_was_promoted {
            promoted.insert(to);
        }

        if let Some(piece_kind) = fed_kind {
            // The captured piece goes to the capturer's diagonal teammate, who plays the
            // captured piece's color on the other board and drops it as their own.
            next.reserves[board_idx.other()][force.opponent()][piece_kind] += 1;
            let value = piece_kind.point_value();
            next.capture_material[board_idx][force] += value;
            next.capture_material[board_idx][force.opponent()] -= value;
        }

        let half_move = BughouseHalfMove {
            envoy: BughouseEnvoy::new(board_idx, force),
            turn: Turn::Move { from, to, promote_to },
            san: applied.san,
            key: move_key(board_idx, from, to, promote_to),
        };
        Ok(ApplyOutcome::Applied(TurnApplied { half_move, position: next }))
    }

    fn apply_drop(
        &self, board_idx: BughouseBoard, board: &SingleBoard, piece_kind: PieceKind, to: Coord,
    ) -> Result<ApplyOutcome, TurnError> {
        let force = board.active_force();
        if board.piece_at(to).is_some() {
            return Err(TurnError::DropBlocked { to });
        }
        if piece_kind == PieceKind::Pawn && (to.row.is_first() || to.row.is_last()) {
            return Err(TurnError::DropPosition { to });
        }
        if self.reserves[board_idx][force][piece_kind] < 1 {
            return Err(TurnError::DropPieceMissing { piece_kind, force });
        }
        let next_board = board
            .drop_piece(piece_kind, to)
            .ok_or(TurnError::UnprotectedKing { force })?;

        let mut next = self.clone();
        next.fens[board_idx] = next_board.to_fen();
        let reserve_left = &mut next.reserves[board_idx][force][piece_kind];
        assert!(*reserve_left > 0);
        *reserve_left -= 1;
        // A dropped piece is never "promoted", whatever stood here before.
        next.promoted[board_idx].remove(&to);

        let san = format!(
            "{}@{}{}",
            piece_kind.to_full_algebraic(),
            to,
            next_board.check_suffix()
        );
        let half_move = BughouseHalfMove {
            envoy: BughouseEnvoy::new(board_idx, force),
            turn: Turn::Drop { piece_kind, to },
            san,
            key: drop_key(board_idx, force, piece_kind, to),
        };
        Ok(ApplyOutcome::Applied(TurnApplied { half_move, position: next }))
    }
}
