use std::collections::BTreeSet;

use enum_map::{enum_map, EnumMap};
use serde::{Deserialize, Serialize};

use crate::chess::SingleBoard;
use crate::coord::Coord;
use crate::force::Force;
use crate::game::BughouseBoard;
use crate::piece::PieceKind;


pub type Reserve = EnumMap<PieceKind, u8>;

/// Immutable snapshot of a whole bughouse match position: both boards' FENs, droppable
/// reserves, promoted-square markers and the capture-material ledger. The two FENs carry
/// independent side-to-move fields; there is no shared global turn.
///
/// Snapshots are values: the rules engine consumes one and produces the next, and any
/// in-flight mutation happens on a private working copy that is discarded on failure.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BughousePositionSnapshot {
    pub fens: EnumMap<BughouseBoard, String>,
    pub reserves: EnumMap<BughouseBoard, EnumMap<Force, Reserve>>,
    // Occupied squares whose piece came from a pawn promotion. Capturing such a square
    // feeds a pawn, not the apparent piece, into the partner reserve.
    pub promoted: EnumMap<BughouseBoard, BTreeSet<Coord>>,
    pub capture_material: EnumMap<BughouseBoard, EnumMap<Force, i32>>,
}

impl BughousePositionSnapshot {
    pub fn initial() -> Self {
        let start_fen = SingleBoard::initial().to_fen();
        BughousePositionSnapshot {
            fens: enum_map! { _ => start_fen.clone() },
            reserves: enum_map! { _ => enum_map! { _ => enum_map! { _ => 0 } } },
            promoted: enum_map! { _ => BTreeSet::new() },
            capture_material: enum_map! { _ => enum_map! { _ => 0 } },
        }
    }

    // A snapshot's FENs are produced by the engine itself: failing to parse one back is a
    // bug in this crate, not a caller error.
    pub(crate) fn board(&self, board_idx: BughouseBoard) -> SingleBoard {
        SingleBoard::from_fen(&self.fens[board_idx]).expect("snapshot holds a valid FEN")
    }

    pub fn active_force(&self, board_idx: BughouseBoard) -> Force {
        self.board(board_idx).active_force()
    }

    pub fn piece_at(&self, board_idx: BughouseBoard, at: Coord) -> Option<(PieceKind, Force)> {
        self.board(board_idx).piece_at(at)
    }

    pub fn reserve(&self, board_idx: BughouseBoard, force: Force) -> &Reserve {
        &self.reserves[board_idx][force]
    }

    pub fn is_promoted(&self, board_idx: BughouseBoard, at: Coord) -> bool {
        self.promoted[board_idx].contains(&at)
    }

    pub fn capture_material(&self, board_idx: BughouseBoard, force: Force) -> i32 {
        self.capture_material[board_idx][force]
    }
}
