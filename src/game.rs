use std::fmt;

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::force::Force;


#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize, Deserialize,
)]
pub enum BughouseBoard {
    A,
    B,
}

impl BughouseBoard {
    pub fn other(self) -> Self {
        match self {
            BughouseBoard::A => BughouseBoard::B,
            BughouseBoard::B => BughouseBoard::A,
        }
    }
}

impl fmt::Display for BughouseBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BughouseBoard::A => write!(f, "A"),
            BughouseBoard::B => write!(f, "B"),
        }
    }
}

// One seat at the match: a board and a force on it. Identifies the mover of a half-move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct BughouseEnvoy {
    pub board_idx: BughouseBoard,
    pub force: Force,
}

impl BughouseEnvoy {
    pub fn new(board_idx: BughouseBoard, force: Force) -> Self { Self { board_idx, force } }
}

impl fmt::Display for BughouseEnvoy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.board_idx, self.force)
    }
}
