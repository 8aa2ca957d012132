use std::fmt;

use serde::{Deserialize, Serialize};


pub const NUM_ROWS: u8 = 8;
pub const NUM_COLS: u8 = 8;


#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Row {
    idx: u8, // 0-based
}

impl Row {
    pub fn from_zero_based(idx: u8) -> Self {
        assert!(idx < NUM_ROWS);
        Self { idx }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        let idx = u8::try_from(u32::checked_sub(ch as u32, '1' as u32)?).ok()?;
        (idx < NUM_ROWS).then(|| Self { idx })
    }
    pub fn to_zero_based(self) -> u8 { self.idx }
    pub fn to_algebraic(self) -> char { (self.idx + b'1') as char }
    pub fn is_first(self) -> bool { self.idx == 0 }
    pub fn is_last(self) -> bool { self.idx == NUM_ROWS - 1 }
    pub fn all() -> impl Iterator<Item = Self> + Clone {
        (0..NUM_ROWS).map(|idx| Self { idx })
    }
}

#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Col {
    idx: u8, // 0-based
}

impl Col {
    pub fn from_zero_based(idx: u8) -> Self {
        assert!(idx < NUM_COLS);
        Self { idx }
    }
    pub fn from_algebraic(ch: char) -> Option<Self> {
        let idx = u8::try_from(u32::checked_sub(ch as u32, 'a' as u32)?).ok()?;
        (idx < NUM_COLS).then(|| Self { idx })
    }
    pub fn to_zero_based(self) -> u8 { self.idx }
    pub fn to_algebraic(self) -> char { (self.idx + b'a') as char }
    pub fn all() -> impl Iterator<Item = Self> + Clone {
        (0..NUM_COLS).map(|idx| Self { idx })
    }
}


#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Coord {
    pub row: Row,
    pub col: Col,
}

impl Coord {
    pub fn new(row: Row, col: Col) -> Self { Self { row, col } }

    pub fn from_algebraic(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let col = Col::from_algebraic(chars.next()?)?;
        let row = Row::from_algebraic(chars.next()?)?;
        chars.next().is_none().then(|| Coord { row, col })
    }
    pub fn to_algebraic(self) -> String {
        format!("{}{}", self.col.to_algebraic(), self.row.to_algebraic())
    }

    pub fn all() -> impl Iterator<Item = Coord> {
        Row::all().flat_map(|row| Col::all().map(move |col| Coord { row, col }))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col.to_algebraic(), self.row.to_algebraic())
    }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord({self})")
    }
}
