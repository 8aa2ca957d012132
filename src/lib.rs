#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod analysis_tree;
pub mod chess;
pub mod clock;
pub mod coord;
pub mod force;
pub mod game;
pub mod piece;
pub mod position;
pub mod replay;
pub mod rules;
pub mod util;
