// Adapter over `shakmaty`: the single-board chess primitive the bughouse layer builds on.
// Everything crossing this boundary is expressed in crate types (`Coord`, `PieceKind`,
// `Force`) and FEN strings; no other module sees `shakmaty` types.

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanError, SanPlus};
use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, FromSetup, Move, Piece, Position, Role, Square,
};

use crate::coord::{Col, Coord, Row};
use crate::force::Force;
use crate::piece::PieceKind;


fn to_square(coord: Coord) -> Square {
    Square::new(u32::from(coord.row.to_zero_based()) * 8 + u32::from(coord.col.to_zero_based()))
}
fn from_square(sq: Square) -> Coord {
    Coord::new(
        Row::from_zero_based(u32::from(sq.rank()) as u8),
        Col::from_zero_based(u32::from(sq.file()) as u8),
    )
}

fn to_role(piece_kind: PieceKind) -> Role {
    match piece_kind {
        PieceKind::Pawn => Role::Pawn,
        PieceKind::Knight => Role::Knight,
        PieceKind::Bishop => Role::Bishop,
        PieceKind::Rook => Role::Rook,
        PieceKind::Queen => Role::Queen,
        PieceKind::King => Role::King,
    }
}
fn from_role(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

fn to_color(force: Force) -> Color {
    match force {
        Force::White => Color::White,
        Force::Black => Color::Black,
    }
}
fn from_color(color: Color) -> Force {
    match color {
        Color::White => Force::White,
        Color::Black => Force::Black,
    }
}

// Square the capture actually removed a piece from. Differs from the destination
// only for en passant.
fn capture_square(m: &Move) -> Option<Square> {
    match *m {
        Move::Normal { capture: Some(_), to, .. } => Some(to),
        Move::EnPassant { from, to } => Some(Square::from_coords(to.file(), from.rank())),
        _ => None,
    }
}


#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InvalidFen(pub String);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotationError {
    Unparseable,
    Ambiguous,
    Illegal,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CapturedPiece {
    pub piece_kind: PieceKind,
    pub at: Coord,
}

#[derive(Clone, Debug)]
pub struct AppliedMove {
    pub san: String, // with "+"/"#" suffix
    pub capture: Option<CapturedPiece>,
    pub promoted_to: Option<PieceKind>,
    pub next: SingleBoard,
}


/// One chess board: a parsed position with side to move, castling rights and
/// en-passant state, as encoded by its FEN.
#[derive(Clone, PartialEq, Debug)]
pub struct SingleBoard {
    pos: Chess,
}

impl SingleBoard {
    pub fn initial() -> Self {
        SingleBoard { pos: Chess::default() }
    }

    pub fn from_fen(fen: &str) -> Result<Self, InvalidFen> {
        let fen: Fen = fen.parse().map_err(|e| InvalidFen(format!("{e:?}")))?;
        let pos = fen
            .into_position::<Chess>(CastlingMode::Standard)
            .or_else(|e| e.ignore_impossible_check())
            // Drops accumulate material beyond a standard chess set (a ninth pawn, a
            // third knight); such positions are perfectly valid here.
            .or_else(|e| e.ignore_too_much_material())
            .map_err(|e| InvalidFen(format!("{e:?}")))?;
        Ok(SingleBoard { pos })
    }

    pub fn to_fen(&self) -> String {
        Fen(self.pos.clone().into_setup(EnPassantMode::Always)).to_string()
    }

    pub fn active_force(&self) -> Force { from_color(self.pos.turn()) }
    pub fn is_check(&self) -> bool { self.pos.is_check() }
    pub fn is_checkmate(&self) -> bool { self.pos.is_checkmate() }

    pub fn check_suffix(&self) -> &'static str {
        if self.pos.is_checkmate() {
            "#"
        } else if self.pos.is_check() {
            "+"
        } else {
            ""
        }
    }

    pub fn piece_at(&self, at: Coord) -> Option<(PieceKind, Force)> {
        self.pos
            .board()
            .piece_at(to_square(at))
            .map(|piece| (from_role(piece.role), from_color(piece.color)))
    }

    // Promotion choices among legal moves for this exact from/to pair. `None` entries are
    // non-promoting continuations. Empty when the move is illegal.
    pub fn candidate_promotions(&self, from: Coord, to: Coord) -> Vec<Option<PieceKind>> {
        let (from_sq, to_sq) = (to_square(from), to_square(to));
        self.pos
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(from_sq) && m.to() == to_sq)
            .map(|m| m.promotion().map(from_role))
            .collect()
    }

    /// Executes a normal move. Returns `None` iff no legal move matches the exact
    /// (from, to, promotion) triple; promotion selection is the caller's business
    /// (see `candidate_promotions`).
    pub fn apply_move(
        &self, from: Coord, to: Coord, promotion: Option<PieceKind>,
    ) -> Option<AppliedMove> {
        let (from_sq, to_sq) = (to_square(from), to_square(to));
        let promotion_role = promotion.map(to_role);
        let m = self
            .pos
            .legal_moves()
            .iter()
            .find(|m| {
                m.from() == Some(from_sq) && m.to() == to_sq && m.promotion() == promotion_role
            })?
            .clone();
        Some(self.apply_move_impl(&m))
    }

    fn apply_move_impl(&self, m: &Move) -> AppliedMove {
        let san_base = San::from_move(&self.pos, m).to_string();
        let capture = capture_square(m).map(|sq| {
            let piece = self.pos.board().piece_at(sq).unwrap();
            CapturedPiece { piece_kind: from_role(piece.role), at: from_square(sq) }
        });
        let mut next_pos = self.pos.clone();
        next_pos.play_unchecked(m);
        let next = SingleBoard { pos: next_pos };
        AppliedMove {
            san: format!("{}{}", san_base, next.check_suffix()),
            capture,
            promoted_to: m.promotion().map(from_role),
            next,
        }
    }

    /// Places a reserve piece for the active force, then passes the turn. The turn flip
    /// and en-passant reset are done manually: the underlying engine does not model drops
    /// as moves. Returns `None` if the drop leaves the dropping side's own king in check.
    /// The target square must be empty (checked by the caller).
    pub fn drop_piece(&self, piece_kind: PieceKind, to: Coord) -> Option<SingleBoard> {
        let force = self.active_force();
        let to_sq = to_square(to);
        debug_assert!(self.pos.board().piece_at(to_sq).is_none());

        // A freshly placed piece never opens a line against its own king, so the only
        // thing to verify is that an already-standing check is resolved.
        let mut board = self.pos.board().clone();
        board.set_piece_at(to_sq, Piece { color: to_color(force), role: to_role(piece_kind) });
        let king_sq = board.king_of(to_color(force)).unwrap();
        if board.attacks_to(king_sq, to_color(force.opponent()), board.occupied()).any() {
            return None;
        }

        let mut setup = self.pos.clone().into_setup(EnPassantMode::Always);
        setup.board = board;
        setup.turn = to_color(force.opponent());
        setup.ep_square = None;
        setup.halfmoves = if piece_kind == PieceKind::Pawn { 0 } else { setup.halfmoves + 1 };
        if force == Force::Black {
            setup.fullmoves = setup.fullmoves.saturating_add(1);
        }
        let pos = Chess::from_setup(setup, CastlingMode::Standard)
            .or_else(|e| e.ignore_invalid_ep_square())
            .or_else(|e| e.ignore_impossible_check())
            .or_else(|e| e.ignore_too_much_material())
            .expect("position after a validated drop must be legal");
        Some(SingleBoard { pos })
    }

    /// Normalizes a SAN-ish string (optionally source-square-qualified, with or without
    /// capture/check marks) into a structured (from, to, promotion) triple. A pawn push
    /// to the last rank without a promotion piece resolves with `promotion: None`, so the
    /// structured entry point can answer with the legal promotion set.
    pub fn resolve_san(&self, notation: &str) -> Result<(Coord, Coord, Option<PieceKind>), NotationError> {
        let san_plus: SanPlus = notation.parse().map_err(|_| NotationError::Unparseable)?;
        match san_plus.san.to_move(&self.pos) {
            Ok(m) => {
                let from = m.from().ok_or(NotationError::Unparseable)?;
                Ok((from_square(from), from_square(m.to()), m.promotion().map(from_role)))
            }
            Err(SanError::AmbiguousSan) => Err(NotationError::Ambiguous),
            Err(SanError::IllegalSan) => self.resolve_unpromoted_push(&san_plus.san),
        }
    }

    // "e8" with no "=Q": not a legal move per se, but a valid way to enter a promotion
    // before choosing the piece.
    fn resolve_unpromoted_push(
        &self, san: &San,
    ) -> Result<(Coord, Coord, Option<PieceKind>), NotationError> {
        let San::Normal { role: Role::Pawn, file, rank, to, promotion: None, .. } = *san else {
            return Err(NotationError::Illegal);
        };
        let to_coord = from_square(to);
        if !to_coord.row.is_first() && !to_coord.row.is_last() {
            return Err(NotationError::Illegal);
        }
        let mut from_candidates: Vec<Square> = self
            .pos
            .legal_moves()
            .iter()
            .filter(|m| {
                m.role() == Role::Pawn
                    && m.to() == to
                    && m.from().is_some()
                    // Pawn SAN without a file qualifier is a straight push.
                    && m.from().unwrap().file() == file.unwrap_or(to.file())
                    && rank.map_or(true, |r| m.from().unwrap().rank() == r)
            })
            .filter_map(|m| m.from())
            .collect();
        from_candidates.dedup();
        match from_candidates[..] {
            [from] => Ok((from_square(from), to_coord, None)),
            [] => Err(NotationError::Illegal),
            _ => Err(NotationError::Ambiguous),
        }
    }
}
