/*
  Lodestone, a chess move-generation and evaluation core.
  Copyright (C) 2024 The Lodestone Authors.

  Lodestone is free software: you can redistribute it and/or modify
  it under the terms of the GNU General Public License as published by
  the Free Software Foundation, either version 3 of the License, or
  (at your option) any later version.

  Lodestone is distributed in the hope that it will be useful,
  but WITHOUT ANY WARRANTY; without even the implied warranty of
  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
  GNU General Public License for more details.

  You should have received a copy of the GNU General Public License
  along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

//! Incrementally updated neural network evaluation.
//!
//! The network is a two-layer quantized integer model. Its first layer,
//! the feature transformer, maps piece-square occupancy onto `HL_SIZE`
//! values per perspective; because a move touches at most four features
//! per perspective, that layer is kept up to date by column additions and
//! subtractions instead of being recomputed. A stack of accumulators makes
//! unwinding a search line a cursor decrement.
//!
//! The weights are an opaque, externally trained artifact embedded at
//! compile time; [`QA`], [`QB`], and [`EVAL_SCALE`] belong to it and must
//! match how it was quantized.

use once_cell::sync::Lazy;

use super::{eval::Score, Board, Color, Move, Piece, Square};

/// The width of one perspective's accumulator.
pub const HL_SIZE: usize = 64;

/// The number of boolean input features per perspective:
/// 2 colors x 6 piece kinds x 64 squares.
const FT_SIZE: usize = 768;

/// The clipping bound of the activation, and the scale of the feature
/// transformer's quantization.
pub const QA: i32 = 255;

/// The scale of the output layer's quantization.
pub const QB: i32 = 64;

/// The fixed-point scale recovering centipawn-like units after both
/// quantization stages.
pub const EVAL_SCALE: i32 = 400;

/// The number of accumulators kept; bounds the depth of a search line.
const STACK_SIZE: usize = 256;

/// The embedded network artifact.
static NETWORK: Lazy<Network> =
    Lazy::new(|| Network::from_bytes(include_bytes!("../nets/lodestone-001.bin")));

/// The quantized network weights: a feature transformer shared by both
/// perspectives and a single linear output head.
struct Network {
    /// Column `f` holds the accumulator delta of feature `f`.
    ft_weights: [[i16; HL_SIZE]; FT_SIZE],
    /// The accumulator value of an empty board.
    ft_bias: [i16; HL_SIZE],
    /// Output weights: the side-to-move half, then the other half.
    l1_weights: [i16; 2 * HL_SIZE],
    /// Output bias.
    l1_bias: i32,
}

impl Network {
    /// The size of the serialized artifact in bytes.
    const NUM_BYTES: usize = 2 * (FT_SIZE * HL_SIZE + HL_SIZE + 2 * HL_SIZE) + 4;

    /// Deserialize the little-endian artifact.
    ///
    /// # Panics
    ///
    /// Panics if the artifact is not exactly the expected length, which
    /// would mean the embedded file does not match these shape constants.
    fn from_bytes(data: &[u8]) -> Network {
        assert_eq!(data.len(), Network::NUM_BYTES, "network artifact has the wrong shape");
        let mut words = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]));
        let mut next = move || words.next().unwrap();

        let mut net = Network {
            ft_weights: [[0; HL_SIZE]; FT_SIZE],
            ft_bias: [0; HL_SIZE],
            l1_weights: [0; 2 * HL_SIZE],
            l1_bias: 0,
        };
        for column in &mut net.ft_weights {
            for weight in column {
                *weight = next();
            }
        }
        for bias in &mut net.ft_bias {
            *bias = next();
        }
        for weight in &mut net.l1_weights {
            *weight = next();
        }
        let tail = &data[Network::NUM_BYTES - 4..];
        net.l1_bias = i32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
        net
    }
}

/// Compute the feature index of a piece from one perspective. The encoding
/// matches the network's training convention: the first 384 features are
/// the perspective-owner's pieces, and White's perspective sees the board
/// flipped vertically.
#[inline(always)]
fn feature_index(perspective: Color, color: Color, kind: Piece, sq: Square) -> usize {
    let color_idx = usize::from(perspective != color);
    let sq_idx = match perspective {
        Color::White => sq.flipped() as usize,
        Color::Black => sq as usize,
    };
    (color_idx * Piece::NUM_TYPES + kind as usize) * 64 + sq_idx
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
/// One ply's feature-transformer outputs, for both perspectives.
struct Accumulator {
    /// The accumulated values, indexed by perspective color.
    vals: [[i16; HL_SIZE]; 2],
}

impl Accumulator {
    /// An accumulator for an empty board.
    fn fresh() -> Accumulator {
        Accumulator {
            vals: [NETWORK.ft_bias; 2],
        }
    }

    /// Add feature columns for a piece appearing on `sq`, for both
    /// perspectives.
    fn add(&mut self, color: Color, kind: Piece, sq: Square) {
        for perspective in Color::ALL {
            let column = &NETWORK.ft_weights[feature_index(perspective, color, kind, sq)];
            let vals = &mut self.vals[perspective as usize];
            for i in 0..HL_SIZE {
                vals[i] += column[i];
            }
        }
    }

    /// Subtract feature columns for a piece leaving `sq`, for both
    /// perspectives.
    fn remove(&mut self, color: Color, kind: Piece, sq: Square) {
        for perspective in Color::ALL {
            let column = &NETWORK.ft_weights[feature_index(perspective, color, kind, sq)];
            let vals = &mut self.vals[perspective as usize];
            for i in 0..HL_SIZE {
                vals[i] -= column[i];
            }
        }
    }
}

/// The incremental evaluation state of one search line: a stack of
/// accumulators, one per ply, plus a cursor. Each searcher owns its own
/// `EvalState`; the type is not meant to be shared.
pub struct EvalState {
    stack: Box<[Accumulator]>,
    current: usize,
}

impl EvalState {
    #[must_use]
    /// Create a state with nothing accumulated. Call [`EvalState::init`]
    /// before evaluating.
    pub fn new() -> EvalState {
        EvalState {
            stack: vec![Accumulator::fresh(); STACK_SIZE].into_boxed_slice(),
            current: 0,
        }
    }

    /// Reset the stack to depth zero and accumulate every piece of the
    /// given position.
    pub fn init(&mut self, board: &Board) {
        self.current = 0;
        self.stack[0] = Accumulator::fresh();
        for sq in board.occupancy() {
            // occupied squares always carry a color and a kind
            let color = board.color_at(sq).unwrap();
            let kind = board.piece_at(sq).unwrap();
            self.stack[0].add(color, kind, sq);
        }
    }

    /// Push one ply and apply a move's feature changes.
    ///
    /// `side_to_move` is the mover's color, `moved_piece` the kind that
    /// left the origin square, and `captured_piece` the kind taken on the
    /// target square for plain captures (`None` for everything else,
    /// including en passant, whose victim is implied).
    ///
    /// Castling moves must use the king-takes-own-rook encoding, with the
    /// rook's square as the move target.
    ///
    /// # Panics
    ///
    /// Panics if the stack is full (the search exceeded 255 plies) or if a
    /// capture provides no `captured_piece`.
    pub fn update(
        &mut self,
        m: Move,
        side_to_move: Color,
        moved_piece: Piece,
        captured_piece: Option<Piece>,
    ) {
        assert!(self.current + 1 < STACK_SIZE, "accumulator stack overflow");
        self.stack[self.current + 1] = self.stack[self.current];
        self.current += 1;
        let top = &mut self.stack[self.current];

        let origin = m.origin();
        let target = m.target();

        if m.is_castle() {
            // the move target is the rook; derive both destinations
            let rank = origin.rank();
            let (king_file, rook_file) = if target < origin { (2, 3) } else { (6, 5) };
            let king_target = Square::new(rank, king_file).unwrap();
            let rook_target = Square::new(rank, rook_file).unwrap();
            top.remove(side_to_move, Piece::King, origin);
            top.add(side_to_move, Piece::King, king_target);
            top.remove(side_to_move, Piece::Rook, target);
            top.add(side_to_move, Piece::Rook, rook_target);
            return;
        }

        if m.is_en_passant() {
            // the captured pawn sits behind the target square
            let victim_sq = Square::try_from(target as u8 ^ 8).unwrap();
            top.remove(side_to_move, Piece::Pawn, origin);
            top.add(side_to_move, Piece::Pawn, target);
            top.remove(!side_to_move, Piece::Pawn, victim_sq);
            return;
        }

        if let Some(promoted) = m.promotion_type() {
            top.remove(side_to_move, Piece::Pawn, origin);
            top.add(side_to_move, promoted, target);
        } else {
            top.remove(side_to_move, moved_piece, origin);
            top.add(side_to_move, moved_piece, target);
        }
        if m.is_capture() {
            let victim = captured_piece.expect("capture move with no captured piece kind");
            top.remove(!side_to_move, victim, target);
        }
    }

    /// Pop one ply, restoring the accumulators from before the matching
    /// [`EvalState::update`].
    ///
    /// # Panics
    ///
    /// Panics at depth zero: an unmatched `undo` is a driver bug.
    pub fn undo(&mut self) {
        assert!(self.current > 0, "undo with no matching update");
        self.current -= 1;
    }
}

impl Default for EvalState {
    fn default() -> EvalState {
        EvalState::new()
    }
}

#[inline(always)]
/// The clipped ReLU activation: clamp into `[0, QA]`.
fn crelu(x: i16) -> i32 {
    i32::from(x).clamp(0, QA)
}

#[must_use]
/// Evaluate the position from the side to move's point of view, in
/// centipawn-like units. `state` must have been initialized from `board`
/// and updated move for move since.
pub fn evaluate(board: &Board, state: &EvalState) -> Score {
    let acc = &state.stack[state.current];
    let us = &acc.vals[board.player as usize];
    let them = &acc.vals[!board.player as usize];

    let mut out = NETWORK.l1_bias;
    for i in 0..HL_SIZE {
        out += crelu(us[i]) * i32::from(NETWORK.l1_weights[i]);
    }
    for i in 0..HL_SIZE {
        out += crelu(them[i]) * i32::from(NETWORK.l1_weights[HL_SIZE + i]);
    }

    out * EVAL_SCALE / QB / QA
}
