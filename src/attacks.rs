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

//! Attack queries: precomputed leaper tables, magic-indexed slider
//! lookups, and the pawn-structure masks used by evaluation terms.
//!
//! All tables here are built once, on first use, and never mutated; they
//! may be read from any number of threads without synchronization.

use once_cell::sync::Lazy;

use super::{magic::AttacksTable, Bitboard, Color, Direction, Square};

/// The process-wide magic tables for rook and bishop attacks.
pub(crate) static MAGIC: Lazy<AttacksTable> = Lazy::new(AttacksTable::load);

/// The squares a pawn may legally stand on: everything but ranks 1 and 8.
const PAWN_RANKS: Bitboard = Bitboard::new(0x00FF_FFFF_FFFF_FF00);

/// The squares a king can step to from each square.
static KING_ATTACKS: Lazy<[Bitboard; 64]> =
    Lazy::new(|| step_attacks(&Direction::KING_STEPS, 1));

/// The squares a knight can jump to from each square.
static KNIGHT_ATTACKS: Lazy<[Bitboard; 64]> =
    Lazy::new(|| step_attacks(&Direction::KNIGHT_STEPS, 2));

/// The squares a pawn of each color attacks from each square.
static PAWN_ATTACKS: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    [
        pawn_attack_table(Color::White),
        pawn_attack_table(Color::Black),
    ]
});

/// For each color and square, the three-file span a pawn must clear of
/// enemy pawns to be passed.
static PASSED_PAWN_MASKS: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    [
        passed_pawn_table(Color::White),
        passed_pawn_table(Color::Black),
    ]
});

/// For each color and square, the 3x3 zone around a king used by safety
/// terms.
static KING_ZONE_MASKS: Lazy<[[Bitboard; 64]; 2]> = Lazy::new(|| {
    [king_zone_table(Color::White), king_zone_table(Color::Black)]
});

/// For each file, the neighboring files a pawn needs a friend on to not be
/// isolated.
static ISOLATED_PAWN_MASKS: Lazy<[Bitboard; 8]> = Lazy::new(|| {
    std::array::from_fn(|file| {
        let mut mask = Bitboard::EMPTY;
        if file > 0 {
            mask |= Bitboard::file(file - 1);
        }
        if file < 7 {
            mask |= Bitboard::file(file + 1);
        }
        mask & PAWN_RANKS
    })
});

/// The squares strictly between two squares which share a rank, file, or
/// diagonal; empty everywhere else.
static BETWEEN: Lazy<[[Bitboard; 64]; 64]> = Lazy::new(|| {
    let mut between = [[Bitboard::EMPTY; 64]; 64];

    for sq1 in Bitboard::ALL {
        for sq2 in Bitboard::ALL {
            if MAGIC.bishop_attacks(Bitboard::EMPTY, sq1).contains(sq2) {
                let bishop1 = MAGIC.bishop_attacks(Bitboard::from(sq2), sq1);
                let bishop2 = MAGIC.bishop_attacks(Bitboard::from(sq1), sq2);

                between[sq1 as usize][sq2 as usize] |= bishop1 & bishop2;
            }
            if MAGIC.rook_attacks(Bitboard::EMPTY, sq1).contains(sq2) {
                let rook1 = MAGIC.rook_attacks(Bitboard::from(sq2), sq1);
                let rook2 = MAGIC.rook_attacks(Bitboard::from(sq1), sq2);

                between[sq1 as usize][sq2 as usize] |= rook1 & rook2;
            }
        }
    }

    between
});

#[inline(always)]
#[must_use]
/// Get the squares a king on `sq` attacks.
pub fn king_attacks(sq: Square) -> Bitboard {
    KING_ATTACKS[sq as usize]
}

#[inline(always)]
#[must_use]
/// Get the squares a knight on `sq` attacks.
pub fn knight_attacks(sq: Square) -> Bitboard {
    KNIGHT_ATTACKS[sq as usize]
}

#[inline(always)]
#[must_use]
/// Get the squares a pawn of the given color on `sq` attacks.
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    PAWN_ATTACKS[color as usize][sq as usize]
}

#[inline(always)]
#[must_use]
/// Get the squares a rook on `sq` attacks when `blockers` is the set of
/// all pieces on the board. Occupied squares on its rays are included;
/// whether they are captures is the caller's concern.
pub fn rook_attacks(sq: Square, blockers: Bitboard) -> Bitboard {
    MAGIC.rook_attacks(blockers, sq)
}

#[inline(always)]
#[must_use]
/// Get the squares a bishop on `sq` attacks when `blockers` is the set of
/// all pieces on the board.
pub fn bishop_attacks(sq: Square, blockers: Bitboard) -> Bitboard {
    MAGIC.bishop_attacks(blockers, sq)
}

#[inline(always)]
#[must_use]
/// Get the squares a queen on `sq` attacks when `blockers` is the set of
/// all pieces on the board.
pub fn queen_attacks(sq: Square, blockers: Bitboard) -> Bitboard {
    rook_attacks(sq, blockers) | bishop_attacks(sq, blockers)
}

#[inline(always)]
#[must_use]
/// Get the span a pawn of `color` on `sq` must clear of enemy pawns to be
/// passed: its own file and both neighbors, from the rank ahead of it
/// through rank 7 (rank 2 for Black).
pub fn passed_pawn_mask(color: Color, sq: Square) -> Bitboard {
    PASSED_PAWN_MASKS[color as usize][sq as usize]
}

#[inline(always)]
#[must_use]
/// Get the 3x3 zone around a king of `color` on `sq`, including `sq`
/// itself.
pub fn king_zone_mask(color: Color, sq: Square) -> Bitboard {
    KING_ZONE_MASKS[color as usize][sq as usize]
}

#[inline(always)]
#[must_use]
/// Get the neighboring-file squares a pawn on `file` needs a friendly pawn
/// on to not be isolated.
pub fn isolated_pawn_mask(file: usize) -> Bitboard {
    ISOLATED_PAWN_MASKS[file & 7]
}

#[inline(always)]
#[must_use]
/// Get the squares strictly between two squares, along a rank, file, or
/// diagonal. Misaligned squares give the empty set.
pub fn between(sq1: Square, sq2: Square) -> Bitboard {
    BETWEEN[sq1 as usize][sq2 as usize]
}

/// Build a table of single-leap attacks: the union of `dirs` applied to
/// each square, keeping only steps that travel at most `max_dist` files
/// and ranks (which discards the jumps that would wrap around an edge).
fn step_attacks(dirs: &[Direction], max_dist: u8) -> [Bitboard; 64] {
    let mut attacks = [Bitboard::EMPTY; 64];
    #[allow(clippy::cast_possible_truncation)]
    for (i, item) in attacks.iter_mut().enumerate() {
        let sq = Square::try_from(i as u8).unwrap();
        for &dir in dirs {
            let target = sq + dir;
            if sq.chebyshev_to(target) <= max_dist {
                item.insert(target);
            }
        }
    }
    attacks
}

/// Build one color's pawn attack table from the forward-diagonal shifts.
#[allow(clippy::cast_possible_truncation)]
fn pawn_attack_table(color: Color) -> [Bitboard; 64] {
    std::array::from_fn(|i| {
        let bb = Bitboard::from(Square::try_from(i as u8).unwrap());
        bb.forward_left(color) | bb.forward_right(color)
    })
}

/// Build one color's passed-pawn masks by sweeping the three-file front
/// span forward and clipping it to the pawn-legal ranks.
#[allow(clippy::cast_possible_truncation)]
fn passed_pawn_table(color: Color) -> [Bitboard; 64] {
    std::array::from_fn(|i| {
        let bb = Bitboard::from(Square::try_from(i as u8).unwrap());
        let mut mask = Bitboard::EMPTY;
        let mut front = bb.forward(color);
        while !front.is_empty() {
            mask |= front | front.left(color) | front.right(color);
            front = front.forward(color);
        }
        mask & PAWN_RANKS
    })
}

/// Build one color's king-zone masks: the 3x3 neighborhood of each square
/// plus the square itself, composed from that color's relative shifts.
#[allow(clippy::cast_possible_truncation)]
fn king_zone_table(color: Color) -> [Bitboard; 64] {
    std::array::from_fn(|i| {
        let bb = Bitboard::from(Square::try_from(i as u8).unwrap());
        let row = bb | bb.left(color) | bb.right(color);
        row | row.forward(color) | row.backward(color)
    })
}
