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

//! Magic bitboards, the perfect-hash scheme behind rook and bishop attacks.
//!
//! For each square, the occupancy bits that can shorten a slider's rays are
//! gathered by a mask, hashed with one multiplication and one shift, and
//! used to index a per-square table of precomputed attack sets. The shipped
//! multipliers in [`SAVED_ROOK_MAGICS`] and [`SAVED_BISHOP_MAGICS`] make
//! startup cheap; [`AttacksTable::make`] can search for fresh ones instead.

use super::{Bitboard, Direction, Square};

/// The number of multiplier candidates to try per square before giving up.
/// In practice a working multiplier appears within a few thousand draws.
const NUM_MAGIC_TRIES: u64 = 10_000_000;

/// A saved list of magic multipliers for rooks, produced by the generator.
/// The entries for ranks 7 and 8 hash more occupancy bits than their table
/// index width and come from the Chess Programming Wiki.
pub const SAVED_ROOK_MAGICS: [u64; 64] = [
    0x4080_0020_4000_1480, // a1
    0x0040_0010_0140_2000, // b1
    0x0300_2000_1810_4100, // c1
    0x2100_0409_0110_0120, // d1
    0x8a00_0600_0408_2070, // e1
    0x0080_0144_0002_0080, // f1
    0x1100_2500_208a_0004, // g1
    0x0900_0042_2201_8100, // h1
    0x0208_8002_28c0_0081, // a2
    0x2280_4010_0340_2000, // b2
    0x0008_8010_0020_0184, // c2
    0x0001_0020_1000_0900, // d2
    0x0182_0006_0010_6008, // e2
    0x2058_8004_0080_0200, // f2
    0x0004_8002_0080_0900, // g2
    0x052d_0012_0040_a100, // h2
    0x0540_0880_0080_24c1, // a3
    0x2000_8480_4002_2000, // b3
    0x0400_4100_1100_6000, // c3
    0x0040_a100_3001_0108, // d3
    0x1204_8080_0800_0402, // e3
    0x0802_8080_0400_2201, // f3
    0x1002_8080_5200_0500, // g3
    0x0004_0a00_2112_4184, // h3
    0x0640_0128_8008_8040, // a4
    0x8410_4000_8020_008a, // b4
    0x0400_2008_8010_0080, // c4
    0x2001_0121_0009_1004, // d4
    0x1200_0d01_0008_0010, // e4
    0x6004_0004_0120_1008, // f4
    0x7500_aa04_0008_4110, // g4
    0x0100_0052_0004_0981, // h4
    0x0040_8040_0280_0020, // a5
    0x0470_0020_0640_0240, // b5
    0x0001_2000_8080_1000, // c5
    0x0000_0812_0200_2040, // d5
    0x00c0_8044_0080_0800, // e5
    0x9000_800a_0080_0400, // f5
    0x0001_0004_0100_0600, // g5
    0x0042_1088_ca00_2401, // h5
    0x0000_c000_228d_8000, // a6
    0x6410_0420_1440_4001, // b6
    0x1002_0040_8226_0014, // c6
    0x206a_0088_11c2_0021, // d6
    0x0002_0018_1022_0024, // e6
    0x2001_0200_0400_8080, // f6
    0x1000_0801_100c_001a, // g6
    0x0048_0082_5402_0011, // h6
    0x48FF_FE99_FECF_AA00, // a7
    0x48FF_FE99_FECF_AA00, // b7
    0x497F_FFAD_FF9C_2E00, // c7
    0x613F_FFDD_FFCE_9200, // d7
    0xffff_ffe9_ffe7_ce00, // e7
    0xffff_fff5_fff3_e600, // f7
    0x0003_ff95_e5e6_a4c0, // g7
    0x510F_FFF5_F63C_96A0, // h7
    0xEBFF_FFB9_FF9F_C526, // a8
    0x61FF_FEDD_FEED_AEAE, // b8
    0x53BF_FFED_FFDE_B1A2, // c8
    0x127F_FFB9_FFDF_B5F6, // d8
    0x411F_FFDD_FFDB_F4D6, // e8
    0x0822_0024_0810_4502, // f8
    0x0003_ffef_27ee_be74, // g8
    0x7645_FFFE_CBFE_A79E, // h8
];

/// A saved list of magic multipliers for bishops, produced by the
/// generator, with some compact entries from the Chess Programming Wiki.
pub const SAVED_BISHOP_MAGICS: [u64; 64] = [
    0xffed_f9fd_7cfc_ffff, // a1
    0xfc09_6285_4a77_f576, // b1
    0x0012_2808_c102_a004, // c1
    0x2851_2400_8240_0440, // d1
    0x0011_1040_1100_0202, // e1
    0x0008_2208_2000_0010, // f1
    0xfc0a_66c6_4a7e_f576, // g1
    0x7ffd_fdfc_bd79_ffff, // h1
    0xfc08_46a6_4a34_fff6, // a2
    0xfc08_7a87_4a3c_f7f6, // b2
    0x0009_8802_0420_a000, // c2
    0x8000_4404_0080_8200, // d2
    0x208c_8450_c001_3407, // e2
    0x1980_1105_2010_8030, // f2
    0xfc08_64ae_59b4_ff76, // g2
    0x3c08_60af_4b35_ff76, // h2
    0x73C0_1AF5_6CF4_CFFB, // a3
    0x41A0_1CFA_D64A_AFFC, // b3
    0x0604_0002_04a2_0202, // c3
    0x0002_8208_0602_4000, // d3
    0x008a_0024_2201_0201, // e3
    0x2082_0040_8801_0802, // f3
    0x7c0c_028f_5b34_ff76, // g3
    0xfc0a_028e_5ab4_df76, // h3
    0x0810_0420_d104_1080, // a4
    0x0904_5100_0210_0100, // b4
    0x0202_2808_0406_4403, // c4
    0x004c_0040_0c03_0082, // d4
    0x0602_0010_0200_5011, // e4
    0x7209_0200_c108_9000, // f4
    0x4211_4104_2400_8805, // g4
    0x0002_8484_2126_0804, // h4
    0xc001_0412_1121_2004, // a5
    0x0208_0188_0004_4800, // b5
    0x0080_2064_1058_0800, // c5
    0x0000_2011_0008_0084, // d5
    0x0208_0034_0009_4100, // e5
    0x2190_4102_0000_4058, // f5
    0x0188_8214_0180_8080, // g5
    0x2006_0a02_0000_c4c0, // h5
    0xDCEF_D9B5_4BFC_C09F, // a6
    0xF95F_FA76_5AFD_602B, // b6
    0x200a_1041_1000_2040, // c6
    0x0800_000c_0831_0c00, // d6
    0x0218_0401_0a01_0400, // e6
    0x1092_2004_0022_4100, // f6
    0x43ff_9a5c_f4ca_0c01, // g6
    0x4BFF_CD8E_7C58_7601, // h6
    0xfc0f_f286_5334_f576, // a7
    0xfc0b_f6ce_5924_f576, // b7
    0x8052_2060_8c30_0001, // c7
    0x2084_1050_4202_0400, // d7
    0xe018_8010_2206_0220, // e7
    0x0001_1220_4901_0200, // f7
    0xc3ff_b7dc_36ca_8c89, // g7
    0xc3ff_8a54_f4ca_2c89, // h7
    0xffff_fcfc_fd79_edff, // a8
    0xfc08_63fc_cb14_7576, // b8
    0x40a0_0400_6213_3000, // c8
    0x0142_0280_0084_0400, // d8
    0x0009_0900_1006_1200, // e8
    0x0800_8445_2810_0308, // f8
    0xfc08_7e8e_4bb2_f736, // g8
    0x43ff_9e4e_f4ca_2c89, // h8
];

/// The width in bits of the table index for rook attacks on each square,
/// matching [`SAVED_ROOK_MAGICS`].
const ROOK_BITS: [u8; 64] = [
    12, 11, 11, 11, 11, 11, 11, 12, // rank 1
    11, 10, 10, 10, 10, 10, 10, 11, // 2
    11, 10, 10, 10, 10, 10, 10, 11, // 3
    11, 10, 10, 10, 10, 10, 10, 11, // 4
    11, 10, 10, 10, 10, 10, 10, 11, // 5
    11, 10, 10, 10, 10, 10, 10, 11, // 6
    10, 9, 9, 9, 9, 9, 9, 10, // 7
    11, 10, 10, 10, 10, 11, 10, 11, // 8
];

/// The width in bits of the table index for bishop attacks on each square,
/// matching [`SAVED_BISHOP_MAGICS`].
const BISHOP_BITS: [u8; 64] = [
    5, 4, 5, 5, 5, 5, 4, 5, // rank 1
    4, 4, 5, 5, 5, 5, 4, 4, // 2
    4, 4, 7, 7, 7, 7, 4, 4, // 3
    5, 5, 7, 9, 9, 7, 5, 5, // 4
    5, 5, 7, 9, 9, 7, 5, 5, // 5
    4, 4, 7, 7, 7, 7, 4, 4, // 6
    4, 4, 5, 5, 5, 5, 4, 4, // 7
    5, 4, 5, 5, 5, 5, 4, 5, // 8
];

#[derive(Clone, Debug)]
/// The complete magic tables for both slider kinds. One process-wide
/// instance lives behind a `Lazy` in the attacks module; the tables are
/// immutable once built and freely shareable across threads.
pub struct AttacksTable {
    rooks: [SquareMagic; 64],
    bishops: [SquareMagic; 64],
}

impl AttacksTable {
    /// Build the table from the saved multipliers. Cheap: no searching, one
    /// pass over each square's blocker subsets.
    ///
    /// # Panics
    ///
    /// Panics if a saved multiplier no longer hashes its square without
    /// destructive collisions, which would mean the constants were edited.
    pub fn load() -> AttacksTable {
        AttacksTable {
            rooks: std::array::from_fn(|i| {
                load_square_magic(square(i), &Direction::ROOK_DIRECTIONS, SAVED_ROOK_MAGICS[i], ROOK_BITS[i])
            }),
            bishops: std::array::from_fn(|i| {
                load_square_magic(
                    square(i),
                    &Direction::BISHOP_DIRECTIONS,
                    SAVED_BISHOP_MAGICS[i],
                    BISHOP_BITS[i],
                )
            }),
        }
    }

    /// Build the table from scratch, searching for fresh multipliers.
    /// Slow (seconds to minutes); useful for regenerating the saved
    /// constants after a layout change.
    ///
    /// # Panics
    ///
    /// Panics if no multiplier is found for some square within the retry
    /// budget, which is statistically implausible with a healthy RNG.
    pub fn make() -> AttacksTable {
        AttacksTable {
            rooks: std::array::from_fn(|i| make_square_magic(square(i), &Direction::ROOK_DIRECTIONS)),
            bishops: std::array::from_fn(|i| {
                make_square_magic(square(i), &Direction::BISHOP_DIRECTIONS)
            }),
        }
    }

    #[inline(always)]
    #[must_use]
    /// Get the attacks a rook on `sq` would make with `occupancy` as the
    /// set of all pieces on the board.
    pub fn rook_attacks(&self, occupancy: Bitboard, sq: Square) -> Bitboard {
        self.rooks[sq as usize].attacks(occupancy)
    }

    #[inline(always)]
    #[must_use]
    /// Get the attacks a bishop on `sq` would make with `occupancy` as the
    /// set of all pieces on the board.
    pub fn bishop_attacks(&self, occupancy: Bitboard, sq: Square) -> Bitboard {
        self.bishops[sq as usize].attacks(occupancy)
    }
}

#[derive(Clone, Debug)]
/// Everything needed to look up one square's slider attacks: the blocker
/// relevance mask, the hash multiplier and shift, and the table the hash
/// indexes into.
struct SquareMagic {
    mask: Bitboard,
    multiplier: u64,
    shift: u8,
    attacks: Vec<Bitboard>,
}

impl SquareMagic {
    #[inline(always)]
    fn attacks(&self, occupancy: Bitboard) -> Bitboard {
        let key = magic_key(occupancy & self.mask, self.multiplier, self.shift);
        self.attacks[key]
    }
}

#[inline(always)]
#[allow(clippy::cast_possible_truncation)]
/// Hash a masked occupancy into a table index.
const fn magic_key(blockers: Bitboard, multiplier: u64, shift: u8) -> usize {
    (blockers.as_u64().wrapping_mul(multiplier) >> shift) as usize
}

#[allow(clippy::cast_possible_truncation)]
/// Convert a loop index to a square.
fn square(i: usize) -> Square {
    Square::try_from(i as u8).unwrap()
}

/// Compute the blocker relevance mask for a slider on `sq`: every square
/// along its rays except the last one of each ray, since a piece sitting
/// there has nothing behind it to shadow.
fn slider_relevant_blockers(sq: Square, dirs: &[Direction]) -> Bitboard {
    let mut mask = Bitboard::EMPTY;
    for &dir in dirs {
        let mut cur = sq;
        loop {
            let next = cur + dir;
            if cur.chebyshev_to(next) > 1 {
                // stepped off the board
                break;
            }
            let beyond = next + dir;
            if next.chebyshev_to(beyond) > 1 {
                // `next` is the terminal square of this ray
                break;
            }
            mask.insert(next);
            cur = next;
        }
    }
    mask
}

/// Compute slider attacks the slow way, stepping outward in each direction
/// until a blocker (included in the result) or the edge of the board. This
/// is the ground truth the hashed tables must reproduce, and is only used
/// for table construction and verification.
pub(crate) fn directional_attacks(sq: Square, dirs: &[Direction], occupancy: Bitboard) -> Bitboard {
    let mut result = Bitboard::EMPTY;
    for &dir in dirs {
        let mut cur = sq;
        loop {
            let next = cur + dir;
            if cur.chebyshev_to(next) > 1 {
                break;
            }
            result.insert(next);
            if occupancy.contains(next) {
                break;
            }
            cur = next;
        }
    }
    result
}

/// Try to fill a table of `1 << (64 - shift)` attack sets using the given
/// multiplier. Two blocker subsets may share a slot only if they produce
/// the same attack set; any other collision rejects the multiplier.
fn try_fill_table(
    sq: Square,
    dirs: &[Direction],
    mask: Bitboard,
    multiplier: u64,
    shift: u8,
) -> Option<Vec<Bitboard>> {
    let mut table = vec![Bitboard::EMPTY; 1 << (64 - shift)];
    for blockers in mask.subsets() {
        let attack = directional_attacks(sq, dirs, blockers);
        let key = magic_key(blockers, multiplier, shift);
        if table[key].is_empty() {
            table[key] = attack;
        } else if table[key] != attack {
            return None;
        }
    }
    Some(table)
}

/// Rebuild one square's table from a saved multiplier.
fn load_square_magic(sq: Square, dirs: &[Direction], multiplier: u64, bits: u8) -> SquareMagic {
    let mask = slider_relevant_blockers(sq, dirs);
    let shift = 64 - bits;
    let attacks = try_fill_table(sq, dirs, mask, multiplier, shift)
        .unwrap_or_else(|| panic!("saved magic for {sq} no longer hashes cleanly"));
    SquareMagic {
        mask,
        multiplier,
        shift,
        attacks,
    }
}

/// Search for a fresh multiplier for one square. The search hashes exactly
/// `popcount(mask)` bits; finding the tighter constructive-collision
/// multipliers that the saved tables use for back-rank rooks takes far too
/// long to do on the fly.
fn make_square_magic(sq: Square, dirs: &[Direction]) -> SquareMagic {
    let mask = slider_relevant_blockers(sq, dirs);
    let shift = 64 - mask.len();
    for _ in 0..NUM_MAGIC_TRIES {
        let multiplier = sparse_random();
        if let Some(attacks) = try_fill_table(sq, dirs, mask, multiplier, shift) {
            return SquareMagic {
                mask,
                multiplier,
                shift,
                attacks,
            };
        }
    }
    panic!("no magic multiplier found for {sq}");
}

#[inline(always)]
/// Draw a random multiplier candidate. ANDing three independent draws
/// biases toward the sparse bit patterns that tend to hash without
/// collisions.
fn sparse_random() -> u64 {
    fastrand::u64(..) & fastrand::u64(..) & fastrand::u64(..)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rook_blocker_masks() {
        assert_eq!(
            slider_relevant_blockers(Square::A1, &Direction::ROOK_DIRECTIONS),
            Bitboard::new(0x0001_0101_0101_017E)
        );
        assert_eq!(
            slider_relevant_blockers(Square::E1, &Direction::ROOK_DIRECTIONS),
            Bitboard::new(0x0010_1010_1010_106E)
        );
        assert_eq!(
            slider_relevant_blockers(Square::E5, &Direction::ROOK_DIRECTIONS),
            Bitboard::new(0x0010_106E_1010_1000)
        );
    }

    #[test]
    fn bishop_blocker_masks() {
        assert_eq!(
            slider_relevant_blockers(Square::A1, &Direction::BISHOP_DIRECTIONS),
            Bitboard::new(0x0040_2010_0804_0200)
        );
        assert_eq!(
            slider_relevant_blockers(Square::E1, &Direction::BISHOP_DIRECTIONS),
            Bitboard::new(0x0000_0000_0244_2800)
        );
        assert_eq!(
            slider_relevant_blockers(Square::E5, &Direction::BISHOP_DIRECTIONS),
            Bitboard::new(0x0044_2800_2844_0200)
        );
    }

    #[test]
    fn mask_sizes_match_saved_bit_widths() {
        // the saved back-rank rook magics hash 11 occupancy bits into 10
        // table-index bits; everywhere else the widths line up exactly
        for i in 0..64 {
            let rook_mask = slider_relevant_blockers(square(i), &Direction::ROOK_DIRECTIONS);
            assert!(rook_mask.len() >= ROOK_BITS[i]);
            let bishop_mask = slider_relevant_blockers(square(i), &Direction::BISHOP_DIRECTIONS);
            assert!(bishop_mask.len() >= BISHOP_BITS[i]);
        }
    }

    #[test]
    fn loaded_tables_match_naive_attacks_everywhere() {
        let table = AttacksTable::load();
        for i in 0..64 {
            let sq = square(i);
            let rook_mask = slider_relevant_blockers(sq, &Direction::ROOK_DIRECTIONS);
            for blockers in rook_mask.subsets() {
                assert_eq!(
                    table.rook_attacks(blockers, sq),
                    directional_attacks(sq, &Direction::ROOK_DIRECTIONS, blockers),
                    "rook mismatch on {sq}"
                );
            }
            let bishop_mask = slider_relevant_blockers(sq, &Direction::BISHOP_DIRECTIONS);
            for blockers in bishop_mask.subsets() {
                assert_eq!(
                    table.bishop_attacks(blockers, sq),
                    directional_attacks(sq, &Direction::BISHOP_DIRECTIONS, blockers),
                    "bishop mismatch on {sq}"
                );
            }
        }
    }

    #[test]
    fn lookups_ignore_irrelevant_occupancy() {
        let table = AttacksTable::load();
        fastrand::seed(0x10de);
        for _ in 0..2_000 {
            let occupancy = Bitboard::new(fastrand::u64(..));
            let sq = square(fastrand::usize(..64));
            assert_eq!(
                table.rook_attacks(occupancy, sq),
                directional_attacks(sq, &Direction::ROOK_DIRECTIONS, occupancy)
            );
            assert_eq!(
                table.bishop_attacks(occupancy, sq),
                directional_attacks(sq, &Direction::BISHOP_DIRECTIONS, occupancy)
            );
        }
    }

    #[test]
    fn generated_magics_agree_with_naive_attacks() {
        // a full regeneration is too slow for a test; spot-check one square
        // of each slider kind
        fastrand::seed(0xbead);
        let rook = make_square_magic(Square::D4, &Direction::ROOK_DIRECTIONS);
        for blockers in rook.mask.subsets() {
            assert_eq!(
                rook.attacks(blockers),
                directional_attacks(Square::D4, &Direction::ROOK_DIRECTIONS, blockers)
            );
        }
        let bishop = make_square_magic(Square::F7, &Direction::BISHOP_DIRECTIONS);
        for blockers in bishop.mask.subsets() {
            assert_eq!(
                bishop.attacks(blockers),
                directional_attacks(Square::F7, &Direction::BISHOP_DIRECTIONS, blockers)
            );
        }
    }

    #[test]
    fn rook_on_open_board_attacks_rank_and_file() {
        let table = AttacksTable::load();
        let expected = (Bitboard::file(3) | Bitboard::rank(3)) & !Bitboard::from(Square::D4);
        let attacks = table.rook_attacks(Bitboard::EMPTY, Square::D4);
        assert_eq!(attacks, expected);
        assert_eq!(attacks.len(), 14);
    }

    #[test]
    fn bishop_stops_at_first_blocker() {
        let table = AttacksTable::load();
        let attacks = table.bishop_attacks(Bitboard::from(Square::D4), Square::A1);
        let expected = Bitboard::from(Square::B2)
            | Bitboard::from(Square::C3)
            | Bitboard::from(Square::D4);
        assert_eq!(attacks, expected);
    }
}
