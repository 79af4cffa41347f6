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

//! Pseudo-legal move generation.
//!
//! Every move produced here obeys the movement rules of its piece, but no
//! check or pin filtering happens at this layer; culling moves that leave
//! the king en prise is the search driver's responsibility.

use super::{attacks, Bitboard, Board, Color, Move, MoveList, Piece, Square};

#[must_use]
/// Generate every pseudo-legal move for the player to move.
///
/// Castling uses the king-takes-own-rook encoding and is gated on rights,
/// the rook being home, and the squares between king and rook being empty;
/// passing through check is not examined here.
///
/// # Examples
///
/// ```
/// use lodestone::{movegen::pseudo_legal_moves, Board};
///
/// let moves = pseudo_legal_moves(&Board::new());
/// assert_eq!(moves.len(), 20);
/// ```
pub fn pseudo_legal_moves(b: &Board) -> MoveList {
    let mut moves = MoveList::new();
    let player = b.player;
    let allies = b[player];
    let enemies = b[!player];
    let occupancy = allies | enemies;

    pawn_moves(b, &mut moves);

    for origin in b[Piece::Knight] & allies {
        leaper_or_slider_moves(attacks::knight_attacks(origin) & !allies, origin, enemies, &mut moves);
    }
    for origin in b[Piece::Bishop] & allies {
        leaper_or_slider_moves(
            attacks::bishop_attacks(origin, occupancy) & !allies,
            origin,
            enemies,
            &mut moves,
        );
    }
    for origin in b[Piece::Rook] & allies {
        leaper_or_slider_moves(
            attacks::rook_attacks(origin, occupancy) & !allies,
            origin,
            enemies,
            &mut moves,
        );
    }
    for origin in b[Piece::Queen] & allies {
        leaper_or_slider_moves(
            attacks::queen_attacks(origin, occupancy) & !allies,
            origin,
            enemies,
            &mut moves,
        );
    }
    for origin in b[Piece::King] & allies {
        leaper_or_slider_moves(attacks::king_attacks(origin) & !allies, origin, enemies, &mut moves);
    }

    castle_moves(b, &mut moves);

    moves
}

#[inline(always)]
#[must_use]
/// In the given position, is `sq` attacked by any piece of `color`?
/// Pawn pushes do not count as attacks.
pub fn is_square_attacked_by(b: &Board, sq: Square, color: Color) -> bool {
    !square_attackers(b, sq, color).is_empty()
}

#[must_use]
/// Get the squares of every piece of `color` attacking `sq`.
pub fn square_attackers(b: &Board, sq: Square, color: Color) -> Bitboard {
    let occupancy = b.occupancy();
    let queens = b[Piece::Queen];

    // a pawn of `color` attacks sq exactly if a pawn of the other color on
    // sq would attack its square
    let mut attackers = attacks::pawn_attacks(!color, sq) & b[Piece::Pawn];
    attackers |= attacks::knight_attacks(sq) & b[Piece::Knight];
    attackers |= attacks::rook_attacks(sq, occupancy) & (b[Piece::Rook] | queens);
    attackers |= attacks::bishop_attacks(sq, occupancy) & (b[Piece::Bishop] | queens);
    attackers |= attacks::king_attacks(sq) & b[Piece::King];

    attackers & b[color]
}

/// Push one move per target square, flagged as a capture where the target
/// is an enemy piece.
fn leaper_or_slider_moves(
    targets: Bitboard,
    origin: Square,
    enemies: Bitboard,
    moves: &mut MoveList,
) {
    for target in targets {
        if enemies.contains(target) {
            moves.push(Move::capture(origin, target));
        } else {
            moves.push(Move::normal(origin, target));
        }
    }
}

/// Generate all pawn moves: pushes, double pushes, captures, promotions,
/// and en passant.
fn pawn_moves(b: &Board, moves: &mut MoveList) {
    let player = b.player;
    let enemies = b[!player];
    let occupancy = b.occupancy();
    let promote_rank = player.pawn_promote_rank();

    for origin in b[Piece::Pawn] & b[player] {
        let single = Bitboard::from(origin).forward(player);
        if (single & occupancy).is_empty() {
            let target = Square::try_from(single).unwrap();
            if promote_rank.contains(target) {
                for kind in Piece::PROMOTE_TYPES {
                    moves.push(Move::promotion(origin, target, kind, false));
                }
            } else {
                moves.push(Move::normal(origin, target));
                if player.pawn_start_rank().contains(origin) {
                    let double = single.forward(player);
                    if (double & occupancy).is_empty() {
                        moves.push(Move::double_push(origin, Square::try_from(double).unwrap()));
                    }
                }
            }
        }

        let attacked = attacks::pawn_attacks(player, origin);
        for target in attacked & enemies {
            if promote_rank.contains(target) {
                for kind in Piece::PROMOTE_TYPES {
                    moves.push(Move::promotion(origin, target, kind, true));
                }
            } else {
                moves.push(Move::capture(origin, target));
            }
        }

        if let Some(ep_square) = b.en_passant_square {
            if attacked.contains(ep_square) {
                moves.push(Move::en_passant(origin, ep_square));
            }
        }
    }
}

/// Generate castling moves for the player to move, in the
/// king-takes-own-rook encoding.
fn castle_moves(b: &Board, moves: &mut MoveList) {
    let player = b.player;
    let occupancy = b.occupancy();
    let back_rank = match player {
        Color::White => 0,
        Color::Black => 7,
    };
    let king_sq = Square::new(back_rank, 4).unwrap();
    // rights normally imply the king is home; checking keeps hand-built
    // positions from generating nonsense
    if !(b[Piece::King] & b[player]).contains(king_sq) {
        return;
    }

    let rooks = b[Piece::Rook] & b[player];
    if b.castle_rights.can_castle_kingside(player) {
        let rook_sq = Square::new(back_rank, 7).unwrap();
        if rooks.contains(rook_sq) && (attacks::between(king_sq, rook_sq) & occupancy).is_empty() {
            moves.push(Move::castling(king_sq, rook_sq));
        }
    }
    if b.castle_rights.can_castle_queenside(player) {
        let rook_sq = Square::new(back_rank, 0).unwrap();
        if rooks.contains(rook_sq) && (attacks::between(king_sq, rook_sq) & occupancy).is_empty() {
            moves.push(Move::castling(king_sq, rook_sq));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CastleRights;

    #[test]
    fn twenty_moves_from_the_starting_position() {
        let moves = pseudo_legal_moves(&Board::new());
        assert_eq!(moves.len(), 20);
        assert_eq!(moves.iter().filter(|m| m.is_double_push()).count(), 8);
        assert!(moves.iter().all(|m| m.is_quiet()));
    }

    #[test]
    fn knight_moves_from_the_corner() {
        let mut b = Board::empty();
        b.insert_piece(Square::A1, Color::White, Piece::Knight);
        b.insert_piece(Square::B3, Color::Black, Piece::Pawn);
        let moves = pseudo_legal_moves(&b);
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&Move::capture(Square::A1, Square::B3)));
        assert!(moves.contains(&Move::normal(Square::A1, Square::C2)));
    }

    #[test]
    fn sliders_stop_at_friends_and_capture_enemies() {
        let mut b = Board::empty();
        b.insert_piece(Square::D4, Color::White, Piece::Rook);
        b.insert_piece(Square::D6, Color::White, Piece::Pawn);
        b.insert_piece(Square::F4, Color::Black, Piece::Knight);
        let moves = pseudo_legal_moves(&b);
        let rook_moves: Vec<_> = moves
            .iter()
            .filter(|m| m.origin() == Square::D4)
            .collect();
        // d5 up; c4, b4, a4 left; e4 + f4 capture right; d3, d2, d1 down
        assert_eq!(rook_moves.len(), 9);
        assert!(rook_moves.contains(&&Move::capture(Square::D4, Square::F4)));
        assert!(!rook_moves.iter().any(|m| m.target() == Square::D6));
        assert!(!rook_moves.iter().any(|m| m.target() == Square::G4));
    }

    #[test]
    fn promotions_fan_out_to_four_kinds() {
        let mut b = Board::empty();
        b.insert_piece(Square::G7, Color::White, Piece::Pawn);
        b.insert_piece(Square::H8, Color::Black, Piece::Rook);
        let moves = pseudo_legal_moves(&b);
        // four quiet promotions on g8, four capturing promotions on h8
        assert_eq!(moves.len(), 8);
        assert!(moves.iter().all(|m| m.is_promotion()));
        assert_eq!(moves.iter().filter(|m| m.is_capture()).count(), 4);
    }

    #[test]
    fn en_passant_is_generated_for_both_neighbors() {
        let mut b = Board::empty();
        b.insert_piece(Square::D5, Color::White, Piece::Pawn);
        b.insert_piece(Square::F5, Color::White, Piece::Pawn);
        b.insert_piece(Square::E5, Color::Black, Piece::Pawn);
        b.en_passant_square = Some(Square::E6);
        let moves = pseudo_legal_moves(&b);
        assert!(moves.contains(&Move::en_passant(Square::D5, Square::E6)));
        assert!(moves.contains(&Move::en_passant(Square::F5, Square::E6)));
    }

    #[test]
    fn castling_requires_room_and_rights() {
        let mut b = Board::empty();
        b.insert_piece(Square::E1, Color::White, Piece::King);
        b.insert_piece(Square::H1, Color::White, Piece::Rook);
        b.insert_piece(Square::A1, Color::White, Piece::Rook);
        b.castle_rights = CastleRights::kingside(Color::White) | CastleRights::queenside(Color::White);

        let moves = pseudo_legal_moves(&b);
        assert!(moves.contains(&Move::castling(Square::E1, Square::H1)));
        assert!(moves.contains(&Move::castling(Square::E1, Square::A1)));

        // a piece in the way blocks the queenside castle only
        b.insert_piece(Square::B1, Color::White, Piece::Knight);
        let moves = pseudo_legal_moves(&b);
        assert!(moves.contains(&Move::castling(Square::E1, Square::H1)));
        assert!(!moves.contains(&Move::castling(Square::E1, Square::A1)));

        // no rights, no castle
        b.castle_rights = CastleRights::NONE;
        let moves = pseudo_legal_moves(&b);
        assert!(!moves.iter().any(|m| m.is_castle()));
    }

    #[test]
    fn startpos_attack_map() {
        let b = Board::new();
        let mut expected = Bitboard::EMPTY;
        for sq in [Square::D1, Square::E1, Square::F1, Square::G1] {
            expected.insert(sq);
        }
        assert_eq!(square_attackers(&b, Square::E2, Color::White), expected);
        assert!(is_square_attacked_by(&b, Square::F3, Color::White));
        assert!(!is_square_attacked_by(&b, Square::E4, Color::White));
        assert!(!is_square_attacked_by(&b, Square::F3, Color::Black));
    }
}
