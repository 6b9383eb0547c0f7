use std::fmt;
use std::sync::OnceLock;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A direction to slide/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All four directions in the fixed scan order used for tie-breaking.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

/// First tile value that ends the game in a win.
pub const WIN_TILE: u32 = 2048;

const WIN_EXPONENT: u8 = WIN_TILE.trailing_zeros() as u8;

/// How a finished board ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Won,
    Lost,
}

/// Outcome of sliding a board in one direction.
///
/// `points` is the sum of the values of every merged pair produced by the
/// slide; `moved` is false iff the resulting board is cell-for-cell identical
/// to the input, in which case the move is a no-op and `points` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slide {
    pub board: Board,
    pub points: u32,
    pub moved: bool,
}

/// Packed 4x4 2048 board: 16 base-2 exponents as 4-bit nibbles in a `u64`,
/// row-major from the most significant nibble. Exponent 0 is an empty cell.
///
/// `Board` is a `Copy` value compared and hashed by content, so history
/// snapshots and hint-search simulations can share boards freely without
/// ever touching the live game's state.
///
/// ```
/// use game_2048::board::{Board, Move};
///
/// let b = Board::from_grid([
///     [2, 2, 0, 0],
///     [0, 0, 0, 0],
///     [0, 0, 0, 0],
///     [0, 0, 0, 0],
/// ]);
/// let slide = b.slide(Move::Left);
/// assert!(slide.moved);
/// assert_eq!(slide.points, 4);
/// assert_eq!(slide.board.tile_value(0), 4);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board(u64);

impl Board {
    /// The empty board.
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Board(raw)
    }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Build a board from a grid of tile values (0 = empty).
    ///
    /// Every non-zero value must be a power of two >= 2; anything else is a
    /// caller bug and trips a debug assertion.
    pub fn from_grid(grid: [[u32; 4]; 4]) -> Self {
        let mut raw = 0u64;
        for (r, row) in grid.iter().enumerate() {
            for (c, &val) in row.iter().enumerate() {
                let exp = if val == 0 {
                    0
                } else {
                    debug_assert!(
                        val.is_power_of_two() && val >= 2,
                        "tile value {val} is not a power of two >= 2"
                    );
                    val.trailing_zeros() as u64
                };
                raw |= exp << (60 - 4 * (r * 4 + c));
            }
        }
        Board(raw)
    }

    /// Expand the board back into a grid of tile values (0 = empty).
    pub fn to_grid(self) -> [[u32; 4]; 4] {
        let mut grid = [[0u32; 4]; 4];
        for (idx, exp) in self.tiles().enumerate() {
            grid[idx / 4][idx % 4] = tile_exp_value(exp);
        }
        grid
    }

    /// Slide and merge tiles in `dir`; no random tile is inserted.
    ///
    /// Per line: empties are compressed out, equal adjacent tiles merge
    /// pairwise toward the move direction (a tile produced by a merge never
    /// merges again in the same slide), and the line is re-padded.
    pub fn slide(self, dir: Move) -> Slide {
        let t = tables();
        let (raw, points) = match dir {
            Move::Left => slide_rows(self.0, &t.left, &t.points),
            Move::Right => slide_rows(self.0, &t.right, &t.points),
            // Columns reduce to rows through the transpose: up is a left
            // slide of the transposed board, down a right slide.
            Move::Up => {
                let (raw, points) = slide_rows(transpose(self.0), &t.left, &t.points);
                (transpose(raw), points)
            }
            Move::Down => {
                let (raw, points) = slide_rows(transpose(self.0), &t.right, &t.points);
                (transpose(raw), points)
            }
        };
        Slide {
            board: Board(raw),
            points,
            moved: raw != self.0,
        }
    }

    /// Insert a random 2 (9 in 10) or 4 (1 in 10) tile into a uniformly
    /// random empty cell. A full board is left untouched.
    ///
    /// Randomness is injected so callers can make spawns reproducible:
    ///
    /// ```
    /// use game_2048::board::Board;
    /// use rand::{rngs::StdRng, SeedableRng};
    ///
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 15);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let exp: u64 = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
        // Walk nibbles from the low end until the chosen empty slot is found.
        let mut tmp = self.0;
        let mut tile = exp;
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 {
                break;
            }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Count the number of empty cells.
    pub fn count_empty(self) -> u32 {
        // Collapse each nibble to a single occupancy bit, then popcount.
        let mut x = self.0;
        x |= x >> 1;
        x |= x >> 2;
        x &= 0x1111_1111_1111_1111;
        16 - x.count_ones()
    }

    /// The highest tile value on the board (0 if the board is empty).
    pub fn max_tile(self) -> u32 {
        self.tiles().max().map_or(0, tile_exp_value)
    }

    /// True if any tile has reached [`WIN_TILE`].
    pub fn has_win_tile(self) -> bool {
        self.tiles().any(|exp| exp >= WIN_EXPONENT)
    }

    /// True if the board is full and no direction's slide changes it.
    pub fn is_stuck(self) -> bool {
        self.count_empty() == 0 && Move::ALL.iter().all(|&dir| !self.slide(dir).moved)
    }

    /// Classify the board: `Won` once a tile reaches [`WIN_TILE`], `Lost`
    /// once no legal move remains, `None` while the game is still open.
    pub fn ending(self) -> Option<Ending> {
        if self.has_win_tile() {
            Some(Ending::Won)
        } else if self.is_stuck() {
            Some(Ending::Lost)
        } else {
            None
        }
    }

    /// Tile value at `idx` (row-major 0..16), 0 for an empty cell.
    pub fn tile_value(self, idx: usize) -> u32 {
        tile_exp_value(((self.0 >> (60 - 4 * idx)) & 0xf) as u8)
    }

    /// Iterate over tile exponents in row-major order (0 = empty, 1 = 2, ...).
    pub fn tiles(self) -> impl Iterator<Item = u8> {
        (0..16).map(move |idx| ((self.0 >> (60 - 4 * idx)) & 0xf) as u8)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.to_grid() {
            for val in row {
                if val == 0 {
                    write!(f, "{:>6}", ".")?;
                } else {
                    write!(f, "{val:>6}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[inline]
fn tile_exp_value(exp: u8) -> u32 {
    if exp == 0 {
        0
    } else {
        1 << exp
    }
}

/// Force table construction now instead of on first use. Benchmarks call
/// this to keep setup cost out of measurements; everything else can rely on
/// lazy initialization.
pub fn warm() {
    let _ = tables();
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // all 16-bit lines

struct Tables {
    left: Box<[u16]>,
    right: Box<[u16]>,
    points: Box<[u32]>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

#[inline]
fn tables() -> &'static Tables {
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> Tables {
    let mut left = vec![0u16; LINE_TABLE_SIZE];
    let mut right = vec![0u16; LINE_TABLE_SIZE];
    let mut points = vec![0u32; LINE_TABLE_SIZE];
    for line in 0..LINE_TABLE_SIZE {
        let (slid, pts) = slide_line_left(line as u16);
        left[line] = slid;
        right[line] = reverse_line(slide_line_left(reverse_line(line as u16)).0);
        // Merges happen pairwise inside runs of equal tiles, so the score
        // delta of a line is the same whichever end it is slid toward; one
        // table serves left, right, and (through the transpose) up and down.
        points[line] = pts;
    }
    Tables {
        left: left.into_boxed_slice(),
        right: right.into_boxed_slice(),
        points: points.into_boxed_slice(),
    }
}

/// Compress, merge pairwise, re-compress one line toward its high nibble.
/// Returns the slid line and the summed value of merged pairs.
fn slide_line_left(line: u16) -> (u16, u32) {
    let cells = [
        (line >> 12) & 0xf,
        (line >> 8) & 0xf,
        (line >> 4) & 0xf,
        line & 0xf,
    ];
    let mut packed = [0u16; 4];
    let mut n = 0;
    for &c in &cells {
        if c != 0 {
            packed[n] = c;
            n += 1;
        }
    }
    let mut out = [0u16; 4];
    let mut points = 0u32;
    let mut src = 0;
    let mut dst = 0;
    while src < n {
        if src + 1 < n && packed[src] == packed[src + 1] {
            let exp = packed[src] + 1;
            points += 1u32 << exp;
            // A merged pair of 32768s exceeds the nibble range; the cell
            // saturates at 32768 like the classic engines.
            out[dst] = exp.min(0xf);
            src += 2;
        } else {
            out[dst] = packed[src];
            src += 1;
        }
        dst += 1;
    }
    (
        (out[0] << 12) | (out[1] << 8) | (out[2] << 4) | out[3],
        points,
    )
}

#[inline]
fn reverse_line(line: u16) -> u16 {
    (line >> 12) | ((line >> 4) & 0x00f0) | ((line << 4) & 0x0f00) | (line << 12)
}

#[inline]
fn slide_rows(raw: u64, table: &[u16], points: &[u32]) -> (u64, u32) {
    let mut out = 0u64;
    let mut pts = 0u32;
    for row in 0..4 {
        let line = extract_row(raw, row);
        out |= (line_entry(table, line) as u64) << ((3 - row) * 16);
        pts += point_entry(points, line);
    }
    (out, pts)
}

#[inline]
fn line_entry(table: &[u16], line: u16) -> u16 {
    debug_assert!((line as usize) < LINE_TABLE_SIZE);
    unsafe { *table.get_unchecked(line as usize) }
}

#[inline]
fn point_entry(table: &[u32], line: u16) -> u32 {
    debug_assert!((line as usize) < LINE_TABLE_SIZE);
    unsafe { *table.get_unchecked(line as usize) }
}

#[inline]
pub(crate) fn extract_row(raw: u64, row: usize) -> u16 {
    ((raw >> ((3 - row) * 16)) & 0xffff) as u16
}

// Nibble-wise 4x4 transpose. Credit to Nneonneo.
pub(crate) fn transpose(x: u64) -> u64 {
    let a1 = x & 0xF0F0_0F0F_F0F0_0F0F;
    let a2 = x & 0x0000_F0F0_0000_F0F0;
    let a3 = x & 0x0F0F_0000_0F0F_0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00_FF00_00FF_00FF;
    let b2 = a & 0x00FF_00FF_0000_0000;
    let b3 = a & 0x0000_0000_FF00_FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn row(cells: [u32; 4]) -> Board {
        Board::from_grid([cells, [0; 4], [0; 4], [0; 4]])
    }

    #[test]
    fn slide_line_compresses_and_merges() {
        // exponents: [1,1,0,0] -> [2,0,0,0], one merged 4
        assert_eq!(slide_line_left(0x1100), (0x2000, 4));
        // gap between equal tiles still merges
        assert_eq!(slide_line_left(0x1001), (0x2000, 4));
        // two pairs merge independently
        assert_eq!(slide_line_left(0x1122), (0x2300, 4 + 8));
        // a merged tile does not merge again
        assert_eq!(slide_line_left(0x1110), (0x2100, 4));
        // nothing to do
        assert_eq!(slide_line_left(0x1234), (0x1234, 0));
        assert_eq!(slide_line_left(0x0000), (0x0000, 0));
    }

    #[test]
    fn slide_left_merges_a_pair() {
        let b = Board::from_grid([
            [2, 2, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
        ]);
        let slide = b.slide(Move::Left);
        assert!(slide.moved);
        assert_eq!(slide.points, 4);
        assert_eq!(slide.board, row([4, 0, 0, 0]));
    }

    #[test]
    fn slide_right_mirrors_left() {
        let slide = row([2, 2, 4, 0]).slide(Move::Right);
        assert!(slide.moved);
        assert_eq!(slide.points, 4);
        assert_eq!(slide.board, row([0, 0, 4, 4]));
    }

    #[test]
    fn slide_columns_through_transpose() {
        let b = Board::from_grid([
            [2, 0, 0, 0],
            [2, 0, 0, 0],
            [4, 0, 0, 0],
            [0, 0, 0, 0],
        ]);
        let up = b.slide(Move::Up);
        assert_eq!(up.points, 4);
        assert_eq!(
            up.board,
            Board::from_grid([[4, 0, 0, 0], [4, 0, 0, 0], [0; 4], [0; 4]])
        );
        let down = b.slide(Move::Down);
        assert_eq!(down.points, 4);
        assert_eq!(
            down.board,
            Board::from_grid([[0; 4], [0; 4], [4, 0, 0, 0], [4, 0, 0, 0]])
        );
    }

    #[test]
    fn each_tile_merges_at_most_once() {
        let slide = row([2, 2, 2, 2]).slide(Move::Left);
        assert_eq!(slide.board, row([4, 4, 0, 0]));
        assert_eq!(slide.points, 8);

        let slide = row([4, 4, 8, 8]).slide(Move::Left);
        assert_eq!(slide.board, row([8, 16, 0, 0]));
        assert_eq!(slide.points, 8 + 16);
    }

    #[test]
    fn noop_slide_reports_unmoved_and_scoreless() {
        let b = row([4, 2, 0, 0]);
        let slide = b.slide(Move::Left);
        assert!(!slide.moved);
        assert_eq!(slide.points, 0);
        assert_eq!(slide.board, b);
    }

    #[test]
    fn repeated_slides_settle() {
        let mut b = Board::from_grid([
            [2, 2, 4, 4],
            [2, 2, 4, 4],
            [8, 8, 2, 2],
            [0, 0, 0, 0],
        ]);
        let mut guard = 0;
        while b.slide(Move::Left).moved {
            b = b.slide(Move::Left).board;
            guard += 1;
            assert!(guard < 16, "slide failed to settle");
        }
        let settled = b.slide(Move::Left);
        assert!(!settled.moved);
        assert_eq!(settled.points, 0);
    }

    #[test]
    fn random_tile_fills_one_empty_cell() {
        let mut rng = StdRng::seed_from_u64(7);
        let b = Board::EMPTY.with_random_tile(&mut rng);
        assert_eq!(b.count_empty(), 15);
        assert!(b.max_tile() == 2 || b.max_tile() == 4);
    }

    #[test]
    fn random_tiles_eventually_fill_the_board() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut b = Board::EMPTY;
        for _ in 0..16 {
            b = b.with_random_tile(&mut rng);
        }
        assert_eq!(b.count_empty(), 0);
    }

    #[test]
    fn seeded_spawns_are_reproducible() {
        let mut a = StdRng::seed_from_u64(123);
        let mut b = StdRng::seed_from_u64(123);
        let x = Board::EMPTY.with_random_tile(&mut a).with_random_tile(&mut a);
        let y = Board::EMPTY.with_random_tile(&mut b).with_random_tile(&mut b);
        assert_eq!(x, y);
    }

    #[test]
    fn ending_classification() {
        assert_eq!(row([2, 4, 8, 0]).ending(), None);

        let won = row([2048, 2, 0, 0]);
        assert_eq!(won.ending(), Some(Ending::Won));

        // Checkerboard: full, no equal neighbors in any direction.
        let lost = Board::from_grid([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert_eq!(lost.count_empty(), 0);
        assert!(Move::ALL.iter().all(|&dir| !lost.slide(dir).moved));
        assert_eq!(lost.ending(), Some(Ending::Lost));
    }

    #[test]
    fn grid_conversions_agree_with_raw_layout() {
        let b = Board::from_grid([
            [2, 0, 0, 0],
            [0, 4, 0, 0],
            [0, 0, 8, 0],
            [0, 0, 0, 16],
        ]);
        assert_eq!(b.raw(), 0x1000_0200_0030_0004);
        assert_eq!(b.tile_value(0), 2);
        assert_eq!(b.tile_value(5), 4);
        assert_eq!(b.tile_value(15), 16);
        assert_eq!(b.count_empty(), 12);
        assert_eq!(b.max_tile(), 16);
    }

    #[test]
    fn transpose_is_an_involution() {
        let raw = 0x1234_5678_9abc_def0;
        assert_eq!(transpose(transpose(raw)), raw);
        assert_eq!(extract_row(transpose(raw), 0), 0x159d);
    }
}
