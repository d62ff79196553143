use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::constants::GRID_SIZE;

/// One of the two seats at a session. Serialized as its number (1 or 2).
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    pub const ALL: [Seat; 2] = [Seat::One, Seat::Two];

    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Zero-based index into per-seat arrays (scores, ready flags).
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    /// The seat that moves next when the turn flips: `(n % 2) + 1`.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> Self {
        seat.number()
    }
}

impl TryFrom<u8> for Seat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            n => Err(format!("invalid seat number {n}")),
        }
    }
}

/// Cell ownership travels as `0` (unclaimed), `1` or `2`.
mod owner_repr {
    use super::Seat;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(owner: &Option<Seat>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(owner.map_or(0, Seat::number))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Seat>, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(None),
            n => Seat::try_from(n).map(Some).map_err(de::Error::custom),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
    #[serde(with = "owner_repr")]
    pub owner: Option<Seat>,
    /// Set once the cell falls inside an enclosure; only a reset clears it.
    pub sealed: bool,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            owner: None,
            sealed: false,
        }
    }

    pub fn is_unclaimed(&self) -> bool {
        self.owner.is_none()
    }
}

/// Square matrix of cells, addressed as `(x, y)` with rows indexed by `y`.
///
/// The matrix is always full: every row has exactly `size` cells.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Board {
    rows: Vec<Vec<Cell>>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        let rows = (0..size)
            .map(|y| (0..size).map(|x| Cell::new(x, y)).collect())
            .collect();
        Self { rows }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.rows.get(y).and_then(|row| row.get(x))
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.rows.get_mut(y).and_then(|row| row.get_mut(x))
    }

    /// Sets the owner of `(x, y)`. Returns `false` when the coordinates are off the board.
    pub fn claim(&mut self, x: usize, y: usize, seat: Seat) -> bool {
        match self.cell_mut(x, y) {
            Some(cell) => {
                cell.owner = Some(seat);
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flatten()
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.rows.iter_mut().flatten()
    }

    pub fn count_owned(&self, seat: Seat) -> usize {
        self.cells().filter(|cell| cell.owner == Some(seat)).count()
    }

    pub fn has_unclaimed(&self) -> bool {
        self.cells().any(Cell::is_unclaimed)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(GRID_SIZE)
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<Vec<Cell>>::deserialize(deserializer)?;
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return Err(serde::de::Error::custom("board rows must form a square"));
        }
        Ok(Self { rows })
    }
}

/// Outcome of a finished game, rendered as the final status line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GameResult {
    Winner(Seat),
    Tie,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Winner(seat) => write!(f, "Player {seat} Wins!"),
            Self::Tie => write!(f, "It's a Tie!"),
        }
    }
}

/// Authoritative state of one game, broadcast verbatim to both seats.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub grid: Board,
    pub scores: [u32; 2],
    pub current_turn: Seat,
    pub game_over: bool,
    /// Human-readable description of the last event.
    pub message: String,
    pub players_ready: Vec<bool>,
    pub last_move_at: Option<DateTime<Utc>>,
}

impl GameState {
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid: Board::new(grid_size),
            scores: [0, 0],
            current_turn: Seat::One,
            game_over: false,
            message: String::new(),
            players_ready: Vec::new(),
            last_move_at: None,
        }
    }

    pub fn score(&self, seat: Seat) -> u32 {
        self.scores[seat.index()]
    }

    pub fn is_ready(&self, seat: Seat) -> bool {
        self.players_ready.get(seat.index()).copied().unwrap_or(false)
    }

    /// Marks `seat` as not ready, growing the flag list if the seat is new.
    pub(crate) fn clear_ready(&mut self, seat: Seat) {
        let index = seat.index();
        if self.players_ready.len() <= index {
            self.players_ready.resize(index + 1, false);
        }
        self.players_ready[index] = false;
    }

    /// Marks `seat` as ready. Returns `true` if the flag changed.
    pub(crate) fn set_ready(&mut self, seat: Seat) -> bool {
        let index = seat.index();
        if self.players_ready.len() <= index {
            self.players_ready.resize(index + 1, false);
        }
        let changed = !self.players_ready[index];
        self.players_ready[index] = true;
        changed
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(GRID_SIZE)
    }
}
