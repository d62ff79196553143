//! Pure rules: move validation, enclosure detection, scoring and game end.
//!
//! Nothing here looks at clocks, participants or sessions; every function
//! works on a board or game state snapshot of any size.

use std::collections::VecDeque;
use thiserror::Error;

use super::entities::{Board, GameResult, GameState, Seat};

/// Why a move was refused. Refused moves never touch the state.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum MoveError {
    #[error("game is over")]
    GameOver,

    #[error("not player {actual}'s turn (player {expected} to move)")]
    NotYourTurn { expected: Seat, actual: Seat },

    #[error("({x}, {y}) is off the board")]
    OutOfBounds { x: i64, y: i64 },

    #[error("({x}, {y}) is already claimed")]
    Occupied { x: usize, y: usize },
}

/// What a committed move did to the game.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MoveOutcome {
    /// The move sealed at least one opponent stone.
    pub enclosed: bool,
    pub game_over: bool,
}

/// Checks every precondition of a move and returns the board coordinates.
pub fn validate_move(state: &GameState, x: i64, y: i64, seat: Seat) -> Result<(usize, usize), MoveError> {
    if state.game_over {
        return Err(MoveError::GameOver);
    }
    if seat != state.current_turn {
        return Err(MoveError::NotYourTurn {
            expected: state.current_turn,
            actual: seat,
        });
    }

    let size = state.grid.size();
    let (cx, cy) = match (usize::try_from(x), usize::try_from(y)) {
        (Ok(cx), Ok(cy)) if cx < size && cy < size => (cx, cy),
        _ => return Err(MoveError::OutOfBounds { x, y }),
    };

    match state.grid.cell(cx, cy) {
        Some(cell) if cell.is_unclaimed() => Ok((cx, cy)),
        Some(_) => Err(MoveError::Occupied { x: cx, y: cy }),
        None => Err(MoveError::OutOfBounds { x, y }),
    }
}

/// Validates and commits a move for `seat`.
///
/// On success the cell is claimed, enclosures are sealed, the mover's score is
/// recounted, and either the game ends or the turn advances (a capture keeps
/// the turn with the mover). On error `state` is left untouched.
pub fn apply_move(state: &mut GameState, x: i64, y: i64, seat: Seat) -> Result<MoveOutcome, MoveError> {
    let (cx, cy) = validate_move(state, x, y, seat)?;

    state.grid.claim(cx, cy, seat);
    let (grid, enclosed) = detect_enclosures(&state.grid, seat);
    state.grid = grid;
    state.scores[seat.index()] = calculate_score(&state.grid, seat);

    let game_over = is_game_over(&state.grid);
    if game_over {
        state.game_over = true;
        state.message = game_result(&state.grid).to_string();
    } else if !enclosed {
        state.current_turn = seat.other();
    }

    Ok(MoveOutcome { enclosed, game_over })
}

/// Seals every region the mover cut off from the board frame.
///
/// Flood fill (4-connected) starts from the whole outer frame. The mover's
/// stones and previously sealed cells block the fill; everything else,
/// opponent stones included, is passable. Cells the fill never reaches, other
/// than the mover's own stones, become sealed. Returns the new board and
/// whether any opponent stone was sealed by this pass.
pub fn detect_enclosures(board: &Board, current: Seat) -> (Board, bool) {
    let mut next = board.clone();
    let size = next.size();
    if size == 0 {
        return (next, false);
    }

    let passable = |x: usize, y: usize| {
        next.cell(x, y)
            .is_some_and(|cell| !cell.sealed && cell.owner != Some(current))
    };

    let mut visited = vec![false; size * size];
    let mut queue = VecDeque::with_capacity(4 * size);
    for i in 0..size {
        queue.extend([(0, i), (size - 1, i), (i, 0), (i, size - 1)]);
    }

    while let Some((x, y)) = queue.pop_front() {
        let idx = y * size + x;
        if visited[idx] || !passable(x, y) {
            continue;
        }
        visited[idx] = true;

        if x > 0 {
            queue.push_back((x - 1, y));
        }
        if x + 1 < size {
            queue.push_back((x + 1, y));
        }
        if y > 0 {
            queue.push_back((x, y - 1));
        }
        if y + 1 < size {
            queue.push_back((x, y + 1));
        }
    }

    let mut captured = false;
    for cell in next.cells_mut() {
        if visited[cell.y * size + cell.x] || cell.sealed || cell.owner == Some(current) {
            continue;
        }
        if cell.owner == Some(current.other()) {
            captured = true;
        }
        cell.sealed = true;
    }

    (next, captured)
}

/// Number of sealed cells owned by anyone other than `seat`.
pub fn calculate_score(board: &Board, seat: Seat) -> u32 {
    let count = board
        .cells()
        .filter(|cell| cell.sealed && cell.owner.is_some_and(|owner| owner != seat))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// The game ends once no cell is left unclaimed.
pub fn is_game_over(board: &Board) -> bool {
    !board.has_unclaimed()
}

/// Compares claimed-cell counts to decide the winner.
pub fn game_result(board: &Board) -> GameResult {
    let one = board.count_owned(Seat::One);
    let two = board.count_owned(Seat::Two);
    match one.cmp(&two) {
        std::cmp::Ordering::Greater => GameResult::Winner(Seat::One),
        std::cmp::Ordering::Less => GameResult::Winner(Seat::Two),
        std::cmp::Ordering::Equal => GameResult::Tie,
    }
}
