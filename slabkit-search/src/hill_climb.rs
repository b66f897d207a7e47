//! ## slabkit-search::hill_climb
//! **Min-conflicts hill climbing**
//!
//! One queen per row, placed at random. Each step picks a random conflicted row and
//! moves its queen to the column with the fewest conflicts. The climb stops when no
//! queen is attacked, when the best move no longer improves the chosen row (plateau),
//! or after `max_steps` moves.
//!
//! The board, the per-step list of conflicted rows and the column/diagonal occupancy
//! counters are all pool-backed `SeqVec`s.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use slabkit_core::alloc::{BlockPool, PoolStrategy, SeqVec};
use tracing::{info, instrument};

use crate::{Routine, SearchContext, SearchError};

#[derive(Debug, Clone, PartialEq)]
pub struct HillClimbOutcome {
    pub board_size: usize,
    pub solved: bool,
    /// Moves made before stopping.
    pub steps: usize,
    pub elapsed: Duration,
    /// Final placement, `board[row] = column`.
    pub board: Vec<usize>,
}

type Counts<'a> = SeqVec<usize, PoolStrategy<'a, usize>>;

/// Queens per column and per diagonal.
struct Occupancy<'a> {
    n: usize,
    columns: Counts<'a>,
    sums: Counts<'a>,
    diffs: Counts<'a>,
}

impl<'a> Occupancy<'a> {
    fn new(board: &[usize], strategy: PoolStrategy<'a, usize>) -> Result<Self, SearchError> {
        let n = board.len();
        let mut occupancy = Self {
            n,
            columns: SeqVec::new_in(strategy),
            sums: SeqVec::new_in(strategy),
            diffs: SeqVec::new_in(strategy),
        };
        occupancy.columns.resize(n, 0)?;
        occupancy.sums.resize(2 * n - 1, 0)?;
        occupancy.diffs.resize(2 * n - 1, 0)?;
        for (row, &col) in board.iter().enumerate() {
            occupancy.place(row, col);
        }
        Ok(occupancy)
    }

    fn diff_index(&self, row: usize, col: usize) -> usize {
        row + self.n - 1 - col
    }

    fn place(&mut self, row: usize, col: usize) {
        let diff = self.diff_index(row, col);
        self.columns[col] += 1;
        self.sums[row + col] += 1;
        self.diffs[diff] += 1;
    }

    fn lift(&mut self, row: usize, col: usize) {
        let diff = self.diff_index(row, col);
        self.columns[col] -= 1;
        self.sums[row + col] -= 1;
        self.diffs[diff] -= 1;
    }

    /// Queens other than `row`'s own that attack square (`row`, `col`).
    fn conflicts(&self, board: &[usize], row: usize, col: usize) -> usize {
        let total = self.columns[col] + self.sums[row + col] + self.diffs[self.diff_index(row, col)];
        if board[row] == col {
            total - 3
        } else {
            total
        }
    }
}

pub struct HillClimber {
    ctx: SearchContext,
    pool: BlockPool,
    max_steps: usize,
    rng: SmallRng,
}

impl HillClimber {
    /// `seed` makes runs reproducible; without one the RNG is seeded from the OS.
    pub fn new(ctx: &SearchContext, max_steps: usize, seed: Option<u64>) -> Result<Self, SearchError> {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        Ok(Self {
            ctx: ctx.clone(),
            pool: ctx.block_pool_for::<usize>()?,
            max_steps,
            rng,
        })
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    #[instrument(level = "info", name = "hill_climb", skip(self))]
    pub fn run(&mut self, n: usize) -> Result<HillClimbOutcome, SearchError> {
        if n == 0 {
            return Err(SearchError::Config("board size must be at least 1".into()));
        }
        self.ctx.begin_run();

        let strategy = PoolStrategy::<usize>::new(&self.pool)?;
        let start = Instant::now();

        let mut board = SeqVec::with_capacity_in(n, strategy)?;
        for _ in 0..n {
            board.push(self.rng.random_range(0..n))?;
        }
        let mut occupancy = Occupancy::new(&board, strategy)?;

        let mut solved = false;
        let mut steps = 0;
        for step in 0..=self.max_steps {
            let mut conflicted = SeqVec::new_in(strategy);
            for row in 0..n {
                if occupancy.conflicts(&board, row, board[row]) > 0 {
                    conflicted.push(row)?;
                }
            }
            if conflicted.is_empty() {
                solved = true;
                break;
            }
            if step == self.max_steps {
                break;
            }

            let row = conflicted[self.rng.random_range(0..conflicted.len())];
            let current = board[row];
            let mut best_col = current;
            let mut min_conflicts = occupancy.conflicts(&board, row, current);
            for col in 0..n {
                let conflicts = occupancy.conflicts(&board, row, col);
                if conflicts < min_conflicts {
                    min_conflicts = conflicts;
                    best_col = col;
                }
            }
            if best_col == current {
                break;
            }

            occupancy.lift(row, current);
            occupancy.place(row, best_col);
            board[row] = best_col;
            steps = step + 1;

            if step % 1000 == 0 {
                if let Some(tracker) = self.ctx.tracker().filter(|t| t.is_enabled()) {
                    info!(step, usage = tracker.current_usage(), "hill climbing progress");
                }
            }
        }
        let elapsed = start.elapsed();

        info!(
            n,
            solved,
            steps,
            seconds = elapsed.as_secs_f64(),
            "hill climbing {}",
            if solved { "succeeded" } else { "failed" }
        );
        let outcome = HillClimbOutcome {
            board_size: n,
            solved,
            steps,
            elapsed,
            board: board.to_vec(),
        };

        drop(occupancy);
        drop(board);
        self.ctx.finish_run(Routine::HillClimb, n)?;
        Ok(outcome)
    }
}
