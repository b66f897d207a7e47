//! ## slabkit-search::dfs
//! **Blind depth-first enumeration**
//!
//! Places queens row by row, trying every column in order and backtracking on attack,
//! and counts every complete placement. No ordering or pruning beyond the safety check.
//! An optional node budget stops the enumeration early; the outcome then reports the
//! partial count with `completed == false`.

use std::time::{Duration, Instant};

use slabkit_core::alloc::{BlockPool, PoolStrategy, SeqVec};
use tracing::{info, instrument, warn};

use crate::{Routine, SearchContext, SearchError};

#[derive(Debug, Clone, PartialEq)]
pub struct DfsOutcome {
    pub board_size: usize,
    pub solutions: u64,
    /// Safe partial placements visited.
    pub nodes: u64,
    /// `false` when the node budget ran out first.
    pub completed: bool,
    pub elapsed: Duration,
}

/// Whether a queen at (`row`, `col`) is safe from the queens in rows `0..row`.
fn is_safe(board: &[usize], row: usize, col: usize) -> bool {
    board[..row]
        .iter()
        .enumerate()
        .all(|(r, &c)| c != col && c.abs_diff(col) != row - r)
}

struct Enumeration {
    n: usize,
    solutions: u64,
    nodes: u64,
    node_limit: u64,
}

impl Enumeration {
    /// Returns `false` once the node budget is spent.
    fn descend(&mut self, board: &mut [usize], row: usize) -> bool {
        if row == self.n {
            self.solutions += 1;
            return true;
        }
        for col in 0..self.n {
            if !is_safe(board, row, col) {
                continue;
            }
            if self.nodes == self.node_limit {
                return false;
            }
            self.nodes += 1;
            board[row] = col;
            if !self.descend(board, row + 1) {
                return false;
            }
        }
        true
    }
}

pub struct DfsSolver {
    ctx: SearchContext,
    pool: BlockPool,
    node_limit: Option<u64>,
}

impl DfsSolver {
    /// `node_limit` caps the safe placements visited per run; `None` enumerates fully.
    pub fn new(ctx: &SearchContext, node_limit: Option<u64>) -> Result<Self, SearchError> {
        Ok(Self {
            ctx: ctx.clone(),
            pool: ctx.block_pool_for::<usize>()?,
            node_limit,
        })
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    #[instrument(level = "info", name = "dfs", skip(self))]
    pub fn run(&mut self, n: usize) -> Result<DfsOutcome, SearchError> {
        if n == 0 {
            return Err(SearchError::Config("board size must be at least 1".into()));
        }
        self.ctx.begin_run();

        let mut board = SeqVec::new_in(PoolStrategy::<usize>::new(&self.pool)?);
        board.resize(n, 0)?;

        let mut search = Enumeration {
            n,
            solutions: 0,
            nodes: 0,
            node_limit: self.node_limit.unwrap_or(u64::MAX),
        };
        let start = Instant::now();
        let completed = search.descend(&mut board, 0);
        let elapsed = start.elapsed();
        drop(board);

        let seconds = elapsed.as_secs_f64();
        if completed {
            info!(n, solutions = search.solutions, nodes = search.nodes, seconds, "dfs enumeration finished");
        } else {
            warn!(
                n,
                solutions = search.solutions,
                nodes = search.nodes,
                seconds,
                "dfs node budget exhausted"
            );
        }

        self.ctx.finish_run(Routine::Dfs, n)?;
        Ok(DfsOutcome {
            board_size: n,
            solutions: search.solutions,
            nodes: search.nodes,
            completed,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slabkit_config::MemoryConfig;

    fn solver(node_limit: Option<u64>) -> DfsSolver {
        DfsSolver::new(&SearchContext::new(&MemoryConfig::default()), node_limit).unwrap()
    }

    #[test]
    fn test_solution_counts() {
        let mut solver = solver(None);
        let expected = [1, 0, 0, 2, 10, 4, 40, 92, 352];
        for (i, &count) in expected.iter().enumerate() {
            let outcome = solver.run(i + 1).unwrap();
            assert!(outcome.completed);
            assert_eq!(outcome.solutions, count, "n = {}", i + 1);
        }
    }

    #[test]
    fn test_node_budget_stops_early() {
        let mut solver = solver(Some(10));
        let outcome = solver.run(8).unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.nodes, 10);
        assert_eq!(outcome.solutions, 0);
    }

    #[test]
    fn test_budget_equal_to_tree_size_completes() {
        let full = solver(None).run(6).unwrap();
        let bounded = solver(Some(full.nodes)).run(6).unwrap();
        assert!(bounded.completed);
        assert_eq!(bounded.solutions, 4);
    }

    #[test]
    fn test_is_safe() {
        let board = [1, 3, 0, 0];
        assert!(is_safe(&board, 3, 2));
        assert!(!is_safe(&board, 3, 1));
        assert!(!is_safe(&board, 3, 0));
        assert!(is_safe(&board, 0, 0));
    }

    #[test]
    fn test_board_goes_back_to_the_pool() {
        let mut solver = solver(None);
        solver.run(1).unwrap();
        solver.run(5).unwrap();
        assert_eq!(solver.pool().live_blocks(), 0);
    }
}
