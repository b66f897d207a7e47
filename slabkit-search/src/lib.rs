//! # slabkit-search
//!
//! N-Queens search routines that run their working storage through slabkit pools and
//! arenas, so the allocators and the tracker can be measured under a real workload.
//!
//! ### Key Submodules:
//! - `hill_climb`: min-conflicts local search over a pool-backed board
//! - `csp`: MRV/LCV backtracking with forward checking, scratch data in an arena
//! - `dfs`: blind enumeration of every solution with an optional node budget
//! - `context`: shared pool/arena sizing, tracker and per-run report files
//! - `results`: the per-routine CSV of board size and elapsed time

pub mod context;
pub mod csp;
pub mod dfs;
pub mod error;
pub mod hill_climb;
pub mod results;

pub use context::SearchContext;
pub use csp::{CspOutcome, CspSolver};
pub use dfs::{DfsOutcome, DfsSolver};
pub use error::SearchError;
pub use hill_climb::{HillClimbOutcome, HillClimber};
pub use results::ResultsCsv;

/// The three search routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Routine {
    HillClimb,
    Csp,
    Dfs,
}

impl Routine {
    pub const ALL: [Routine; 3] = [Routine::HillClimb, Routine::Csp, Routine::Dfs];

    /// Short name used in report file names and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Routine::HillClimb => "hillclimb",
            Routine::Csp => "csp",
            Routine::Dfs => "dfs",
        }
    }

    pub fn results_file(self) -> &'static str {
        match self {
            Routine::HillClimb => "nqueens_hillclimbing_results.csv",
            Routine::Csp => "nqueens_csp_results.csv",
            Routine::Dfs => "nqueens_dfs_results.csv",
        }
    }

    pub fn memory_report_file(self, board_size: usize) -> String {
        format!("{}_memory_N{}.txt", self.name(), board_size)
    }

    pub fn leak_report_file(self) -> String {
        format!("{}_final_leaks.txt", self.name())
    }
}

impl std::fmt::Display for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `queens[row] = column` places every queen safely.
pub fn is_solution(queens: &[usize]) -> bool {
    let n = queens.len();
    queens.iter().all(|&c| c < n)
        && (0..n).all(|r1| {
            (r1 + 1..n).all(|r2| {
                let (c1, c2) = (queens[r1], queens[r2]);
                c1 != c2 && c1.abs_diff(c2) != r2 - r1
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_solution() {
        assert!(is_solution(&[1, 3, 0, 2]));
        assert!(!is_solution(&[0, 1, 2, 3]));
        assert!(!is_solution(&[0, 0, 0, 0]));
        assert!(!is_solution(&[1, 3, 0, 4]));
        assert!(is_solution(&[0]));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(Routine::Dfs.memory_report_file(8), "dfs_memory_N8.txt");
        assert_eq!(Routine::HillClimb.leak_report_file(), "hillclimb_final_leaks.txt");
        assert_eq!(Routine::Csp.results_file(), "nqueens_csp_results.csv");
    }
}
