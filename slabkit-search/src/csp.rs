//! ## slabkit-search::csp
//! **Backtracking constraint solver**
//!
//! Rows are variables, columns are values. The solver picks the row with the smallest
//! remaining domain (MRV), tries its columns in least-constraining order (LCV), and
//! after each assignment prunes the domains of all unassigned rows (forward checking).
//! Pruning then propagates arc consistency from every row left with three or fewer
//! columns: a queen attacks at most three squares of another row, so only such rows
//! can take the last support away from a neighbour's value.
//!
//! Each branch works on a clone of the state. The assignment is pool-backed; LCV
//! orderings and the propagation queue are arena-backed scratch that lives until the
//! arena is reset at the end of the run.

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use slabkit_core::alloc::{Arena, ArenaStrategy, BlockPool, PoolStrategy, SeqVec};
use tracing::{debug, info, instrument};

use crate::{Routine, SearchContext, SearchError};

/// Rows with at most this many columns left can prune their neighbours.
const PROPAGATION_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct CspOutcome {
    pub board_size: usize,
    pub solved: bool,
    /// `assignment[row] = column`; empty when unsolved.
    pub assignment: Vec<usize>,
    /// Assignments tried, including those rejected by forward checking.
    pub nodes: u64,
    pub elapsed: Duration,
}

/// Remaining columns of every row as one flat bitset.
#[derive(Debug, Clone)]
struct Domains {
    n: usize,
    words: usize,
    bits: Vec<u64>,
    sizes: Vec<usize>,
}

impl Domains {
    fn full(n: usize) -> Self {
        let words = n.div_ceil(64);
        let mut bits = vec![0u64; n * words];
        for row in bits.chunks_mut(words) {
            for (i, word) in row.iter_mut().enumerate() {
                let live = (n - i * 64).min(64);
                *word = if live == 64 { u64::MAX } else { (1u64 << live) - 1 };
            }
        }
        Self {
            n,
            words,
            bits,
            sizes: vec![n; n],
        }
    }

    fn size(&self, row: usize) -> usize {
        self.sizes[row]
    }

    fn contains(&self, row: usize, col: usize) -> bool {
        col < self.n && self.bits[row * self.words + col / 64] & (1 << (col % 64)) != 0
    }

    /// Returns whether `col` was present.
    fn remove(&mut self, row: usize, col: usize) -> bool {
        if !self.contains(row, col) {
            return false;
        }
        self.bits[row * self.words + col / 64] &= !(1 << (col % 64));
        self.sizes[row] -= 1;
        true
    }

    fn restrict_to(&mut self, row: usize, col: usize) {
        let words = &mut self.bits[row * self.words..(row + 1) * self.words];
        words.fill(0);
        words[col / 64] = 1 << (col % 64);
        self.sizes[row] = 1;
    }

    fn columns(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.bits[row * self.words..(row + 1) * self.words]
            .iter()
            .enumerate()
            .flat_map(|(i, &word)| {
                (0..64usize)
                    .filter(move |&bit| word & (1 << bit) != 0)
                    .map(move |bit| i * 64 + bit)
            })
    }
}

/// Columns of row `row + distance` (or `row - distance`) attacked by a queen at `col`.
fn attacked(col: usize, distance: usize) -> [Option<usize>; 3] {
    [
        Some(col),
        col.checked_add(distance),
        col.checked_sub(distance),
    ]
}

struct CspState<'p> {
    assignment: SeqVec<Option<usize>, PoolStrategy<'p, Option<usize>>>,
    domains: Domains,
    unassigned: usize,
}

impl<'p> CspState<'p> {
    fn new(n: usize, pool: &'p BlockPool) -> Result<Self, SearchError> {
        let mut assignment = SeqVec::new_in(PoolStrategy::new(pool)?);
        assignment.resize(n, None)?;
        Ok(Self {
            assignment,
            domains: Domains::full(n),
            unassigned: n,
        })
    }

    fn try_clone(&self) -> Result<Self, SearchError> {
        Ok(Self {
            assignment: self.assignment.try_clone()?,
            domains: self.domains.clone(),
            unassigned: self.unassigned,
        })
    }

    fn n(&self) -> usize {
        self.assignment.len()
    }

    fn is_unassigned(&self, row: usize) -> bool {
        self.assignment[row].is_none()
    }

    fn assign(&mut self, row: usize, col: usize) {
        self.assignment[row] = Some(col);
        self.domains.restrict_to(row, col);
        self.unassigned -= 1;
    }

    /// Smallest domain first; among equals, the row whose peers keep the most columns.
    fn select_variable(&self) -> Option<usize> {
        let open = (0..self.n()).filter(|&r| self.is_unassigned(r));
        let total: usize = open.clone().map(|r| self.domains.size(r)).sum();
        open.min_by_key(|&r| {
            let size = self.domains.size(r);
            (size, Reverse(total - size))
        })
    }

    /// Columns of `row`, fewest eliminations in other rows first.
    fn ordered_values<'a>(
        &self,
        row: usize,
        arena: &'a Arena,
    ) -> Result<SeqVec<usize, ArenaStrategy<'a, usize>>, SearchError> {
        let mut scored = SeqVec::new_in(ArenaStrategy::<(usize, usize)>::new(arena));
        for col in self.domains.columns(row) {
            let mut eliminated = 0;
            for other in (0..self.n()).filter(|&r| r != row && self.is_unassigned(r)) {
                let distance = row.abs_diff(other);
                eliminated += attacked(col, distance)
                    .into_iter()
                    .flatten()
                    .filter(|&c| self.domains.contains(other, c))
                    .count();
            }
            scored.push((eliminated, col))?;
        }
        scored.sort_unstable();

        let mut values = SeqVec::with_capacity_in(scored.len(), ArenaStrategy::new(arena))?;
        for &(_, col) in scored.iter() {
            values.push(col)?;
        }
        Ok(values)
    }

    /// Prunes unassigned domains after `row` took `col`. Returns `false` once any
    /// domain empties.
    fn forward_check(&mut self, row: usize, col: usize, arena: &Arena) -> Result<bool, SearchError> {
        let n = self.n();
        let mut queue = SeqVec::new_in(ArenaStrategy::<usize>::new(arena));

        for other in 0..n {
            if !self.is_unassigned(other) {
                continue;
            }
            let mut pruned = false;
            for c in attacked(col, row.abs_diff(other)).into_iter().flatten() {
                pruned |= self.domains.remove(other, c);
            }
            if self.domains.size(other) == 0 {
                return Ok(false);
            }
            if pruned && self.domains.size(other) <= PROPAGATION_THRESHOLD {
                queue.push(other)?;
            }
        }

        while let Some(source) = queue.pop() {
            for target in 0..n {
                if target == source || !self.is_unassigned(target) {
                    continue;
                }
                if !self.revise(target, source) {
                    continue;
                }
                if self.domains.size(target) == 0 {
                    return Ok(false);
                }
                if self.domains.size(target) <= PROPAGATION_THRESHOLD {
                    queue.push(target)?;
                }
            }
        }
        Ok(true)
    }

    /// Drops every column of `target` that all remaining columns of `source` attack.
    fn revise(&mut self, target: usize, source: usize) -> bool {
        let distance = source.abs_diff(target);
        let mut candidates = [None; 3 * PROPAGATION_THRESHOLD];
        for (slot, c) in candidates.iter_mut().zip(
            self.domains
                .columns(source)
                .flat_map(|c1| attacked(c1, distance).into_iter().flatten()),
        ) {
            *slot = Some(c);
        }

        let mut revised = false;
        for c2 in candidates.into_iter().flatten() {
            if !self.domains.contains(target, c2) {
                continue;
            }
            let supported = self
                .domains
                .columns(source)
                .any(|c1| !attacked(c1, distance).contains(&Some(c2)));
            if !supported {
                revised |= self.domains.remove(target, c2);
            }
        }
        revised
    }
}

fn solve(
    state: &mut CspState<'_>,
    arena: &Arena,
    nodes: &mut u64,
) -> Result<bool, SearchError> {
    let Some(row) = state.select_variable() else {
        return Ok(true);
    };

    let values = state.ordered_values(row, arena)?;
    for &col in values.iter() {
        *nodes += 1;
        let mut next = state.try_clone()?;
        next.assign(row, col);
        if !next.forward_check(row, col, arena)? {
            continue;
        }
        if solve(&mut next, arena, nodes)? {
            *state = next;
            return Ok(true);
        }
    }
    Ok(false)
}

pub struct CspSolver {
    ctx: SearchContext,
    pool: BlockPool,
    arena: Arena,
}

impl CspSolver {
    pub fn new(ctx: &SearchContext) -> Result<Self, SearchError> {
        Ok(Self {
            ctx: ctx.clone(),
            pool: ctx.block_pool_for::<Option<usize>>()?,
            arena: ctx.arena(),
        })
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[instrument(level = "info", name = "csp", skip(self))]
    pub fn run(&mut self, n: usize) -> Result<CspOutcome, SearchError> {
        if n == 0 {
            return Err(SearchError::Config("board size must be at least 1".into()));
        }
        self.ctx.begin_run();

        let start = Instant::now();
        let mut nodes = 0;
        let mut state = CspState::new(n, &self.pool)?;
        let solved = solve(&mut state, &self.arena, &mut nodes)?;
        let elapsed = start.elapsed();

        let assignment = if solved {
            state.assignment.iter().flatten().copied().collect()
        } else {
            Vec::new()
        };
        drop(state);

        debug!(
            arena_bytes = self.arena.total_memory(),
            arena_slabs = self.arena.slab_count(),
            "csp scratch before reset"
        );
        info!(n, solved, nodes, seconds = elapsed.as_secs_f64(), "csp search finished");

        self.ctx.finish_run(Routine::Csp, n)?;
        self.arena.reset();

        Ok(CspOutcome {
            board_size: n,
            solved,
            assignment,
            nodes,
            elapsed,
        })
    }
}
