//! Per-routine timing CSV: `N,Time(seconds)`, plus `Solutions` for DFS.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::{Routine, SearchError};

pub struct ResultsCsv {
    path: PathBuf,
    writer: BufWriter<File>,
    with_solutions: bool,
}

impl ResultsCsv {
    /// Creates `dir/<results file of routine>` and writes the header row.
    pub fn create(dir: &Path, routine: Routine) -> Result<Self, SearchError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(routine.results_file());
        let mut writer = BufWriter::new(File::create(&path)?);

        let with_solutions = routine == Routine::Dfs;
        if with_solutions {
            writeln!(writer, "N,Time(seconds),Solutions")?;
        } else {
            writeln!(writer, "N,Time(seconds)")?;
        }
        Ok(Self {
            path,
            writer,
            with_solutions,
        })
    }

    pub fn record(&mut self, n: usize, seconds: f64, solutions: u64) -> Result<(), SearchError> {
        if self.with_solutions {
            writeln!(self.writer, "{},{},{}", n, seconds, solutions)?;
        } else {
            writeln!(self.writer, "{},{}", n, seconds)?;
        }
        Ok(())
    }

    /// Flushes and returns the file path.
    pub fn finish(mut self) -> Result<PathBuf, SearchError> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dfs_csv_has_solutions_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = ResultsCsv::create(dir.path(), Routine::Dfs).unwrap();
        csv.record(8, 0.5, 92).unwrap();
        let path = csv.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "N,Time(seconds),Solutions\n8,0.5,92\n");
    }

    #[test]
    fn test_timing_only_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = ResultsCsv::create(&dir.path().join("out"), Routine::HillClimb).unwrap();
        csv.record(4, 0.25, 0).unwrap();
        let path = csv.finish().unwrap();

        assert!(path.ends_with("nqueens_hillclimbing_results.csv"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "N,Time(seconds)\n4,0.25\n");
    }
}
