//! Custom validation functions shared by the configuration modules.

use validator::ValidationError;

/// Largest board the search routines accept.
pub const MAX_BOARD_SIZE: usize = 4096;

/// Validate that at least one board size is given and each lies in `1..=MAX_BOARD_SIZE`.
pub fn validate_board_sizes(sizes: &[usize]) -> Result<(), ValidationError> {
    if sizes.is_empty() {
        return Err(ValidationError::new("empty_board_sizes"));
    }
    if sizes.iter().any(|&n| n == 0 || n > MAX_BOARD_SIZE) {
        return Err(ValidationError::new("board_size_out_of_range"));
    }
    Ok(())
}

/// Validate that a report directory is a plain relative or absolute path, not blank.
pub fn validate_report_dir(dir: &str) -> Result<(), ValidationError> {
    if dir.trim().is_empty() || dir.contains('\0') {
        return Err(ValidationError::new("invalid_report_dir"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_sizes() {
        assert!(validate_board_sizes(&[4, 8, 4096]).is_ok());
        assert!(validate_board_sizes(&[]).is_err());
        assert!(validate_board_sizes(&[0]).is_err());
        assert!(validate_board_sizes(&[8, 4097]).is_err());
    }

    #[test]
    fn test_report_dir() {
        assert!(validate_report_dir("reports").is_ok());
        assert!(validate_report_dir("  ").is_err());
    }
}
