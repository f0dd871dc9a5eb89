//! Deciding whether an existing scratch file already satisfies a fragment.
use std::path::Path;

/// Pluggable completeness check for scratch files left by an earlier run.
///
/// Implementations must be cheap to share across workers.
pub trait ResumePolicy: Send + Sync {
    /// `existing_len` is the scratch file's length on disk, `expected_len` the
    /// fragment's expected size.
    fn is_complete(&self, path: &Path, existing_len: u64, expected_len: u64) -> bool;
}

/// Treats a scratch file as complete when its length matches exactly.
///
/// Length equality is not a checksum: a corrupted file of the right length is
/// accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeMatch;

impl ResumePolicy for SizeMatch {
    fn is_complete(&self, _path: &Path, existing_len: u64, expected_len: u64) -> bool {
        existing_len == expected_len
    }
}

/// Never resumes; every fragment is fetched again.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRefetch;

impl ResumePolicy for AlwaysRefetch {
    fn is_complete(&self, _path: &Path, _existing_len: u64, _expected_len: u64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_match() {
        let p = Path::new("x.part0");
        assert!(SizeMatch.is_complete(p, 4_194_304, 4_194_304));
        assert!(!SizeMatch.is_complete(p, 4_194_303, 4_194_304));
        assert!(!SizeMatch.is_complete(p, 0, 1));
        assert!(!AlwaysRefetch.is_complete(p, 10, 10));
    }
}
