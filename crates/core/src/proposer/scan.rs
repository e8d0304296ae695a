//! Pattern-scan strategy selection.
//!
//! The backward scan over the context is the hottest loop of the exact
//! proposer. The backend is picked once at proposer construction and held as
//! a function pointer, so per-call dispatch is a single indirect call with
//! no repeated capability check. The `accel` build uses a blockwise scan
//! with a first-token prefilter; both backends return identical positions.

/// Finds the start index of the most recent occurrence of `pattern` in
/// `haystack`, or `None`.
type ScanFn = fn(haystack: &[u32], pattern: &[u32]) -> Option<usize>;

/// Scan strategy selected at construction time.
#[derive(Debug, Clone, Copy)]
pub struct ScanBackend {
    find_last: ScanFn,
    name: &'static str,
}

impl ScanBackend {
    /// Pick the best backend available in this build.
    pub fn select() -> Self {
        #[cfg(feature = "accel")]
        {
            Self {
                find_last: find_last_blockwise,
                name: "blockwise",
            }
        }
        #[cfg(not(feature = "accel"))]
        {
            Self {
                find_last: find_last_portable,
                name: "portable",
            }
        }
    }

    /// Most recent occurrence of `pattern` fully contained in `haystack`.
    pub fn find_last(&self, haystack: &[u32], pattern: &[u32]) -> Option<usize> {
        (self.find_last)(haystack, pattern)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg_attr(feature = "accel", allow(dead_code))]
fn find_last_portable(haystack: &[u32], pattern: &[u32]) -> Option<usize> {
    let n = pattern.len();
    if n == 0 || haystack.len() < n {
        return None;
    }
    (0..=haystack.len() - n)
        .rev()
        .find(|&start| haystack[start..start + n] == *pattern)
}

/// Backward scan in fixed-size blocks with a prefilter on the pattern's
/// first token. Full pattern comparison only runs at prefilter hits, which
/// keeps the inner loop branch-light on long repetitive contexts.
#[cfg(feature = "accel")]
fn find_last_blockwise(haystack: &[u32], pattern: &[u32]) -> Option<usize> {
    const BLOCK: usize = 64;

    let n = pattern.len();
    if n == 0 || haystack.len() < n {
        return None;
    }
    let first = pattern[0];
    let mut block_end = haystack.len() - n + 1;
    while block_end > 0 {
        let block_start = block_end.saturating_sub(BLOCK);
        for start in (block_start..block_end).rev() {
            if haystack[start] == first && haystack[start..start + n] == *pattern {
                return Some(start);
            }
        }
        block_end = block_start;
    }
    None
}
