//! Linear memory sizing.

/// Size of one WebAssembly memory page.
pub const PAGE_SIZE: u64 = 64 * 1024;

/// Number of pages needed to hold `bytes`, rounding up.
#[must_use]
pub fn pages_for(bytes: u64) -> u64 {
    bytes.div_ceil(PAGE_SIZE)
}

/// Bytes spanned by `pages`, saturating at `u64::MAX`.
#[must_use]
pub fn bytes_for(pages: u64) -> u64 {
    pages.saturating_mul(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_round_up() {
        assert_eq!(pages_for(0), 0);
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(PAGE_SIZE), 1);
        assert_eq!(pages_for(PAGE_SIZE + 1), 2);
        assert_eq!(pages_for(64 * 1024 * 1024), 1024);
        assert_eq!(pages_for(u64::MAX), 1 << 48);
    }

    #[test]
    fn test_bytes_for() {
        assert_eq!(bytes_for(2), 2 * PAGE_SIZE);
        assert_eq!(bytes_for(u64::MAX), u64::MAX);
    }
}
