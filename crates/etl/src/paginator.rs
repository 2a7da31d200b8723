/// One fetch window: `max_results` issues starting at offset `start_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub start_at: u64,
    pub max_results: u64,
}

/// Compute the batch plan covering `[0, total)` with fixed-size pages.
///
/// Windows are ordered, gap-free and non-overlapping; the last one shrinks
/// to whatever remains. A zero total yields no batches.
pub fn plan(total: u64, page_size: u64) -> Vec<Batch> {
    if total == 0 || page_size == 0 {
        return Vec::new();
    }
    (0..total.div_ceil(page_size))
        .map(|i| {
            let start_at = i * page_size;
            Batch {
                start_at,
                max_results: page_size.min(total - start_at),
            }
        })
        .collect()
}
