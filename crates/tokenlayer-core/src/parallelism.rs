/// Detects a usable degree of parallelism for the transform and formatter executors.
///
/// Always returns at least 1, matching the "CPU-count hint, min 1" capability contract;
/// the result is advisory only, since the engines sort output back into canonical order
/// regardless of how much fan-out actually happened.
pub fn detect_parallelism() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_reports_zero() {
        assert!(detect_parallelism() >= 1);
    }
}
