/// Knobs for running a program. Built with `Config::default()` and the
/// builder-style setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Per-loop iteration ceiling; exceeding it aborts the row.
    pub max_loop_iterations: usize,
}

pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 1_000_000;

impl Config {
    #[must_use]
    pub fn max_loop_iterations(mut self, limit: usize) -> Self {
        self.max_loop_iterations = limit;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_default() {
        assert_eq!(Config::default().max_loop_iterations, DEFAULT_MAX_LOOP_ITERATIONS);
        assert_eq!(Config::default().max_loop_iterations(10).max_loop_iterations, 10);
    }
}
