//! Clustering solver configuration

/// Configuration for the clustering solver
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum solving time in seconds
    pub max_time_seconds: u32,
    /// Maximum generations for metaheuristic
    pub max_generations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_time_seconds: 30,
            max_generations: 500,
        }
    }
}

impl SolverConfig {
    /// Create config with custom values
    pub fn new(max_time_seconds: u32, max_generations: usize) -> Self {
        Self {
            max_time_seconds,
            max_generations,
        }
    }

    /// Fast configuration for interactive use
    pub fn fast() -> Self {
        Self {
            max_time_seconds: 5,
            max_generations: 200,
        }
    }

    /// Instant configuration, mostly for tests
    pub fn instant() -> Self {
        Self {
            max_time_seconds: 2,
            max_generations: 100,
        }
    }

    /// Interactive preset with the time limit taken from configuration.
    pub fn interactive(max_time_seconds: u64) -> Self {
        Self {
            max_time_seconds: max_time_seconds.clamp(1, 300) as u32,
            ..Self::fast()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.max_time_seconds, 30);
        assert_eq!(config.max_generations, 500);
    }

    #[test]
    fn test_fast_config() {
        let config = SolverConfig::fast();
        assert_eq!(config.max_time_seconds, 5);
        assert!(config.max_generations < SolverConfig::default().max_generations);
    }

    #[test]
    fn test_instant_config() {
        let config = SolverConfig::instant();
        assert!(config.max_time_seconds < SolverConfig::fast().max_time_seconds);
    }

    #[test]
    fn test_interactive_clamps_time() {
        assert_eq!(SolverConfig::interactive(0).max_time_seconds, 1);
        assert_eq!(SolverConfig::interactive(12).max_time_seconds, 12);
        assert_eq!(SolverConfig::interactive(10_000).max_time_seconds, 300);
    }
}
