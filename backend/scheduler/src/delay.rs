//! Response delay: the random wait before each reminder attempt.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDelay {
    /// Uniform in `[0, max]`, whole seconds.
    Uniform { max: Duration },
    /// Always the same wait.
    Fixed(Duration),
}

impl ResponseDelay {
    pub fn uniform(max: Duration) -> Self {
        ResponseDelay::Uniform { max }
    }

    pub fn sample(&self) -> Duration {
        match *self {
            ResponseDelay::Fixed(delay) => delay,
            ResponseDelay::Uniform { max } => {
                let max_secs = max.as_secs();
                if max_secs == 0 {
                    return Duration::ZERO;
                }
                Duration::from_secs(rand::thread_rng().gen_range(0..=max_secs))
            }
        }
    }
}
