use std::f64::consts::PI;

use burn::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("warmup must last at least one iteration")]
    ZeroWarmup,
    #[error("max_iters ({max_iters}) must exceed warmup_iters ({warmup_iters})")]
    EmptyDecay {
        warmup_iters: usize,
        max_iters: usize,
    },
}

/// Linear warmup from `start_lr` to `warmup_lr`, then cosine decay from
/// `warmup_lr` down to `alpha * warmup_lr`.
#[derive(Config)]
pub struct CosineScheduleConfig {
    pub warmup_iters: usize,
    pub max_iters: usize,
    #[config(default = 0.0)]
    pub start_lr: f64,
    #[config(default = 1.0e-3)]
    pub warmup_lr: f64,
    /// Not used by the decay phase, which is anchored to `warmup_lr`.
    #[config(default = 0.0)]
    pub end_lr: f64,
    #[config(default = 0.0)]
    pub alpha: f64,
}

impl CosineScheduleConfig {
    pub fn init(&self) -> Result<CosineSchedule, ScheduleError> {
        CosineSchedule::new(
            self.start_lr,
            self.warmup_lr,
            self.warmup_iters,
            self.max_iters,
            self.alpha,
        )
    }
}

/// Yields one learning rate per iteration, `max_iters` in total.
#[derive(Debug, Clone)]
pub struct CosineSchedule {
    start_lr: f64,
    warmup_lr: f64,
    warmup_iters: usize,
    max_iters: usize,
    alpha: f64,
    iter: usize,
}

impl CosineSchedule {
    fn new(
        start_lr: f64,
        warmup_lr: f64,
        warmup_iters: usize,
        max_iters: usize,
        alpha: f64,
    ) -> Result<Self, ScheduleError> {
        if warmup_iters == 0 {
            return Err(ScheduleError::ZeroWarmup);
        }
        if max_iters <= warmup_iters {
            return Err(ScheduleError::EmptyDecay {
                warmup_iters,
                max_iters,
            });
        }

        Ok(Self {
            start_lr,
            warmup_lr,
            warmup_iters,
            max_iters,
            alpha,
            iter: 0,
        })
    }

    pub fn decay_iters(&self) -> usize {
        self.max_iters - self.warmup_iters
    }

    /// Learning rate of the zero based iteration `i`.
    pub fn lr_at(&self, i: usize) -> f64 {
        if i < self.warmup_iters {
            let step = (self.warmup_lr - self.start_lr) / self.warmup_iters as f64;
            let t = (i + 1) as f64;
            self.start_lr + t * step
        } else {
            let t = (i - self.warmup_iters + 1) as f64;
            let decay = 0.5 * (1.0 + (PI * t / self.decay_iters() as f64).cos());
            let decay = (1.0 - self.alpha) * decay + self.alpha;
            decay * self.warmup_lr
        }
    }
}

impl Iterator for CosineSchedule {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.iter >= self.max_iters {
            return None;
        }
        let lr = self.lr_at(self.iter);
        self.iter += 1;
        Some(lr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.max_iters - self.iter;
        (n, Some(n))
    }
}

impl ExactSizeIterator for CosineSchedule {}

/// Precomputes the whole schedule. `end_lr` is accepted for callers that pass
/// it but does not influence the result.
pub fn cosine_learning_schedule(
    start_lr: f64,
    warmup_lr: f64,
    _end_lr: f64,
    warmup_iters: usize,
    max_iters: usize,
    alpha: f64,
) -> Result<Vec<f64>, ScheduleError> {
    Ok(CosineSchedule::new(start_lr, warmup_lr, warmup_iters, max_iters, alpha)?.collect())
}
