//! Synthetic AGC regulation command with temporally correlated noise.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Normalized regulation command in `[-1, 1]`.
///
/// The command is a sinusoid of the given period plus an AR(1) noise term:
///
/// ```text
/// n(k) = alpha * n(k-1) + (1 - alpha) * epsilon(k)
/// s(t) = clamp(amplitude * sin(2 pi t / period) + n(k), -1, 1)
/// ```
///
/// where `epsilon` is Gaussian noise. A positive value asks for upward
/// regulation, a negative value for downward regulation; the caller scales it
/// by the unit's capacity in that direction.
#[derive(Debug, Clone)]
pub struct RegulationSignal {
    /// Sinusoid amplitude (fraction of capacity, 0.0 to 1.0).
    pub amplitude: f64,
    /// Sinusoid period in seconds.
    pub period_secs: f64,
    /// AR(1) correlation coefficient (0.0 = uncorrelated, 1.0 = fully persistent).
    pub alpha: f64,
    /// Standard deviation of the AR(1) innovation noise.
    pub noise_std: f64,
    noise: f64,
    rng: StdRng,
}

impl RegulationSignal {
    /// Creates a new signal source.
    ///
    /// # Arguments
    ///
    /// * `amplitude` - Sinusoid amplitude, clamped to `[0, 1]`
    /// * `period_secs` - Sinusoid period; a non-positive period disables the sinusoid
    /// * `alpha` - AR(1) coefficient, clamped to `[0, 1]`
    /// * `noise_std` - Innovation standard deviation (negative treated as 0)
    /// * `seed` - Random seed for reproducible noise
    pub fn new(amplitude: f64, period_secs: f64, alpha: f64, noise_std: f64, seed: u64) -> Self {
        Self {
            amplitude: amplitude.clamp(0.0, 1.0),
            period_secs,
            alpha: alpha.clamp(0.0, 1.0),
            noise_std: noise_std.max(0.0),
            noise: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advances the noise process and returns the command at `time`.
    pub fn next_command(&mut self, time: f64) -> f64 {
        let epsilon = gaussian_noise(&mut self.rng, self.noise_std);
        self.noise = self.alpha * self.noise + (1.0 - self.alpha) * epsilon;

        let wave = if self.period_secs > 0.0 {
            self.amplitude * (2.0 * PI * time / self.period_secs).sin()
        } else {
            0.0
        };
        (wave + self.noise).clamp(-1.0, 1.0)
    }
}

/// Generates Gaussian noise using the Box-Muller transform.
///
/// Returns 0.0 when `std_dev` is not positive.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z0 * std_dev
}
