use glam::Vec3;

/// Normalised 9-tap Gaussian, centre tap first.
pub const GAUSSIAN_WEIGHTS: [f32; 5] = [0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216];

/// Where a blur iteration reads from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlurSource {
    Bright,
    Buffer(usize),
}

/// One blur iteration as scheduled by [`PingPong::step`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlurStep {
    pub horizontal: bool,
    pub read: BlurSource,
    pub write: usize,
}

/// Alternation state of the two blur buffers.
///
/// `horizontal` is the direction of the most recent iteration and is false
/// before the first one. Iterations are counted separately from frames and
/// restart with [`PingPong::reset`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PingPong {
    horizontal: bool,
    iterations: u32,
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self) -> BlurStep {
        self.horizontal = !self.horizontal;
        let read = if self.iterations == 0 { BlurSource::Bright } else { BlurSource::Buffer(!self.horizontal as usize) };
        self.iterations += 1;
        BlurStep { horizontal: self.horizontal, read, write: self.horizontal as usize }
    }

    pub fn horizontal(&self) -> bool {
        self.horizontal
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Buffer holding the finished blur, `None` before any iteration.
    pub fn last_written(&self) -> Option<usize> {
        (self.iterations > 0).then_some(self.horizontal as usize)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The schedule of a whole blur chain of `iterations` steps.
pub fn schedule(iterations: u32) -> Vec<BlurStep> {
    let mut pp = PingPong::new();
    (0..iterations).map(|_| pp.step()).collect()
}

/// Exposure tonemap of the scene plus bloom, then gamma encoding.
pub fn tonemap(scene: Vec3, bloom: Vec3, exposure: f32, gamma: f32) -> Vec3 {
    let mapped = Vec3::ONE - (-(scene + bloom) * exposure).exp();
    mapped.powf(1.0 / gamma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_normalised() {
        let total = GAUSSIAN_WEIGHTS[0] + 2.0 * GAUSSIAN_WEIGHTS[1..].iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn first_step_reads_bright_and_writes_one() {
        let mut pp = PingPong::new();
        assert!(!pp.horizontal());
        assert_eq!(pp.last_written(), None);
        let step = pp.step();
        assert_eq!(step, BlurStep { horizontal: true, read: BlurSource::Bright, write: 1 });
        assert_eq!(pp.step(), BlurStep { horizontal: false, read: BlurSource::Buffer(1), write: 0 });
    }

    #[test]
    fn last_written_is_iterations_mod_two() {
        for m in 1..=12u32 {
            let mut pp = PingPong::new();
            for _ in 0..m {
                pp.step();
            }
            assert_eq!(pp.horizontal(), m % 2 == 1);
            assert_eq!(pp.last_written(), Some((m % 2) as usize));
            assert_eq!(pp.iterations(), m);
        }
    }

    #[test]
    fn steps_never_read_what_they_write() {
        for step in schedule(10) {
            assert_ne!(step.read, BlurSource::Buffer(step.write));
        }
        let dirs: Vec<bool> = schedule(4).iter().map(|s| s.horizontal).collect();
        assert_eq!(dirs, [true, false, true, false]);
    }

    #[test]
    fn reset_restarts_from_bright() {
        let mut pp = PingPong::new();
        pp.step();
        pp.step();
        pp.step();
        pp.reset();
        assert_eq!(pp.step().read, BlurSource::Bright);
    }

    #[test]
    fn tonemap_stays_in_unit_range() {
        assert_eq!(tonemap(Vec3::ZERO, Vec3::ZERO, 1.0, 2.2), Vec3::ZERO);
        let hot = tonemap(Vec3::splat(100.0), Vec3::splat(50.0), 1.0, 2.2);
        assert!(hot.max_element() <= 1.0 && hot.min_element() > 0.99);
        let dim = tonemap(Vec3::splat(0.5), Vec3::ZERO, 1.0, 1.0);
        assert!((dim.x - (1.0 - (-0.5f32).exp())).abs() < 1e-6);
        assert!(tonemap(Vec3::splat(0.5), Vec3::splat(0.2), 1.0, 1.0).x > dim.x);
    }
}
