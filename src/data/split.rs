use super::frame::Frame;

/// Minimal deterministic PRNG (xoshiro256**), seeded through an LCG.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform index in `0..bound` (`bound > 0`).
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

/// Rows assigned to each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with `seed` and cut off `ceil(n * test_fraction)` rows
/// for the test side. `test_fraction` is clamped to `[0, 1]`.
pub fn split_indices(n_rows: usize, test_fraction: f64, seed: u64) -> SplitIndices {
    let mut order: Vec<usize> = (0..n_rows).collect();
    SimpleRng::new(seed).shuffle(&mut order);

    let n_test = ((n_rows as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let train = order.split_off(n_test.min(n_rows));
    SplitIndices { train, test: order }
}

/// Split a frame into `(train, test)` frames.
pub fn train_test_split(frame: &Frame, test_fraction: f64, seed: u64) -> (Frame, Frame) {
    let idx = split_indices(frame.len(), test_fraction, seed);
    (frame.select_rows(&idx.train), frame.select_rows(&idx.test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Value;

    #[test]
    fn test_split_sizes_match_fraction() {
        let idx = split_indices(800, 0.2, 42);
        assert_eq!(idx.test.len(), 160);
        assert_eq!(idx.train.len(), 640);
    }

    #[test]
    fn test_split_is_a_partition() {
        let idx = split_indices(57, 0.3, 7);
        let mut all: Vec<usize> = idx.train.iter().chain(&idx.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        assert_eq!(split_indices(100, 0.2, 42), split_indices(100, 0.2, 42));
        assert_ne!(split_indices(100, 0.2, 42), split_indices(100, 0.2, 43));
    }

    #[test]
    fn test_train_test_split_frames() {
        let frame = Frame::from_rows(
            &["id"],
            (0..10).map(|i| vec![Value::Integer(i)]).collect(),
        );
        let (train, test) = train_test_split(&frame, 0.2, 1);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(train.column_names, vec!["id"]);
    }
}
