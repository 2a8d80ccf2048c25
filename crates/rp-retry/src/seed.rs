//! Per-worker random streams derived from one master seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Hands out one independent ChaCha stream per worker.
///
/// All streams share the master key and differ in their stream id, so no two
/// workers ever draw from the same sequence regardless of how many workers
/// are spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedStream {
    master: u64,
}

impl SeedStream {
    pub fn new(master: u64) -> Self {
        Self { master }
    }

    /// Master seed drawn from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn master(&self) -> u64 {
        self.master
    }

    /// The random stream for `worker`.
    pub fn stream(&self, worker: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.master);
        rng.set_stream(worker as u64);
        rng
    }

    /// Streams for workers `0..count`.
    pub fn spawn(&self, count: usize) -> Vec<ChaCha8Rng> {
        (0..count).map(|worker| self.stream(worker)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn draws(rng: &mut ChaCha8Rng) -> Vec<u64> {
        (0..8).map(|_| rng.gen()).collect()
    }

    #[test]
    fn same_master_is_reproducible() {
        let a = SeedStream::new(42).spawn(3);
        let b = SeedStream::new(42).spawn(3);
        for (mut x, mut y) in a.into_iter().zip(b) {
            assert_eq!(draws(&mut x), draws(&mut y));
        }
    }

    #[test]
    fn workers_get_distinct_streams() {
        let mut streams = SeedStream::new(7).spawn(5);
        let sequences: Vec<Vec<u64>> = streams.iter_mut().map(draws).collect();
        for i in 0..sequences.len() {
            for j in (i + 1)..sequences.len() {
                assert_ne!(sequences[i], sequences[j], "workers {i} and {j} share a stream");
            }
        }
    }

    #[test]
    fn spawn_count_matches_workers() {
        assert_eq!(SeedStream::new(1).spawn(0).len(), 0);
        assert_eq!(SeedStream::new(1).spawn(9).len(), 9);
    }

    #[test]
    fn stream_does_not_depend_on_worker_count() {
        let mut single = SeedStream::new(3).stream(2);
        let mut from_batch = SeedStream::new(3).spawn(4).remove(2);
        assert_eq!(draws(&mut single), draws(&mut from_batch));
    }
}
