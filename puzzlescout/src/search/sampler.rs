use rand::Rng;

/// Reservoir of size one.
///
/// After `n` offers every offered item has been held with probability `1/n`,
/// without knowing `n` up front and without keeping more than one item.
/// The item is built lazily, so rows that lose the draw are never
/// materialized.
#[derive(Debug)]
pub struct Reservoir<T> {
    seen: u64,
    held: Option<T>,
}

impl<T> Reservoir<T> {
    pub fn new() -> Self {
        Self {
            seen: 0,
            held: None,
        }
    }

    /// Offers one candidate. It replaces the held item iff a uniform draw in
    /// `[0, seen)` comes up `0`.
    pub fn offer_with<R, F>(&mut self, rng: &mut R, make: F)
    where
        R: Rng + ?Sized,
        F: FnOnce() -> T,
    {
        self.seen += 1;
        if rng.gen_range(0..self.seen) == 0 {
            self.held = Some(make());
        }
    }

    /// Number of candidates offered so far
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn into_inner(self) -> Option<T> {
        self.held
    }
}

impl<T> Default for Reservoir<T> {
    fn default() -> Self {
        Self::new()
    }
}
