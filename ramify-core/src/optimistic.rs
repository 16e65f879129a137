use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::warn;

use crate::error::RepositoryError;

/// Prefix reserved for ids of locally created, not yet confirmed messages.
pub const OPTIMISTIC_PREFIX: &str = "__optimistic__";

/// Returns true if `id` was produced by the optimistic id allocator.
pub fn is_optimistic_id(id: &str) -> bool {
    id.starts_with(OPTIMISTIC_PREFIX)
}

/// Source of id suffixes for optimistic messages.
///
/// Implemented for closures, which keeps tests deterministic:
///
/// ```
/// use ramify_core::IdGenerator;
///
/// let mut counter = 0;
/// let mut sequence = move |_len: usize| {
///     counter += 1;
///     format!("{counter}")
/// };
/// assert_eq!(sequence.generate(7), "1");
/// assert_eq!(sequence.generate(7), "2");
/// ```
pub trait IdGenerator {
    /// Returns a fresh suffix of roughly `len` characters.
    fn generate(&mut self, len: usize) -> String;
}

impl<F: FnMut(usize) -> String> IdGenerator for F {
    fn generate(&mut self, len: usize) -> String {
        self(len)
    }
}

/// Generates random alphanumeric suffixes from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&mut self, len: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

/// Hands out prefixed ids that do not collide with any id already in use.
pub(crate) struct OptimisticIdAllocator {
    generator: Box<dyn IdGenerator + Send + Sync>,
    length: usize,
    max_attempts: usize,
}

impl OptimisticIdAllocator {
    pub fn new(
        generator: Box<dyn IdGenerator + Send + Sync>,
        length: usize,
        max_attempts: usize,
    ) -> Self {
        OptimisticIdAllocator {
            generator,
            length,
            max_attempts,
        }
    }

    pub fn set_generator(&mut self, generator: Box<dyn IdGenerator + Send + Sync>) {
        self.generator = generator;
    }

    /// Generates ids until `taken` rejects one.
    pub fn allocate(&mut self, taken: impl Fn(&str) -> bool) -> Result<String, RepositoryError> {
        for attempt in 1..=self.max_attempts {
            let id = format!("{OPTIMISTIC_PREFIX}{}", self.generator.generate(self.length));
            if !taken(&id) {
                return Ok(id);
            }
            warn!(%id, attempt, "optimistic id collision, retrying");
        }
        Err(RepositoryError::OptimisticIdExhausted(self.max_attempts))
    }
}

impl std::fmt::Debug for OptimisticIdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticIdAllocator")
            .field("length", &self.length)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
