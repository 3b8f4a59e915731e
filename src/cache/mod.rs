//! Result cache for refinement runs.
//!
//! A bounded LRU keyed on (task, input, model, temperature) with a fixed
//! time to live. The cache is an explicit object handed to the engine; tests
//! drive expiry through [`ManualClock`].

mod clock;
mod lru;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::lru::{CacheStats, CachedResult, RefinementCache, SharedCache, DEFAULT_TTL};
