pub mod concurrent_map;
pub mod descriptor;
pub mod list;
pub mod michael_hash_map;
mod tag;

pub mod ebr;
pub mod hp;
pub mod nr;

pub use self::concurrent_map::{ConcurrentMap, Reclaimer};
pub use self::descriptor::{Describe, Descriptor};
