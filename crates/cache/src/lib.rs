#![warn(clippy::unwrap_used)]

pub mod clock;
pub mod local;
pub mod request;

pub use clock::{Clock, ManualClock, SystemClock};
pub use local::{CacheEntry, RequestCache};
pub use request::{build_key, HttpMethod};
