//! Selection cache
//!
//! Remembers every decision taken during a conversion so that re-running
//! against the same compose project reproduces the same manifest without
//! asking again.
//!
//! The cache is a JSON document stored beside the compose file. It is
//! passed by value through the resolvers: every call that records a
//! decision consumes the cache and hands back the updated one, which has
//! already been flushed to disk.
//!
//! | Section       | Key                              | Value                  |
//! |---------------|----------------------------------|------------------------|
//! | `volumes`     | `service:target` / `service:source:target` | volume decision |
//! | `ports`       | `service:mapping`                | route decision         |
//! | `push`        | `service`                        | `true` / `false`       |
//! | `images`      | original image name              | pushed tag             |
//! | `builds`      | service name                     | pushed tag             |
//! | `settings`    | `registry`                       | registry URL           |
//! | `application` | answer name                      | application answer     |

mod keys;
mod merge;
mod selection;

pub use keys::CacheKey;
pub use merge::merge_values;
pub use selection::{SelectionCache, CACHE_FILE_NAME};
