pub mod error;
pub mod throttle;
pub mod traits;
pub mod types;

pub use error::*;
pub use throttle::RateLimiter;
pub use traits::*;
pub use types::*;
