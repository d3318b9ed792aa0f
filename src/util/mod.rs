//! # Utility Modules
//!
//! Small helpers shared by the daemon and the tools.

pub mod logging;

pub use logging::{LogThrottle, ThrottleManager};
