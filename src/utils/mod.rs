//! The `utils` module provides the pieces shared across the `greenroom`
//! components: the error types returned at every seam and the logging setup.

pub mod error;
pub mod logging;
