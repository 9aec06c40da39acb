//! Exit codes for the CLI

/// Success
pub const SUCCESS: i32 = 0;

/// Any failure: configuration, authentication or a remote operation
pub const ERROR: i32 = 1;
