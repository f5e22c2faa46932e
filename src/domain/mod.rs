// Market data domain
pub mod market;

// Feature, target and contract types
pub mod ml;

// Port interfaces
pub mod ports;

// Trading decisions
pub mod trading;

// Domain-specific error types
pub mod errors;
