// Trading decision value objects
pub mod signal;
