pub mod contract;
pub mod feature_matrix;
pub mod feature_registry;
pub mod target;
