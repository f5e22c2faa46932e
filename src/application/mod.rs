// Feature engineering
pub mod features;

// Rolling statistics shared by the feature stages
pub mod market_data;

// Model training, evaluation and prediction
pub mod ml;

// End-to-end runs
pub mod pipeline;
