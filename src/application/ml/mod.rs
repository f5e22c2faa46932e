pub mod evaluation;
pub mod gradient_boosting;
pub mod model_trainer;
pub mod predictor;
