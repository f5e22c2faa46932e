// Market data domain
pub mod price_frame;
pub mod timeframe;
