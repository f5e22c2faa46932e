pub mod binance;
pub mod core;
pub mod csv_source;
pub mod factory;
pub mod mock;
pub mod persistence;

pub use csv_source::CsvPriceSource;
pub use factory::ServiceFactory;
pub use mock::InMemoryPriceSource;
