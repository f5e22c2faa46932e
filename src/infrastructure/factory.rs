use crate::config::{DataConfig, DataSourceKind};
use crate::domain::ports::PriceSource;
use crate::infrastructure::binance::BinancePriceSource;
use crate::infrastructure::csv_source::CsvPriceSource;
use std::sync::Arc;
use tracing::info;

pub struct ServiceFactory;

impl ServiceFactory {
    pub fn create_price_source(config: &DataConfig) -> Arc<dyn PriceSource> {
        match config.source {
            DataSourceKind::Binance => {
                info!("Price source: Binance at {}", config.binance_base_url);
                Arc::new(BinancePriceSource::new(config.binance_base_url.clone()))
            }
            DataSourceKind::Csv => {
                info!("Price source: CSV files under {:?}", config.csv_data_dir);
                Arc::new(CsvPriceSource::new(config.csv_data_dir.clone()))
            }
        }
    }
}
