pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::{Config, StoreKind};
pub use datasource::{
    CsvPriceSource, DataSourceError, HttpBackend, LocalStore, MockBackend, PriceSource,
    TransactionStore,
};
pub use db::{init_db, Repository};
pub use domain::{
    Decimal, NewTransaction, Position, PricePoint, Side, TradeId, TradeType, TransactionRecord,
};
pub use engine::{SessionConfig, SessionError, SessionSnapshot, SessionState};
pub use error::AppError;
pub use orchestration::{TradeController, TradeError};
