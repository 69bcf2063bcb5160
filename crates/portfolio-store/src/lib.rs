pub mod db;
pub mod models;
pub mod store;

pub use db::PortfolioDb;
pub use models::*;
pub use store::PortfolioStore;
