pub mod drawdown;
pub mod error;
pub mod performance;
pub mod returns;
pub mod types;
pub mod volatility;

pub use drawdown::*;
pub use error::*;
pub use performance::*;
pub use returns::*;
pub use types::*;
pub use volatility::*;
