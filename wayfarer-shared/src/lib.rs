pub mod currency;
pub mod pii;

pub use currency::{CurrencyCode, CurrencyError};
pub use pii::Masked;
