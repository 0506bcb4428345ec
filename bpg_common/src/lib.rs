pub mod helpers;
mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
