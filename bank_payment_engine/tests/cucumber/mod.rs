pub mod setups;
pub mod steps;

pub use bank_world::BankWorld;
