pub mod fleet;
pub mod notify;
pub mod provision;
