pub mod notify;
pub mod presence;
