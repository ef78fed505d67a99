pub mod lease;
pub mod message;
pub mod seat;
pub mod validate;
