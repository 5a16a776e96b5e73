pub mod board;
pub mod policy;
pub mod record;
