pub mod migrate;
pub mod user;
