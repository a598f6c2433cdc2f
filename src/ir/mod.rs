pub mod scope;
pub mod types;
