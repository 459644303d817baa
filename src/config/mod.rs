pub mod cli;
pub mod map;
