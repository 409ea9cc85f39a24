pub mod config;
pub mod skill;
