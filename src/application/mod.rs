pub mod bootstrap;
pub mod commands;
