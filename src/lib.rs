pub mod config;
pub mod messages;
pub mod mixer;
pub mod motor;
pub mod runtime;
