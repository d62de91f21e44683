//! Tutor core library: Messenger webhook gateway, duplicate suppression, solve pipeline,
//! inference client, and paced reply delivery. Used by the CLI.

pub mod channels;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod dispatch;
pub mod gateway;
pub mod llm;
pub mod solve;
