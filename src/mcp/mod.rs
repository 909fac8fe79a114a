pub mod adapter;
pub mod catalog;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
