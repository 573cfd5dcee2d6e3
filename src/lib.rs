pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod mapping;
pub mod parsers;
pub mod reconciler;
pub mod registry;
pub mod response;
pub mod server;
pub mod store;
pub mod tools;
