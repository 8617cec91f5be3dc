#![forbid(unsafe_code)]

pub mod app;
pub mod assemble;
pub mod cli;
pub mod formats;
pub mod logging;
pub mod map;
pub mod outline;
pub mod report;
pub mod settings;
pub mod snapshot;
pub mod store;
