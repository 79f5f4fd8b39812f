pub mod config;
pub mod error;
pub mod ir;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod records;
pub mod table;
pub mod textio;
pub mod throttle;
pub mod tree;
