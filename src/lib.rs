pub mod cli;
pub mod config;
pub mod fetch;
pub mod names;
pub mod parser;
pub mod plot;
pub mod rankings;
pub mod ranks;
pub mod schema;
pub mod spotlight;
pub mod summary;
pub mod table;
