pub mod catalog;
pub mod config;
pub mod csv;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod server;
pub mod strategy;
