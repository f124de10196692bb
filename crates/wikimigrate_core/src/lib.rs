pub mod config;
pub mod elapsed;
pub mod graphql;
pub mod migrate;
pub mod sanitize;
