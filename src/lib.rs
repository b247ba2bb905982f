pub mod config;
pub mod executor;
pub mod hcl;
pub mod output;
pub mod planner;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod state;
