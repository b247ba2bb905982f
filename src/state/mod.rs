pub mod backend;
pub mod models;
pub mod schema;
pub mod sqlite;
