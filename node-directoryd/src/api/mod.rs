pub mod query;
pub mod routes;
