pub mod config;
pub mod error;
pub mod labels;
pub mod logger;
pub mod model;
pub mod recommendation;
pub mod routes;
pub mod utils;
pub mod validator;
