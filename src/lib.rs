pub mod error;
pub mod matrix;
pub mod quota;
pub mod resolver;
pub mod service;
pub mod store;
pub mod utils;
pub mod worklog;
