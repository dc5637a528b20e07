pub mod cache;
pub mod claude;
pub mod log_gateway;
pub mod summary;
pub mod trends;
