pub mod health;
pub mod logs;
pub mod summary;
pub mod trends;
