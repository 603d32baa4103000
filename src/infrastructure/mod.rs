pub mod cache;
pub mod external;
pub mod http;
pub mod observability;
pub mod persistence;
