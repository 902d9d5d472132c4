pub mod connection_config;
pub mod error;
pub mod header;
pub mod payload_type;
