pub mod server;

pub mod db;
pub mod http_server;
pub mod monitoring;

pub mod alerting;
pub mod metrics;
