pub mod agents;
pub mod containers_list;
pub mod cron;
pub mod health;
pub mod live_ws;
pub mod metrics;
pub mod sessions;
pub mod status;
