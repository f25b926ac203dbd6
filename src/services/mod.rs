pub mod dashboard;
pub mod poller;
pub mod sessions;
pub mod trip_api;
