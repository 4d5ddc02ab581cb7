pub mod hazard;
pub mod metrics;
pub mod scheduler;
pub mod state;
pub mod system;
pub mod timeline;
