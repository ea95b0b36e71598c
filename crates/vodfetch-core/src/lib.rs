pub mod config;
pub mod logging;

pub mod control;
pub mod dates;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod session;
pub mod worker;
