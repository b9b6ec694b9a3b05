pub mod controller;
pub mod poller;
pub mod state;

pub use controller::TimerController;
pub use poller::Poller;
pub use state::{TimerMetrics, TimerState, TimerStatus, MIN_RECORDED_SECONDS};
