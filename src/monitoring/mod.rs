pub mod prober;
pub mod scheduler;

pub use prober::{HttpProber, Prober};
pub use scheduler::{ProcessError, Scheduler, TickReport};
