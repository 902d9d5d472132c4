mod timer;

pub use timer::{PeriodicTimer, Timer};
