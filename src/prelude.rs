pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::task::{from_fn, with_cleanup};
pub use crate::executor::{PanicStrategy, Runner, Strand, Task};

pub use crate::telemetry::{Metrics, MetricsSnapshot};
