use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Label attached to every log record the runner emits.
    pub name: String,

    /// Buffer pushes made from inside the run loop in a per-thread queue
    /// instead of taking the shared lock.
    pub local_fast_path: bool,

    pub panic_strategy: PanicStrategy,

    /// Slots reserved up front in the shared queue and in every strand
    /// queue created against the runner.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "tq-runner".to_string(),
            local_fast_path: true,
            panic_strategy: PanicStrategy::default(),
            queue_capacity: 64,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("name must not be empty"));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn local_fast_path(mut self, enable: bool) -> Self {
        self.config.local_fast_path = enable;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
