//! Billing configuration

/// Usage queue configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Jobs buffered before new ones are dropped
    pub usage_queue_capacity: usize,
    /// Workers draining the queue
    pub usage_workers: usize,
}

impl BillingConfig {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
    pub const DEFAULT_WORKERS: usize = 2;

    /// Create a config with default queue settings
    pub fn new() -> Self {
        Self {
            usage_queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            usage_workers: Self::DEFAULT_WORKERS,
        }
    }

    /// Set the queue capacity (at least 1)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.usage_queue_capacity = capacity.max(1);
        self
    }

    /// Set the worker count (at least 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.usage_workers = workers.max(1);
        self
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self::new()
    }
}
