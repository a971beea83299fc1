use std::time::Duration;

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 50;

/// Default time a lock request may wait before it is treated as a deadlock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 500;

/// Capacity of the disk scheduler's request channel
pub const DISK_REQUEST_QUEUE_DEPTH: usize = 128;

/// Tunables for an access manager and the pool/lock table underneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Size of every page in bytes
    pub page_size: usize,
    /// Number of frames in the buffer pool
    pub buffer_pool_size: usize,
    /// Bounded wait for a lock request before it aborts with a deadlock error
    pub lock_timeout: Duration,
    /// Force policy: flush dirty pages synchronously at commit
    pub force: bool,
}

impl StorageConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_size(mut self, buffer_pool_size: usize) -> Self {
        self.buffer_pool_size = buffer_pool_size;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            force: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.buffer_pool_size, DEFAULT_BUFFER_POOL_SIZE);
        assert!(config.force);
    }

    #[test]
    fn test_config_builder() {
        let config = StorageConfig::default()
            .with_page_size(512)
            .with_buffer_pool_size(4)
            .with_lock_timeout(Duration::from_millis(20))
            .with_force(false);

        assert_eq!(config.page_size, 512);
        assert_eq!(config.buffer_pool_size, 4);
        assert_eq!(config.lock_timeout, Duration::from_millis(20));
        assert!(!config.force);
    }
}
