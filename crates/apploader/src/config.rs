use rtsync::{ThreadConfig, ThreadPriority, Ticks};

use crate::error::{LoaderError, LoaderResult};

/// Capacity of the app stack storage.
pub const APP_STACK_SIZE: usize = 32;

/// Configuration for a [`Loader`](crate::Loader).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Depth of the request queue.
    pub queue_capacity: usize,
    /// Maximum number of stacked apps, at most [`APP_STACK_SIZE`].
    pub stack_limit: usize,
    /// How long a caller waits for room in the request queue.
    pub enqueue_timeout: Ticks,
    /// How long a blocking caller waits for the reply.
    pub reply_timeout: Ticks,
    /// How long the loader waits for the display lock on show/hide.
    pub display_timeout: Ticks,
    pub thread: ThreadConfig,
    /// App started as the stack root when the loader starts.
    pub root_app: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1,
            stack_limit: APP_STACK_SIZE,
            enqueue_timeout: Ticks::FOREVER,
            reply_timeout: Ticks::FOREVER,
            display_timeout: Ticks::FOREVER,
            thread: ThreadConfig::new("loader")
                .with_priority(ThreadPriority::HIGH)
                .with_stack_size(4096),
            root_app: None,
        }
    }
}

impl LoaderConfig {
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// Rejects values the builder would have clamped.
    pub fn validate(&self) -> LoaderResult<()> {
        if self.queue_capacity == 0 {
            return Err(LoaderError::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        if !(1..=APP_STACK_SIZE).contains(&self.stack_limit) {
            return Err(LoaderError::InvalidConfig(format!(
                "stack limit {} outside 1..={APP_STACK_SIZE}",
                self.stack_limit
            )));
        }
        Ok(())
    }
}

/// Builder for [`LoaderConfig`].
#[derive(Debug, Clone, Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Limits the number of stacked apps; clamped to `1..=APP_STACK_SIZE`.
    pub fn stack_limit(mut self, limit: usize) -> Self {
        self.config.stack_limit = limit;
        self
    }

    pub fn enqueue_timeout(mut self, timeout: Ticks) -> Self {
        self.config.enqueue_timeout = timeout;
        self
    }

    pub fn reply_timeout(mut self, timeout: Ticks) -> Self {
        self.config.reply_timeout = timeout;
        self
    }

    pub fn display_timeout(mut self, timeout: Ticks) -> Self {
        self.config.display_timeout = timeout;
        self
    }

    /// Sets the loader thread's stack size and priority.
    pub fn thread(mut self, stack_size: usize, priority: ThreadPriority) -> Self {
        self.config.thread = self
            .config
            .thread
            .with_stack_size(stack_size)
            .with_priority(priority);
        self
    }

    /// Starts `id` as the stack root when the loader starts.
    pub fn root_app(mut self, id: impl Into<String>) -> Self {
        self.config.root_app = Some(id.into());
        self
    }

    pub fn build(mut self) -> LoaderConfig {
        let limit = self.config.stack_limit.clamp(1, APP_STACK_SIZE);
        if limit != self.config.stack_limit {
            log::warn!(
                target: "loader",
                "stack limit {} out of range, using {limit}",
                self.config.stack_limit
            );
            self.config.stack_limit = limit;
        }
        self.config.queue_capacity = self.config.queue_capacity.max(1);
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_settings() {
        let config = LoaderConfig::default();
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.stack_limit, APP_STACK_SIZE);
        assert!(config.reply_timeout.is_forever());
        assert_eq!(config.thread.name, "loader");
        assert!(config.root_app.is_none());
    }

    #[test]
    fn builder_clamps_limits() {
        let config = LoaderConfig::builder()
            .stack_limit(100)
            .queue_capacity(0)
            .root_app("desktop")
            .build();
        assert_eq!(config.stack_limit, APP_STACK_SIZE);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.root_app.as_deref(), Some("desktop"));

        assert_eq!(LoaderConfig::builder().stack_limit(0).build().stack_limit, 1);
    }

    #[test]
    fn hand_built_configs_are_validated() {
        assert!(LoaderConfig::default().validate().is_ok());
        assert!(LoaderConfig::builder().build().validate().is_ok());

        let empty_queue = LoaderConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            empty_queue.validate(),
            Err(LoaderError::InvalidConfig(_))
        ));

        for stack_limit in [0, APP_STACK_SIZE + 1] {
            let config = LoaderConfig {
                stack_limit,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(LoaderError::InvalidConfig(_))));
        }
    }
}
