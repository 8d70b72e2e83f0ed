//! Store configuration.

/// Configuration for opening a store.
///
/// Durability and creation policy are store-wide; individual tables do
/// not carry their own tuning knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether a writable open creates the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether table flushes fsync before commit returns (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether commits fsync table snapshots.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_commit);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new().create_if_missing(false).sync_on_commit(false);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
    }
}
