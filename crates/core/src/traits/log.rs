//! Injected mission log.

/// User-facing mission narrative. Components receive one at construction
/// instead of writing to a global logger.
pub trait MissionLog: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str);

    /// Start a named phase of the mission.
    fn section(&self, title: &str);
}
