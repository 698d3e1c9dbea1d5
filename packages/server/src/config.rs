//! Controller configuration, resolved once at startup.

/// Settings shared by every compiled controller.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `SPECTREE_ENV` | (absent) | `dev` or `development` enables development mode |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Verify every handler result against the endpoint's response schema
    /// and answer 500 when it does not match. Off in production.
    pub dev_mode: bool,
}

impl ControllerConfig {
    pub fn development() -> Self {
        Self { dev_mode: true }
    }

    pub fn production() -> Self {
        Self { dev_mode: false }
    }

    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        let dev_mode = std::env::var("SPECTREE_ENV")
            .map(|v| is_dev_env(&v))
            .unwrap_or(false);
        Self { dev_mode }
    }
}

/// Whether an environment name selects development mode.
pub fn is_dev_env(name: &str) -> bool {
    matches!(name.trim().to_ascii_lowercase().as_str(), "dev" | "development")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_names() {
        assert!(is_dev_env("dev"));
        assert!(is_dev_env("Development "));
        assert!(!is_dev_env("prod"));
        assert!(!is_dev_env(""));
    }

    #[test]
    fn from_env_reads_spectree_env() {
        std::env::set_var("SPECTREE_ENV", "development");
        assert_eq!(ControllerConfig::from_env(), ControllerConfig::development());
        std::env::set_var("SPECTREE_ENV", "production");
        assert_eq!(ControllerConfig::from_env(), ControllerConfig::production());
        std::env::remove_var("SPECTREE_ENV");
        assert_eq!(ControllerConfig::from_env(), ControllerConfig::production());
    }

    #[test]
    fn default_is_production() {
        assert_eq!(ControllerConfig::default(), ControllerConfig::production());
    }
}
