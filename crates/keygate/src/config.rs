use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use keygate_provision::ProvisionConfig;

pub const ENV_PREFIX: &str = "KEYGATE_";

/// Defaults, then the TOML file (if present), then `KEYGATE_*` variables. Nested keys
/// use `__`, e.g. `KEYGATE_BUNDLE__PRIMARY_URL`.
pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(ProvisionConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn load(path: &Path) -> anyhow::Result<ProvisionConfig> {
    let config: ProvisionConfig = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "keygate.toml",
                r#"
                    authority_url = "https://auth.test/isValid/"
                    launch_artifact = "bin/app"

                    [bundle]
                    primary_url = "https://cdn.test/bundle.zip"
                    backup_url = "https://mirror.test/bundle.zip"

                    [transfer]
                    min_file_size = 2048
                "#,
            )?;
            jail.set_env("KEYGATE_BUNDLE__BACKUP_URL", "https://other.test/bundle.zip");
            jail.set_env("KEYGATE_CONFLICT_RETRIES", "5");

            let config = load(Path::new("keygate.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.bundle.primary_url, "https://cdn.test/bundle.zip");
            assert_eq!(config.bundle.backup_url, "https://other.test/bundle.zip");
            assert_eq!(config.conflict_retries, 5);
            assert_eq!(config.transfer.min_file_size, 2048);
            assert_eq!(config.transfer.max_redirects, 10);
            assert_eq!(config.launch_artifact.as_deref(), Some(Path::new("bin/app")));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_| {
            let config: ProvisionConfig = figment(Path::new("absent.toml")).extract()?;
            assert_eq!(config, ProvisionConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_incomplete_config_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("keygate.toml", r#"authority_url = "https://auth.test/""#)?;
            let err = load(Path::new("keygate.toml")).unwrap_err();
            assert!(err.to_string().contains("bundle.primary_url"), "{err}");
            Ok(())
        });
    }
}
