//! Configuration Provider Trait

use serde::de::DeserializeOwned;

use super::ConfigResult;
use super::fhir::parse_flag;

/// Read-only key/value configuration source.
///
/// Connection settings are immutable once the process has started, so
/// providers only expose lookups.
#[async_trait::async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Get a raw configuration value
    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>>;

    /// List keys matching a prefix
    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>>;
}

/// Extension methods for typed configuration access
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a typed configuration value parsed as JSON
    fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = ConfigResult<Option<T>>> + Send
    where
        Self: Sync,
    {
        async move {
            match self.get_raw(key).await? {
                Some(raw) => {
                    let value: T = serde_json::from_str(&raw).map_err(|e| {
                        super::ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: e.to_string(),
                        }
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Get a string value as stored; blank values are reported as absent.
    fn get_string(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = ConfigResult<Option<String>>> + Send
    where
        Self: Sync,
    {
        async move {
            Ok(self
                .get_raw(key)
                .await?
                .filter(|v| !v.trim().is_empty()))
        }
    }

    /// Get a boolean flag; absent means `false`.
    fn get_flag(&self, key: &str) -> impl std::future::Future<Output = ConfigResult<bool>> + Send
    where
        Self: Sync,
    {
        async move { Ok(self.get_raw(key).await?.is_some_and(|v| parse_flag(&v))) }
    }
}

impl<P: ConfigProvider + ?Sized> ConfigProviderExt for P {}
