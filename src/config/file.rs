//! JSON file Configuration Provider
//!
//! Reads settings files such as `appsettings.json`. Nested objects are
//! addressed with dot notation (`fhir_service.url`); non-string values are
//! returned in their JSON form, so `true` reads as `"true"`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;

use super::ConfigResult;
use super::provider::ConfigProvider;

/// File-based configuration provider, loaded once on first access.
pub struct FileConfigProvider {
    path: PathBuf,
    data: OnceCell<HashMap<String, serde_json::Value>>,
}

impl FileConfigProvider {
    /// Create a new file provider
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: OnceCell::new(),
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ConfigResult<HashMap<String, serde_json::Value>> {
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::debug!(path = %self.path.display(), "Settings file not found, treating as empty");
            return Ok(HashMap::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn data(&self) -> ConfigResult<&HashMap<String, serde_json::Value>> {
        self.data.get_or_try_init(|| self.load()).await
    }
}

#[async_trait::async_trait]
impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        let map = self.data().await?;

        let value = map.get(key).or_else(|| {
            let mut parts = key.split('.');
            let first = map.get(parts.next()?)?;
            parts.try_fold(first, |current, part| current.get(part))
        });

        Ok(match value {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(v) => Some(v.to_string()),
        })
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let map = self.data().await?;
        Ok(map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("loaded", &self.data.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_provider_reads_flat_and_nested_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("appsettings.json");

        let config = serde_json::json!({
            "url": "https://fhir.example.com",
            "use_client_credentials": true,
            "fhir_service": {
                "authority": "https://login.example.com/tenant"
            },
            "client_secret": null
        });
        tokio::fs::write(&config_path, config.to_string())
            .await
            .unwrap();

        let provider = FileConfigProvider::new(config_path);

        assert_eq!(
            provider.get_raw("url").await.unwrap(),
            Some("https://fhir.example.com".to_string())
        );
        assert_eq!(
            provider.get_raw("use_client_credentials").await.unwrap(),
            Some("true".to_string())
        );
        assert_eq!(
            provider.get_raw("fhir_service.authority").await.unwrap(),
            Some("https://login.example.com/tenant".to_string())
        );
        assert_eq!(provider.get_raw("client_secret").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_provider_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileConfigProvider::new(temp_dir.path().join("missing.json"));

        assert_eq!(provider.get_raw("url").await.unwrap(), None);
        assert!(provider.list_keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_provider_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.json");
        tokio::fs::write(&config_path, "{ not json").await.unwrap();

        let provider = FileConfigProvider::new(config_path);
        assert!(provider.get_raw("url").await.is_err());
    }
}
