//! Explicit binding of typed settings to configuration keys.

use std::sync::Arc;

use crate::store::cache::ConfigCache;
use crate::store::client::ConfigClient;
use crate::store::value::FromConfigValue;

#[derive(Debug, Clone)]
enum Binding<T> {
    /// Read live from the cache kept current by a watch.
    Watched(Arc<ConfigCache>),
    /// Resolved once at bind time.
    Fixed(T),
}

/// A typed setting bound to one key.
#[derive(Debug, Clone)]
pub struct Setting<T> {
    key: String,
    default: T,
    binding: Binding<T>,
}

impl<T: FromConfigValue> Setting<T> {
    /// Current value. O(1) for watched settings, no remote fetch.
    pub fn get(&self) -> T {
        match &self.binding {
            Binding::Watched(cache) => cache
                .get(&self.key)
                .and_then(|v| T::from_value(&v))
                .unwrap_or_else(|| self.default.clone()),
            Binding::Fixed(value) => value.clone(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_watched(&self) -> bool {
        matches!(self.binding, Binding::Watched(_))
    }
}

/// Binds settings under a common key prefix.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    client: Arc<ConfigClient>,
    prefix: String,
}

impl ConfigBundle {
    pub fn new(client: Arc<ConfigClient>, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.trim_end_matches('.').to_string(),
        }
    }

    fn key(&self, field: &str) -> String {
        if self.prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", self.prefix, field)
        }
    }

    /// A bundle for the table under `field`.
    pub fn nested(&self, field: &str) -> ConfigBundle {
        ConfigBundle {
            client: Arc::clone(&self.client),
            prefix: self.key(field),
        }
    }

    /// A setting that follows changes to its key.
    pub async fn watched<T: FromConfigValue>(&self, field: &str, default: T) -> Setting<T> {
        let key = self.key(field);
        self.client.watch(&key).await;
        Setting {
            key,
            default,
            binding: Binding::Watched(Arc::clone(self.client.cache())),
        }
    }

    /// A setting read once now and never updated.
    pub async fn fixed<T: FromConfigValue>(&self, field: &str, default: T) -> Setting<T> {
        let key = self.key(field);
        let value = self
            .client
            .get(&key)
            .await
            .and_then(|v| T::from_value(&v))
            .unwrap_or_else(|| default.clone());
        Setting {
            key,
            default,
            binding: Binding::Fixed(value),
        }
    }
}

/// Runtime settings of the sample service, bound under `rest-config`.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub maintenance: Setting<bool>,
    pub string_property: Setting<String>,
    pub boolean_property: Setting<bool>,
    pub integer_property: Setting<i64>,
    pub object_property: ObjectProperty,
}

#[derive(Debug, Clone)]
pub struct ObjectProperty {
    pub sub_property: Setting<String>,
    pub sub_property_2: Setting<String>,
}

impl RestConfig {
    pub const PREFIX: &'static str = "rest-config";

    pub async fn bind(client: Arc<ConfigClient>) -> Self {
        let bundle = ConfigBundle::new(client, Self::PREFIX);
        let object = bundle.nested("object-property");
        Self {
            maintenance: bundle.watched("maintenance", false).await,
            string_property: bundle.watched("string-property", String::new()).await,
            boolean_property: bundle.fixed("boolean-property", false).await,
            integer_property: bundle.fixed("integer-property", 0i64).await,
            object_property: ObjectProperty {
                sub_property: object.watched("sub-property", String::new()).await,
                sub_property_2: object.fixed("sub-property-2", String::new()).await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::store::memory::MemorySource;
    use crate::store::source::ConfigSource;
    use std::time::Duration;

    fn client(source: Arc<MemorySource>) -> Arc<ConfigClient> {
        let sources: Vec<Arc<dyn ConfigSource>> = vec![source as Arc<dyn ConfigSource>];
        Arc::new(ConfigClient::new(sources, Duration::from_millis(100), Shutdown::new()))
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let config = RestConfig::bind(client(Arc::new(MemorySource::new()))).await;
        assert!(!config.maintenance.get());
        assert_eq!(config.string_property.get(), "");
        assert_eq!(config.integer_property.get(), 0);
        assert!(config.maintenance.is_watched());
        assert!(!config.integer_property.is_watched());
        assert_eq!(config.maintenance.key(), "rest-config.maintenance");
        assert_eq!(
            config.object_property.sub_property.key(),
            "rest-config.object-property.sub-property"
        );
    }

    #[tokio::test]
    async fn test_watched_follows_fixed_does_not() {
        let source = Arc::new(MemorySource::new());
        source.set("rest-config.string-property", "before");
        source.set("rest-config.integer-property", 5i64);
        let config = RestConfig::bind(client(source.clone())).await;

        assert_eq!(config.string_property.get(), "before");
        assert_eq!(config.integer_property.get(), 5);

        source.set("rest-config.string-property", "after");
        source.set("rest-config.integer-property", 6i64);
        for _ in 0..50 {
            if config.string_property.get() == "after" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(config.string_property.get(), "after");
        assert_eq!(config.integer_property.get(), 5);
    }

    #[tokio::test]
    async fn test_unparseable_value_uses_default() {
        let source = Arc::new(MemorySource::new());
        source.set("rest-config.maintenance", "sometimes");
        let config = RestConfig::bind(client(source)).await;
        assert!(!config.maintenance.get());
    }
}
