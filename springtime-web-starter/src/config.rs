//! Framework configuration is based on injecting a [WebServerConfigProvider], which can later be
//! used to retrieve [WebServerConfig], and an [ApplicationPropertiesProvider] giving access to raw
//! [ApplicationProperties] used when evaluating route conditions.
//!
//! By default, both are read from the `springtime.json` file and environment variables prefixed
//! with `SPRINGTIME_`, where `_` separates nested keys (e.g. `SPRINGTIME_WEB_SERVER_PORT` sets
//! `web.server.port`). Server configuration lives under the `web.server` key:
//!
//! | key                     | default |
//! |-------------------------|---------|
//! | `web.server.enable`     | `true`  |
//! | `web.server.port`       | `8080`  |
//! | `web.server.ssl.enable` | `false` |
//! | `web.server.ssl.port`   | `8443`  |
//! | `web.server.ssl.cert`   | empty   |
//! | `web.server.ssl.key`    | empty   |
//!
//! Active profiles are read from the `profiles.active` key, either as a list or a comma-separated
//! string.

use config::{Config, ConfigError, Environment, File, Value};
use serde::Deserialize;
use springtime::config::CONFIG_FILE;
use springtime_di::component_registry::conditional::unregistered_component;
use springtime_di::future::{BoxFuture, FutureExt};
use springtime_di::instance_provider::ErrorPtr;
use springtime_di::{component_alias, injectable, Component};
use std::sync::Arc;

const CONFIG_ENV_PREFIX: &str = "SPRINGTIME";

/// Key holding active profiles.
pub const ACTIVE_PROFILES_KEY: &str = "profiles.active";

/// Web server configuration.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WebServerConfig {
    /// Should the HTTP server be started.
    pub enable_http: bool,
    /// HTTP port.
    pub port: u16,
    /// Should HTTPS be enabled.
    pub enable_https: bool,
    /// HTTPS port.
    pub ssl_port: u16,
    /// Path to the certificate.
    pub ssl_cert: String,
    /// Path to the private key.
    pub ssl_key: String,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            enable_http: true,
            port: 8080,
            enable_https: false,
            ssl_port: 8443,
            ssl_cert: String::new(),
            ssl_key: String::new(),
        }
    }
}

impl From<OptionalServerConfig> for WebServerConfig {
    fn from(value: OptionalServerConfig) -> Self {
        let default = Self::default();
        let ssl = value.ssl.unwrap_or_default();
        Self {
            enable_http: value.enable.unwrap_or(default.enable_http),
            port: value.port.unwrap_or(default.port),
            enable_https: ssl.enable.unwrap_or(default.enable_https),
            ssl_port: ssl.port.unwrap_or(default.ssl_port),
            ssl_cert: ssl.cert.unwrap_or(default.ssl_cert),
            ssl_key: ssl.key.unwrap_or(default.ssl_key),
        }
    }
}

impl WebServerConfig {
    /// Reads the configuration from given source, using defaults for missing values.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config
            .clone()
            .try_deserialize::<OptionalWebConfigWrapper>()
            .map(|config| {
                config
                    .web
                    .and_then(|config| config.server)
                    .map(|config| config.into())
                    .unwrap_or_default()
            })
    }
}

/// Raw key-value application properties.
#[derive(Clone, Debug, Default)]
pub struct ApplicationProperties {
    config: Config,
    active_profiles: Vec<String>,
}

impl ApplicationProperties {
    pub fn new(config: Config) -> Self {
        let active_profiles = config
            .get::<Vec<String>>(ACTIVE_PROFILES_KEY)
            .or_else(|_| {
                config.get_string(ACTIVE_PROFILES_KEY).map(|profiles| {
                    profiles
                        .split(',')
                        .map(|profile| profile.trim().to_string())
                        .filter(|profile| !profile.is_empty())
                        .collect()
                })
            })
            .unwrap_or_default();

        Self {
            config,
            active_profiles,
        }
    }

    /// Loads properties from the default config file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("_")
                    .try_parsing(true),
            )
            .build()
            .map(Self::new)
    }

    /// Returns a property as a string. Missing properties and tables are reported as `None`.
    pub fn property(&self, name: &str) -> Option<String> {
        self.config.get_string(name).ok()
    }

    /// Checks if a property is present, either as a value or as a table of nested properties.
    pub fn has_property(&self, name: &str) -> bool {
        self.config.get::<Value>(name).is_ok()
    }

    pub fn active_profiles(&self) -> &[String] {
        &self.active_profiles
    }

    pub fn is_profile_active(&self, profile: &str) -> bool {
        self.active_profiles.iter().any(|active| active == profile)
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Provider for [WebServerConfig]. The primary instance of the provider will be used to retrieve
/// web server configuration.
#[injectable]
pub trait WebServerConfigProvider {
    fn config(&self) -> BoxFuture<'_, Result<&WebServerConfig, ErrorPtr>>;
}

/// Provider for [ApplicationProperties]. The primary instance of the provider will be used to
/// evaluate route conditions.
#[injectable]
pub trait ApplicationPropertiesProvider {
    fn properties(&self) -> BoxFuture<'_, Result<&ApplicationProperties, ErrorPtr>>;
}

#[derive(Component)]
#[component(priority = -128, condition = "unregistered_component::<dyn WebServerConfigProvider + Send + Sync>", constructor = "DefaultWebServerConfigProvider::new")]
struct DefaultWebServerConfigProvider {
    // cached init result
    #[component(ignore)]
    config: Result<WebServerConfig, ErrorPtr>,
}

#[component_alias]
impl WebServerConfigProvider for DefaultWebServerConfigProvider {
    fn config(&self) -> BoxFuture<'_, Result<&WebServerConfig, ErrorPtr>> {
        async {
            match &self.config {
                Ok(config) => Ok(config),
                Err(error) => Err(error.clone()),
            }
        }
        .boxed()
    }
}

impl DefaultWebServerConfigProvider {
    fn new() -> BoxFuture<'static, Result<Self, ErrorPtr>> {
        async {
            Ok(Self {
                config: ApplicationProperties::load()
                    .and_then(|properties| WebServerConfig::from_config(properties.config()))
                    .map_err(|error| Arc::new(error) as ErrorPtr),
            })
        }
        .boxed()
    }
}

#[derive(Component)]
#[component(priority = -128, condition = "unregistered_component::<dyn ApplicationPropertiesProvider + Send + Sync>", constructor = "DefaultApplicationPropertiesProvider::new")]
struct DefaultApplicationPropertiesProvider {
    #[component(ignore)]
    properties: Result<ApplicationProperties, ErrorPtr>,
}

#[component_alias]
impl ApplicationPropertiesProvider for DefaultApplicationPropertiesProvider {
    fn properties(&self) -> BoxFuture<'_, Result<&ApplicationProperties, ErrorPtr>> {
        async {
            match &self.properties {
                Ok(properties) => Ok(properties),
                Err(error) => Err(error.clone()),
            }
        }
        .boxed()
    }
}

impl DefaultApplicationPropertiesProvider {
    fn new() -> BoxFuture<'static, Result<Self, ErrorPtr>> {
        async {
            Ok(Self {
                properties: ApplicationProperties::load()
                    .map_err(|error| Arc::new(error) as ErrorPtr),
            })
        }
        .boxed()
    }
}

#[derive(Default, Deserialize)]
struct OptionalSslConfig {
    enable: Option<bool>,
    port: Option<u16>,
    cert: Option<String>,
    key: Option<String>,
}

#[derive(Deserialize)]
struct OptionalServerConfig {
    enable: Option<bool>,
    port: Option<u16>,
    ssl: Option<OptionalSslConfig>,
}

#[derive(Deserialize)]
struct OptionalWebConfig {
    server: Option<OptionalServerConfig>,
}

#[derive(Deserialize)]
struct OptionalWebConfigWrapper {
    web: Option<OptionalWebConfig>,
}
