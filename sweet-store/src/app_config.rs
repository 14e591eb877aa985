use serde::Deserialize;
use std::env;

/// Service configuration.
///
/// Every external credential is optional here. A missing processor key,
/// database URL or webhook secret is reported when a request needs it,
/// not when the process starts.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mock_payments: MockPaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_seconds: i64,
    /// How long an unfinished webhook claim blocks the provider's retry.
    #[serde(default = "default_claim_lease")]
    pub webhook_claim_lease_seconds: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: default_stripe_api_base(),
            signature_tolerance_seconds: default_signature_tolerance(),
            webhook_claim_lease_seconds: default_claim_lease(),
        }
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "********"))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "********"))
            .field("api_base", &self.api_base)
            .field("signature_tolerance_seconds", &self.signature_tolerance_seconds)
            .field("webhook_claim_lease_seconds", &self.webhook_claim_lease_seconds)
            .finish()
    }
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_claim_lease() -> u64 {
    120
}

#[derive(Deserialize, Clone, Default)]
pub struct InventoryConfig {
    /// Endpoint of the hosted inventory function.
    pub function_url: Option<String>,
    pub service_key: Option<String>,
}

impl std::fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("function_url", &self.function_url)
            .field("service_key", &self.service_key.as_ref().map(|_| "********"))
            .finish()
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "********"))
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MockPaymentConfig {
    #[serde(default = "default_mock_latency")]
    pub latency_ms: u64,
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

impl Default for MockPaymentConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_mock_latency(),
            success_rate: default_success_rate(),
        }
    }
}

fn default_mock_latency() -> u64 {
    2000
}

fn default_success_rate() -> f64 {
    0.9
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `SWEET__STRIPE__SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("SWEET").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
