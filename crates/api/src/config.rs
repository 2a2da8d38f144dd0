//! Process configuration from environment variables.

use std::net::SocketAddr;

use rust_decimal::Decimal;
use thiserror::Error;

use storefront_core::Money;
use storefront_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Shipping charged on every order unless a code waives it.
    pub flat_shipping: Money,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            flat_shipping: Money::ZERO,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.trim().parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR",
                message: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => defaults.jwt_secret,
        };

        let flat_shipping = match lookup("SHOP_FLAT_SHIPPING") {
            Some(raw) => {
                let value: Decimal = raw.trim().parse().map_err(|e: rust_decimal::Error| ConfigError::Invalid {
                    key: "SHOP_FLAT_SHIPPING",
                    message: e.to_string(),
                })?;
                if value.is_sign_negative() {
                    return Err(ConfigError::Invalid {
                        key: "SHOP_FLAT_SHIPPING",
                        message: "must not be negative".to_string(),
                    });
                }
                value
            }
            None => defaults.flat_shipping,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|e: storefront_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    message: e.to_string(),
                }
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            flat_shipping,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn unset_variables_take_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.flat_shipping, Money::ZERO);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.uses_dev_secret());
    }

    #[test]
    fn reads_every_setting() {
        let cfg = load(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "prod"),
            ("SHOP_FLAT_SHIPPING", "4.95"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.jwt_secret, "prod");
        assert_eq!(cfg.flat_shipping, Decimal::new(495, 2));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(load(&[("BIND_ADDR", "nowhere")]), Err(ConfigError::Invalid { key: "BIND_ADDR", .. })));
        assert!(load(&[("SHOP_FLAT_SHIPPING", "cheap")]).is_err());
        assert!(load(&[("SHOP_FLAT_SHIPPING", "-1")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
