// marketplace/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

/// One year.
pub const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Stripe,
  Mock,
}

impl FromStr for GatewayKind {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "stripe" => Ok(GatewayKind::Stripe),
      "mock" => Ok(GatewayKind::Mock),
      other => Err(AppError::Config(format!("Unknown PAYMENT_GATEWAY '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub database_max_connections: u32,
  pub run_migrations: bool,

  pub session_secret: String,
  pub session_ttl_secs: i64,

  pub payment_gateway: GatewayKind,
  pub stripe_secret_key: Option<String>,
  pub stripe_api_base: String,
  pub stripe_webhook_secret: Option<String>,
  pub webhook_tolerance_secs: i64,

  /// Fraction of each line total kept by the platform, in `[0, 1]`.
  pub platform_commission_rate: Decimal,
  pub currency: String,
  pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_max_connections", &self.database_max_connections)
      .field("run_migrations", &self.run_migrations)
      .field("payment_gateway", &self.payment_gateway)
      .field("stripe_api_base", &self.stripe_api_base)
      .field("has_webhook_secret", &self.stripe_webhook_secret.is_some())
      .field("platform_commission_rate", &self.platform_commission_rate)
      .field("currency", &self.currency)
      .finish_non_exhaustive()
  }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from an arbitrary variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|_| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;
    let database_url = get_env("DATABASE_URL")?;
    let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &get_or("DATABASE_MAX_CONNECTIONS", "10"))?;
    let run_migrations = parse_var("RUN_MIGRATIONS", &get_or("RUN_MIGRATIONS", "true"))?;

    let session_secret = get_env("SESSION_SECRET")?;
    let session_ttl_secs: i64 = parse_var("SESSION_TTL_SECS", &get_or("SESSION_TTL_SECS", "86400"))?;
    if session_ttl_secs <= 0 || session_ttl_secs > MAX_SESSION_TTL_SECS {
      return Err(AppError::Config(format!(
        "SESSION_TTL_SECS must be between 1 and {}",
        MAX_SESSION_TTL_SECS
      )));
    }

    let stripe_secret_key = get_env("STRIPE_SECRET_KEY").ok();
    let payment_gateway = match get_env("PAYMENT_GATEWAY") {
      Ok(raw) => raw.parse::<GatewayKind>()?,
      Err(_) if stripe_secret_key.is_some() => GatewayKind::Stripe,
      Err(_) => GatewayKind::Mock,
    };
    if payment_gateway == GatewayKind::Stripe && stripe_secret_key.is_none() {
      return Err(AppError::Config("PAYMENT_GATEWAY=stripe requires STRIPE_SECRET_KEY".to_string()));
    }
    let stripe_api_base = get_or("STRIPE_API_BASE", "https://api.stripe.com").trim_end_matches('/').to_string();
    let stripe_webhook_secret = get_env("STRIPE_WEBHOOK_SECRET").ok();
    let webhook_tolerance_secs = parse_var("WEBHOOK_TOLERANCE_SECS", &get_or("WEBHOOK_TOLERANCE_SECS", "300"))?;

    let platform_commission_rate: Decimal =
      parse_var("PLATFORM_COMMISSION_RATE", &get_or("PLATFORM_COMMISSION_RATE", "0"))?;
    if platform_commission_rate < Decimal::ZERO || platform_commission_rate > Decimal::ONE {
      return Err(AppError::Config(format!(
        "PLATFORM_COMMISSION_RATE must be between 0 and 1, got {}",
        platform_commission_rate
      )));
    }
    let currency = get_or("CURRENCY", "usd").to_ascii_lowercase();
    if currency.len() != 3 {
      return Err(AppError::Config(format!("CURRENCY must be a 3-letter code, got '{}'", currency)));
    }

    let log_format = match get_or("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      "pretty" | "text" => LogFormat::Pretty,
      other => return Err(AppError::Config(format!("Unknown LOG_FORMAT '{}'", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      database_url,
      database_max_connections,
      run_migrations,
      session_secret,
      session_ttl_secs,
      payment_gateway,
      stripe_secret_key,
      stripe_api_base,
      stripe_webhook_secret,
      webhook_tolerance_secs,
      platform_commission_rate,
      currency,
      log_format,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
  }

  const REQUIRED: [(&str, &str); 2] = [("DATABASE_URL", "postgres://localhost/market"), ("SESSION_SECRET", "s3cret")];

  #[test]
  fn defaults_apply_when_only_required_vars_are_set() {
    let cfg = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
    assert_eq!(cfg.server_port, 8080);
    assert_eq!(cfg.payment_gateway, GatewayKind::Mock);
    assert_eq!(cfg.platform_commission_rate, Decimal::ZERO);
    assert_eq!(cfg.currency, "usd");
    assert_eq!(cfg.stripe_api_base, "https://api.stripe.com");
    assert!(cfg.stripe_webhook_secret.is_none());
  }

  #[test]
  fn stripe_key_selects_the_stripe_gateway() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("STRIPE_SECRET_KEY", "sk_test_123"));
    pairs.push(("PLATFORM_COMMISSION_RATE", "0.10"));
    let cfg = AppConfig::from_lookup(lookup(&pairs)).unwrap();
    assert_eq!(cfg.payment_gateway, GatewayKind::Stripe);
    assert_eq!(cfg.platform_commission_rate, dec!(0.10));
  }

  #[test]
  fn missing_database_url_is_a_config_error() {
    let err = AppConfig::from_lookup(lookup(&[("SESSION_SECRET", "x")])).unwrap_err();
    assert!(matches!(err, AppError::Config(m) if m.contains("DATABASE_URL")));
  }

  #[test]
  fn commission_rate_outside_unit_interval_is_rejected() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("PLATFORM_COMMISSION_RATE", "1.5"));
    assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
  }

  #[test]
  fn stripe_gateway_without_key_is_rejected() {
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("PAYMENT_GATEWAY", "stripe"));
    assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
  }

  #[test]
  fn session_ttl_must_be_positive_and_bounded() {
    for ttl in ["0", "31536001", "9223372036854775807"] {
      let mut pairs = REQUIRED.to_vec();
      pairs.push(("SESSION_TTL_SECS", ttl));
      assert!(AppConfig::from_lookup(lookup(&pairs)).is_err(), "{ttl}");
    }
    let mut pairs = REQUIRED.to_vec();
    pairs.push(("SESSION_TTL_SECS", "31536000"));
    assert_eq!(AppConfig::from_lookup(lookup(&pairs)).unwrap().session_ttl_secs, MAX_SESSION_TTL_SECS);
  }
}
