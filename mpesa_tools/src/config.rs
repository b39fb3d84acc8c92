use std::{fmt::Display, str::FromStr};

use donate_common::Secret;
use log::*;

const SANDBOX_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_URL: &str = "https://api.safaricom.co.ke";
const SANDBOX_SHORTCODE: &str = "174379";
const SANDBOX_PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_URL,
            Self::Production => PRODUCTION_URL,
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "live" => Ok(Self::Production),
            other => Err(format!("Unknown M-Pesa environment: {other}")),
        }
    }
}

impl Display for MpesaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => f.write_str("sandbox"),
            Self::Production => f.write_str("production"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    pub consumer_key: Secret<String>,
    pub consumer_secret: Secret<String>,
    /// The paybill / till number that receives the funds
    pub shortcode: String,
    pub passkey: Secret<String>,
    /// Public URL that Safaricom will POST the STK callback to
    pub callback_url: String,
    /// Overrides the environment's base URL. Only useful for pointing the client at a stub server.
    pub base_url: Option<String>,
}

impl MpesaConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = std::env::var("DONATE_MPESA_ENVIRONMENT")
            .ok()
            .and_then(|s| {
                s.parse::<MpesaEnvironment>()
                    .map_err(|e| warn!("🪛️ {e}. Falling back to the sandbox environment"))
                    .ok()
            })
            .unwrap_or_default();
        let consumer_key = Secret::new(std::env::var("DONATE_MPESA_CONSUMER_KEY").unwrap_or_else(|_| {
            warn!("🪛️ DONATE_MPESA_CONSUMER_KEY not set. Live M-Pesa calls will fail to authenticate");
            String::default()
        }));
        let consumer_secret = Secret::new(std::env::var("DONATE_MPESA_CONSUMER_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ DONATE_MPESA_CONSUMER_SECRET not set. Live M-Pesa calls will fail to authenticate");
            String::default()
        }));
        let shortcode = std::env::var("DONATE_MPESA_SHORTCODE").unwrap_or_else(|_| {
            info!("🪛️ DONATE_MPESA_SHORTCODE not set, using the sandbox shortcode {SANDBOX_SHORTCODE}");
            SANDBOX_SHORTCODE.to_string()
        });
        let passkey = Secret::new(std::env::var("DONATE_MPESA_PASSKEY").unwrap_or_else(|_| {
            info!("🪛️ DONATE_MPESA_PASSKEY not set, using the sandbox passkey");
            SANDBOX_PASSKEY.to_string()
        }));
        let callback_url = std::env::var("DONATE_MPESA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("🪛️ DONATE_MPESA_CALLBACK_URL not set. Safaricom will not be able to reach the callback endpoint");
            "http://localhost:8360/mpesa/callback".to_string()
        });
        let base_url = std::env::var("DONATE_MPESA_BASE_URL").ok();
        if environment == MpesaEnvironment::Production && shortcode == SANDBOX_SHORTCODE {
            warn!("🪛️ Production M-Pesa environment is configured with the sandbox shortcode");
        }
        Self { environment, consumer_key, consumer_secret, shortcode, passkey, callback_url, base_url }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.environment.base_url())
    }
}
