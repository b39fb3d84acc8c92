use std::{env, fmt::Display, net::IpAddr, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use donate_common::{parse_boolean_flag, Kes, Secret};
use donation_engine::{
    db_url,
    donation_objects::{DonationFlowConfig, ReconciliationConfig},
    helpers::DonationLimits,
};
use log::*;
use mpesa_tools::MpesaConfig;

const DEFAULT_DONATE_HOST: &str = "127.0.0.1";
const DEFAULT_DONATE_PORT: u16 = 8360;
const DEFAULT_SESSION_LIFETIME: Duration = Duration::hours(24);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Which payment provider handles push payments. Chosen once, here.
    pub payment_mode: PaymentMode,
    pub mpesa: MpesaConfig,
    pub callback: CallbackConfig,
    pub reconciliation: ReconciliationConfig,
    /// Used when the donation limit settings are missing or unreadable.
    pub fallback_limits: DonationLimits,
    pub session_lifetime: Duration,
    /// If supplied, this admin account is created at start-up when no admin exists yet.
    pub bootstrap_admin: Option<AdminBootstrap>,
    pub seed_sample_projects: bool,
}

/// Protection for the `/mpesa` callback endpoints.
#[derive(Clone, Debug, Default)]
pub struct CallbackConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
    /// If supplied, callbacks are only accepted from these addresses.
    /// To explicitly disable the whitelist, set DONATE_MPESA_IP_WHITELIST to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

#[derive(Clone, Debug)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaymentMode {
    Live,
    #[default]
    Simulated,
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "simulated" | "simulation" => Ok(Self::Simulated),
            other => Err(format!("'{other}' is not a payment mode. Use 'live' or 'simulated'")),
        }
    }
}

impl Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Simulated => f.write_str("simulated"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DONATE_HOST.to_string(),
            port: DEFAULT_DONATE_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            payment_mode: PaymentMode::default(),
            mpesa: MpesaConfig::default(),
            callback: CallbackConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            fallback_limits: DonationLimits::default(),
            session_lifetime: DEFAULT_SESSION_LIFETIME,
            bootstrap_admin: None,
            seed_sample_projects: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DONATE_HOST").ok().unwrap_or_else(|| DEFAULT_DONATE_HOST.into());
        let port = env::var("DONATE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DONATE_PORT. {e} Using the default, {DEFAULT_DONATE_PORT}, \
                         instead."
                    );
                    DEFAULT_DONATE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DONATE_PORT);
        let database_url = db_url();
        let use_x_forwarded_for = parse_boolean_flag(env::var("DONATE_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("DONATE_USE_FORWARDED").ok(), false);
        let payment_mode = env::var("DONATE_PAYMENT_MODE")
            .map_err(|_| {
                warn!("🪛️ DONATE_PAYMENT_MODE is not set. Donations will be settled by the simulated provider.")
            })
            .and_then(|s| s.parse::<PaymentMode>().map_err(|e| warn!("🪛️ {e}. Using the simulated provider.")))
            .ok()
            .unwrap_or_default();
        let mpesa = MpesaConfig::new_from_env_or_default();
        let callback = CallbackConfig::from_env_or_defaults();
        let reconciliation = configure_reconciliation();
        let fallback_limits = configure_donation_limits();
        let session_lifetime = env_number::<i64>("DONATE_SESSION_LIFETIME_HOURS")
            .filter(|h| *h > 0)
            .map(Duration::hours)
            .unwrap_or(DEFAULT_SESSION_LIFETIME);
        let bootstrap_admin = AdminBootstrap::from_env();
        let seed_sample_projects = parse_boolean_flag(env::var("DONATE_SEED_SAMPLE_PROJECTS").ok(), false);
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            payment_mode,
            mpesa,
            callback,
            reconciliation,
            fallback_limits,
            session_lifetime,
            bootstrap_admin,
            seed_sample_projects,
        }
    }

    pub fn donation_flow_config(&self) -> DonationFlowConfig {
        DonationFlowConfig { reconciliation: self.reconciliation, fallback_limits: self.fallback_limits }
    }
}

impl CallbackConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("DONATE_MPESA_CALLBACK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ DONATE_MPESA_CALLBACK_SECRET is not set. Please set it to the shared secret used to sign M-Pesa \
                 callbacks."
            );
            String::default()
        });
        let hmac_secret = Secret::new(hmac_secret);
        let hmac_checks = parse_boolean_flag(env::var("DONATE_MPESA_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Callback signature checks are disabled. Anyone can settle donations via /mpesa/callback.");
        }
        let whitelist = env::var("DONATE_MPESA_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The M-Pesa IP whitelist was configured, but is empty.  The server will run, but won't \
                     accept any payment callbacks."
                );
            },
            None => {
                info!("🪛️ No M-Pesa IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ M-Pesa IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret, hmac_checks, whitelist }
    }
}

fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ M-Pesa IP whitelist is disabled. If this is not what you want, set DONATE_MPESA_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in DONATE_MPESA_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

impl AdminBootstrap {
    pub fn from_env() -> Option<Self> {
        let username = env::var("DONATE_ADMIN_USERNAME").ok();
        let password = env::var("DONATE_ADMIN_PASSWORD").ok();
        match (username, password) {
            (Some(username), Some(password)) => {
                let email = env::var("DONATE_ADMIN_EMAIL").unwrap_or_else(|_| format!("{username}@localhost"));
                Some(Self { username, email, password: Secret::new(password) })
            },
            (Some(_), None) | (None, Some(_)) => {
                warn!("🪛️ Both DONATE_ADMIN_USERNAME and DONATE_ADMIN_PASSWORD must be set to create an admin account.");
                None
            },
            (None, None) => None,
        }
    }
}

fn env_number<T: FromStr>(name: &str) -> Option<T>
where T::Err: Display {
    let value = env::var(name).ok()?;
    value.trim().parse::<T>().map_err(|e| warn!("🪛️ Invalid configuration value for {name} ({value}). {e}")).ok()
}

fn configure_reconciliation() -> ReconciliationConfig {
    let defaults = ReconciliationConfig::default();
    let secs = |name: &str, default: StdDuration| {
        env_number::<u64>(name).filter(|s| *s > 0).map(StdDuration::from_secs).unwrap_or_else(|| {
            debug!("🪛️ {name} is not set. Using the default value of {}s.", default.as_secs());
            default
        })
    };
    let settle_after = secs("DONATE_SETTLE_AFTER_SECS", defaults.settle_after);
    let expire_after = secs("DONATE_EXPIRE_AFTER_SECS", defaults.expire_after);
    let poll_interval = secs("DONATE_RECONCILE_INTERVAL_SECS", defaults.poll_interval);
    if expire_after <= settle_after {
        warn!(
            "🪛️ DONATE_EXPIRE_AFTER_SECS ({}s) must be longer than DONATE_SETTLE_AFTER_SECS ({}s). Using the default \
             reconciliation timings.",
            expire_after.as_secs(),
            settle_after.as_secs()
        );
        return defaults;
    }
    ReconciliationConfig { settle_after, expire_after, poll_interval, ..defaults }
}

fn configure_donation_limits() -> DonationLimits {
    let defaults = DonationLimits::default();
    let minimum = env_number::<i64>("DONATE_MIN_DONATION").map(Kes::from).unwrap_or(defaults.minimum);
    let maximum = env_number::<i64>("DONATE_MAX_DONATION").map(Kes::from).unwrap_or(defaults.maximum);
    let limits = DonationLimits::new(minimum, maximum);
    if limits.is_consistent() {
        limits
    } else {
        warn!("🪛️ Donation limits {minimum} .. {maximum} make no sense. Using {} .. {}", defaults.minimum, defaults.maximum);
        defaults
    }
}
