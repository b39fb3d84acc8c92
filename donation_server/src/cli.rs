use std::{env, env::VarError};

/// The server takes no arguments, so any argument prints the help text and the current environment.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 20] = [
        "RUST_LOG",
        "DONATE_HOST",
        "DONATE_PORT",
        "DONATE_DATABASE_URL",
        "DONATE_USE_X_FORWARDED_FOR",
        "DONATE_USE_FORWARDED",
        "DONATE_PAYMENT_MODE",
        "DONATE_MPESA_ENVIRONMENT",
        "DONATE_MPESA_SHORTCODE",
        "DONATE_MPESA_CALLBACK_URL",
        "DONATE_MPESA_HMAC_CHECKS",
        "DONATE_MPESA_IP_WHITELIST",
        "DONATE_SETTLE_AFTER_SECS",
        "DONATE_EXPIRE_AFTER_SECS",
        "DONATE_RECONCILE_INTERVAL_SECS",
        "DONATE_MIN_DONATION",
        "DONATE_MAX_DONATION",
        "DONATE_SESSION_LIFETIME_HOURS",
        "DONATE_ADMIN_USERNAME",
        "DONATE_SEED_SAMPLE_PROJECTS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
