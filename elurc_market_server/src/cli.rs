use std::{env, env::VarError};

/// The server takes no arguments. If any are given, print the help text and the current configuration, and return
/// `true` so that the caller can exit.
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
    // Secrets (ELURC_ADMIN_API_KEY, ELURC_WEBHOOK_HMAC_SECRET) are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "ELURC_HOST",
        "ELURC_PORT",
        "ELURC_DATABASE_URL",
        "ELURC_WEBHOOK_HMAC_CHECKS",
        "ELURC_VERIFIER_IP_WHITELIST",
        "ELURC_USE_X_FORWARDED_FOR",
        "ELURC_USE_FORWARDED",
        "ELURC_PAYMENT_TIMEOUT",
        "ELURC_UNDERPAYMENT_TOLERANCE",
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
