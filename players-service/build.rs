//! Build script for players-service
//!
//! Exposes `PLAYERS_BUILD_ID` to the binary, e.g.
//! `0.1.0 [1a2b3c4d] built 2025-10-26T14:30:45-05:00 (release)`.

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}

fn main() {
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let hash = git_short_hash().unwrap_or_else(|| "unknown".to_string());
    let built = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!(
        "cargo:rustc-env=PLAYERS_BUILD_ID={} [{}] built {} ({})",
        version, hash, built, profile
    );
}
