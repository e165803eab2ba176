//! Build script for bpimport
//!
//! Bumps the persistent build counter and exposes build metadata to the crate.

use std::fs;
use std::path::Path;

const BUILD_NUMBER_FILE: &str = "build_number.txt";

fn read_build_number(path: &Path) -> u64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

fn main() {
    println!("cargo:rerun-if-changed=src");

    let path = Path::new(BUILD_NUMBER_FILE);
    let build_number = read_build_number(path) + 1;

    if let Err(e) = fs::write(path, build_number.to_string()) {
        println!("cargo:warning=could not update {}: {}", BUILD_NUMBER_FILE, e);
    }

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

    println!("cargo:rustc-env=BPIMPORT_BUILD_NUMBER={}", build_number);
    println!("cargo:rustc-env=BPIMPORT_BUILD_TIMESTAMP={}", timestamp);
}
