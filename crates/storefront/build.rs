//! Build script for the storefront crate.
//!
//! Fingerprints static assets so they can be served with immutable cache
//! headers. Each asset is copied to `static/derived/` with the first eight
//! hex digits of its SHA-256 in the file name, and the digest is exposed to
//! the crate as a compile-time environment variable.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

/// (source path under `static/`, file stem, extension, env var)
const ASSETS: &[(&str, &str, &str, &str)] = &[
    ("css/main.css", "main", "css", "CSS_HASH"),
    ("js/app.js", "app", "js", "JS_HASH"),
];

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");
    let derived_dir = static_dir.join("derived");

    for (source, stem, ext, var) in ASSETS {
        fingerprint(&static_dir.join(source), &derived_dir, stem, ext, var);
    }
}

fn fingerprint(source: &Path, derived_dir: &Path, stem: &str, ext: &str, var: &str) {
    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", source.display());
            println!("cargo:rustc-env={var}=");
            return;
        }
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short_hash = &digest[..8];
    println!("cargo:rustc-env={var}={short_hash}");

    fs::create_dir_all(derived_dir).expect("Failed to create derived asset directory");
    let target = derived_dir.join(format!("{stem}.{short_hash}.{ext}"));
    fs::write(&target, &content).expect("Failed to write fingerprinted asset");
}
