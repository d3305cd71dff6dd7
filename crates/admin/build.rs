//! Build script for the admin crate.
//!
//! Copies `static/css/main.css` to `static/derived/main.<hash>.css`, where
//! `<hash>` is the first eight hex digits of its SHA-256, and exposes the
//! hash as `CSS_HASH` so templates can reference the fingerprinted file.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");
    let source = static_dir.join("css/main.css");

    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(&source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", source.display());
            println!("cargo:rustc-env=CSS_HASH=");
            return;
        }
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short_hash = &digest[..8];
    println!("cargo:rustc-env=CSS_HASH={short_hash}");

    let derived_dir = static_dir.join("derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");
    fs::write(derived_dir.join(format!("main.{short_hash}.css")), &content)
        .expect("Failed to write fingerprinted stylesheet");
}
