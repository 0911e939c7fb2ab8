//! Build script for reel-mpv.
//!
//! libmpv is loaded at runtime, so this only forwards a configured library
//! location into the build for diagnostics.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=MPV_PATH");
    println!("cargo:rerun-if-env-changed=MPV_ROOT");

    let mpv_path = env::var("MPV_PATH")
        .or_else(|_| env::var("MPV_ROOT"))
        .ok()
        .map(PathBuf::from);

    if let Some(ref path) = mpv_path {
        let lib_dir = if path.is_file() {
            path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| path.clone())
        } else {
            path.clone()
        };
        println!("cargo:rustc-env=MPV_LIBRARY_PATH={}", lib_dir.display());
    }

    // Note: we never link libmpv directly; libloading resolves it at runtime.
}
