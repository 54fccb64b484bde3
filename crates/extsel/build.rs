//! Build script for the extsel crate.
//!
//! Records the target triple this crate is compiled for, so the `cc`-based
//! compiler adapter can default to it when it runs outside of a build script
//! (where Cargo's `TARGET` variable is not set).

fn main() {
    println!("cargo::rerun-if-changed=build.rs");

    let target = std::env::var("TARGET").unwrap_or_default();
    println!("cargo::rustc-env=EXTSEL_BUILD_TARGET={target}");
}
