//! Rebuild when the embedded default config changes.

fn main() {
    println!("cargo:rerun-if-changed=resources/config.json");
}
