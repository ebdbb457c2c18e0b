use std::env;
use std::fs;
use std::path::Path;

/// Copies the workspace `config.toml` next to the built binary, where
/// `shared::config::load_config` looks for it.
fn main() {
    println!("cargo:rerun-if-changed=../../config.toml");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let profile = env::var("PROFILE").expect("PROFILE is set by cargo");

    // OUT_DIR looks like target/<profile>/build/backend-<hash>/out
    let Some(target_dir) = Path::new(&out_dir)
        .ancestors()
        .find(|p| p.ends_with(&profile))
    else {
        println!("cargo:warning=target profile directory not found, config.toml not copied");
        return;
    };

    let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("backend crate lives two levels below the workspace root");
    let source_config = workspace_root.join("config.toml");

    if source_config.exists() {
        let dest_config = target_dir.join("config.toml");
        if let Err(e) = fs::copy(&source_config, &dest_config) {
            println!("cargo:warning=failed to copy config.toml: {}", e);
        }
    } else {
        println!("cargo:warning=no config.toml at {:?}, the embedded default applies", source_config);
    }
}
