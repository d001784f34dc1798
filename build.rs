use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let Some(target_dir) = target_dir() else {
        return;
    };

    // The bot resolves templates and config relative to its executable
    copy_templates(&target_dir);
    copy_config(&target_dir);
}

/// Returns target/<profile>, derived from OUT_DIR (target/<profile>/build/<pkg-hash>/out).
fn target_dir() -> Option<PathBuf> {
    let out_dir = env::var("OUT_DIR").ok()?;
    Path::new(&out_dir).ancestors().nth(3).map(Path::to_path_buf)
}

/// Copies the digit template folder next to the executable.
fn copy_templates(target_dir: &Path) {
    let template_src = Path::new("resources/templates");
    let template_dst = target_dir.join("resources").join("templates");

    if template_src.exists() {
        copy_dir_recursive(template_src, &template_dst);
        println!("cargo:rerun-if-changed=resources/templates/");
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) {
    let _ = fs::create_dir_all(dst);

    if let Ok(entries) = fs::read_dir(src) {
        for entry in entries.flatten() {
            let src_path = entry.path();
            let Some(file_name) = src_path.file_name() else {
                continue;
            };
            let dst_path = dst.join(file_name);

            if src_path.is_dir() {
                copy_dir_recursive(&src_path, &dst_path);
            } else {
                let _ = fs::copy(&src_path, &dst_path);
            }
        }
    }
}

/// Copies config.json next to the executable.
fn copy_config(target_dir: &Path) {
    let config_src = Path::new("config.json");

    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
