use std::path::Path;
use std::process::Command;

fn git_sha(workspace: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    let sha = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (out.status.success() && !sha.is_empty()).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-env-changed=TURNOVER_BUILD_SHA");

    // Packaged builds have no .git; they pass the SHA in.
    let sha = std::env::var("TURNOVER_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            let manifest = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into());
            git_sha(&Path::new(&manifest).join(".."))
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TURNOVER_BUILD_SHA={sha}");
}
