use std::process::Command;

/// Expose the build commit as `SALESCAST_GIT_COMMIT` for `/version` and `salescast --version`.
fn main() {
    println!("cargo:rerun-if-env-changed=SALESCAST_GIT_COMMIT");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    let from_env = std::env::var("SALESCAST_GIT_COMMIT")
        .ok()
        .map(|sha| sha.trim().to_string())
        .filter(|sha| !sha.is_empty());

    let commit = from_env.or_else(|| {
        let output = Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!sha.is_empty()).then_some(sha)
    });

    if let Some(sha) = commit {
        println!("cargo:rustc-env=SALESCAST_GIT_COMMIT={sha}");
    }
}
