use std::process::{Command, Output};

/// Run git in the crate root; `None` when git is missing or the call fails.
fn git(args: &[&str]) -> Option<Output> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
}

fn main() {
    // Version string follows HEAD and tags
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let hash = git(&["rev-parse", "--short", "HEAD"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();
    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rustc-env=ON_RELEASE_TAG={on_tag}");
}
