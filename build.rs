//! Stamps the binary with the commit it was built from.
//!
//! `GIT_HASH` is the short commit hash, with `-dirty` appended when the
//! working tree has uncommitted changes. Container builds have no `.git`;
//! they pass the hash in `PHOTOFOLIO_BUILD_HASH` instead. `ON_RELEASE_TAG`
//! is `true` when HEAD carries a tag.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=PHOTOFOLIO_BUILD_HASH");

    let hash = match std::env::var("PHOTOFOLIO_BUILD_HASH") {
        Ok(hash) if !hash.trim().is_empty() => hash.trim().to_string(),
        _ => {
            let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_default();
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|status| !status.is_empty());
            if dirty && !hash.is_empty() {
                format!("{hash}-dirty")
            } else {
                hash
            }
        }
    };
    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rustc-env=ON_RELEASE_TAG={on_tag}");
}
