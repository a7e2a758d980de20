use std::{
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

fn run_command<const N: usize>(command: &str, args: [&str; N]) -> Option<String> {
    let output = Command::new(command).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn git_hash() -> String {
    run_command("git", ["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into())
}

fn main() {
    let hash = git_hash();
    let unix_now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();

    println!("cargo:rustc-env=BUILD_GIT_COMMIT_HASH={hash}");
    println!("cargo:rustc-env=BUILD_TIMESTAMP={unix_now}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
