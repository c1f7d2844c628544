use std::process::Command;

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let value = String::from_utf8(output.stdout).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    let pkg_version = env!("CARGO_PKG_VERSION");
    let commit = git_output(&["rev-parse", "--short=12", "HEAD"]);
    let dirty = git_output(&["status", "--porcelain"]).is_some();

    // Release tags win; otherwise the crate version is tagged with the commit.
    let version = match (git_output(&["describe", "--tags", "--exact-match"]), commit) {
        (Some(tag), _) => tag,
        (None, Some(sha)) if dirty => format!("{pkg_version}+{sha}.dirty"),
        (None, Some(sha)) => format!("{pkg_version}+{sha}"),
        (None, None) => pkg_version.to_string(),
    };

    println!("cargo:rustc-env=PRBOARD_VERSION_STRING={version}");
}
