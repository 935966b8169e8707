use std::process::Command;

// `echo` stands in for gh so the rewritten arguments can be inspected.
fn gh_post(args: &[&str]) -> String {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_gh-post"))
        .args(args)
        .current_dir(dir.path())
        .env("GH_POST_GH_BIN", "echo")
        .env("AI_PROJECT", "proj")
        .env("AI_ROLE", "WORKER")
        .env("AI_ITERATION", "3")
        .env_remove("AI_SESSION")
        .output()
        .expect("run gh-post");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn tags_issue_create() {
    let out = gh_post(&[
        "issue",
        "create",
        "--title",
        "[old][W]2 Broken build",
        "--body",
        "Details",
    ]);
    assert!(out.contains("[proj] Broken build"));
    assert!(out.contains("**FROM:** proj [WORKER]3"));
    assert!(out.contains("proj | WORKER #3 | - |"));
}

#[test]
fn passes_other_commands_through() {
    let out = gh_post(&["repo", "view", "--json", "name"]);
    assert_eq!(out.trim(), "repo view --json name");
}

#[test]
fn exit_code_follows_gh() {
    let output = Command::new(env!("CARGO_BIN_EXE_gh-post"))
        .args(["issue", "list"])
        .env("GH_POST_GH_BIN", "false")
        .output()
        .expect("run gh-post");
    assert_eq!(output.status.code(), Some(1));
}
