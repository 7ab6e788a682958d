use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("missionctl").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("WORKSPACE_SLUG")
            .env("RUST_LOG", "warn")
            .arg("--database")
            .arg(self.dir.path().join("board.db"));
        cmd
    }

    fn in_workspace(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.env("WORKSPACE_SLUG", "acme-corp");
        cmd
    }
}

#[test]
fn no_subcommand_shows_getting_started() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("missionctl workspace create"));
}

#[test]
fn workspace_scoped_commands_need_a_workspace() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["tasks", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No workspace selected"));
}

#[test]
fn board_round_trip_through_the_cli() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["workspace", "create", "Acme Corp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme-corp"));

    sandbox
        .in_workspace()
        .args(["agent", "upsert", "--name", "Alice", "--role", "Backend", "--level", "SPC"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered agent Alice"));

    let output = sandbox
        .in_workspace()
        .args(["--json", "task", "create", "Build API", "--priority", "high"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let task: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "inbox");

    sandbox
        .in_workspace()
        .args(["task", "assign", &task_id, "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("assigned").and(predicate::str::contains("Alice")));

    sandbox
        .in_workspace()
        .args(["message", "post", &task_id, "@alice can you take a look?"])
        .assert()
        .success();

    sandbox
        .in_workspace()
        .args(["notifications", "list", "Alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mentioned you on"));

    sandbox
        .in_workspace()
        .args(["run", "enqueue", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Queued run"));

    sandbox
        .in_workspace()
        .args(["run", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1"));

    sandbox
        .in_workspace()
        .args(["feed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task created: Build API"));
}

#[test]
fn leaving_done_is_rejected() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["workspace", "create", "Acme Corp"])
        .assert()
        .success();

    let output = sandbox
        .in_workspace()
        .args(["--json", "task", "create", "Finished", "--status", "done"])
        .output()
        .unwrap();
    let task: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let task_id = task["id"].as_str().unwrap().to_string();

    sandbox
        .in_workspace()
        .args(["task", "status", &task_id, "review"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Policy violation"));
}
