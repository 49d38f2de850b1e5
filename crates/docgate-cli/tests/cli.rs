use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn docgate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docgate"))
}

fn docgate(args: &[&str], cwd: &Path) -> Output {
    Command::new(docgate_bin())
        .args(args)
        .current_dir(cwd)
        .env_remove("DOCGATE_CONFIG")
        .env_remove("DOCGATE_UPDATE_EXPECTED")
        .env("RUST_LOG", "off")
        .output()
        .expect("run docgate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const SOURCE: &str = "---\nname: plan\ndescription: Plan a session\nallowed-tools: Read, Write\n---\n\n# Plan\n\n## Overview\n\nProse.\n\n## Usage\n";

const REFERENCE: &str = "---\nname: plan\ndescription: Plan a session\nallowed-tools: Read, Write, Bash\n---\n\n## Overview\n## Usage\n## Execution Process\n## Error Handling\n";

fn write_corpus(root: &Path) {
    fs::create_dir_all(root.join(".claude/commands/workflow")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::create_dir_all(root.join("tooling/src")).unwrap();
    fs::write(root.join(".claude/commands/workflow/plan.md"), SOURCE).unwrap();
    fs::write(root.join("docs/plan.md"), REFERENCE).unwrap();
    fs::write(
        root.join("tooling/src/registry.ts"),
        "register('/workflow:plan', runPlan);\n",
    )
    .unwrap();
}

#[test]
fn gap_report_without_required_args_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let output = docgate(&["gap-report", "--spec", "spec.json"], dir.path());
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("--outline"), "{}", err);
    assert!(err.contains("Usage"), "{}", err);
}

#[test]
fn derive_render_and_gap_report() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_corpus(root);

    let derive = docgate(
        &["derive-spec", "--source", ".claude/commands/workflow/plan.md", "--out", "out/spec.json"],
        root,
    );
    assert!(derive.status.success(), "{}", stderr(&derive));
    let spec = fs::read_to_string(root.join("out/spec.json")).unwrap();
    assert!(spec.contains("\"group\": \"workflow\""));
    assert!(!spec.contains("Prose."));

    let render = docgate(
        &["render-outline", "--spec", "out/spec.json", "--out", "out/outline.md"],
        root,
    );
    assert!(render.status.success(), "{}", stderr(&render));
    let outline = fs::read_to_string(root.join("out/outline.md")).unwrap();
    assert!(outline.contains("## Error Handling"));

    let gap = docgate(
        &[
            "gap-report",
            "--spec",
            "out/spec.json",
            "--outline",
            "out/outline.md",
            "--reference",
            "docs/plan.md",
            "--tooling-manifest",
            "tooling",
            "--out",
            "out/gap-report.md",
        ],
        root,
    );
    assert!(gap.status.success(), "{}", stderr(&gap));
    let report = fs::read_to_string(root.join("out/gap-report.md")).unwrap();
    assert!(report.contains("tool `Bash` is declared by the reference"));
    assert!(report.contains("`src/registry.ts`"));

    // The seeded evidence table still carries placeholders.
    let verify = docgate(&["verify-evidence", "out/gap-report.md"], root);
    assert_eq!(verify.status.code(), Some(1));
    assert!(stdout(&verify).contains("evidence violation(s)"));
}

#[test]
fn verify_evidence_passes_on_grounded_rows() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_corpus(root);
    fs::write(
        root.join("report.md"),
        "| Pointer | Status | Evidence | Verify | Notes |\n\
         |---|---|---|---|---|\n\
         | `tooling/src/registry.ts` | Existing | docs: `docs/plan.md` / Usage<br>ts: `tooling/src/registry.ts` / `'/workflow:plan'` | `npm test` | |\n\
         | `tooling/src/later.ts` | Planned | docs: `docs/plan.md` / Overview<br>ts: `tooling/src/later.ts` / laterFn | `npm test later` | |\n",
    )
    .unwrap();

    let output = docgate(&["verify-evidence", "report.md"], root);
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).contains("PASS report.md (2 row(s))"));
}

#[test]
fn verify_evidence_reports_every_violation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_corpus(root);
    fs::write(
        root.join("report.md"),
        "| Pointer | Status | Evidence | Verify | Notes |\n\
         |---|---|---|---|---|\n\
         | `src/gone.ts` | Existing | docs: `docs/plan.md` / Missing Heading<br>ts: `tooling/src/registry.ts` / runPlan | run | |\n",
    )
    .unwrap();

    let output = docgate(&["verify-evidence", "report.md", "--root", "."], root);
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("FAIL report.md: 2 violation(s)"), "{}", out);
    assert!(out.contains("`src/gone.ts` does not exist"));
    assert!(out.contains("heading `Missing Heading` not found"));
}

#[test]
fn snapshot_bootstraps_then_blocks_then_accepts() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("current.md"), "v1\n").unwrap();
    let args = [
        "snapshot",
        "--expected",
        "snap/expected.md",
        "--current",
        "current.md",
        "--diff",
        "snap/diff.txt",
    ];

    let first = docgate(&args, root);
    assert!(first.status.success(), "{}", stderr(&first));
    assert!(stdout(&first).contains("\"initialized\":true"));

    fs::write(root.join("current.md"), "v2\n").unwrap();
    let blocked = docgate(&args, root);
    assert_eq!(blocked.status.code(), Some(1));
    assert!(root.join("snap/diff.txt").exists());
    assert_eq!(fs::read_to_string(root.join("snap/expected.md")).unwrap(), "v1\n");

    let accepted = Command::new(docgate_bin())
        .args(args)
        .current_dir(root)
        .env("DOCGATE_UPDATE_EXPECTED", "1")
        .env("RUST_LOG", "off")
        .output()
        .unwrap();
    assert!(accepted.status.success(), "{}", stderr(&accepted));
    assert!(stdout(&accepted).contains("\"updated_expected\":true"));
    assert_eq!(fs::read_to_string(root.join("snap/expected.md")).unwrap(), "v2\n");

    let settled = docgate(&args, root);
    assert!(settled.status.success());
    assert!(stdout(&settled).contains("\"changed\":false"));
}

#[test]
fn cycle_runs_all_units() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_corpus(root);
    fs::write(
        root.join("plan.yaml"),
        "cycle: c1\nout_root: out\ntooling_manifest: tooling\nunits:\n  - id: workflow:plan\n    source: .claude/commands/workflow/plan.md\n    reference: docs/plan.md\n",
    )
    .unwrap();

    let first = docgate(&["cycle", "plan.yaml"], root);
    assert!(first.status.success(), "{}", stderr(&first));
    assert!(root.join("out/workflow-plan/expected.md").exists());
    assert!(root.join("out/workflow-plan/cycles/c1/spec.json").exists());

    let second = docgate(&["cycle", "plan.yaml"], root);
    assert!(second.status.success(), "{}", stderr(&second));
}

#[test]
fn bad_config_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("docgate.yaml"), "hint_limit: 0\n").unwrap();
    let output = docgate(&["--config", "docgate.yaml", "verify-evidence", "x.md"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("hint_limit"));
}
