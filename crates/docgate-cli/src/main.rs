//! docgate: deterministic verification for generated command docs.

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use docgate_core::{
    derive_spec, enforce_gate, run_cycle, CommandSpec, EvidenceVerifier, GapAnalyzer,
    GateRequest, HarnessConfig, OutlineEnrichment, OutlineRenderer, ReportContext,
    ToolingManifest,
};

#[derive(Parser)]
#[command(name = "docgate")]
#[command(about = "Spec, outline, gap, snapshot and evidence gates for command docs")]
#[command(version)]
struct Cli {
    /// Harness configuration (YAML); defaults apply when omitted
    #[arg(long, global = true, env = "DOCGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a command spec from a source document
    DeriveSpec {
        #[arg(long)]
        source: PathBuf,

        /// Spec JSON to write
        #[arg(long)]
        out: PathBuf,
    },

    /// Render an outline skeleton from a spec
    RenderOutline {
        #[arg(long)]
        spec: PathBuf,

        #[arg(long)]
        out: PathBuf,

        /// Optional per-section content (YAML)
        #[arg(long)]
        enrichment: Option<PathBuf>,
    },

    /// Compare an outline against its reference and write a gap report
    GapReport {
        #[arg(long)]
        spec: PathBuf,

        /// Candidate artifact
        #[arg(long)]
        outline: PathBuf,

        #[arg(long)]
        reference: PathBuf,

        /// Directory or JSON index of tooling sources
        #[arg(long)]
        tooling_manifest: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Verify evidence tables; exits non-zero on any violation
    VerifyEvidence {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory evidence paths resolve against
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Gate a current artifact against its expected baseline
    Snapshot {
        #[arg(long)]
        expected: PathBuf,

        #[arg(long)]
        current: PathBuf,

        #[arg(long)]
        diff: PathBuf,

        /// Accept a divergent current artifact as the new baseline
        #[arg(
            long,
            env = "DOCGATE_UPDATE_EXPECTED",
            action = ArgAction::SetTrue,
            value_parser = FalseyValueParser::new()
        )]
        update_expected: bool,
    },

    /// Run derive, render, gap and snapshot for every unit in a plan
    Cycle {
        plan: PathBuf,

        #[arg(
            long,
            env = "DOCGATE_UPDATE_EXPECTED",
            action = ArgAction::SetTrue,
            value_parser = FalseyValueParser::new()
        )]
        update_expected: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docgate=info,docgate_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config =
        HarnessConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::DeriveSpec { source, out } => cmd_derive_spec(&config, &source, &out),
        Commands::RenderOutline {
            spec,
            out,
            enrichment,
        } => cmd_render_outline(&config, &spec, &out, enrichment.as_deref()),
        Commands::GapReport {
            spec,
            outline,
            reference,
            tooling_manifest,
            out,
        } => cmd_gap_report(&config, &spec, &outline, &reference, &tooling_manifest, &out),
        Commands::VerifyEvidence { files, root } => cmd_verify_evidence(&config, &files, &root),
        Commands::Snapshot {
            expected,
            current,
            diff,
            update_expected,
        } => cmd_snapshot(
            &config,
            GateRequest {
                expected_path: expected,
                current_path: current,
                diff_path: diff,
                update_expected,
            },
        ),
        Commands::Cycle {
            plan,
            update_expected,
        } => cmd_cycle(&config, &plan, update_expected),
    }
}

fn cmd_derive_spec(config: &HarnessConfig, source: &Path, out: &Path) -> Result<ExitCode> {
    let spec = derive_spec(source, config)?;
    spec.write_json_file(out)?;
    tracing::info!(
        source = %source.display(),
        out = %out.display(),
        command = %spec.command.invocation(),
        "Spec derived"
    );
    println!("{}", out.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_render_outline(
    config: &HarnessConfig,
    spec_path: &Path,
    out: &Path,
    enrichment: Option<&Path>,
) -> Result<ExitCode> {
    let spec = CommandSpec::from_json_file(spec_path)?;
    let enrichment = enrichment.map(OutlineEnrichment::from_yaml_file).transpose()?;
    let outline = OutlineRenderer::new(config).render(&spec, enrichment.as_ref());
    write_output(out, &outline)?;
    println!("{}", out.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_gap_report(
    config: &HarnessConfig,
    spec_path: &Path,
    outline: &Path,
    reference: &Path,
    tooling_manifest: &Path,
    out: &Path,
) -> Result<ExitCode> {
    let spec = CommandSpec::from_json_file(spec_path)?;
    let candidate = fs::read_to_string(outline)
        .with_context(|| format!("Failed to read outline {}", outline.display()))?;
    let reference_text = fs::read_to_string(reference)
        .with_context(|| format!("Failed to read reference {}", reference.display()))?;
    let manifest = ToolingManifest::load(tooling_manifest)?;

    let report = GapAnalyzer::new(config).analyze(&candidate, &reference_text, &spec, &manifest);
    let rendered = report.render_markdown(
        &spec,
        &ReportContext {
            candidate_path: outline.display().to_string(),
            reference_path: reference.display().to_string(),
        },
        config,
    );
    write_output(out, &rendered)?;

    println!(
        "{}: {} P0, {} P1, {} hint(s)",
        out.display(),
        report.p0.len(),
        report.p1.len(),
        report.implementation_hints.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify_evidence(
    config: &HarnessConfig,
    files: &[PathBuf],
    root: &Path,
) -> Result<ExitCode> {
    let verifier = EvidenceVerifier::new(root, config);
    let mut violations = 0usize;

    for file in files {
        match verifier.verify_file(file) {
            Ok(verdict) if verdict.passed() => {
                println!("PASS {} ({} row(s))", file.display(), verdict.rows_checked);
            }
            Ok(verdict) => {
                println!("FAIL {}: {} violation(s)", file.display(), verdict.issues.len());
                for issue in &verdict.issues {
                    println!("  - {}", issue);
                }
                violations += verdict.issues.len();
            }
            Err(e) => {
                println!("FAIL {}: {}", file.display(), e);
                violations += 1;
            }
        }
    }

    if violations == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} evidence violation(s) in {} file(s)", violations, files.len());
        Ok(ExitCode::from(1))
    }
}

fn cmd_snapshot(config: &HarnessConfig, request: GateRequest) -> Result<ExitCode> {
    let outcome = enforce_gate(&request, &config.diff_tool)?;
    println!("{}", serde_json::to_string(&outcome)?);
    if outcome.is_regression() {
        eprintln!(
            "Snapshot changed: see {} (rerun with --update-expected to accept)",
            request.diff_path.display()
        );
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_cycle(config: &HarnessConfig, plan: &Path, update_expected: bool) -> Result<ExitCode> {
    let summary = run_cycle(plan, config, update_expected)
        .with_context(|| format!("Cycle {} could not start", plan.display()))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}
