//! xmlforge - learn an XML transformation from example pairs
//!
//! ## Commands
//!
//! - `run`: submit a job and follow it to the end
//! - `test`: score an xform program against pairs in the local sandbox
//! - `check`: load an xform program without running it
//! - `compare`: structural diff of two XML documents
//! - `config`: print the effective configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, Level};

use xmlforge_core::feedback;
use xmlforge_core::{
    compare, pairs_from_lists, CandidateCode, DocumentPair, ForgeConfig, JobOptions, JobService,
    JobStatus, Orchestrator, SandboxEngine,
};

#[derive(Parser)]
#[command(name = "xmlforge")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Example-driven XML transformation learner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "XMLFORGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a transformation and print the finished job as JSON
    Run {
        #[command(flatten)]
        pairs: PairArgs,

        /// Maximum analyze/generate/test cycles
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Accuracy needed to stop early (0 < t <= 1)
        #[arg(long)]
        threshold: Option<f64>,

        /// Write the final candidate program here
        #[arg(long)]
        candidate_out: Option<PathBuf>,

        /// Progress polling interval in milliseconds
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },

    /// Score an xform program against example pairs
    Test {
        /// Candidate program file
        #[arg(long)]
        candidate: PathBuf,

        #[command(flatten)]
        pairs: PairArgs,

        /// Language tag of the candidate
        #[arg(long, default_value = xmlforge_core::domain::DEFAULT_LANGUAGE)]
        language: String,

        /// Accuracy below which feedback is printed and the command fails
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Load an xform program and report whether it would run
    Check {
        /// Candidate program file
        candidate: PathBuf,

        /// Language tag of the candidate
        #[arg(long, default_value = xmlforge_core::domain::DEFAULT_LANGUAGE)]
        language: String,
    },

    /// Compare two XML documents, ignoring namespaces
    Compare {
        /// Expected document
        expected: PathBuf,

        /// Actual document
        actual: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Where example pairs come from.
#[derive(Args, Debug, Clone, Default)]
struct PairArgs {
    /// JSON file: a list of {input_xml, output_xml, pair_id?} or {"xml_pairs": [...]}
    #[arg(long, conflicts_with_all = ["input", "output"])]
    pairs: Option<PathBuf>,

    /// Input XML file (repeat; matched by position with --output)
    #[arg(long)]
    input: Vec<PathBuf>,

    /// Expected output XML file (repeat)
    #[arg(long)]
    output: Vec<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PairsFile {
    Wrapped { xml_pairs: Vec<DocumentPair> },
    Bare(Vec<DocumentPair>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ForgeConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level()
    };
    xmlforge_core::init_tracing(cli.json || config.logging.json, level);
    config.warn_unknown_log_level();

    match cli.command {
        Commands::Run {
            pairs,
            max_iterations,
            threshold,
            candidate_out,
            poll_ms,
        } => {
            let options = JobOptions {
                max_iterations: max_iterations.unwrap_or(config.job.max_iterations),
                accuracy_threshold: threshold.unwrap_or(config.job.accuracy_threshold),
            };
            cmd_run(
                &config,
                &pairs,
                options,
                candidate_out.as_deref(),
                Duration::from_millis(poll_ms.max(10)),
            )
            .await
        }
        Commands::Test {
            candidate,
            pairs,
            language,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(config.job.accuracy_threshold);
            cmd_test(&config, &candidate, &pairs, &language, threshold).await
        }
        Commands::Check {
            candidate,
            language,
        } => cmd_check(&config, &candidate, &language).await,
        Commands::Compare { expected, actual } => cmd_compare(&expected, &actual),
        Commands::Config => cmd_config(&config),
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Collect example pairs from a JSON file or from matched input/output files.
fn load_pairs(args: &PairArgs) -> Result<Vec<DocumentPair>> {
    if let Some(path) = &args.pairs {
        let parsed: PairsFile = serde_json::from_str(&read_text(path)?)
            .with_context(|| format!("Invalid pairs file {}", path.display()))?;
        return Ok(match parsed {
            PairsFile::Wrapped { xml_pairs } => xml_pairs,
            PairsFile::Bare(pairs) => pairs,
        });
    }

    if args.input.is_empty() {
        anyhow::bail!("No pairs given: use --pairs FILE or --input/--output");
    }
    let inputs = args.input.iter().map(|p| read_text(p)).collect::<Result<Vec<_>>>()?;
    let outputs = args.output.iter().map(|p| read_text(p)).collect::<Result<Vec<_>>>()?;
    Ok(pairs_from_lists(inputs, outputs)?)
}

fn read_candidate(path: &Path, language: &str) -> Result<CandidateCode> {
    Ok(CandidateCode {
        language: language.to_string(),
        ..CandidateCode::new(read_text(path)?)
    })
}

/// Submit a job, log its progress and print the final state.
async fn cmd_run(
    config: &ForgeConfig,
    pair_args: &PairArgs,
    options: JobOptions,
    candidate_out: Option<&Path>,
    poll: Duration,
) -> Result<()> {
    let pairs = load_pairs(pair_args)?;
    let collaborators = config
        .collaborators()
        .context("Failed to set up collaborators")?;
    let service = JobService::new(Orchestrator::new(collaborators));

    let summary = service.submit(pairs, options).await?;
    let job_id = summary.job_id;
    info!(job_id = %job_id, "job submitted");

    let mut ticker = tokio::time::interval(poll);
    let mut last_message = String::new();
    let job = loop {
        tokio::select! {
            done = service.wait(&job_id) => break done?,
            _ = ticker.tick() => {
                let job = service.get(&job_id).await?;
                if job.message != last_message {
                    info!(status = %job.status, "{}", job.message);
                    last_message = job.message;
                }
            }
        }
    };

    if let (Some(path), Some(candidate)) = (candidate_out, &job.candidate) {
        std::fs::write(path, &candidate.source)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "candidate written");
    }

    println!("{}", serde_json::to_string_pretty(&job)?);

    match job.status {
        JobStatus::Completed => Ok(()),
        _ => anyhow::bail!("Job {} ended {}: {}", job.id, job.status, job.message),
    }
}

/// Score a candidate file in the local sandbox.
async fn cmd_test(
    config: &ForgeConfig,
    candidate: &Path,
    pair_args: &PairArgs,
    language: &str,
    threshold: f64,
) -> Result<()> {
    let candidate = read_candidate(candidate, language)?;
    let pairs = load_pairs(pair_args)?;
    let engine = SandboxEngine::new(config.sandbox_policy());

    let score = engine.score(&candidate, &pairs).await;
    println!("{}", serde_json::to_string_pretty(&score)?);

    if score.accuracy < threshold {
        eprintln!("{}", feedback::compile(&score, threshold));
        anyhow::bail!(
            "Accuracy {} is below threshold {}",
            feedback::percent(score.accuracy),
            feedback::percent(threshold)
        );
    }
    Ok(())
}

/// Load a candidate file without calling it.
async fn cmd_check(config: &ForgeConfig, candidate: &Path, language: &str) -> Result<()> {
    let candidate = read_candidate(candidate, language)?;
    let engine = SandboxEngine::new(config.sandbox_policy());
    match engine.load(&candidate).await {
        Ok(_) => {
            println!("OK ({})", candidate.digest().short());
            Ok(())
        }
        Err(reason) => anyhow::bail!(reason),
    }
}

fn cmd_compare(expected: &Path, actual: &Path) -> Result<()> {
    let comparison = compare(&read_text(expected)?, &read_text(actual)?);
    println!("{}", comparison.report());
    if comparison.is_equal() {
        Ok(())
    } else {
        anyhow::bail!("Documents differ")
    }
}

fn cmd_config(config: &ForgeConfig) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_pairs_file_accepts_both_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let bare = write(
            dir.path(),
            "bare.json",
            r#"[{"input_xml": "<a/>", "output_xml": "<b/>", "pair_id": "one"}]"#,
        );
        let wrapped = write(
            dir.path(),
            "wrapped.json",
            r#"{"xml_pairs": [{"input_xml": "<a/>", "output_xml": "<b/>"}]}"#,
        );

        let pairs = load_pairs(&PairArgs {
            pairs: Some(bare),
            ..PairArgs::default()
        })
        .unwrap();
        assert_eq!(pairs[0].id, "one");

        let pairs = load_pairs(&PairArgs {
            pairs: Some(wrapped),
            ..PairArgs::default()
        })
        .unwrap();
        assert_eq!(pairs[0].output, "<b/>");
        assert_eq!(pairs[0].id.len(), 8);
    }

    #[test]
    fn test_pairs_from_matched_files() {
        let dir = tempfile::tempdir().unwrap();
        let args = PairArgs {
            pairs: None,
            input: vec![write(dir.path(), "in.xml", "<a>1</a>")],
            output: vec![write(dir.path(), "out.xml", "<b>1</b>")],
        };
        let pairs = load_pairs(&args).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].input, "<a>1</a>");

        let mismatched = PairArgs {
            output: Vec::new(),
            ..args
        };
        assert!(load_pairs(&mismatched).is_err());
        assert!(load_pairs(&PairArgs::default()).is_err());
    }

    #[test]
    fn test_compare_command() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.xml", r#"<ns:r xmlns:ns="urn:x"><v>1</v></ns:r>"#);
        let b = write(dir.path(), "b.xml", "<r><v>1</v></r>");
        let c = write(dir.path(), "c.xml", "<r><v>2</v></r>");
        assert!(cmd_compare(&a, &b).is_ok());
        assert!(cmd_compare(&a, &c).is_err());
    }

    #[tokio::test]
    async fn test_check_and_test_commands() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForgeConfig::default();
        let good = write(dir.path(), "good.xform", "fn transform_xml(input) { return input; }");
        let bad = write(dir.path(), "bad.xform", "fn other(input) { return input; }");

        assert!(cmd_check(&config, &good, "xform").await.is_ok());
        let err = cmd_check(&config, &bad, "xform").await.unwrap_err();
        assert!(err.to_string().contains("does not define a 'transform_xml' function"));

        let pairs = PairArgs {
            pairs: Some(write(
                dir.path(),
                "pairs.json",
                r#"[{"input_xml": "<a/>", "output_xml": "<a/>"}]"#,
            )),
            ..PairArgs::default()
        };
        assert!(cmd_test(&config, &good, &pairs, "xform", 1.0).await.is_ok());
        assert!(cmd_test(&config, &bad, &pairs, "xform", 0.5).await.is_err());
    }
}
