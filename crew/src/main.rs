//! Local runner for an external multi-agent crew.
//!
//! `crew run` builds the run inputs and kicks off the pipeline; the other
//! commands expose the same operations as the web UI from a terminal.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crew::core::inputs::build_inputs;
use crew::exit_codes;
use crew::io::config::{CrewConfig, load_config};
use crew::io::credentials::CredentialFile;
use crew::io::documents::{ConfigDocKind, ConfigDocument};
use crew::io::files::list_files;
use crew::io::paths::{CONFIG_FILE, ProjectPaths, detect_root};
use crew::io::process::{LineSink, ProcessRunner, RunError, RunRequest};
use crew::io::report::ReportViewer;
use crew::logging;
use crew::pipeline::{CommandPipeline, invoke_pipeline};

#[derive(Parser)]
#[command(name = "crew", version, about = "Local runner for an external agent crew")]
struct Cli {
    /// Project directory (searched upward for pyproject.toml or crew.toml)
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build run inputs and kick off the pipeline.
    Run,
    /// Print the run inputs as JSON.
    Inputs,
    /// Launch the crew tool and stream its output.
    Exec {
        /// API key injected into the tool's environment (defaults to the saved key).
        #[arg(long)]
        api_key: Option<String>,
        /// Also write the API key to `.env` in the project root.
        #[arg(long, requires = "api_key")]
        save_key: bool,
    },
    /// Show or save agents.yaml / tasks.yaml.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Preview the generated report.
    Report {
        /// Print the whole report instead of the preview.
        #[arg(long)]
        full: bool,
    },
    /// List files in the project root.
    Files,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a config document (empty if missing).
    Show { doc: ConfigDocKind },
    /// Overwrite a config document from a file, or stdin when --from is omitted.
    Save {
        doc: ConfigDocKind,
        #[arg(long)]
        from: Option<PathBuf>,
    },
}

/// Streams child output straight to stdout.
struct StdoutSink {
    out: io::Stdout,
}

impl LineSink for StdoutSink {
    fn line(&mut self, line: &str) {
        let mut out = self.out.lock();
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }
}

struct Project {
    paths: ProjectPaths,
    cfg: CrewConfig,
}

impl Project {
    fn open(project_dir: &Path) -> Result<Self> {
        let start = project_dir
            .canonicalize()
            .with_context(|| format!("resolve project dir {}", project_dir.display()))?;
        let root = detect_root(&start);
        let cfg = load_config(&root.join(CONFIG_FILE))?;
        let paths = ProjectPaths::with_config(root, &cfg);
        debug!(root = %paths.root.display(), "opened project");
        Ok(Self { paths, cfg })
    }
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(clamp_exit_code(code)),
        Err(err) => {
            eprintln!("{:#}", err);
            let code = match err.downcast_ref::<RunError>() {
                Some(RunError::ToolNotFound { .. }) => exit_codes::TOOL_NOT_FOUND,
                _ => exit_codes::ERROR,
            };
            ExitCode::from(clamp_exit_code(code))
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let project = Project::open(&cli.project_dir)?;
    match cli.command {
        Command::Run => cmd_run(&project),
        Command::Inputs => cmd_inputs(&project),
        Command::Exec { api_key, save_key } => cmd_exec(&project, api_key, save_key),
        Command::Config { action } => cmd_config(&project, action),
        Command::Report { full } => cmd_report(&project, full),
        Command::Files => cmd_files(&project),
    }
}

fn cmd_run(project: &Project) -> Result<i32> {
    let inputs = build_inputs(&project.cfg.topic);
    let pipeline = CommandPipeline::new(&project.cfg.pipeline.command, &project.paths.root)?;
    invoke_pipeline(&pipeline, &inputs)?;
    Ok(exit_codes::OK)
}

fn cmd_inputs(project: &Project) -> Result<i32> {
    let inputs = build_inputs(&project.cfg.topic);
    println!(
        "{}",
        serde_json::to_string_pretty(&inputs).context("serialize run inputs")?
    );
    Ok(exit_codes::OK)
}

fn cmd_exec(project: &Project, api_key: Option<String>, save_key: bool) -> Result<i32> {
    let credential = CredentialFile::new(&project.paths.env_path, &project.cfg.credential.env_var)
        .restrict_permissions(project.cfg.credential.restrict_permissions);
    let api_key = api_key.filter(|key| !key.is_empty());
    if save_key && let Some(key) = &api_key {
        credential.save(key)?;
        eprintln!("Saved to {}", credential.path().display());
    }
    let api_key = match api_key {
        Some(key) => Some(key),
        None => credential.resolve()?,
    };

    let (program, args) = project.cfg.tool.split()?;
    let mut request = RunRequest::new(program, &project.paths.root).args(args.iter().cloned());
    if let Some(key) = api_key {
        request = request.env(credential.var(), key);
    }

    let mut sink = StdoutSink { out: io::stdout() };
    match ProcessRunner.run(&request, &mut sink)?.into_result() {
        Ok(session) => {
            eprintln!("{} completed successfully.", session.command);
            Ok(exit_codes::OK)
        }
        Err(RunError::ProcessFailure { program, exit_code }) => {
            eprintln!("{program} returned non-zero exit code: {exit_code}");
            Ok(exit_code)
        }
        Err(err) => Err(err.into()),
    }
}

fn cmd_config(project: &Project, action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Show { doc } => {
            let text = ConfigDocument::for_project(&project.paths, doc).load()?;
            print!("{text}");
        }
        ConfigAction::Save { doc, from } => {
            let text = match from {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf).context("read stdin")?;
                    buf
                }
            };
            let document = ConfigDocument::for_project(&project.paths, doc);
            document.save(&text)?;
            eprintln!("{} saved", doc.file_name());
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_report(project: &Project, full: bool) -> Result<i32> {
    let viewer = ReportViewer::new(&project.paths.report_path, project.cfg.report.preview_chars);
    let text = if full {
        viewer.download()?.map(|export| export.contents)
    } else {
        viewer.preview()?.map(|preview| preview.text)
    };
    match text {
        Some(text) => print!("{text}"),
        None => eprintln!(
            "No report found at {} yet. Run the pipeline to generate one.",
            viewer.path().display()
        ),
    }
    Ok(exit_codes::OK)
}

fn cmd_files(project: &Project) -> Result<i32> {
    for name in list_files(&project.paths.root, &project.cfg.listing.exclude)? {
        println!("{name}");
    }
    Ok(exit_codes::OK)
}

/// Process exit statuses are a single byte; out-of-range child codes become 1.
fn clamp_exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(exit_codes::ERROR as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exec_with_key() {
        let cli = Cli::parse_from(["crew", "exec", "--api-key", "sk-1"]);
        assert!(matches!(
            cli.command,
            Command::Exec { api_key: Some(ref k), save_key: false } if k == "sk-1"
        ));
    }

    #[test]
    fn parse_save_key_requires_api_key() {
        assert!(Cli::try_parse_from(["crew", "exec", "--save-key"]).is_err());
        assert!(Cli::try_parse_from(["crew", "exec", "--api-key", "k", "--save-key"]).is_ok());
    }

    #[test]
    fn parse_config_save() {
        let cli = Cli::parse_from(["crew", "config", "save", "tasks", "--from", "t.yaml"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Save {
                    doc: ConfigDocKind::Tasks,
                    from: Some(_)
                }
            }
        ));
    }

    #[test]
    fn parse_rejects_unknown_doc() {
        assert!(Cli::try_parse_from(["crew", "config", "show", "crew"]).is_err());
    }

    #[test]
    fn clamp_keeps_byte_codes() {
        assert_eq!(clamp_exit_code(7), 7);
        assert_eq!(clamp_exit_code(-9), 1);
        assert_eq!(clamp_exit_code(300), 1);
    }
}
