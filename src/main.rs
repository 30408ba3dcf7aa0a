use anyhow::Context;
use clap::Parser;
use engineered_prompts::{
    BatchRequest, BatchRunner, Config, Error, FilterStore, FlattenerKind, GoalStore, OpenAiClient,
    OutputWriter, PromptTemplate, ShellActions, TerminalShell, TokenizerKind, Workbench, flatten,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "engineered-prompts",
    version,
    author,
    about = "Apply goal prompts to files and directories with an LLM",
    long_about = "Build a delimited prompt from a goal and an input text, send it to a \
    chat-completion API and print the answer.\n\n\
    Without --dir or --file an interactive goal / input / output form is started.\n\n\
    USAGE EXAMPLES:\n  \
      # Summarize a file\n  \
      engineered-prompts --file notes.txt --goal general/summarize.txt\n\n  \
      # Review a directory, restricted by a filter\n  \
      engineered-prompts --dir ./src --goal code/review.txt --filter has_timestamp.sh\n\n  \
      # Interactive form with a goal preloaded\n  \
      engineered-prompts --goal general/summarize.txt"
)]
struct Cli {
    /// Directory to flatten and process as one input
    #[arg(short, long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Single file to process
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Goal file, relative to the goals directory
    #[arg(short, long, value_name = "REL")]
    goal: Option<String>,

    /// Filter file, relative to the filters directory (only with --dir)
    #[arg(short = 't', long, value_name = "REL")]
    filter: Option<String>,

    /// Model identifier
    #[arg(short, long, value_name = "ID")]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Path to a custom Tera prompt template using `goal` and `body`
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// How directories are flattened
    #[arg(long, value_enum, default_value = "script")]
    flattener: CliFlattener,

    /// Serialization script used by the script flattener
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// Root directory of goal files
    #[arg(long, value_name = "PATH")]
    goals_dir: Option<PathBuf>,

    /// Root directory of filter files
    #[arg(long, value_name = "PATH")]
    filters_dir: Option<PathBuf>,

    /// Also write the completion to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Overwrite --output without keeping a backup
    #[arg(long)]
    no_backup: bool,

    /// Estimator used to check the prompt against the model's context window
    #[arg(long, value_enum, default_value = "chars")]
    tokenizer: CliTokenizer,

    /// List available goals and exit
    #[arg(long)]
    list_goals: bool,

    /// List available filters and exit
    #[arg(long)]
    list_filters: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFlattener {
    /// Run the serialization shell script
    Script,
    /// Walk the directory in-process
    Builtin,
}

impl From<CliFlattener> for FlattenerKind {
    fn from(f: CliFlattener) -> Self {
        match f {
            CliFlattener::Script => Self::Script,
            CliFlattener::Builtin => Self::Builtin,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTokenizer {
    /// Four characters per token
    Chars,
    /// Word pieces plus punctuation
    Words,
}

impl From<CliTokenizer> for TokenizerKind {
    fn from(t: CliTokenizer) -> Self {
        match t {
            CliTokenizer::Chars => Self::Chars,
            CliTokenizer::Words => Self::Words,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_file = dotenv::dotenv();

    setup_tracing(cli.verbose);

    match env_file {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<Error>())
                .map_or(1, Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let request = BatchRequest::from_args(
        cli.dir.clone(),
        cli.file.clone(),
        cli.goal.clone(),
        cli.filter.clone(),
    )?;

    let config = build_config(&cli).context("Failed to build configuration")?;

    if cli.list_goals || cli.list_filters {
        if cli.list_goals {
            for goal in GoalStore::new(&config.goals_dir).list() {
                println!("{goal}");
            }
        }
        if cli.list_filters {
            for filter in FilterStore::new(&config.filters_dir).list() {
                println!("{filter}");
            }
        }
        return Ok(());
    }

    let client = OpenAiClient::from_env(&config).context("Failed to create completion client")?;

    match request {
        Some(request) => {
            let runner = BatchRunner::new(&config, client, flatten::from_config(&config))
                .context("Failed to create batch runner")?;
            let report = runner.run(&request)?;

            println!("{}", report.completion);
            info!(
                "Processed {} in {:.2}s (~{} prompt tokens)",
                report.source.display(),
                report.duration.as_secs_f64(),
                report.prompt_size.total
            );

            if let Some(ref output) = cli.output {
                OutputWriter::new(config.backup_existing)
                    .write(output, &report.completion)
                    .context("Failed to write output file")?;
            }
        }
        None => {
            if cli.output.is_some() {
                warn!("--output is ignored in interactive mode");
            }

            let template = PromptTemplate::load(config.template_path.as_deref())?;
            let mut workbench = Workbench::new(client, template);
            if let Some(ref goal) = cli.goal {
                let goal = GoalStore::new(&config.goals_dir).load(goal)?;
                workbench.set_goal(goal.text);
            }

            TerminalShell::new(workbench, &config.goals_dir).run()?;
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> engineered_prompts::Result<Config> {
    let mut builder = Config::builder()
        .temperature(cli.temperature)
        .flattener(cli.flattener.into())
        .tokenizer(cli.tokenizer.into())
        .backup_existing(!cli.no_backup);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref template) = cli.template {
        builder = builder.template_path(template);
    }
    if let Some(ref script) = cli.script {
        builder = builder.serialize_script(script);
    }
    if let Some(ref dir) = cli.goals_dir {
        builder = builder.goals_dir(dir);
    }
    if let Some(ref dir) = cli.filters_dir {
        builder = builder.filters_dir(dir);
    }

    builder.build()
}

fn setup_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "engineered_prompts=info",
        1 => "engineered_prompts=debug",
        _ => "engineered_prompts=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();
}
