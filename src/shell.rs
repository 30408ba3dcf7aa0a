//! Interactive goal / input / output form.
//!
//! [`Workbench`] holds the three panes and implements every user action;
//! [`TerminalShell`] is a thin `dialoguer` menu that drives it.

use crate::{
    client::CompletionClient,
    error::{Error, Result},
    file::read_text,
    prompt::PromptTemplate,
    writer::OutputWriter,
};
use console::style;
use dialoguer::{Editor, Input, Select};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Goal used when the goal pane holds fewer than two characters.
pub const DEFAULT_GOAL: &str = "summarize in 2 sentence";

const GOAL_EXTENSION: &str = ".txt";

/// One method per action offered by the interactive form.
pub trait ShellActions {
    /// Current goal pane.
    fn goal(&self) -> &str;
    /// Current input pane.
    fn input(&self) -> &str;
    /// Current output pane.
    fn output(&self) -> &str;

    /// Replaces the goal pane.
    fn set_goal(&mut self, text: String);
    /// Replaces the input pane.
    fn set_input(&mut self, text: String);

    /// Reads a text file into the goal pane.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable; the pane is
    /// left unchanged.
    fn on_load_goal(&mut self, path: &Path) -> Result<()>;

    /// Writes the goal pane to `path`, returning the path actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn on_save_goal(&self, path: &Path) -> Result<PathBuf>;

    /// Empties the goal pane.
    fn on_clear_goal(&mut self);
    /// Empties the input pane.
    fn on_clear_input(&mut self);

    /// Sends goal and input to the model and fills the output pane.
    ///
    /// Failures are rendered into the output pane instead of returned.
    fn on_process(&mut self);
}

/// Form state backed by a completion client.
pub struct Workbench<C> {
    goal: String,
    input: String,
    output: String,
    template: PromptTemplate,
    client: C,
    writer: OutputWriter,
}

impl<C: CompletionClient> Workbench<C> {
    /// Creates an empty form.
    #[must_use]
    pub fn new(client: C, template: PromptTemplate) -> Self {
        Self {
            goal: String::new(),
            input: String::new(),
            output: String::new(),
            template,
            client,
            writer: OutputWriter::new(false),
        }
    }

    /// Goal text that [`ShellActions::on_process`] will use.
    #[must_use]
    pub fn effective_goal(&self) -> &str {
        if self.goal.chars().count() < 2 {
            DEFAULT_GOAL
        } else {
            &self.goal
        }
    }

    fn process(&self) -> Result<String> {
        let prompt = self.template.render(self.effective_goal(), &self.input)?;
        info!("Sending prompt to the model");
        self.client.complete(&prompt)
    }
}

impl<C: CompletionClient> ShellActions for Workbench<C> {
    fn goal(&self) -> &str {
        &self.goal
    }

    fn input(&self) -> &str {
        &self.input
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn set_goal(&mut self, text: String) {
        self.goal = text;
    }

    fn set_input(&mut self, text: String) {
        self.input = text;
    }

    fn on_load_goal(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::not_found("goal file", path));
        }
        self.goal = read_text(path)?;
        debug!("Loaded goal from {}", path.display());
        Ok(())
    }

    fn on_save_goal(&self, path: &Path) -> Result<PathBuf> {
        let path = with_goal_extension(path);
        self.writer.write(&path, &self.goal)
    }

    fn on_clear_goal(&mut self) {
        self.goal.clear();
    }

    fn on_clear_input(&mut self) {
        self.input.clear();
    }

    fn on_process(&mut self) {
        self.output = match self.process() {
            Ok(completion) => completion,
            Err(e) => format!("error: {e}"),
        };
    }
}

fn with_goal_extension(path: &Path) -> PathBuf {
    if path.to_string_lossy().ends_with(GOAL_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(GOAL_EXTENSION);
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum MenuItem {
    EditGoal,
    EditInput,
    LoadGoal,
    SaveGoal,
    ClearGoal,
    ClearInput,
    Process,
    Quit,
}

impl MenuItem {
    const ALL: [Self; 8] = [
        Self::Process,
        Self::EditGoal,
        Self::EditInput,
        Self::LoadGoal,
        Self::SaveGoal,
        Self::ClearGoal,
        Self::ClearInput,
        Self::Quit,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::EditGoal => "Edit goal",
            Self::EditInput => "Edit input",
            Self::LoadGoal => "Load goal...",
            Self::SaveGoal => "Save goal...",
            Self::ClearGoal => "Clear goal",
            Self::ClearInput => "Clear input",
            Self::Process => "Process",
            Self::Quit => "Quit",
        }
    }
}

/// Terminal front end for a [`ShellActions`] implementation.
pub struct TerminalShell<S> {
    actions: S,
    goals_dir: PathBuf,
}

impl<S: ShellActions> TerminalShell<S> {
    /// Creates a shell; `goals_dir` is the default location offered when
    /// loading or saving goals.
    #[must_use]
    pub fn new(actions: S, goals_dir: impl Into<PathBuf>) -> Self {
        Self {
            actions,
            goals_dir: goals_dir.into(),
        }
    }

    /// Runs the menu loop until the user quits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Terminal`] if the terminal cannot be read from.
    pub fn run(mut self) -> Result<()> {
        let labels: Vec<&str> = MenuItem::ALL.iter().map(|item| item.label()).collect();

        loop {
            self.render();

            let selection = Select::new()
                .with_prompt("Action")
                .items(&labels)
                .default(0)
                .interact_opt()
                .map_err(|e| Error::terminal(e.to_string()))?;

            let Some(index) = selection else {
                return Ok(());
            };

            match MenuItem::ALL[index] {
                MenuItem::EditGoal => {
                    if let Some(text) = edit(self.actions.goal())? {
                        self.actions.set_goal(text.trim_end().to_string());
                    }
                }
                MenuItem::EditInput => {
                    if let Some(text) = edit(self.actions.input())? {
                        self.actions.set_input(text);
                    }
                }
                MenuItem::LoadGoal => {
                    let path = self.ask_path("Goal file to load")?;
                    if let Err(e) = self.actions.on_load_goal(&path) {
                        report_error(&e);
                    }
                }
                MenuItem::SaveGoal => {
                    let path = self.ask_path("Save goal as")?;
                    match self.actions.on_save_goal(&path) {
                        Ok(saved) => {
                            println!("{} {}", style("Saved").green(), saved.display());
                        }
                        Err(e) => report_error(&e),
                    }
                }
                MenuItem::ClearGoal => self.actions.on_clear_goal(),
                MenuItem::ClearInput => self.actions.on_clear_input(),
                MenuItem::Process => {
                    println!("{}", style("Waiting for the model...").dim());
                    self.actions.on_process();
                }
                MenuItem::Quit => return Ok(()),
            }
        }
    }

    fn render(&self) {
        println!();
        print_pane("Goal", self.actions.goal());
        print_pane("Input", self.actions.input());
        print_pane("Output", self.actions.output());
    }

    fn ask_path(&self, prompt: &str) -> Result<PathBuf> {
        let default = format!("{}/", self.goals_dir.display());
        Input::<String>::new()
            .with_prompt(prompt)
            .with_initial_text(default)
            .interact_text()
            .map(PathBuf::from)
            .map_err(|e| Error::terminal(e.to_string()))
    }
}

fn edit(current: &str) -> Result<Option<String>> {
    Editor::new()
        .extension(GOAL_EXTENSION)
        .edit(current)
        .map_err(|e| Error::terminal(e.to_string()))
}

fn print_pane(title: &str, text: &str) {
    println!("{}", style(format!("── {title} ──")).cyan().bold());
    if text.is_empty() {
        println!("{}", style("(empty)").dim());
    } else {
        println!("{text}");
    }
}

fn report_error(error: &Error) {
    eprintln!("{} {}", style("error:").red().bold(), error);
}
