/*!
Main binary for sqb.
*/

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::fs::File;
use std::io::{self, BufReader, IsTerminal, Read, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use sqb::commands;
use sqb::config::SearchConfig;
use sqb::recent::{JsonFileStore, RecentSearches, SavedSearchType};
use sqb::session::{EditSession, Focus, TokenPart};

/// Parse, validate and edit `key:value` search queries.
#[derive(Parser)]
#[command(name = "sqb", version, about, arg_required_else_help = true, long_about = None, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    config: ConfigArgs,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

/// Filter-key dictionary and validity toggles.
#[derive(Args)]
struct ConfigArgs {
    /// Search configuration (JSON, YAML or TOML, by extension)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Flag AND / OR
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    disallow_logical_operators: bool,
    /// Flag values containing `*`
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    disallow_wildcard: bool,
    /// Flag free text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    disallow_free_text: bool,
    /// Flag keys missing from the configuration
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    disallow_unsupported_filters: bool,
    /// Flag parentheses
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    disallow_parens: bool,
}

impl ConfigArgs {
    /// Loads the configuration file, if any, and applies the flags on top.
    fn load(&self) -> Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => SearchConfig::load(path).with_context(|| {
                format!("Failed to load config {}", path.display())
            })?,
            None => SearchConfig::default(),
        };
        let validity = &mut config.validity;
        validity.disallow_logical_operators |= self.disallow_logical_operators;
        validity.disallow_wildcard |= self.disallow_wildcard;
        validity.disallow_free_text |= self.disallow_free_text;
        validity.disallow_unsupported_filters |=
            self.disallow_unsupported_filters;
        validity.disallow_parens |= self.disallow_parens;
        Ok(config)
    }
}

/// Available subcommands for `sqb`
#[derive(Subcommand)]
enum Commands {
    /// Print the canonical query and its invalid tokens.
    Parse {
        /// Query string. If omitted, reads from STDIN
        query: Option<String>,
        /// Print the annotated tokens as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// Exit with status 2 if the query is invalid
        #[arg(long, action = ArgAction::SetTrue)]
        strict: bool,
    },
    /// Print the canonical query.
    Format {
        /// Query string. If omitted, reads from STDIN
        query: Option<String>,
    },
    /// Print the suggestion menu at a position of a query.
    Suggest {
        /// Query the menu is computed for
        #[arg(long, default_value = "")]
        query: String,
        /// Token to focus. If omitted, focuses the input after the last token
        #[arg(short, long)]
        token: Option<usize>,
        /// Part of the focused token
        #[arg(short, long, value_enum, default_value_t = PartArg::Value)]
        part: PartArg,
        /// Text typed at the focus
        #[arg(default_value = "")]
        partial: String,
        /// Print the menu as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// File recent searches are kept in
        #[arg(long, value_name = "FILE")]
        recent: Option<PathBuf>,
    },
    /// Replay an edit script, printing every change, search and blur.
    Session {
        /// Starting query
        #[arg(long, default_value = "")]
        query: String,
        /// Script file. If omitted, reads from STDIN
        #[arg(value_name = "FILE")]
        script: Option<PathBuf>,
        /// File recent searches are read from and recorded to
        #[arg(long, value_name = "FILE")]
        recent: Option<PathBuf>,
    },
    #[command(subcommand)]
    /// Generate additional documentation and/or completions
    Generate(GenerateCommand),
}

/// Generate shell completions and man page
#[derive(Subcommand)]
enum GenerateCommand {
    /// Generate shell completions for the given shell to stdout.
    Shell { shell: clap_complete::Shell },
    /// Generate man pages for sqb to output directory if specified, else
    /// the current directory.
    Man {
        /// The output directory to write the man pages.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

/// Focusable token part, as named on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum PartArg {
    Key,
    Operator,
    Value,
    Params,
    Token,
}

impl From<PartArg> for TokenPart {
    fn from(part: PartArg) -> Self {
        match part {
            PartArg::Key => Self::Key,
            PartArg::Operator => Self::Operator,
            PartArg::Value => Self::Value,
            PartArg::Params => Self::Parameters,
            PartArg::Token => Self::Whole,
        }
    }
}

/// Returns `query`, or reads it from STDIN without its line break.
fn query_or_stdin(query: Option<String>) -> Result<String> {
    if let Some(query) = query {
        return Ok(query);
    }
    if io::stdin().is_terminal() {
        bail!("Query string required (as argument or on STDIN)");
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read query from STDIN")?;
    Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
}

fn recent_searches(
    path: PathBuf,
    config: &SearchConfig,
) -> RecentSearches<JsonFileStore> {
    let scope = config.saved_search_type.unwrap_or(SavedSearchType::Issue);
    RecentSearches::new(JsonFileStore::new(path), scope)
}

/// Entry point for main binary.
///
/// Parses the command line, loads the search configuration and runs the
/// subcommand, writing to STDOUT. Exits with status 1 on errors and 2 when
/// `parse --strict` finds an invalid query.
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();
    if !stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let mut out = stdout().lock();
    match cli.command {
        Commands::Generate(cmd) => match cmd {
            GenerateCommand::Shell { shell } => {
                commands::generate::generate_completions(
                    shell,
                    &mut Cli::command(),
                    &mut out,
                );
            }
            GenerateCommand::Man { output_dir } => {
                commands::generate::generate_man_pages(
                    &Cli::command(),
                    output_dir,
                )?;
            }
        },
        Commands::Parse { query, json, strict } => {
            let config = cli.config.load()?;
            let query = query_or_stdin(query)?;
            let valid = commands::parse::parse(
                &mut out,
                &query,
                &config.filter_keys(),
                &config.validity,
                json,
            )?;
            if strict && !valid {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Format { query } => {
            let query = query_or_stdin(query)?;
            commands::parse::format(&mut out, &query)?;
        }
        Commands::Suggest { query, token, part, partial, json, recent } => {
            let config = cli.config.load()?;
            let mut session =
                EditSession::from_config(&config).with_query(&query);
            if let Some(path) = recent {
                session.set_recent_searches(
                    recent_searches(path, &config).list(),
                );
            }
            let focus = match token {
                Some(index) => Focus::Token { index, part: part.into() },
                None => Focus::Input(session.tokens().len()),
            };
            commands::suggest::suggest(
                &mut out,
                &mut session,
                focus,
                &partial,
                json,
            )?;
        }
        Commands::Session { query, script, recent } => {
            let config = cli.config.load()?;
            let mut session =
                EditSession::from_config(&config).with_query(&query);
            if let Some(path) = recent {
                let recent = recent_searches(path, &config);
                session.set_recent_searches(recent.list());
                session.subscribe(recent);
            }
            match script {
                Some(path) => {
                    let file = File::open(&path).with_context(|| {
                        format!("Failed to open script {}", path.display())
                    })?;
                    commands::script::run_script(
                        &mut session,
                        BufReader::new(file),
                        &mut out,
                    )?;
                }
                None => commands::script::run_script(
                    &mut session,
                    io::stdin().lock(),
                    &mut out,
                )?,
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
