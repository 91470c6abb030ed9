use clap::{ArgAction, Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "fix-urls")]
#[command(about = "Fix staging paths in database content")]
#[command(
    long_about = "Looks for absolute links pointing at a staging host in every text column \
and rewrites them as root-relative paths.\n\n\
Example: <img src=\"http://staging.example.com/assets/img/person.jpg\"> becomes \
<img src=\"/assets/img/person.jpg\">"
)]
#[command(version)]
pub struct Cli {
    /// Staging URL to replace, without http(s):// (e.g. staging.example.com)
    #[arg(required_unless_present = "completions")]
    pub absolute_url: Option<String>,

    /// Table names to search for absolute paths in (default: all tables)
    pub tables: Vec<String>,

    /// Base path element of URL to remove (e.g. "/sites/default/files/")
    #[arg(long = "base-path-remove", requires = "base_path_replace")]
    pub base_path_remove: Option<String>,

    /// Base path element to put in its place, used with --base-path-remove (e.g. "/files/")
    #[arg(long = "base-path-replace", requires = "base_path_remove")]
    pub base_path_replace: Option<String>,

    /// Update the database without any confirmation prompts (y/yes)
    #[arg(long = "auto-confirm", num_args = 0..=1, default_missing_value = "yes")]
    pub auto_confirm: Option<String>,

    /// Database engine (mysql)
    #[arg(long = "db-engine")]
    pub db_engine: Option<String>,

    /// Database host to connect to (localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// Database port (3306)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database username
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Database password
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Database name
    #[arg(short = 'D', long)]
    pub database: Option<String>,

    /// Unix socket path
    #[arg(long)]
    pub socket: Option<String>,

    /// MySQL defaults file to read [client] credentials from (default: ~/.my.cnf)
    #[arg(long = "defaults-file")]
    pub defaults_file: Option<String>,

    /// Print the run result as JSON after the summary
    #[arg(long)]
    pub json: bool,

    /// Control colored output
    #[arg(long, default_value = "auto")]
    pub color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<clap_complete::Shell>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}
