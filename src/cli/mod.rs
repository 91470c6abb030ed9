//! Command-line front end for the `fix-urls` binary.
//!
//! Argument parsing uses clap derive macros; the [`app::Cli`] struct is
//! shared between `main.rs` and `build.rs` (for man page and completion
//! generation) via `include!()`.
//!
//! [`execute`] validates the target before anything else, resolves the
//! database credentials (flags, then a MySQL defaults file, then prompts),
//! opens the single connection for the run and hands over to
//! [`crate::pipeline::run`]. Interactive questions go through
//! [`TerminalPrompt`].

pub mod app;

use std::io::{BufRead, Write};
use std::path::Path;

use crate::cli::app::Cli;
use crate::pipeline::gate::Prompt;
use crate::pipeline::report::RunResult;
use crate::pipeline::RunConfig;
use crate::rewrite::pattern::TargetSpec;
use crate::util::mysql::{self, ConnectionConfig};
use crate::util::{wprint, wprintln};
use crate::FixError;

/// Number of tries for a required credential.
const MAX_ATTEMPTS: usize = 2;

/// Interpret the `--auto-confirm` value: `y` or `yes` in any case.
pub fn parse_auto_confirm(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("y") || v.eq_ignore_ascii_case("yes")
    })
}

/// Yes/no prompt over a line-oriented reader and writer.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        TerminalPrompt {
            input: std::io::stdin().lock(),
            output: std::io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalPrompt { input, output }
    }

    /// Ask for a value, falling back to `default` on an empty answer.
    /// Required values are asked for again, up to [`MAX_ATTEMPTS`] times.
    pub fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String, FixError> {
        for _ in 0..MAX_ATTEMPTS {
            wprint!(self.output, "{}", question)?;
            self.output
                .flush()
                .map_err(|e| FixError::Io(e.to_string()))?;
            let answer = read_line(&mut self.input)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            if let Some(d) = default {
                return Ok(d.to_string());
            }
            wprintln!(self.output, "You must enter a value")?;
        }
        Err(FixError::Config(format!(
            "No value given for: {}",
            question.trim().trim_end_matches(':')
        )))
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn confirm(&mut self, question: &str) -> Result<bool, FixError> {
        wprint!(self.output, "{} (y/n) ", question)?;
        self.output
            .flush()
            .map_err(|e| FixError::Io(e.to_string()))?;
        let answer = read_line(&mut self.input)?;
        Ok(answer
            .chars()
            .next()
            .is_some_and(|c| c.eq_ignore_ascii_case(&'y')))
    }
}

fn read_line(input: &mut dyn BufRead) -> Result<String, FixError> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| FixError::Io(format!("Cannot read answer: {}", e)))?;
    Ok(line.trim().to_string())
}

/// Build the validated [`RunConfig`] from parsed arguments.
pub fn run_config(cli: &Cli) -> Result<RunConfig, FixError> {
    let url = cli
        .absolute_url
        .as_deref()
        .ok_or_else(|| FixError::Config("Staging URL is required".to_string()))?;
    let target = TargetSpec::new(
        url,
        cli.base_path_remove.as_deref(),
        cli.base_path_replace.as_deref(),
    )?;
    Ok(RunConfig {
        target,
        tables: cli.tables.clone(),
        auto_confirm: parse_auto_confirm(cli.auto_confirm.as_deref()),
    })
}

/// Connection settings from flags, then the defaults file.
pub fn connection_from_args(cli: &Cli) -> ConnectionConfig {
    let flags = ConnectionConfig {
        engine: cli.db_engine.clone(),
        host: cli.host.clone(),
        port: cli.port,
        user: cli.username.clone(),
        password: cli.password.clone(),
        database: cli.database.clone(),
        socket: cli.socket.clone(),
    };

    let defaults = match &cli.defaults_file {
        Some(path) => mysql::parse_defaults_file(Path::new(path)),
        None => mysql::find_defaults_file().and_then(|p| mysql::parse_defaults_file(&p)),
    };
    match defaults {
        Some(file) => flags.or(file),
        None => flags,
    }
}

/// Prompt for every connection setting still missing.
pub fn complete_connection<R: BufRead, W: Write>(
    mut config: ConnectionConfig,
    prompt: &mut TerminalPrompt<R, W>,
    read_password: &mut dyn FnMut(&str) -> Result<String, FixError>,
) -> Result<ConnectionConfig, FixError> {
    if config.engine.is_none() {
        config.engine = Some(prompt.ask("Enter the database engine (mysql): ", Some("mysql"))?);
    }
    if config.host.is_none() && config.socket.is_none() {
        config.host = Some(prompt.ask(
            "Enter the database host to connect to (localhost): ",
            Some("localhost"),
        )?);
    }
    if config.user.is_none() {
        config.user = Some(prompt.ask("Enter your database username: ", None)?);
    }
    if config.password.is_none() {
        let mut password = String::new();
        for _ in 0..MAX_ATTEMPTS {
            password = read_password("Enter your database password (hidden): ")?;
            if !password.is_empty() {
                break;
            }
        }
        config.password = Some(password);
    }
    if config.database.is_none() {
        config.database = Some(prompt.ask("Enter your database name: ", None)?);
    }
    config.validate()?;
    Ok(config)
}

/// Run the command end to end.
pub fn execute(cli: &Cli, writer: &mut dyn Write) -> Result<RunResult, FixError> {
    let config = run_config(cli)?;

    let mut prompt = TerminalPrompt::stdio();
    let connection = complete_connection(connection_from_args(cli), &mut prompt, &mut |q: &str| {
        rpassword::prompt_password(q).map_err(|e| FixError::Io(format!("Cannot read password: {}", e)))
    })?;

    wprintln!(writer, "Fix staging paths in database content")?;
    let result = run_with_connection(&config, &connection, &mut prompt, writer)?;

    if cli.json {
        wprintln!(
            writer,
            "{}",
            serde_json::to_string_pretty(&result).map_err(|e| FixError::Io(e.to_string()))?
        )?;
    }
    Ok(result)
}

/// Flush buffered output, reporting a failure like any other write.
pub fn flush_output(writer: &mut dyn Write) -> Result<(), FixError> {
    writer
        .flush()
        .map_err(|e| FixError::Io(format!("Cannot flush output: {}", e)))
}

#[cfg(feature = "mysql")]
fn run_with_connection(
    config: &RunConfig,
    connection: &ConnectionConfig,
    prompt: &mut dyn Prompt,
    writer: &mut dyn Write,
) -> Result<RunResult, FixError> {
    let mut db = crate::db::mysql::MysqlDatabase::connect(connection)?;
    wprintln!(writer, "{}", colored::Colorize::green("Connected to database"))?;
    crate::pipeline::run(config, &mut db, prompt, writer)
}

#[cfg(not(feature = "mysql"))]
fn run_with_connection(
    _config: &RunConfig,
    _connection: &ConnectionConfig,
    _prompt: &mut dyn Prompt,
    _writer: &mut dyn Write,
) -> Result<RunResult, FixError> {
    Err(FixError::Config(
        "MySQL support not compiled. Rebuild with: cargo build --features mysql".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;

    fn prompt(input: &str) -> TerminalPrompt<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_parse_auto_confirm() {
        assert!(parse_auto_confirm(Some("y")));
        assert!(parse_auto_confirm(Some("YES")));
        assert!(!parse_auto_confirm(Some("no")));
        assert!(!parse_auto_confirm(Some("n")));
        assert!(!parse_auto_confirm(None));
    }

    #[test]
    fn test_confirm_answers() {
        assert!(prompt("y\n").confirm("Go?").unwrap());
        assert!(prompt("Yes\n").confirm("Go?").unwrap());
        assert!(!prompt("n\n").confirm("Go?").unwrap());
        assert!(!prompt("\n").confirm("Go?").unwrap());
        assert!(!prompt("").confirm("Go?").unwrap());
    }

    #[test]
    fn test_confirm_writes_question() {
        let mut p = prompt("y\n");
        p.confirm("Replace?").unwrap();
        assert_eq!(String::from_utf8(p.output).unwrap(), "Replace? (y/n) ");
    }

    #[test]
    fn test_ask_default_and_retry() {
        assert_eq!(prompt("\n").ask("Host: ", Some("localhost")).unwrap(), "localhost");
        assert_eq!(prompt("\nroot\n").ask("User: ", None).unwrap(), "root");
        assert!(matches!(prompt("\n\n").ask("User: ", None), Err(FixError::Config(_))));
    }

    #[test]
    fn test_complete_connection_prompts_for_missing() {
        let mut p = prompt("\n\nadmin\ncms\n");
        let config = complete_connection(ConnectionConfig::default(), &mut p, &mut |_: &str| {
            Ok("pw".to_string())
        })
        .unwrap();
        assert_eq!(config.engine.as_deref(), Some("mysql"));
        assert_eq!(config.host.as_deref(), Some("localhost"));
        assert_eq!(config.user.as_deref(), Some("admin"));
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.database.as_deref(), Some("cms"));
    }

    #[test]
    fn test_complete_connection_rejects_unknown_engine() {
        let given = ConnectionConfig {
            engine: Some("oracle".into()),
            host: Some("h".into()),
            user: Some("u".into()),
            password: Some("p".into()),
            database: Some("d".into()),
            ..Default::default()
        };
        let err = complete_connection(given, &mut prompt(""), &mut |_: &str| Ok(String::new())).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_flush_failure_is_reported() {
        let err = flush_output(&mut BrokenPipe).unwrap_err();
        assert!(matches!(err, FixError::Io(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(flush_output(&mut Vec::new()).is_ok());
    }

    #[test]
    fn test_run_config_from_args() {
        let cli = Cli::parse_from([
            "fix-urls",
            "staging.example.com/",
            "pages",
            "posts",
            "--base-path-remove",
            "/files/old/",
            "--base-path-replace",
            "/new/",
            "--auto-confirm",
        ]);
        let config = run_config(&cli).unwrap();
        assert_eq!(config.target.host(), "staging.example.com");
        assert_eq!(config.tables, vec!["pages", "posts"]);
        assert!(config.auto_confirm);
    }

    #[test]
    fn test_run_config_rejects_scheme() {
        let cli = Cli::parse_from(["fix-urls", "http://staging.example.com"]);
        assert!(matches!(run_config(&cli), Err(FixError::Config(_))));
    }

    #[test]
    fn test_base_path_flags_must_pair() {
        let parsed = Cli::try_parse_from(["fix-urls", "s.test", "--base-path-remove", "/a/"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_connection_flags_override_defaults_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nuser=fromfile\npassword=filepw").unwrap();
        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["fix-urls", "s.test", "-u", "flaguser", "--defaults-file", &path]);
        let config = connection_from_args(&cli);
        assert_eq!(config.user.as_deref(), Some("flaguser"));
        assert_eq!(config.password.as_deref(), Some("filepw"));
    }
}
