//! Interactive REPL over a loaded collection
//!
//! Errors are printed and the loop continues; only `exit` or end of input
//! leaves the session.

use std::io::{self, BufRead, Write};

use crate::cache::CacheFilter;
use crate::errors::Result;
use crate::output::{terminal, Printer};
use crate::sessions::Session;
use crate::signals;

/// Commands available in the REPL
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(String),
    RunId(String),
    Show(String),
    List,
    Vars,
    Cache,
    ClearCache(Option<String>),
    Cookies,
    History,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(input: &str) -> Command {
    let (cmd, args) = match input.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
        None => (input.to_lowercase(), ""),
    };

    let require = |make: fn(String) -> Command, usage: &str| {
        if args.is_empty() {
            Command::Unknown(format!("usage: {}", usage))
        } else {
            make(args.to_string())
        }
    };

    match cmd.as_str() {
        "run" | "r" => require(Command::Run, "run <folder/request>"),
        "id" => require(Command::RunId, "id <request id>"),
        "show" | "s" => require(Command::Show, "show <folder/request>"),
        "list" | "ls" => Command::List,
        "vars" | "env" => Command::Vars,
        "cache" => match args.split_once(char::is_whitespace).map_or((args, ""), |(a, b)| (a, b.trim())) {
            ("", _) => Command::Cache,
            ("clear", "") => Command::ClearCache(None),
            ("clear", prefix) => Command::ClearCache(Some(prefix.to_string())),
            _ => Command::Unknown("usage: cache [clear [prefix]]".to_string()),
        },
        "cookies" => Command::Cookies,
        "history" | "hist" => Command::History,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Unknown(format!("Unknown command: {}", cmd)),
    }
}

pub struct Repl<'a> {
    session: &'a Session,
    printer: Printer,
    history: Vec<String>,
}

impl<'a> Repl<'a> {
    pub fn new(session: &'a Session, printer: Printer) -> Self {
        Self {
            session,
            printer,
            history: Vec::new(),
        }
    }

    /// Run against the process's stdin/stdout
    pub async fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        self.run_with(&mut input, &mut stdout, &mut stderr).await
    }

    pub async fn run_with(
        &mut self,
        input: &mut impl BufRead,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> Result<()> {
        writeln!(
            out,
            "{} ({} requests). Type 'help' for commands.",
            self.session.tree().name(),
            self.session.tree().requests().len()
        )?;

        loop {
            write!(out, "reqchain> ")?;
            out.flush()?;

            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    writeln!(err, "Error reading input: {}", e)?;
                    continue;
                }
            }
            if signals::was_interrupted() {
                signals::reset_interrupted();
                continue;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.history.push(line.to_string());

            match self.execute_command(parse_command(line), out).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    writeln!(err, "{}", terminal::error(&format!("Error: {}", e)))?;
                }
            }
        }

        writeln!(out)?;
        Ok(())
    }

    async fn execute_command(&mut self, cmd: Command, out: &mut impl Write) -> Result<bool> {
        match cmd {
            Command::Run(path) => {
                let response = self.session.execute(&path).await?;
                self.printer.write_response(out, &response)?;
            }
            Command::RunId(id) => {
                let response = self.session.execute_by_id(&id).await?;
                self.printer.write_response(out, &response)?;
            }
            Command::Show(path) => {
                let resolved = self.session.resolve(&path).await?;
                self.printer.write_resolved(out, &resolved)?;
            }
            Command::List => self.printer.write_request_list(out, self.session.tree())?,
            Command::Vars => self.printer.write_variables(out, self.session.tree())?,
            Command::Cache => {
                let entries = self.session.cache().get_all(None)?;
                if entries.is_empty() {
                    writeln!(out, "cache is empty")?;
                }
                for entry in entries {
                    let expiry = entry
                        .expires_at
                        .map_or_else(|| "never expires".to_string(), |at| format!("expires {}", at.to_rfc3339()));
                    writeln!(out, "{} = {} ({})", entry.key, entry.value, expiry)?;
                }
            }
            Command::ClearCache(prefix) => {
                let filter = prefix.map(CacheFilter::prefix);
                let cleared = self.session.cache().clear(filter.as_ref())?;
                writeln!(out, "cleared {} cached value(s)", cleared)?;
            }
            Command::Cookies => {
                for cookie in self.session.cookies().get_cookies(None)? {
                    writeln!(out, "{}={} (domain {}, path {})", cookie.key, cookie.value, cookie.domain, cookie.path)?;
                }
            }
            Command::History => {
                for (i, cmd) in self.history.iter().enumerate() {
                    writeln!(out, "  {}: {}", i + 1, cmd)?;
                }
            }
            Command::Help => print_help(out)?,
            Command::Quit => return Ok(false),
            Command::Unknown(msg) => writeln!(out, "{}", msg)?,
        }
        Ok(true)
    }
}

fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  run <path>            Resolve and send a request (r)")?;
    writeln!(out, "  id <id>               Resolve and send a request by id")?;
    writeln!(out, "  show <path>           Print the resolved request without sending (s)")?;
    writeln!(out, "  list                  List requests (ls)")?;
    writeln!(out, "  vars                  Show environment variables (env)")?;
    writeln!(out, "  cache [clear [pfx]]   Show or clear cached values")?;
    writeln!(out, "  cookies               Show stored cookies")?;
    writeln!(out, "  history               Show command history")?;
    writeln!(out, "  help                  Show this help (?)")?;
    writeln!(out, "  exit                  Leave (quit, q)")
}

/// Run the REPL on the terminal
pub async fn run_interactive(session: &Session) -> Result<()> {
    Repl::new(session, Printer::for_stdout()).run().await
}
