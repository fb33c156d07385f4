use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, warn};

use crate::cache::{CacheFilter, CacheStore, FileCacheStore, MemoryCacheStore};
use crate::cli::Args;
use crate::client::DEFAULT_TIMEOUT;
use crate::collection::{load_collection, ConfigTree, LoadOptions};
use crate::config::{Config, StorageBackend};
use crate::cookies::{CookieStore, FileCookieStore, MemoryCookieStore};
use crate::directives::{NonInteractivePrompter, Prompter, TerminalPrompter};
use crate::dotenv::EnvOverrides;
use crate::errors::{ReqchainError, Result};
use crate::interactive;
use crate::logging;
use crate::output::{self, Printer};
use crate::sessions::Session;
use crate::signals;
use crate::status::ExitStatus;
use crate::template::TemplateOptions;

pub fn run(args: Vec<String>) -> ExitStatus {
    let parsed = match Args::try_parse_from(&args) {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            return if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion {
                ExitStatus::Success
            } else {
                ExitStatus::Error
            };
        }
    };

    logging::init(parsed.verbose, parsed.log_format);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", output::warning(&format!("Warning: Failed to load config: {}", e)));
            Config::default()
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => return handle_error(ReqchainError::Io(e)),
    };

    match runtime.block_on(program(parsed, config)) {
        Ok(status) => status,
        Err(e) => handle_error(e),
    }
}

pub async fn program(args: Args, config: Config) -> Result<ExitStatus> {
    debug!(?args, "parsed arguments");

    let tree = load_tree(&args)?;
    let cache = cache_store(&config);

    if let Some(prefix) = &args.clear_cache {
        let filter = (!prefix.is_empty()).then(|| CacheFilter::prefix(prefix.as_str()));
        let cleared = cache.clear(filter.as_ref())?;
        println!("Cleared {} cached value(s)", cleared);
        return Ok(ExitStatus::Success);
    }

    let printer = Printer::for_stdout();

    if args.list {
        printer.write_request_list(&mut io::stdout().lock(), &tree)?;
        return Ok(ExitStatus::Success);
    }

    let session = build_session(tree, &args, &config, cache)?;

    if args.interactive {
        interactive::run_interactive(&session).await?;
        return Ok(ExitStatus::Success);
    }

    let resolved = match (&args.request_path, &args.id) {
        (Some(path), _) => session.resolve(path).await?,
        (None, Some(id)) => session.resolve_by_id(id).await?,
        (None, None) => {
            return Err(ReqchainError::Config(
                "no request given; pass a request path, --id, --list or --interactive".to_string(),
            ))
        }
    };
    if signals::was_interrupted() {
        return Err(ReqchainError::Interrupted);
    }

    let strict = args.strict || config.strict;
    if resolved.has_issues() {
        for issue in &resolved.issues {
            if strict {
                eprintln!("{}", output::error(&format!("error: {}", issue)));
            } else {
                warn!(%issue, "unresolved value kept as written");
            }
        }
        if strict {
            return Ok(ExitStatus::Error);
        }
    }

    if args.dry_run {
        printer.write_resolved(&mut io::stdout().lock(), &resolved)?;
        return Ok(ExitStatus::Success);
    }

    let response = session.send(&resolved).await?;
    let mut stdout = io::stdout().lock();
    printer.write_response(&mut stdout, &response)?;
    stdout.flush()?;

    Ok(response.exit_status(args.check_status))
}

fn load_tree(args: &Args) -> Result<ConfigTree> {
    let mut overrides = match &args.env_file {
        Some(path) => EnvOverrides::load_file(path)?,
        None => EnvOverrides::load_beside(&args.collection)?,
    };
    overrides.extend_assignments(&args.vars)?;

    let options = LoadOptions {
        environment: args.env.clone(),
        overrides: overrides.into_map(),
    };
    load_collection(&args.collection, &options)
}

fn cache_store(config: &Config) -> Arc<dyn CacheStore> {
    match config.storage.cache {
        StorageBackend::Memory => Arc::new(MemoryCacheStore::new()),
        StorageBackend::File => Arc::new(FileCacheStore::new(config.cache_file())),
    }
}

fn cookie_store(config: &Config) -> Arc<dyn CookieStore> {
    match config.storage.cookies {
        StorageBackend::Memory => Arc::new(MemoryCookieStore::new()),
        StorageBackend::File => Arc::new(FileCookieStore::new(config.cookie_file())),
    }
}

fn build_session(tree: ConfigTree, args: &Args, config: &Config, cache: Arc<dyn CacheStore>) -> Result<Session> {
    let timeout = match args.timeout {
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => Duration::from_secs_f64(seconds),
        Some(seconds) => {
            return Err(ReqchainError::Config(format!("invalid timeout: {}", seconds)));
        }
        None => config.timeout.unwrap_or(DEFAULT_TIMEOUT),
    };
    let prompter: Arc<dyn Prompter> = if args.no_prompt {
        Arc::new(NonInteractivePrompter)
    } else {
        Arc::new(TerminalPrompter)
    };

    Session::builder(tree)
        .template_options(TemplateOptions {
            strict: args.strict || config.strict,
            placeholder: config.placeholder.clone(),
        })
        .timeout(timeout)
        .cache(cache)
        .cookies(cookie_store(config))
        .prompter(prompter)
        .build()
}

fn handle_error(error: ReqchainError) -> ExitStatus {
    if matches!(error, ReqchainError::Interrupted) {
        return ExitStatus::Interrupted;
    }
    eprintln!("{}", output::error(&format!("Error: {}", error)));
    ExitStatus::Error
}
