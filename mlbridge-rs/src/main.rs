use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use mlbridge::cli::{self, CliArgs, ConfigFile};
use mlbridge::loopback::LoopbackFactory;
use mlbridge::{Bindings, Language, Options, SessionManager, Value};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("mlbridge: {e}");
            eprintln!("{}", cli::USAGE);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.debug);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mlbridge: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("MLBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Rc file, then `MLBRIDGE_*` variables, then flags.
fn load_options(args: &CliArgs) -> Result<Options, String> {
    let path = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(p) => Some(p.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };

    let mut opts = match path {
        Some(path) => {
            let (opts, errors) =
                Options::load_file(&path).map_err(|e| format!("{}: {e}", path.display()))?;
            for e in errors {
                tracing::warn!("{}: {e}", path.display());
            }
            opts
        }
        None => Options::default(),
    };

    for e in opts.apply_env(std::env::vars()) {
        tracing::warn!("{e}");
    }
    args.apply_to(&mut opts)?;
    Ok(opts)
}

fn run(args: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let opts = load_options(args)?;
    let sessions = if args.loopback {
        Arc::new(SessionManager::new(LoopbackFactory::new()))
    } else {
        SessionManager::global()
    };
    let engine = Language::script_engine(Bindings::new(Arc::clone(&sessions), opts.shared()));

    for path in &args.files {
        if !Language::handles(path) {
            tracing::warn!("{}: not a .m file, running it anyway", path.display());
        }
        let file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
        print_result(engine.eval_reader(BufReader::new(file))?);
    }
    if let Some(src) = &args.command {
        print_result(engine.eval(src)?);
    }
    if args.files.is_empty() && args.command.is_none() {
        print_result(engine.eval_reader(io::stdin().lock())?);
    }

    if args.list_vars {
        for (name, value) in engine.bindings().entries()? {
            println!("{name} = {value}");
        }
    }
    if args.exit_engine {
        println!("{}", sessions.end_session());
    }
    Ok(())
}

fn print_result(result: Option<Value>) {
    if let Some(value) = result {
        println!("{value}");
    }
}
