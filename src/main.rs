use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use themestore::services::storage::current_theme_key;
use themestore::{
    FileBackend, SettingsBackend, SettingsFormat, SettingsParameters, ThemeError, ThemeStore,
    ThemeValue,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("themestore {} - JSON theme and settings store", VERSION);
    println!();
    println!("USAGE:");
    println!("    themestore [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help              Print help information");
    println!("    -v, --version           Print version information");
    println!("    --config <FILE>         Read parameters from a JSON file");
    println!("    --settings-dir <DIR>    Settings directory (default: ~/.themestore)");
    println!("    --folder <DIR>          Folder scanned for *.json themes");
    println!("    --prefix <TEXT>         Namespace for settings keys");
    println!("    --format <native|ini>   Settings file format");
    println!("    --theme <FILE>          Load an extra theme file (repeatable)");
    println!("    --select <NAME>         Select the current theme");
    println!("    --set <PATH>=<JSON>     Set a value in the current theme (dot-separated path)");
    println!("    --save                  Persist the current theme after --set");
    println!("    --restore               Drop cached settings and reload themes from disk");
    println!("    --list                  List known themes");
    println!("    --print                 Print the current theme as JSON");
    println!();
    println!("Logging is controlled with RUST_LOG (default: warn).");
}

fn print_version() {
    println!("themestore {}", VERSION);
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    settings_dir: Option<PathBuf>,
    folder: Option<String>,
    prefix: Option<String>,
    format: Option<SettingsFormat>,
    themes: Vec<PathBuf>,
    select: Option<String>,
    set: Vec<(String, String)>,
    save: bool,
    restore: bool,
    list: bool,
    print: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Version,
    Run(Options),
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut opts = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "--config" => opts.config = Some(PathBuf::from(value("--config")?)),
            "--settings-dir" => opts.settings_dir = Some(PathBuf::from(value("--settings-dir")?)),
            "--folder" => opts.folder = Some(value("--folder")?),
            "--prefix" => opts.prefix = Some(value("--prefix")?),
            "--format" => {
                let raw = value("--format")?;
                let format = SettingsFormat::parse(&raw)
                    .ok_or_else(|| format!("Unknown format: {}", raw))?;
                opts.format = Some(format);
            }
            "--theme" => opts.themes.push(PathBuf::from(value("--theme")?)),
            "--select" => opts.select = Some(value("--select")?),
            "--set" => {
                let raw = value("--set")?;
                let (path, json) = raw
                    .split_once('=')
                    .ok_or_else(|| format!("--set expects PATH=VALUE, got {}", raw))?;
                opts.set.push((path.to_string(), json.to_string()));
            }
            "--save" => opts.save = true,
            "--restore" => opts.restore = true,
            "--list" => opts.list = true,
            "--print" => opts.print = true,
            other => return Err(format!("Unknown option: {}", other)),
        }
    }

    Ok(Command::Run(opts))
}

/// Values that are not valid JSON are taken as plain strings
fn parse_value(raw: &str) -> ThemeValue {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => ThemeValue::from(value),
        Err(_) => ThemeValue::from(raw),
    }
}

fn run(opts: Options) -> Result<(), ThemeError> {
    let mut params = match &opts.config {
        Some(path) => SettingsParameters::load_from(path)?,
        None => SettingsParameters::load(),
    };
    if let Some(folder) = opts.folder {
        params.setting_folder = folder;
    }
    if let Some(prefix) = opts.prefix {
        params.prefix = prefix;
    }
    if let Some(format) = opts.format {
        params.format = format;
    }
    params.theme_paths.extend(opts.themes);

    let settings_dir = opts
        .settings_dir
        .or_else(SettingsParameters::settings_dir)
        .ok_or_else(|| ThemeError::Config("Could not determine settings directory".to_string()))?;
    let backend = FileBackend::open(settings_dir, params.format);
    if let Some(name) = backend.get(&current_theme_key(&params.prefix)).and_then(Value::as_str) {
        params.current_theme = name.to_string();
    }

    let mut store = ThemeStore::new(Box::new(backend));
    store.apply_parameters(&params)?;

    if opts.restore {
        store.restore()?;
        store.select_theme(&params.current_theme);
    }
    if let Some(name) = &opts.select {
        if !store.select_theme(name) {
            eprintln!("Warning: theme \"{}\" is not loaded", name);
        }
    }
    for (path, raw) in &opts.set {
        store.set_value(path, parse_value(raw), ".")?;
    }
    if opts.save {
        store.save_current()?;
    }

    if opts.list {
        for name in store.theme_names() {
            let marker = if name == store.current_theme() { "*" } else { " " };
            println!("{} {}", marker, name);
        }
    }
    if opts.print {
        let theme = store.theme().ok_or(ThemeError::NoActiveTheme)?;
        let json = serde_json::to_string_pretty(&theme.to_json())
            .map_err(|e| ThemeError::Storage(e.to_string()))?;
        println!("{}", json);
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let opts = match parse_args(&args) {
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            print_version();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Run(opts)) => opts,
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!("Use --help for usage information");
            return ExitCode::from(2);
        }
    };

    init_logging();

    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
