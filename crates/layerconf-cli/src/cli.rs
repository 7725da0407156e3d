//! layerconf CLI - inspect the settings a layered resolver would produce
//!
//! Usage:
//!   layerconf -c config.yaml get database.host
//!   layerconf -c base.yaml -c local.json --env-prefix APP --automatic-env dump
//!   layerconf -c config.yaml --set server.port=9090 keys --sources
//!   layerconf check config.yaml other.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use layerconf_core::{
    Codec, CodecRegistry, Flag, JsonCodec, Mapping, Resolver, ResolverOptions, Value, YamlCodec,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::flags::parse_scalar;

/// layerconf - Layered configuration inspector
#[derive(Parser, Debug)]
#[command(name = "layerconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    /// Log resolver activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the resolver gets its values
#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Configuration file(s); later files merge over earlier ones
    #[arg(short, long = "config", global = true)]
    config: Vec<PathBuf>,

    /// Prefix for environment variable names
    #[arg(long, global = true)]
    env_prefix: Option<String>,

    /// Look up PREFIX_KEY in the environment for every key
    #[arg(long, global = true)]
    automatic_env: bool,

    /// Override a value (KEY=VALUE)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    /// Register a default (KEY=VALUE)
    #[arg(long = "set-default", value_name = "KEY=VALUE", global = true)]
    defaults: Vec<String>,

    /// Bind an explicitly given flag (KEY=VALUE)
    #[arg(long = "flag", value_name = "KEY=VALUE", global = true)]
    flags: Vec<String>,

    /// Register an alias (ALIAS=KEY)
    #[arg(long = "alias", value_name = "ALIAS=KEY", global = true)]
    aliases: Vec<String>,

    /// Key path delimiter
    #[arg(long, global = true)]
    delimiter: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a specific value
    Get {
        /// Key path (e.g. database.host)
        key: String,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Print the layer that supplied the value instead of the value
        #[arg(long)]
        source: bool,

        /// Value to print if the key is not set
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Export all settings
    Dump {
        /// Only settings under this prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List every known key
    Keys {
        /// Only keys under this prefix (printed relative to it)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Show which layer supplies each key
        #[arg(long)]
        sources: bool,
    },

    /// Write all settings to a file, format taken from its extension
    Write {
        /// Destination file
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Quick syntax check of configuration files
    Check {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Main entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        // try_init also forwards records from the `log` facade
        if let Err(e) = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .try_init()
        {
            eprintln!("{}: {}", "Warning".yellow(), e);
        }
    }

    match cli.command {
        Commands::Get {
            key,
            format,
            source,
            default,
        } => with_resolver(&cli.sources, |r| cmd_get(r, &key, &format, source, default)),

        Commands::Dump {
            prefix,
            format,
            output,
        } => with_resolver(&cli.sources, |r| {
            cmd_dump(r, prefix.as_deref(), &format, output)
        }),

        Commands::Keys { prefix, sources } => {
            with_resolver(&cli.sources, |r| cmd_keys(r, prefix.as_deref(), sources))
        }

        Commands::Write { path, force } => {
            with_resolver(&cli.sources, |r| cmd_write(r, path, force))
        }

        Commands::Check { files } => cmd_check(files),
    }
}

/// Why the resolver could not be assembled
#[derive(Debug, Clone, PartialEq, Eq)]
enum SetupError {
    /// A config file could not be read or decoded
    Load(String),
    /// A command-line assignment or alias was rejected
    Invalid(String),
}

impl SetupError {
    fn exit_code(&self) -> u8 {
        match self {
            SetupError::Load(_) => 2,
            SetupError::Invalid(_) => 1,
        }
    }

    fn message(&self) -> &str {
        match self {
            SetupError::Load(msg) | SetupError::Invalid(msg) => msg,
        }
    }
}

fn with_resolver(args: &SourceArgs, command: impl FnOnce(&Resolver) -> ExitCode) -> ExitCode {
    match build_resolver(args) {
        Ok(resolver) => command(&resolver),
        Err(e) => {
            eprintln!("{}", e.message().red());
            ExitCode::from(e.exit_code())
        }
    }
}

fn split_assignment(arg: &str) -> Result<(&str, &str), SetupError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(SetupError::Invalid(format!(
            "Expected KEY=VALUE, got '{}'",
            arg
        ))),
    }
}

fn build_resolver(args: &SourceArgs) -> Result<Resolver, SetupError> {
    let mut options = ResolverOptions::default();
    if let Some(delimiter) = &args.delimiter {
        options = options.with_key_delimiter(delimiter.clone());
    }
    let resolver = Resolver::with_options(options);

    if let Some(prefix) = &args.env_prefix {
        resolver.set_env_prefix(prefix);
    }
    if args.automatic_env {
        resolver.automatic_env();
    }

    // First file replaces, later ones merge
    for (i, file) in args.config.iter().enumerate() {
        resolver.set_config_file(file);
        let loaded = if i == 0 {
            resolver.read_in_config()
        } else {
            resolver.merge_in_config()
        };
        loaded.map_err(|e| SetupError::Load(format!("Failed to load {}: {}", file.display(), e)))?;
    }

    for arg in &args.defaults {
        let (key, value) = split_assignment(arg)?;
        resolver.set_default(key, parse_scalar(value));
    }
    for arg in &args.flags {
        let (key, value) = split_assignment(arg)?;
        resolver
            .bind_flag(key, Arc::new(Flag::explicit(key, parse_scalar(value))))
            .map_err(|e| SetupError::Invalid(e.to_string()))?;
    }
    for arg in &args.overrides {
        let (key, value) = split_assignment(arg)?;
        resolver.set(key, parse_scalar(value));
    }
    for arg in &args.aliases {
        let (alias, key) = split_assignment(arg)?;
        resolver
            .register_alias(alias, key)
            .map_err(|e| SetupError::Invalid(format!("Invalid alias '{}': {}", alias, e)))?;
    }

    Ok(resolver)
}

/// Replace binary blobs with base64 text so every format can carry them
fn printable(value: Value) -> Value {
    match value {
        Value::Bytes(bytes) => Value::String(STANDARD.encode(bytes)),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(printable).collect()),
        Value::Mapping(map) => Value::Mapping(printable_mapping(map)),
        other => other,
    }
}

fn printable_mapping(map: Mapping) -> Mapping {
    map.into_iter().map(|(k, v)| (k, printable(v))).collect()
}

fn render_value(value: &Value, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => match value {
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_yaml::to_string(value).map_err(|e| e.to_string())
            }
            scalar => Ok(format!("{}\n", scalar)),
        },
    }
}

fn cmd_get(
    resolver: &Resolver,
    key: &str,
    format: &str,
    source: bool,
    default: Option<String>,
) -> ExitCode {
    let Some(value) = resolver.get(key) else {
        return match default {
            Some(default_val) => {
                println!("{}", default_val);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("{}: Key '{}' not set", "Error".red(), key);
                ExitCode::from(1)
            }
        };
    };

    if source {
        match resolver.source_of(key) {
            Some(layer) => println!("{}", layer),
            None => println!("unknown"),
        }
        return ExitCode::SUCCESS;
    }

    match render_value(&printable(value), format) {
        Ok(out) => {
            print!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_dump(
    resolver: &Resolver,
    prefix: Option<&str>,
    format: &str,
    output: Option<PathBuf>,
) -> ExitCode {
    let settings = match prefix {
        Some(prefix) => resolver.view(prefix).all_settings(),
        None => resolver.all_settings(),
    };
    let settings = printable_mapping(settings);

    let encoded = match format {
        "json" => JsonCodec.encode(&settings),
        _ => YamlCodec.encode(&settings),
    };
    let content = match encoded {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    if let Some(output_path) = output {
        if let Err(e) = std::fs::write(&output_path, &content) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        print!("{}", String::from_utf8_lossy(&content));
    }
    ExitCode::SUCCESS
}

fn cmd_keys(resolver: &Resolver, prefix: Option<&str>, sources: bool) -> ExitCode {
    let view = resolver.view(prefix.unwrap_or_default());
    for key in view.all_keys() {
        if sources {
            let layer = view
                .source_of(&key)
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("{} {}", key, format!("({})", layer).dimmed());
        } else {
            println!("{}", key);
        }
    }
    ExitCode::SUCCESS
}

fn cmd_write(resolver: &Resolver, path: PathBuf, force: bool) -> ExitCode {
    let written = if force {
        resolver.write_config_as(&path)
    } else {
        resolver.safe_write_config_as(&path)
    };
    match written {
        Ok(()) => {
            println!("{} Wrote to {}", "✓".green(), path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}: {}", "✗".red(), path.display(), e);
            ExitCode::from(1)
        }
    }
}

/// Decode one file with the codec for its extension, returning the format
fn check_file(codecs: &CodecRegistry, file: &Path) -> layerconf_core::Result<String> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let codec = codecs.get(&ext)?;
    let bytes = std::fs::read(file).map_err(|e| layerconf_core::Error::io(file, &e))?;
    codec.decode(&bytes)?;
    Ok(ext.to_uppercase())
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let codecs = CodecRegistry::with_builtins();
    let mut all_valid = true;

    for file in files {
        match check_file(&codecs, &file) {
            Ok(format) => {
                println!("{} {}: valid {}", "✓".green(), file.display(), format);
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerconf_core::{ErrorKind, Layer};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sources(args: &[&str]) -> SourceArgs {
        let mut argv = vec!["layerconf"];
        argv.extend_from_slice(args);
        argv.push("keys");
        Cli::try_parse_from(argv).unwrap().sources
    }

    #[test]
    fn test_parse_global_options_after_subcommand() {
        let cli =
            Cli::try_parse_from(["layerconf", "get", "a.b", "--set", "a.b=1", "-c", "x.yaml"])
                .unwrap();
        assert_eq!(cli.sources.overrides, vec!["a.b=1"]);
        assert_eq!(cli.sources.config, vec![PathBuf::from("x.yaml")]);
        assert!(matches!(cli.command, Commands::Get { ref key, .. } if key == "a.b"));
    }

    #[test]
    fn test_check_requires_files() {
        assert!(Cli::try_parse_from(["layerconf", "check"]).is_err());
    }

    #[test]
    fn test_build_resolver_layers() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base.yaml");
        let local = dir.path().join("local.json");
        std::fs::write(&base, "server:\n  host: base\n  port: 80\nname: app\n").unwrap();
        std::fs::write(&local, r#"{"server": {"port": 8080}}"#).unwrap();

        let args = sources(&[
            "-c",
            base.to_str().unwrap(),
            "-c",
            local.to_str().unwrap(),
            "--set-default",
            "timeout=30",
            "--flag",
            "name=cli",
            "--set",
            "server.host=override",
            "--alias",
            "port=server.port",
        ]);
        let r = build_resolver(&args).unwrap();

        assert_eq!(r.get("server.host"), Some(Value::from("override")));
        assert_eq!(r.get("port"), Some(Value::from(8080)));
        assert_eq!(r.source_of("port"), Some(Layer::File));
        assert_eq!(r.get("name"), Some(Value::from("cli")));
        assert_eq!(r.source_of("name"), Some(Layer::Flag));
        assert_eq!(r.get("timeout"), Some(Value::from(30)));
    }

    #[test]
    fn test_build_resolver_missing_file() {
        let args = sources(&["-c", "/nonexistent/layerconf/config.yaml"]);
        let err = build_resolver(&args).unwrap_err();
        assert!(matches!(err, SetupError::Load(_)));
        assert!(err.message().starts_with("Failed to load"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_build_resolver_rejects_bad_assignment() {
        let args = sources(&["--set", "novalue"]);
        let err = build_resolver(&args).unwrap_err();
        assert_eq!(
            err,
            SetupError::Invalid("Expected KEY=VALUE, got 'novalue'".to_string())
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_build_resolver_rejected_alias_is_invalid() {
        let args = sources(&["--alias", "a=b", "--alias", "b=a"]);
        let err = build_resolver(&args).unwrap_err();
        assert!(err.message().starts_with("Invalid alias 'b'"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_build_resolver_custom_delimiter() {
        let args = sources(&["--delimiter", "/", "--set", "a/b=x"]);
        let r = build_resolver(&args).unwrap();
        assert_eq!(r.view("a").get("b"), Some(Value::from("x")));
    }

    #[test]
    fn test_printable_encodes_bytes() {
        let mut map = Mapping::new();
        map.insert("blob".into(), Value::Bytes(b"hi".to_vec()));
        let out = printable(Value::Mapping(map));
        let Value::Mapping(map) = out else {
            panic!("expected mapping");
        };
        assert_eq!(map["blob"], Value::from("aGk="));
    }

    #[test]
    fn test_render_value_formats() {
        assert_eq!(render_value(&Value::from(5), "text").unwrap(), "5\n");
        assert_eq!(render_value(&Value::from("x"), "json").unwrap(), "\"x\"\n");
        assert_eq!(
            render_value(&Value::from(vec!["a", "b"]), "text").unwrap(),
            "- a\n- b\n"
        );
    }

    #[test]
    fn test_check_file() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.YAML");
        let bad = dir.path().join("bad.json");
        let odd = dir.path().join("config.ini");
        std::fs::write(&good, "a: 1\n").unwrap();
        std::fs::write(&bad, "{not json").unwrap();
        std::fs::write(&odd, "[a]\n").unwrap();

        let codecs = CodecRegistry::with_builtins();
        assert_eq!(check_file(&codecs, &good).unwrap(), "YAML");
        assert_eq!(check_file(&codecs, &bad).unwrap_err().kind, ErrorKind::Parse);
        assert_eq!(
            check_file(&codecs, &odd).unwrap_err().kind,
            ErrorKind::UnsupportedFormat
        );
        assert_eq!(
            check_file(&codecs, &dir.path().join("missing.yaml"))
                .unwrap_err()
                .kind,
            ErrorKind::Io
        );
    }
}
