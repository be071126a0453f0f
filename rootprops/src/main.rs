//! rootprops: Command-line tool reporting public-key statistics for a root store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Root store read when no file is given.
const DEFAULT_STORE: &str = "certdata.json";

#[derive(Parser)]
#[command(
    name = "rootprops",
    about = "Public-key statistics for the server-auth roots of an NSS root store",
    long_about = "rootprops reads an NSS root store in certdata.json form, keeps the roots\n\
                  trusted to delegate for TLS server authentication, and reports the\n\
                  distribution of public-key algorithms, ECDSA curves, and RSA key sizes.\n\n\
                  With no subcommand it behaves like `rootprops stats certdata.json`.\n\
                  Entries that cannot be decoded are reported on stderr and skipped.",
    after_help = "EXAMPLES:\n\
                  \n  rootprops\
                  \n  rootprops stats /path/to/certdata.json\
                  \n  rootprops convert certdata.txt certdata.json\
                  \n  cat certdata.txt | rootprops convert | rootprops stats -"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report algorithm, curve, and key-size distributions (the default)
    #[command(after_help = "EXAMPLES:\n\
                      \n  rootprops stats\
                      \n  rootprops stats certdata.json\
                      \n  rootprops -vv stats certdata.json\
                      \n  rootprops stats - < certdata.json")]
    Stats {
        /// Root store in certdata.json form. Use `-` for stdin.
        #[arg(default_value = DEFAULT_STORE)]
        file: PathBuf,
    },
    /// Convert NSS certdata.txt into certdata.json
    #[command(after_help = "Reads from stdin when INPUT is omitted and writes to stdout\n\
                      when OUTPUT is omitted.\n\
                      \nEXAMPLES:\n\
                      \n  rootprops convert certdata.txt certdata.json\
                      \n  rootprops convert certdata.txt > certdata.json")]
    Convert {
        /// certdata.txt file. Reads from stdin if omitted.
        input: Option<PathBuf>,
        /// Output JSON file. Writes to stdout if omitted.
        output: Option<PathBuf>,
    },
}

/// Maximum size for root store inputs (64 MiB).
const MAX_INPUT_BYTES: u64 = 64 * 1024 * 1024;

/// Read a whole input file, or stdin when `path` is `None` or `-`.
fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path.filter(|p| p.as_os_str() != "-") {
        Some(path) => {
            let meta = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat file: {}", path.display()))?;
            if meta.len() > MAX_INPUT_BYTES {
                anyhow::bail!(
                    "File too large ({} bytes, max {} bytes): {}",
                    meta.len(),
                    MAX_INPUT_BYTES,
                    path.display()
                );
            }
            std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .take(MAX_INPUT_BYTES + 1)
                .read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            if buf.len() as u64 > MAX_INPUT_BYTES {
                anyhow::bail!("Input too large (max {} bytes): stdin", MAX_INPUT_BYTES);
            }
            Ok(buf)
        }
    }
}

/// Human-readable name of an input for the report heading.
fn source_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Pick the log level: `-v` flags win, then `RUST_LOG`, then WARN.
fn log_level(verbose: u8, env: Option<&str>) -> Level {
    match verbose {
        0 => env
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let env = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(verbose, env.as_deref()))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")
}

/// Load, analyze, and print the report for one root store.
fn run_stats(file: &Path) -> Result<()> {
    let data = read_input(Some(file))?;
    let store = rootprops_lib::RootStore::from_json(&data)
        .with_context(|| format!("Failed to load root store: {}", source_name(file)))?;
    info!(entries = store.len(), source = %source_name(file), "loaded root store");

    let stats = rootprops_lib::analyze(&store);
    for skipped in &stats.skipped {
        eprintln!("{}", skipped);
    }
    info!(
        good = stats.good,
        non_server_auth = stats.skipped_non_server_auth,
        bad_base64 = stats.skipped_bad_base64,
        bad_der = stats.skipped_bad_der,
        "analysis complete"
    );

    print!(
        "{}",
        rootprops_lib::display_report(&stats, &source_name(file))
    );
    Ok(())
}

fn run_convert(input: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let data = read_input(input)?;
    let label = input.map_or("stdin".to_string(), source_name);
    let text = String::from_utf8(data).with_context(|| format!("{} is not UTF-8", label))?;
    let converted = rootprops_lib::parse_certdata(&text)
        .with_context(|| format!("Failed to convert {}", label))?;
    let mut json = converted.to_json_pretty()?;
    json.push('\n');

    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write file: {}", path.display()))?,
        None => std::io::stdout()
            .write_all(json.as_bytes())
            .context("Failed to write to stdout")?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match &cli.command {
        None => run_stats(Path::new(DEFAULT_STORE)),
        Some(Commands::Stats { file }) => run_stats(file),
        Some(Commands::Convert { input, output }) => {
            run_convert(input.as_deref(), output.as_deref())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../tests/data")
            .join(name)
    }

    // ---- Argument parsing ----

    #[test]
    fn no_subcommand_defaults_to_stats() {
        let cli = Cli::try_parse_from(["rootprops"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn stats_file_defaults_to_certdata_json() {
        let cli = Cli::try_parse_from(["rootprops", "stats"]).unwrap();
        match cli.command {
            Some(Commands::Stats { file }) => assert_eq!(file, PathBuf::from(DEFAULT_STORE)),
            _ => panic!("expected stats"),
        }
    }

    #[test]
    fn verbose_is_global_and_counted() {
        let cli = Cli::try_parse_from(["rootprops", "stats", "-vv", "x.json"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn convert_paths_are_optional() {
        let cli = Cli::try_parse_from(["rootprops", "convert"]).unwrap();
        match cli.command {
            Some(Commands::Convert { input, output }) => {
                assert!(input.is_none());
                assert!(output.is_none());
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["rootprops", "--json"]).is_err());
    }

    // ---- Log level selection ----

    #[test]
    fn log_level_defaults_to_warn() {
        assert_eq!(log_level(0, None), Level::WARN);
        assert_eq!(log_level(0, Some("not-a-level")), Level::WARN);
    }

    #[test]
    fn log_level_from_env() {
        assert_eq!(log_level(0, Some("debug")), Level::DEBUG);
    }

    #[test]
    fn verbose_overrides_env() {
        assert_eq!(log_level(1, Some("error")), Level::INFO);
        assert_eq!(log_level(2, None), Level::DEBUG);
        assert_eq!(log_level(5, None), Level::TRACE);
    }

    // ---- Input handling ----

    #[test]
    fn source_name_for_stdin() {
        assert_eq!(source_name(Path::new("-")), "stdin");
        assert_eq!(source_name(Path::new("certdata.json")), "certdata.json");
    }

    #[test]
    fn read_input_reads_file() {
        let data = read_input(Some(fixture("certdata.json").as_path())).unwrap();
        assert!(data.starts_with(b"{"));
    }

    #[test]
    fn read_input_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(Some(dir.path().join("certdata.json").as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to stat file"));
    }

    #[test]
    fn stats_fails_on_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certdata.json");
        std::fs::write(&path, br#"{"Root": {"CKA_VALUE": ["not", "a", "string"]}}"#).unwrap();
        let err = run_stats(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load root store"));
    }

    #[test]
    fn stats_succeeds_on_empty_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();
        assert!(run_stats(file.path()).is_ok());
    }

    #[test]
    fn stats_succeeds_despite_skipped_entries() {
        assert!(run_stats(&fixture("certdata.json")).is_ok());
    }

    #[test]
    fn convert_writes_loadable_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("certdata.json");
        run_convert(Some(fixture("certdata.txt").as_path()), Some(out.as_path())).unwrap();

        let store = rootprops_lib::RootStore::from_json(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(store.len(), 3);
        let stats = rootprops_lib::analyze(&store);
        assert_eq!(stats.good, 2);
    }

    #[test]
    fn convert_rejects_broken_certdata() {
        let mut input = tempfile::NamedTempFile::new().unwrap();
        input
            .write_all(b"CKA_CLASS CK_OBJECT_CLASS CKO_CERTIFICATE\nCKA_VALUE MULTILINE_OCTAL\n")
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.json");
        assert!(run_convert(Some(input.path()), Some(out.as_path())).is_err());
        assert!(!out.exists());
    }
}
