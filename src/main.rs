use binfixture::loader::{self, OPTIONS_FILENAME};
use binfixture::report::{self, Summary};
use binfixture::runner::SuiteRunner;
use binfixture::schema::{self, SandboxDir, SuiteConfig};
use binfixture::suite::SuiteBuilder;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with checkmarks
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
    /// JUnit XML output for CI systems
    Junit,
}

#[derive(Parser)]
#[command(name = "binfixture")]
#[command(about = "Fixture-driven acceptance tests for command-line programs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every fixture under a directory
    Run {
        /// Fixtures root, laid out as <root>/<binary>/<test>/
        path: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "human")]
        output: OutputFormat,
        /// Only run fixtures whose <binary>/<test> contains this substring
        #[arg(short, long)]
        filter: Option<String>,
        /// Show verbose output (debug logging, full failure text)
        #[arg(short, long)]
        verbose: bool,
        /// Directory for test sandboxes (overrides suite config).
        /// Use "local" for .binfixture/<timestamp>/, or specify a path.
        #[arg(long)]
        sandbox_dir: Option<String>,
        /// Run tests one at a time (overrides suite config)
        #[arg(long)]
        serial: bool,
    },
    /// Resolve every fixture's options without running anything
    Validate {
        /// Fixtures root
        path: PathBuf,
    },
    /// Scaffold a new fixture directory
    Init {
        /// Fixtures root
        path: PathBuf,
        /// Name of the binary under test
        binary: String,
        /// Name of the test case
        test: String,
    },
    /// Output the options.json schema
    Schema,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            path,
            output,
            filter,
            verbose,
            sandbox_dir,
            serial,
        } => {
            if let Err(e) = binfixture::logging::init_logging(verbose) {
                eprintln!("{e}");
            }

            let mut config = load_config(&path);

            // CLI flags override suite config
            if let Some(dir) = sandbox_dir {
                config.sandbox_dir = Some(SandboxDir::from(dir));
            }
            let serial = serial || config.serial;

            let builder = match SuiteBuilder::new(&path, config) {
                Ok(builder) => builder.filter(filter),
                Err(e) => {
                    eprintln!("Error resolving {}: {e}", path.display());
                    std::process::exit(1);
                }
            };

            let mut runner = SuiteRunner::new();
            let errors = match builder.build(&mut runner) {
                Ok(errors) => errors,
                Err(e) => {
                    eprintln!("Error reading fixtures at {}: {e}", path.display());
                    std::process::exit(1);
                }
            };

            if runner.test_count() == 0 && errors.is_empty() {
                eprintln!("No fixtures found at: {}", path.display());
                std::process::exit(1);
            }

            let run_start = std::time::Instant::now();
            let results = match runner.run(serial) {
                Ok(results) => results,
                Err(e) => {
                    eprintln!("Error starting runtime: {e}");
                    std::process::exit(1);
                }
            };
            let total_time = run_start.elapsed();

            match output {
                OutputFormat::Human => {
                    print!("{}", report::format_human(&results, &errors, verbose));
                }
                OutputFormat::Json => {
                    let output = report::format_json(&results, &errors);
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&output).expect("Failed to serialize")
                    );
                }
                OutputFormat::Junit => {
                    print!(
                        "{}",
                        report::format_junit_xml(&results, &errors, total_time)
                    );
                }
            }

            if !Summary::new(&results, &errors).success() {
                std::process::exit(1);
            }
        }
        Command::Validate { path } => {
            let config = load_config(&path);
            let resolved = match SuiteBuilder::new(&path, config).and_then(|b| b.resolve_all()) {
                Ok(resolved) => resolved,
                Err(e) => {
                    eprintln!("Error reading fixtures at {}: {e}", path.display());
                    std::process::exit(1);
                }
            };

            if resolved.is_empty() {
                eprintln!("No fixtures found at: {}", path.display());
                std::process::exit(1);
            }

            let total = resolved.len();
            let mut errors = 0;
            for (fixture, result) in resolved {
                match result {
                    Ok(options) => match options.os {
                        Some(os) => println!("✓ {} (os: {os})", fixture.id()),
                        None => println!("✓ {}", fixture.id()),
                    },
                    Err(e) => {
                        eprintln!("✗ {}: {e}", fixture.id());
                        errors += 1;
                    }
                }
            }

            if errors > 0 {
                eprintln!("\n{errors} fixture(s) failed validation");
                std::process::exit(1);
            }
            println!("\nAll {total} fixture(s) valid");
        }
        Command::Init { path, binary, test } => {
            let dir = path.join(&binary).join(&test);
            if dir.exists() {
                eprintln!("Error: fixture already exists: {}", dir.display());
                std::process::exit(1);
            }
            if let Err(e) = scaffold(&dir) {
                eprintln!("Error creating fixture: {e}");
                std::process::exit(1);
            }
            println!("Created: {}", dir.display());
        }
        Command::Schema => {
            let schema = schema::generate_schema();
            let json = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema");
            println!("{json}");
        }
    }
}

/// Load the suite config of a fixtures root, exiting on a malformed file.
fn load_config(root: &Path) -> SuiteConfig {
    match loader::load_suite_config(root) {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error loading suite config: {e}");
            std::process::exit(1);
        }
    }
}

fn scaffold(dir: &Path) -> std::io::Result<()> {
    let template = r#"{
  "args": []
}
"#;
    fs::create_dir_all(dir)?;
    fs::write(dir.join(OPTIONS_FILENAME), template)?;
    fs::write(dir.join("stdout.txt"), "")?;
    Ok(())
}
