use clap::{Parser, Subcommand, ValueEnum};
use xshell::{Shell, cmd};

/// Developer tasks for the passwordless workspace.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the test suite with nextest, optionally collecting coverage.
    Test {
        #[clap(short, long, default_value_t = false)]
        coverage: bool,
        /// Only test one crate, e.g. `rp-passwordless-axum`.
        #[clap(short, long)]
        package: Option<String>,
        #[clap(last = true)]
        args: Vec<String>,
    },
    /// Run one of the demo binaries. Reads `PASSWORDLESS_*` from the environment.
    Demo {
        #[clap(value_enum)]
        demo: Demo,
        #[clap(last = true)]
        args: Vec<String>,
    },
    Check,
    Fmt,
    Doc,
    Deny,
    Audit,
    UnusedDeps,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Demo {
    Client,
    StepUp,
    MultiTenancy,
}

impl Demo {
    const fn bin(self) -> &'static str {
        match self {
            Self::Client => "client-demo",
            Self::StepUp => "step-up-demo",
            Self::MultiTenancy => "multi-tenancy-demo",
        }
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let sh = Shell::new()?;
    let args = Args::parse();

    match args.command {
        Commands::Test {
            coverage,
            package,
            args,
        } => test(&sh, coverage, package.as_deref(), &args)?,
        Commands::Demo { demo, args } => {
            let bin = demo.bin();
            println!("cargo run {bin}");
            cmd!(sh, "cargo run -p demos --bin {bin} -- {args...}").run()?;
        }
        Commands::Check => {
            println!("cargo check");
            cmd!(sh, "cargo clippy --workspace --all-targets --locked -- -D warnings").run()?;
            cmd!(sh, "cargo fmt --all --check").run()?;
        }
        Commands::Fmt => {
            println!("cargo fmt");
            cmd!(sh, "cargo fmt --all").run()?;
            cmd!(
                sh,
                "cargo clippy --fix --allow-dirty --allow-staged --workspace --all-features --tests"
            )
            .run()?;
        }
        Commands::Doc => {
            println!("cargo doc");
            cmd!(sh, "cargo doc --workspace --no-deps --all-features").run()?;
            open(&sh, "target/doc/rp_passwordless_client/index.html")?;
        }
        Commands::Deny => {
            println!("cargo deny");
            cmd!(sh, "cargo install cargo-deny").run()?;
            cmd!(sh, "cargo deny check").run()?;
        }
        Commands::Audit => {
            println!("cargo audit");
            cmd!(sh, "cargo install cargo-audit").run()?;
            cmd!(sh, "cargo audit").run()?;
        }
        Commands::UnusedDeps => {
            println!("unused deps");
            cmd!(sh, "cargo install cargo-machete").run()?;
            cmd!(sh, "cargo-machete").run()?;
        }
    }

    Ok(())
}

fn test(sh: &Shell, coverage: bool, package: Option<&str>, args: &[String]) -> eyre::Result<()> {
    println!("cargo test");
    cmd!(sh, "cargo install cargo-nextest").run()?;

    if coverage {
        cmd!(sh, "cargo install grcov").run()?;
        for (key, val) in [
            ("CARGO_INCREMENTAL", "0"),
            ("RUSTFLAGS", "-Cinstrument-coverage"),
            ("LLVM_PROFILE_FILE", "target/coverage/%p-%m.profraw"),
        ] {
            sh.set_var(key, val);
        }
    }

    let scope = package.map_or_else(
        || vec!["--workspace".to_owned()],
        |package| vec!["-p".to_owned(), package.to_owned()],
    );
    cmd!(
        sh,
        "cargo nextest run {scope...} --all-targets --no-fail-fast {args...}"
    )
    .run()?;

    if coverage {
        sh.create_dir("target/coverage")?;
        cmd!(sh, "grcov . --binary-path ./target/debug/deps/ -s . -t html,cobertura --branch --ignore-not-existing --ignore '../*' --ignore \"/*\" --ignore 'xtask/*' --ignore 'demos/*' -o target/coverage/").run()?;
        open(sh, "target/coverage/html/index.html")?;
    }
    Ok(())
}

/// Opens a generated report unless running on CI.
fn open(sh: &Shell, path: &str) -> eyre::Result<()> {
    if std::option_env!("CI").is_some() {
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    cmd!(sh, "open {path}").run()?;

    #[cfg(target_os = "linux")]
    cmd!(sh, "xdg-open {path}").run()?;

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    let _ = (sh, path);

    Ok(())
}
