//! CLI for planning and building extsel extension modules.
//!
//! The variant decision is made from the environment only: the transpiler
//! is probed, and `USE_CYTHON` (or the variable given by `--toggle-var`)
//! opts in to the transpiled source.
//!
//! # Examples
//!
//! ```bash
//! # Show which source would be compiled, and the packaging metadata
//! extsel plan --module fibonacci --source-dir demos/fibonacci --metadata
//!
//! # Build against the pregenerated fallback
//! extsel build --module fibonacci --source-dir demos/fibonacci -o target/extsel \
//!   -I /usr/include/python3.12
//!
//! # Opt in to transpiling fibonacci.pyx with cython
//! USE_CYTHON=1 extsel build --module fibonacci --source-dir demos/fibonacci -o target/extsel \
//!   -I /usr/include/python3.12
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extsel::{
    BuildConfig, BuildPlan, BuildSettings, CcCompiler, CommandTranspiler, PackageMetadata,
    Pipeline, ProcessEnv,
};

/// Plan and build a single compiled extension module.
#[derive(Parser, Debug)]
#[command(name = "extsel")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the environment and print the resolved plan as JSON
    Plan {
        #[command(flatten)]
        module: ModuleArgs,

        /// Print packaging metadata instead of the plan
        #[arg(long)]
        metadata: bool,
    },

    /// Plan, then compile the extension with the platform C compiler
    Build {
        #[command(flatten)]
        module: ModuleArgs,

        /// Target triple to compile for (default: this tool's target)
        #[arg(long)]
        target: Option<String>,

        /// Optimization level passed to the C compiler
        #[arg(long, default_value_t = 2)]
        opt_level: u32,
    },
}

#[derive(clap::Args, Debug)]
struct ModuleArgs {
    /// Logical module name (e.g. `fibonacci` or `pkg.fibonacci`)
    #[arg(short, long)]
    module: String,

    /// Directory containing `<stem>.pyx` and `<stem>.c`
    #[arg(short, long, default_value = ".")]
    source_dir: PathBuf,

    /// Source file stem (default: last segment of the module name)
    #[arg(long)]
    stem: Option<String>,

    /// Directory for transpiler output, artifacts and metadata
    #[arg(short, long, default_value = "build")]
    out_dir: PathBuf,

    /// Transpiler program
    #[arg(long, default_value = extsel::transpile::DEFAULT_TRANSPILER)]
    transpiler: PathBuf,

    /// Environment variable that opts in to the transpiled source
    #[arg(long, default_value = extsel::DEFAULT_TOGGLE_VAR)]
    toggle_var: String,

    /// Header search directory. Can be specified multiple times.
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Preprocessor definition as NAME or NAME=VALUE. Can be specified multiple times.
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Distribution name for packaging metadata (default: module name)
    #[arg(long)]
    package_name: Option<String>,

    /// Distribution version for packaging metadata
    #[arg(long, default_value = "0.1.0")]
    package_version: String,
}

impl ModuleArgs {
    fn config(&self) -> BuildConfig {
        let mut settings = BuildSettings::new();
        for dir in &self.include_dirs {
            settings = settings.with_include_dir(dir);
        }
        for define in &self.defines {
            let (name, value) = parse_define(define);
            settings = settings.with_define(name, value);
        }

        let config = BuildConfig::new(&self.module)
            .with_source_dir(&self.source_dir)
            .with_out_dir(&self.out_dir)
            .with_toggle_var(&self.toggle_var)
            .with_settings(settings);
        match &self.stem {
            Some(stem) => config.with_source_stem(stem),
            None => config,
        }
    }

    fn metadata(&self, plan: &BuildPlan) -> PackageMetadata {
        let name = self.package_name.as_deref().unwrap_or(&self.module);
        PackageMetadata::new(name, &self.package_version)
            .with_extension(plan.descriptor().clone())
            .with_transpiler_extra()
    }
}

/// Split `NAME=VALUE` into its parts; a bare `NAME` has no value.
fn parse_define(define: &str) -> (&str, Option<&str>) {
    match define.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (define, None),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up tracing
    let filter = if args.verbose {
        "extsel=debug,extsel_cli=debug"
    } else {
        "extsel=info,extsel_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Plan { module, metadata } => plan(&module, metadata),
        Command::Build {
            module,
            target,
            opt_level,
        } => build(&module, target, opt_level),
    }
}

fn plan(module: &ModuleArgs, metadata: bool) -> Result<()> {
    let config = module.config();
    let transpiler = CommandTranspiler::new(&module.transpiler);

    let plan = Pipeline::new(&config, &transpiler)
        .plan(&ProcessEnv)
        .with_context(|| format!("Failed to plan extension '{}'", module.module))?;

    let json = if metadata {
        module.metadata(&plan).to_json()?
    } else {
        serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?
    };
    println!("{json}");
    Ok(())
}

fn build(module: &ModuleArgs, target: Option<String>, opt_level: u32) -> Result<()> {
    let config = module.config();
    let transpiler = CommandTranspiler::new(&module.transpiler);

    println!("extsel");
    println!("======");
    println!();
    println!("Module:     {}", config.module_name());
    println!("Sources:    {}", config.source_dir().display());
    println!("Output:     {}", config.out_dir().display());
    println!("Transpiler: {}", module.transpiler.display());
    println!("Toggle:     {}", config.toggle_var());
    println!();

    println!("Step 1: Selecting sources...");
    let start = Instant::now();
    let plan = Pipeline::new(&config, &transpiler)
        .plan(&ProcessEnv)
        .with_context(|| format!("Failed to plan extension '{}'", module.module))?;
    tracing::debug!(?plan, "Resolved build plan");
    println!(
        "  Selected {} source ({})",
        plan.variant(),
        plan.selected_sources()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if plan.descriptor().is_transpiled() {
        println!(
            "  Transpiled to {} in {:?}",
            plan.descriptor()
                .sources()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            start.elapsed()
        );
    }

    println!();
    println!("Step 2: Compiling...");
    let start = Instant::now();
    let mut compiler = CcCompiler::new(config.out_dir()).with_opt_level(opt_level);
    if let Some(target) = target {
        compiler = compiler.with_target(target);
    }
    let artifact = plan
        .compile(&compiler)
        .with_context(|| format!("Failed to compile extension '{}'", module.module))?;
    println!("  Done in {:?}", start.elapsed());
    println!("  Saved to: {}", artifact.path.display());

    println!();
    println!("Step 3: Writing packaging metadata...");
    let path = module
        .metadata(&plan)
        .write_to_dir(config.out_dir())
        .context("Failed to write packaging metadata")?;
    println!("  Saved to: {}", path.display());

    println!();
    println!("Success!");
    Ok(())
}
