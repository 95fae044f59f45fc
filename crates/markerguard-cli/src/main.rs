use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use markerguard_core::{
    CaptureOutcome, CommandRouter, ConfigError, Decision, Effect, GuardConfig, GuardError,
    GuardResult, Notifier, ObjectKind, OwnerId, OwnershipRegistry, PrivilegeCheck,
    StoreResolver, TargetDescriptor, YamlMarkerSource, YamlOwnershipFile,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("markerguard")
        .version(markerguard_core::VERSION)
        .about("Ownership checks for a shared marker store")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("YAML configuration file"),
        )
        .arg(
            Arg::new("markers")
                .long("markers")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Marker store file (overrides config)"),
        )
        .arg(
            Arg::new("ownership")
                .long("ownership")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Ownership file (overrides config)"),
        )
        .subcommand(
            Command::new("check")
                .about("Run one command through the router and print the decision")
                .arg(
                    Arg::new("as")
                        .long("as")
                        .required(true)
                        .help("Identity issuing the command"),
                )
                .arg(
                    Arg::new("privileged")
                        .long("privileged")
                        .action(ArgAction::SetTrue)
                        .help("Treat the identity as privileged"),
                )
                .arg(
                    Arg::new("command")
                        .required(true)
                        .num_args(1..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true)
                        .help("Command text, e.g. /dmarker delete id:spawn"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a target against the marker store")
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("marker")
                        .value_parser(value_parser!(ObjectKind))
                        .help("Object kind: marker, area, circle or line"),
                )
                .arg(
                    Arg::new("target")
                        .required(true)
                        .num_args(1..)
                        .help("Target arguments, e.g. id:spawn set:towns"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Rewrite the ownership file with canonical keys"),
        )
        .subcommand(Command::new("list").about("Print ownership records"))
        .subcommand(
            Command::new("purge")
                .about("Remove ownership records")
                .arg(
                    Arg::new("scope")
                        .long("scope")
                        .help("Only remove records in this scope"),
                ),
        )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file (if any) with command-line path overrides applied
fn load_config(matches: &ArgMatches) -> GuardResult<GuardConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GuardConfig::from_yaml_file(path)?,
        None => GuardConfig::new(),
    };
    if let Some(path) = matches.get_one::<PathBuf>("markers") {
        config = config.with_markers_path(path);
    }
    if let Some(path) = matches.get_one::<PathBuf>("ownership") {
        config = config.with_ownership_path(path);
    }
    Ok(config)
}

fn markers_source(config: &GuardConfig) -> GuardResult<YamlMarkerSource> {
    let path = config.markers_path.as_ref().ok_or_else(|| {
        ConfigError::Invalid("no marker store configured; pass --markers".to_string())
    })?;
    Ok(YamlMarkerSource::new(path))
}

fn open_registry(config: &GuardConfig) -> GuardResult<OwnershipRegistry> {
    let path = config.ownership_path.as_ref().ok_or_else(|| {
        ConfigError::Invalid("no ownership file configured; pass --ownership".to_string())
    })?;
    let registry = OwnershipRegistry::new(Box::new(YamlOwnershipFile::new(path)));
    let report = registry.load()?;
    if report.skipped_empty > 0 {
        tracing::info!("Skipped {} ownership entries without an owner", report.skipped_empty);
    }
    Ok(registry)
}

/// Prints rejection notices the way a player would see them
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, recipient: &OwnerId, message: &str) {
        println!("[to {}] {}", recipient, message);
    }
}

async fn run_check(config: &GuardConfig, args: &ArgMatches) -> Result<()> {
    let actor = OwnerId::new(
        args.get_one::<String>("as")
            .context("--as is required")?
            .as_str(),
    );
    let privileged = args.get_flag("privileged");
    let text = args
        .get_many::<String>("command")
        .context("command text is required")?
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    let privileges: Arc<dyn PrivilegeCheck> = Arc::new(move |_: &OwnerId| privileged);
    let router = CommandRouter::new(
        config,
        Arc::new(markers_source(config)?),
        Arc::new(open_registry(config)?),
        privileges,
        Arc::new(ConsoleNotifier),
    );

    match router.handle(&text, &actor) {
        Decision::Ignore => println!("ignored"),
        Decision::Deny(reason) => println!("denied: {:?}", reason),
        Decision::Allow(Effect::None) => println!("allowed"),
        Decision::Allow(Effect::OwnershipReleased(key)) => {
            println!("allowed; released {}", key);
        }
        Decision::Allow(Effect::ScopePurged { scope, removed }) => {
            println!("allowed; purged {} records in scope '{}'", removed, scope);
        }
        Decision::Allow(Effect::CaptureScheduled(handle)) => {
            println!("allowed; waiting for capture");
            match handle.await.context("capture task failed")? {
                CaptureOutcome::Captured(key) => println!("captured {} for {}", key, actor),
                CaptureOutcome::AlreadyOwned(key) => println!("{} already owned", key),
                CaptureOutcome::Abandoned { attempts } => {
                    println!("object never appeared after {} attempts", attempts);
                }
            }
        }
    }
    Ok(())
}

fn run_resolve(config: &GuardConfig, args: &ArgMatches) -> Result<()> {
    let kind = *args
        .get_one::<ObjectKind>("kind")
        .context("--kind is required")?;
    let tokens: Vec<&str> = args
        .get_many::<String>("target")
        .context("target is required")?
        .map(String::as_str)
        .collect();
    let text = tokens.join(" ");

    let Some(target) = TargetDescriptor::extract(&text, &tokens, 0) else {
        bail!("no id or label in '{}'", text);
    };
    let resolver = StoreResolver::new(Arc::new(markers_source(config)?), config.default_scope.clone());
    match resolver.resolve(kind, &target) {
        Some(key) => println!("{}", key),
        None => bail!("no {} matches {:?}", kind, target),
    }
    Ok(())
}

fn run_migrate(config: &GuardConfig) -> Result<()> {
    let registry = open_registry(config)?;
    registry.flush().context("writing canonical ownership file")?;
    println!("Rewrote {} ownership records", registry.len());
    Ok(())
}

fn run_list(config: &GuardConfig) -> Result<()> {
    for (key, owner) in open_registry(config)?.snapshot() {
        println!("{}\t{}", key, owner);
    }
    Ok(())
}

fn run_purge(config: &GuardConfig, args: &ArgMatches) -> Result<()> {
    let registry = open_registry(config)?;
    match args.get_one::<String>("scope") {
        Some(scope) => {
            let release = registry.release_scope(scope);
            release.flushed.map_err(GuardError::from)?;
            println!("Removed {} records in scope '{}'", release.removed, scope);
        }
        None => {
            let removed = registry.len();
            registry.clear()?;
            println!("Removed {} records", removed);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("check", args)) => run_check(&config, args).await,
        Some(("resolve", args)) => run_resolve(&config, args),
        Some(("migrate", _)) => run_migrate(&config),
        Some(("list", _)) => run_list(&config),
        Some(("purge", args)) => run_purge(&config, args),
        _ => unreachable!("subcommand is required"),
    }
}
