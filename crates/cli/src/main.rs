use std::{path::Path, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use bindery_engine::{BindingEvent, ContextBinding, ContextRef, JsonMetaModel, ModelHandle};
use bindery_types::{BindingParameters, ModelConfig};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{Level, debug};

mod dry_run;

use dry_run::{BaseContext, DryRunCacheFactory};

#[derive(Debug, Parser)]
#[command(name = "bindery", version, about = "Dry-run context and operation bindings against a metadata document")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a deferred operation binding, e.g. `/GetPrice(...)`
    Execute(ExecuteArgs),
    /// Read a value through an entity binding, e.g. `/Orders('1')`
    Read(ReadArgs),
}

#[derive(Debug, Args)]
struct BindingArgs {
    /// CSDL JSON metadata document
    #[arg(long, short = 'm')]
    metadata: PathBuf,
    /// Model configuration (groupId, updateGroupId, autoExpandSelect, uriParameters)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Path of a base context; makes `path` relative to it
    #[arg(long)]
    context: Option<String>,
    /// Binding parameter `name=value`, e.g. `$select=ID` or `$$groupId=$direct`
    #[arg(long = "option", short = 'o', value_parser = parse_assignment)]
    options: Vec<(String, Value)>,
    /// Group id for the request
    #[arg(long, short = 'g')]
    group: Option<String>,
    /// Binding path
    path: String,
}

#[derive(Debug, Args)]
struct ExecuteArgs {
    #[command(flatten)]
    binding: BindingArgs,
    /// Operation parameter `name=value`; values are parsed as JSON and fall back to strings
    #[arg(long = "param", short = 'p', value_parser = parse_assignment)]
    params: Vec<(String, Value)>,
}

#[derive(Debug, Args)]
struct ReadArgs {
    #[command(flatten)]
    binding: BindingArgs,
    /// Path below the binding to read
    #[arg(long, default_value = "")]
    value_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let requests = match cli.command {
        Command::Execute(args) => run_execute(args).await?,
        Command::Read(args) => run_read(args).await?,
    };
    println!("{}", serde_json::to_string_pretty(&Value::Array(requests))?);
    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_execute(args: ExecuteArgs) -> Result<Vec<Value>> {
    let (binding, caches) = create_binding(&args.binding)?;
    for (name, value) in args.params {
        binding.set_parameter(&name, Some(value))?;
    }
    binding
        .execute(args.binding.group.as_deref())?
        .await
        .with_context(|| format!("failed to execute {}", binding.path()))?;
    debug!(resource_path = ?binding.operation_resource_path(), "operation executed");
    binding.destroy();
    Ok(caches.requests())
}

async fn run_read(args: ReadArgs) -> Result<Vec<Value>> {
    let (binding, caches) = create_binding(&args.binding)?;
    if binding.is_deferred() {
        bail!("{} is a deferred operation; use `execute`", binding.path());
    }
    let value = binding
        .fetch_value(&args.value_path, None, args.binding.group.as_deref())
        .await
        .with_context(|| format!("failed to read {}", binding.path()))?;
    debug!(value = ?value, "value read");
    binding.destroy();
    Ok(caches.requests())
}

fn create_binding(args: &BindingArgs) -> Result<(ContextBinding, DryRunCacheFactory)> {
    let meta_model = load_meta_model(&args.metadata)?;
    let config = load_config(args.config.as_deref())?;
    let caches = DryRunCacheFactory::default();
    let model = ModelHandle::new(config, Arc::new(meta_model), Arc::new(caches.clone())).context("invalid model configuration")?;

    let parameters: BindingParameters = args.options.iter().cloned().collect();
    let context = args.context.as_deref().map(|path| Arc::new(BaseContext::new(path)) as ContextRef);
    let binding = ContextBinding::new(model, &args.path, context, parameters).with_context(|| format!("cannot bind {}", args.path))?;
    binding.attach_event(
        "change",
        Arc::new(|event: &BindingEvent| {
            if let BindingEvent::Change { reason } = event {
                debug!(reason = %reason, "binding changed");
            }
        }),
    )?;
    Ok((binding, caches))
}

fn load_meta_model(path: &Path) -> Result<JsonMetaModel> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read metadata {}", path.display()))?;
    JsonMetaModel::from_json_str(&raw).with_context(|| format!("parse metadata {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<ModelConfig> {
    let Some(path) = path else {
        return Ok(ModelConfig::default());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    ModelConfig::from_json_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

/// Splits `name=value`. The value is JSON if it parses as such, otherwise a plain string.
fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("missing name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
