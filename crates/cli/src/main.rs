use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kubeui_api::{decode_body, standard, BodyLimits, Deps, Dispatcher};
use kubeui_authz::{Authorizer, LocalAuthorizer, RbacPolicy, RemoteAuthorizer, TieredAuthorizer};
use kubeui_compute::ChartRegistry;
use kubeui_core::{ApiError, CreateOptions, GetOptions, ListOptions, RequestContext, Table, TableOptions, UserInfo};
use kubeui_kubehub::KubeCluster;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "kubeuictl", version, about = "Query kubeui virtual resources against the current cluster")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Act as this user
    #[arg(long = "as", env = "KUBEUI_USER", global = true)]
    user: Option<String>,

    /// Group for the impersonated user; repeatable
    #[arg(long = "as-group", global = true)]
    groups: Vec<String>,

    #[arg(long = "as-uid", global = true)]
    uid: Option<String>,

    /// Local RBAC policy consulted before the cluster
    #[arg(long = "policy", env = "KUBEUI_POLICY", global = true)]
    policy: Option<PathBuf>,

    /// Editor chart cache (default: ~/.kubeui/charts)
    #[arg(long = "chart-cache", env = "KUBEUI_CHART_CACHE", global = true)]
    chart_cache: Option<PathBuf>,

    /// Per-request deadline in seconds
    #[arg(long = "request-timeout", env = "KUBEUI_REQUEST_TIMEOUT", global = true, default_value_t = 30)]
    request_timeout: u64,

    /// Name reported in SiteInfo
    #[arg(long = "cluster-name", env = "KUBEUI_CLUSTER_NAME", global = true, default_value = "default")]
    cluster_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List served kinds and their verbs
    Kinds,
    /// Read one object
    Get { resource: String, name: String },
    /// List objects of a kind
    List {
        resource: String,
        /// Label selector, e.g. "tier=gold,!legacy"
        #[arg(short = 'l', long = "selector")]
        selector: Option<String>,
        #[arg(long = "field-selector")]
        field_selector: Option<String>,
        #[arg(long = "limit")]
        limit: Option<u64>,
        #[arg(long = "continue")]
        continue_token: Option<String>,
    },
    /// Submit a request object (JSON or YAML); "-" reads stdin
    Create {
        resource: String,
        #[arg(short = 'f', long = "filename")]
        file: PathBuf,
        #[arg(long = "dry-run")]
        dry_run: Option<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("KUBEUI_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KUBEUI_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KUBEUI_METRICS_ADDR; expected host:port");
        }
    }
}

fn user_of(cli: &Cli) -> UserInfo {
    match cli.user.as_deref() {
        Some(name) => {
            let mut user = UserInfo::new(name).with_groups(cli.groups.iter().cloned());
            user.uid = cli.uid.clone().unwrap_or_default();
            user
        }
        None => UserInfo::anonymous(),
    }
}

fn authorizer(cli: &Cli, cluster: &KubeCluster) -> Result<Arc<dyn Authorizer>> {
    let policy = match cli.policy.as_deref() {
        Some(path) => RbacPolicy::from_file(path).with_context(|| format!("loading policy {}", path.display()))?,
        None => RbacPolicy::default(),
    };
    let local: Arc<dyn Authorizer> = Arc::new(LocalAuthorizer::new(policy));
    let remote: Arc<dyn Authorizer> = Arc::new(RemoteAuthorizer::new(cluster.client().clone()));
    Ok(Arc::new(TieredAuthorizer::new(local, Some(remote))))
}

fn read_body(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        use std::io::Read;
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn print_table(table: &Table) {
    let header: Vec<String> = table.column_definitions.iter().map(|c| c.name.to_ascii_uppercase()).collect();
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.cells.iter().map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string())).collect())
        .collect();
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in rows.iter() {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }
    let line = |cells: &[String]| {
        let parts: Vec<String> = cells.iter().enumerate().map(|(i, c)| format!("{:<w$}", c, w = widths.get(i).copied().unwrap_or(0))).collect();
        println!("{}", parts.join("   ").trim_end());
    };
    line(&header);
    for row in rows.iter() {
        line(row);
    }
    if let Some(tok) = table.metadata.continue_token.as_deref() {
        eprintln!("more results available, pass --continue {}", tok);
    }
}

fn emit(d: &Dispatcher, resource: &str, out: Output, v: &Value) -> Result<()> {
    match out {
        Output::Json => println!("{}", serde_json::to_string_pretty(v)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(v)?),
        Output::Human => match d.convert_to_table(resource, v, &TableOptions::default()) {
            Ok(table) => print_table(&table),
            Err(e) => {
                warn!(error = %e, "table conversion failed; printing json");
                println!("{}", serde_json::to_string_pretty(v)?);
            }
        },
    }
    Ok(())
}

fn report(e: &ApiError) -> ! {
    eprintln!("Error from server ({}): {}", e.reason(), e);
    std::process::exit(1)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received; cancelling request");
                cancel.cancel();
            }
        }
    });
    let ctx = RequestContext::new(user_of(&cli))
        .with_timeout(Duration::from_secs(cli.request_timeout))
        .with_cancellation(cancel);

    let cluster = KubeCluster::try_default().await.context("connecting to the cluster")?;
    let authz = authorizer(&cli, &cluster)?;
    let chart_root = cli.chart_cache.clone().unwrap_or_else(ChartRegistry::default_root);
    let deps = match Deps::new(&ctx, Arc::new(cluster), &cli.cluster_name, chart_root).await {
        Ok(d) => d,
        Err(e) => report(&e),
    };
    let registry = match standard(&deps) {
        Ok(r) => r,
        Err(e) => report(&e),
    };
    let d = Dispatcher::new(registry).with_authorizer(authz);

    match &cli.command {
        Commands::Kinds => {
            for k in d.registry().kinds() {
                let verbs: Vec<&str> = k.verbs.iter().map(|v| v.as_str()).collect();
                match cli.output {
                    Output::Human => println!("{:<22} {:<34} {}", k.plural, k.gvk.api_version(), verbs.join(",")),
                    _ => println!("{}", serde_json::json!({"name": k.plural, "apiVersion": k.gvk.api_version(), "kind": k.gvk.kind, "verbs": verbs})),
                }
            }
        }
        Commands::Get { resource, name } => match d.get(&ctx, resource, name, &GetOptions::default()).await {
            Ok(v) => emit(&d, resource, cli.output, &v)?,
            Err(e) => report(&e),
        },
        Commands::List { resource, selector, field_selector, limit, continue_token } => {
            let opts = ListOptions {
                label_selector: selector.clone(),
                field_selector: field_selector.clone(),
                continue_token: continue_token.clone(),
                limit: *limit,
                ..Default::default()
            };
            match d.list(&ctx, resource, &opts).await {
                Ok(list) => emit(&d, resource, cli.output, &serde_json::to_value(&list)?)?,
                Err(e) => report(&e),
            }
        }
        Commands::Create { resource, file, dry_run } => {
            let bytes = read_body(file)?;
            let body = match decode_body(&bytes, BodyLimits::from_env()) {
                Ok(b) => b,
                Err(e) => report(&e),
            };
            let opts = CreateOptions { dry_run: dry_run.iter().cloned().collect(), ..Default::default() };
            match d.create(&ctx, resource, body, &opts).await {
                // Computed responses rarely fit a table.
                Ok(v) if cli.output == Output::Human => println!("{}", serde_json::to_string_pretty(&v)?),
                Ok(v) => emit(&d, resource, cli.output, &v)?,
                Err(e) => report(&e),
            }
        }
    }
    Ok(())
}
