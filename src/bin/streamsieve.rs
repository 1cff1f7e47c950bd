//! streamsieve server binary: `filter` and `proxy` subcommands.

use clap::{Args, Parser, Subcommand};

use streamsieve::config::{
    FilterConfig, FilterServiceConfig, ProxyConfig, Variant, DEFAULT_CAPACITY, DEFAULT_FILTER_PORT,
    DEFAULT_PROXY_PORT,
};
use streamsieve::service::{FilterService, Proxy};
use streamsieve::{Error, ErrorKind};

/// Semantic exit codes, kept in the shell-safe range.
struct ExitCode;

impl ExitCode {
    /// Clean shutdown.
    const SUCCESS: i32 = 0;
    /// Bad arguments or configuration.
    const USER_ERROR: i32 = 1;
    /// Startup or runtime failure.
    const RUNTIME_ERROR: i32 = 2;
}

#[derive(Parser, Debug)]
#[command(
    name = "streamsieve",
    version,
    about = "Bounded concurrent min-max priority filter service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the filter service
    Filter(FilterArgs),
    /// Run the HTTP front-end proxy
    Proxy(ProxyArgs),
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// TCP port for the filter service
    #[arg(long = "filter-port", default_value_t = DEFAULT_FILTER_PORT)]
    port: u16,

    /// Maximum number of items allowed in the filter
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Locking strategy: coarse or subtree
    #[arg(long, default_value_t = Variant::Subtree)]
    variant: Variant,

    /// Upper bound on concurrently served connections
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Service name used in log lines
    #[arg(long, default_value = "filter")]
    name: String,
}

#[derive(Args, Debug)]
struct ProxyArgs {
    /// HTTP port for the proxy
    #[arg(long = "proxy-port", default_value_t = DEFAULT_PROXY_PORT)]
    port: u16,

    /// Address of the upstream filter service
    #[arg(long = "filter-addr", default_value = "127.0.0.1:9091")]
    filter_addr: String,

    /// Proxy instance id used in log lines
    #[arg(long, default_value = "1")]
    id: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let name = match &cli.command {
        Command::Filter(_) => "filter",
        Command::Proxy(_) => "proxy",
    };

    if let Err(e) = run(cli) {
        log::error!("run {name} error: {e}");
        std::process::exit(exit_code_for(&e));
    }
    std::process::exit(ExitCode::SUCCESS);
}

fn run(cli: Cli) -> streamsieve::Result<()> {
    match cli.command {
        Command::Filter(args) => {
            let config = FilterServiceConfig {
                name: args.name,
                port: args.port,
                filter: FilterConfig {
                    capacity: args.capacity,
                    variant: args.variant,
                },
                worker_threads: args.threads,
            };
            FilterService::new(config)?.run()
        }
        Command::Proxy(args) => {
            let config = ProxyConfig {
                port: args.port,
                filter_addr: args.filter_addr,
                id: args.id,
            };
            Proxy::new(config)?.run()
        }
    }
}

fn exit_code_for(err: &Error) -> i32 {
    match err.kind() {
        ErrorKind::InvalidArgument | ErrorKind::UnsupportedVariant | ErrorKind::Config => {
            ExitCode::USER_ERROR
        }
        _ => ExitCode::RUNTIME_ERROR,
    }
}
