use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use s3exporter::config::{AuthConfig, Config, TlsConfig};
use s3exporter::{
    load_tls, BasicAuth, Collector, ExporterError, FileMetrics, RcloneLister, ScrapeServer,
    Settings,
};

/// Exports the objects of a bucket as Prometheus metrics over HTTPS.
#[derive(Parser, Debug)]
#[command(name = "s3exporter", version, about, long_about = None)]
struct Args {
    /// Bucket to list
    #[arg(long, env = "BUCKET_NAME")]
    bucket: Option<String>,

    /// Remote name configured in rclone
    #[arg(long, env = "RCLONE_REMOTE")]
    remote: Option<String>,

    /// Seconds to wait between two listings
    #[arg(long, env = "INTERVAL")]
    interval: Option<u64>,

    /// Port of the HTTPS endpoint
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Address of the HTTPS endpoint
    #[arg(long, env = "BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Basic auth user expected from scrapers
    #[arg(long, env = "BASIC_AUTH_USER")]
    auth_user: Option<String>,

    /// Basic auth password expected from scrapers
    #[arg(long, env = "BASIC_AUTH_PASS", hide_env_values = true)]
    auth_password: Option<String>,

    /// PEM certificate chain of the HTTPS endpoint
    #[arg(long, env = "SSL_CERT_FILE")]
    tls_cert: Option<PathBuf>,

    /// PEM private key of the HTTPS endpoint
    #[arg(long, env = "SSL_KEY_FILE")]
    tls_key: Option<PathBuf>,

    /// rclone executable
    #[arg(long, env = "RCLONE_BINARY")]
    rclone_binary: Option<String>,

    /// Kill a listing that runs longer than this many seconds (off by default)
    #[arg(long, env = "LISTING_TIMEOUT")]
    listing_timeout: Option<u64>,

    /// Also export process_* metrics of the exporter itself
    #[arg(long, env = "PROCESS_METRICS")]
    process_metrics: Option<bool>,

    /// TOML configuration file
    #[arg(short, long, env = "S3_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_example_config: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn to_config(&self) -> Config {
        Config {
            bucket: self.bucket.clone(),
            remote: self.remote.clone(),
            interval: self.interval,
            port: self.port,
            bind_address: self.bind_address.clone(),
            rclone_binary: self.rclone_binary.clone(),
            listing_timeout: self.listing_timeout,
            process_metrics: self.process_metrics,
            auth: Some(AuthConfig {
                user: self.auth_user.clone(),
                password: self.auth_password.clone(),
            }),
            tls: Some(TlsConfig {
                cert: self.tls_cert.clone(),
                key: self.tls_key.clone(),
            }),
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(args: &Args) -> Result<Settings, ExporterError> {
    let mut config = Config::with_defaults();
    if let Some(path) = &args.config {
        config = config.merge_with(Config::from_file(path)?);
    }
    Ok(config.merge_with(args.to_config()).resolve()?)
}

async fn run(settings: Settings) -> Result<(), ExporterError> {
    let addr = settings.listen_address();
    let acceptor = load_tls(settings.tls_cert.as_deref(), settings.tls_key.as_deref())?;

    let metrics = FileMetrics::new()?;
    if settings.process_metrics {
        metrics.register_process_metrics()?;
    }

    let auth = BasicAuth::new(settings.auth_user.as_str(), settings.auth_password.as_str());
    if auth.is_weak() {
        warn!("BASIC_AUTH_USER or BASIC_AUTH_PASS is empty; scrapes are only protected by an empty credential");
    }

    let lister = RcloneLister::new(
        settings.rclone_binary.as_str(),
        settings.remote.as_str(),
        settings.bucket.as_str(),
    )
    .with_timeout(settings.listing_timeout);
    info!(path = %lister.target(), interval = ?settings.interval, "Collecting bucket listings");

    let collector = Collector::new(lister, metrics.clone(), settings.interval);
    tokio::spawn(collector.run());

    ScrapeServer::new(metrics, auth).serve(addr, acceptor).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.print_example_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    init_logging(args.verbose, args.quiet);

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    if let Err(e) = run(settings).await {
        error!("{}", e);
        exit(1);
    }
}
