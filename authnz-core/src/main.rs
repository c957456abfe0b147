use anyhow::Result;
use authnz_core::{config::Config, telemetry, AuthInterceptor};
use clap::Parser;
use tonic::metadata::MetadataMap;
use tracing::info;

/// Run one token through the authentication/authorization pipeline
#[derive(Debug, Parser)]
#[command(name = "authnz-check", version)]
struct Args {
    /// Bearer token to check
    #[arg(long)]
    token: String,

    /// Full RPC method name, e.g. /iam.v1.IAM/GetKey
    #[arg(long)]
    method: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::from_env()?;
    let prometheus = telemetry::init(&config.telemetry)?;

    let interceptor = AuthInterceptor::from_config(&config.authnz)?;

    let mut metadata = MetadataMap::new();
    metadata.insert("authorization", format!("Bearer {}", args.token).parse()?);

    info!(method = %args.method, "Checking token");
    let admitted = match interceptor.admit(&metadata, &args.method, None).await {
        Ok(admission) => {
            match admission.context() {
                Some(ctx) => println!(
                    "OK principal={} method={}",
                    ctx.principal(),
                    ctx.auth_method.as_str()
                ),
                None => println!("OK (authentication skipped for {})", args.method),
            }
            true
        }
        Err(status) => {
            println!("DENIED {:?}: {}", status.code(), status.message());
            false
        }
    };

    // Metrics snapshot on stderr; stdout carries the verdict.
    if let Some(handle) = prometheus {
        eprint!("{}", handle.render());
    }

    if !admitted {
        std::process::exit(1);
    }
    Ok(())
}
