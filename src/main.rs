use std::process;

use frugal::{
    application::token::{SigningKey, TokenCodec},
    cache::{CachedResponse, Snapshot},
    config::{self, CacheCommand, Command, InspectArgs, TokenArgs},
    infra::{error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        InfraError::configuration(format!("failed to load configuration: {err}"))
    })?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Keygen => {
            println!("{}", SigningKey::generate().export());
            Ok(())
        }
        Command::Token(args) => run_token(&settings, args),
        Command::Cache(CacheCommand::Inspect(args)) => run_cache_inspect(&settings, args).await,
    }
}

fn run_token(settings: &config::Settings, args: TokenArgs) -> Result<(), InfraError> {
    let key = match args.key.as_deref() {
        Some(encoded) => SigningKey::import(encoded)
            .map_err(|err| InfraError::configuration(format!("--key: {err}")))?,
        None => settings.runtime.signing_key.clone().ok_or_else(|| {
            InfraError::configuration("no signing key; pass --key or set runtime.signing_key")
        })?,
    };

    let codec = TokenCodec::new(key).with_timeout(settings.runtime.token_timeout);
    let token = codec
        .mint(args.kind.into())
        .map_err(|err| InfraError::configuration(err.to_string()))?;
    println!("{token}");
    Ok(())
}

async fn run_cache_inspect(
    settings: &config::Settings,
    args: InspectArgs,
) -> Result<(), InfraError> {
    let file = args
        .file
        .or_else(|| settings.cache.snapshot_path.clone())
        .ok_or_else(|| {
            InfraError::configuration("no snapshot file; pass FILE or set cache.snapshot_path")
        })?;
    let snapshot = Snapshot::read(&file).await?;
    info!(
        file = %file.display(),
        entries = snapshot.entries.len(),
        "snapshot loaded"
    );

    println!("status\tfreshness\tbytes\thash\tpath");
    for serialized in snapshot.entries {
        let entry = CachedResponse::try_from(serialized)?;
        let freshness = if entry.max_age() < 0 {
            "immutable"
        } else if entry.is_stale() {
            "stale"
        } else {
            "fresh"
        };
        let bytes = entry.body().map(str::len).unwrap_or(0);
        let hash = entry.hash().get(..12).unwrap_or(entry.hash());
        println!(
            "{}\t{freshness}\t{bytes}\t{hash}\t{}",
            entry.status().as_u16(),
            entry.path()
        );
    }
    Ok(())
}
