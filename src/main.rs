use clap::Parser;
use ranking_engine::{
    args::{Args, Command},
    cache::InMemoryCacheStore,
    database::db::DbClient,
    messaging::{RabbitMqConfig, RabbitMqPublisher},
    service::{RankingService, ServiceConfig}
};
use serde::Serialize;
use std::{process::ExitCode, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(EnvFilter::new(&args.log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = DbClient::connect(&args.connection_string)
        .await
        .map_err(|e| format!("Failed to connect to the database: {}", e))?;

    if args.command == Command::Migrate {
        client.ensure_schema().await?;
        info!("Schema is up to date");
        return Ok(());
    }

    let db = Arc::new(client);
    let config = ServiceConfig {
        cache_ttl: Duration::from_secs(args.cache_ttl_secs),
        max_write_attempts: args.max_write_attempts
    };
    let mut service = RankingService::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db,
        Arc::new(InMemoryCacheStore::new()),
        config
    );

    let rabbitmq = RabbitMqConfig::from_env()?;
    if rabbitmq.enabled {
        match RabbitMqPublisher::connect_from_config(&rabbitmq).await {
            Ok(publisher) => service = service.with_notifier(Arc::new(publisher)),
            Err(e) => warn!("Continuing without ranking events: {}", e)
        }
    }

    match args.command {
        Command::Migrate => Ok(()),
        Command::Init { user_id, group_id } => print(&service.initialize_ranking(user_id, group_id).await?),
        Command::Apply { match_id } => print(&service.apply_match_result(match_id).await?),
        Command::ProcessGroup { group_id } => print(&service.process_group(group_id).await?),
        Command::Leaderboard {
            group_id,
            page,
            page_size
        } => print(&service.get_leaderboard(group_id, page, page_size).await?),
        Command::User { user_id, group_id } => print(&service.get_user_ranking(user_id, group_id).await?),
        Command::Deactivate { user_id, group_id } => print(&service.deactivate_ranking(user_id, group_id).await?)
    }
}

fn print<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
