use mimalloc::MiMalloc;
use rentacar_persistence::db::{Brand, ContextOptions, Database, RentACarContext};
use rentacar_persistence::{Config, PersistenceError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load(CONFIG_PATH).map_err(PersistenceError::from)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let context = RentACarContext::new(cfg);
    let db = match Database::open(&context, ContextOptions::new()).await {
        Ok(db) => db,
        Err(e) => {
            error!(
                error = %e,
                configuration = e.is_configuration_error(),
                "failed to open database"
            );
            return Err(e.into());
        }
    };

    for report in db.ensure_created().await? {
        info!(
            table = %report.table,
            created = report.created,
            inserted = report.inserted,
            skipped = report.skipped,
            "schema initialized"
        );
    }

    let brands = db.set::<Brand>()?.all().await?;
    for brand in &brands {
        info!(id = brand.id, name = %brand.name, "brand");
    }

    db.close().await;
    Ok(())
}
