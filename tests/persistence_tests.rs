use rentacar_persistence::db::{
    Brand, ColumnValue, ContextOptions, Database, DbContext, Entity, Property, RENTACAR_CONNECTION,
    RentACarContext, SchemaBuilder, SqlType,
};
use rentacar_persistence::{Config, PersistenceError};
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();

        let mut path = std::env::temp_dir();
        path.push(format!(
            "rentacar-{tag}-{}-{}.sqlite",
            std::process::id(),
            nanos
        ));
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path.display())
    }

    fn plain_url(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn config(&self) -> Config {
        Config::default().with_connection_string(RENTACAR_CONNECTION, self.url())
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
        for suffix in ["-wal", "-shm", "-journal"] {
            let mut side = self.path.clone().into_os_string();
            side.push(suffix);
            let _ = fs::remove_file(side);
        }
    }
}

async fn open(tmp: &TempDb) -> Database {
    Database::open(&RentACarContext::new(tmp.config()), ContextOptions::new())
        .await
        .expect("failed to open database")
}

fn seeded() -> Vec<Brand> {
    vec![Brand::new(1, "BMW"), Brand::new(2, "Mercedes")]
}

#[tokio::test]
async fn initialization_seeds_exactly_bmw_and_mercedes() {
    let tmp = TempDb::new("seed");
    let db = open(&tmp).await;

    let reports = db.ensure_created().await.expect("ensure_created failed");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].table, "Brands");
    assert!(reports[0].created);
    assert_eq!(reports[0].inserted, 2);
    assert_eq!(reports[0].skipped, 0);

    let brands = db.set::<Brand>().expect("brand mapped");
    assert_eq!(brands.all().await.expect("list failed"), seeded());
    assert_eq!(brands.count().await.expect("count failed"), 2);

    db.close().await;
}

#[tokio::test]
async fn table_and_columns_use_mapped_names() {
    let tmp = TempDb::new("names");
    let db = open(&tmp).await;
    db.ensure_created().await.expect("ensure_created failed");

    let rows: Vec<(i64, String)> =
        sqlx::query_as(r#"SELECT "Id", "Name" FROM "Brands" ORDER BY "Id""#)
            .fetch_all(db.pool())
            .await
            .expect("raw select failed");
    assert_eq!(
        rows,
        vec![(1, "BMW".to_string()), (2, "Mercedes".to_string())]
    );

    db.close().await;
}

#[tokio::test]
async fn repeated_initialization_is_idempotent() {
    let tmp = TempDb::new("idempotent");
    let db = open(&tmp).await;
    db.ensure_created().await.expect("first init failed");

    let again = db.ensure_created().await.expect("second init failed");
    assert!(!again[0].created);
    assert_eq!(again[0].inserted, 0);
    assert_eq!(again[0].skipped, 2);
    db.close().await;

    // A fresh context against the same file behaves the same way.
    let reopened = open(&tmp).await;
    let third = reopened.ensure_created().await.expect("third init failed");
    assert_eq!(third[0].inserted, 0);

    let brands = reopened.set::<Brand>().expect("brand mapped");
    assert_eq!(brands.all().await.expect("list failed"), seeded());
    reopened.close().await;
}

#[tokio::test]
async fn initialization_does_not_overwrite_existing_rows() {
    let tmp = TempDb::new("no-overwrite");
    let db = open(&tmp).await;
    db.ensure_created().await.expect("init failed");

    let brands = db.set::<Brand>().expect("brand mapped");
    assert!(
        brands
            .update(&Brand::new(1, "BMW Group"))
            .await
            .expect("update failed")
    );
    db.ensure_created().await.expect("re-init failed");

    let first = brands.find(1).await.expect("find failed");
    assert_eq!(first, Some(Brand::new(1, "BMW Group")));
    assert_eq!(brands.count().await.expect("count failed"), 2);

    db.close().await;
}

#[tokio::test]
async fn deleted_seed_row_stays_deleted_after_reinitialization() {
    let tmp = TempDb::new("deleted-seed");
    let db = open(&tmp).await;
    db.ensure_created().await.expect("init failed");

    let brands = db.set::<Brand>().expect("brand mapped");
    assert!(brands.remove(1).await.expect("remove failed"));

    let reports = db.ensure_created().await.expect("re-init failed");
    assert!(!reports[0].created);
    assert_eq!(reports[0].inserted, 0);
    assert_eq!(brands.find(1).await.expect("find failed"), None);
    assert_eq!(
        brands.all().await.expect("list failed"),
        vec![Brand::new(2, "Mercedes")]
    );

    db.close().await;
}

#[tokio::test]
async fn existing_table_with_other_casing_is_not_recreated_or_seeded() {
    let tmp = TempDb::new("casing");
    let db = open(&tmp).await;
    sqlx::query(r#"CREATE TABLE brands ("Id" INTEGER PRIMARY KEY, "Name" TEXT NOT NULL)"#)
        .execute(db.pool())
        .await
        .expect("pre-create failed");

    let reports = db.ensure_created().await.expect("init failed");
    assert!(!reports[0].created);
    assert_eq!(reports[0].inserted, 0);
    assert_eq!(reports[0].skipped, 2);

    let brands = db.set::<Brand>().expect("brand mapped");
    assert_eq!(brands.count().await.expect("count failed"), 0);
    db.close().await;
}

#[tokio::test]
async fn plain_sqlite_url_creates_a_fresh_database() {
    let tmp = TempDb::new("plain-url");
    assert!(!tmp.path.exists());
    let cfg = Config::default().with_connection_string(RENTACAR_CONNECTION, tmp.plain_url());

    let db = Database::open(&RentACarContext::new(cfg), ContextOptions::new())
        .await
        .expect("open should create the database file");
    let reports = db.ensure_created().await.expect("init failed");
    assert!(reports[0].created);
    assert_eq!(reports[0].inserted, 2);
    assert!(tmp.path.exists());

    let brands = db.set::<Brand>().expect("brand mapped");
    assert_eq!(brands.all().await.expect("list failed"), seeded());
    db.close().await;
}

#[tokio::test]
async fn missing_configuration_fails_before_database_access() {
    let tmp = TempDb::new("no-config");

    let err = Database::open(&RentACarContext::default(), ContextOptions::new())
        .await
        .err()
        .expect("open should fail without configuration");
    assert!(matches!(err, PersistenceError::MissingConfiguration));
    assert!(err.is_configuration_error());
    assert!(!tmp.path.exists());
}

#[tokio::test]
async fn missing_connection_string_is_a_configuration_error() {
    let cfg = Config::default().with_connection_string("SomeOtherDb", "sqlite:other.sqlite");

    let err = Database::open(&RentACarContext::new(cfg), ContextOptions::new())
        .await
        .err()
        .expect("open should fail without RentACarDb");
    match err {
        PersistenceError::MissingConnectionString { ref name } => {
            assert_eq!(name, RENTACAR_CONNECTION)
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn malformed_connection_string_fails_before_database_access() {
    for bad in [
        "postgres://localhost/rentacar",
        "Server=.;Database=RentACar;Trusted_Connection=True",
        "sqlite:",
        "sqlite:rentacar.sqlite?no_such_option=1",
    ] {
        let cfg = Config::default().with_connection_string(RENTACAR_CONNECTION, bad);
        let err = Database::open(&RentACarContext::new(cfg), ContextOptions::new())
            .await
            .err()
            .unwrap_or_else(|| panic!("open should fail for {bad:?}"));
        assert!(
            matches!(err, PersistenceError::InvalidConnectionString { .. }),
            "{bad:?} gave {err:?}"
        );
        assert!(err.is_configuration_error());
    }
    assert!(!std::path::Path::new("rentacar.sqlite").exists());
}

#[tokio::test]
async fn preconfigured_options_skip_configuration() {
    let tmp = TempDb::new("preconfigured");

    // No configuration at all: the caller's options are used as-is.
    let db = Database::open(&RentACarContext::default(), ContextOptions::sqlite(tmp.url()))
        .await
        .expect("open with explicit options");
    db.ensure_created().await.expect("init failed");
    assert_eq!(
        db.set::<Brand>()
            .expect("brand mapped")
            .count()
            .await
            .expect("count failed"),
        2
    );
    db.close().await;
}

#[tokio::test]
async fn unreachable_database_is_a_connectivity_error() {
    let mut path = std::env::temp_dir();
    path.push("rentacar-no-such-dir");
    path.push("nested");
    path.push("rentacar.sqlite");
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let err = Database::open(&RentACarContext::default(), ContextOptions::sqlite(url))
        .await
        .err()
        .expect("open should fail for a missing directory");
    assert!(matches!(err, PersistenceError::Connect(_)), "got {err:?}");
    assert!(!err.is_configuration_error());
}

#[tokio::test]
async fn duplicate_id_is_rejected_by_storage() {
    let tmp = TempDb::new("duplicate");
    let db = open(&tmp).await;
    db.ensure_created().await.expect("init failed");

    let brands = db.set::<Brand>().expect("brand mapped");
    let err = brands
        .add(&Brand::new(1, "Audi"))
        .await
        .expect_err("duplicate id must be rejected");
    match err {
        PersistenceError::DuplicateKey { ref table, ref key } => {
            assert_eq!(table, "Brands");
            assert_eq!(key, "1");
        }
        ref other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(brands.find(1).await.expect("find failed"), Some(Brand::new(1, "BMW")));
    assert_eq!(brands.count().await.expect("count failed"), 2);
    db.close().await;
}

#[tokio::test]
async fn brands_crud_round() {
    let tmp = TempDb::new("crud");
    let db = open(&tmp).await;
    db.ensure_created().await.expect("init failed");
    let brands = db.set::<Brand>().expect("brand mapped");

    brands.add(&Brand::new(3, "Audi")).await.expect("add failed");
    assert_eq!(
        brands.find(3).await.expect("find failed"),
        Some(Brand::new(3, "Audi"))
    );

    assert!(
        brands
            .update(&Brand::new(3, "Audi AG"))
            .await
            .expect("update failed")
    );
    assert!(
        !brands
            .update(&Brand::new(42, "Nobody"))
            .await
            .expect("update failed")
    );

    let names: Vec<String> = brands
        .all()
        .await
        .expect("list failed")
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["BMW", "Mercedes", "Audi AG"]);

    assert!(brands.remove(3).await.expect("remove failed"));
    assert!(!brands.remove(3).await.expect("remove failed"));
    assert_eq!(brands.find(3).await.expect("find failed"), None);

    db.close().await;
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
struct Model {
    code: String,
}

impl Entity for Model {
    fn default_table() -> &'static str {
        "Models"
    }

    fn key() -> &'static str {
        "code"
    }

    fn properties() -> &'static [Property] {
        const PROPERTIES: &[Property] = &[Property::required("code", SqlType::Text)];
        PROPERTIES
    }

    fn values(&self) -> Vec<ColumnValue> {
        vec![self.code.clone().into()]
    }
}

#[tokio::test]
async fn unmapped_entity_is_rejected() {
    let tmp = TempDb::new("unmapped");
    let db = open(&tmp).await;

    let err = db.set::<Model>().err().expect("Model is not mapped");
    assert!(matches!(err, PersistenceError::Schema(_)));
    db.close().await;
}

struct InvalidSeedContext;

impl DbContext for InvalidSeedContext {
    fn configure(&self, _options: &mut ContextOptions) -> Result<(), PersistenceError> {
        Err(PersistenceError::MissingConfiguration)
    }

    fn define_schema(&self, schema: &mut SchemaBuilder) {
        schema.entity::<Model>().has_data([
            Model {
                code: "320i".to_string(),
            },
            Model {
                code: "320i".to_string(),
            },
        ]);
    }
}

#[tokio::test]
async fn invalid_model_fails_before_connecting() {
    let tmp = TempDb::new("invalid-model");

    let err = Database::open(&InvalidSeedContext, ContextOptions::sqlite(tmp.url()))
        .await
        .err()
        .expect("duplicate seed keys must be rejected");
    assert!(matches!(err, PersistenceError::Schema(_)), "got {err:?}");
    assert!(!tmp.path.exists());
}
