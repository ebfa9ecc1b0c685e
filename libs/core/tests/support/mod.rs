use anyhow::Context as _;
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::Connection as _;
use std::str::FromStr;
use uuid::Uuid;
use vellum_core::{Config, Core};

pub fn init_tracing() {
    vellum_core::logging::init_simple_logging();
}

/// A core backed by the in-memory stores.
pub fn memory_core() -> Core {
    init_tracing();
    Core::in_memory(Config::default())
}

pub fn memory_core_with(configure: impl FnOnce(&mut Config)) -> Core {
    init_tracing();
    let mut config = Config::default();
    configure(&mut config);
    Core::in_memory(config)
}

/// Builder for Patient representations
#[derive(Default)]
pub struct PatientBuilder {
    id: Option<String>,
    active: Option<bool>,
    family: Option<String>,
    given: Vec<String>,
    gender: Option<String>,
    birth_date: Option<String>,
}

impl PatientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn given(mut self, given: impl Into<String>) -> Self {
        self.given.push(given.into());
        self
    }

    pub fn gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }

    pub fn build(self) -> Value {
        let mut patient = json!({ "resourceType": "Patient" });
        if let Some(id) = self.id {
            patient["id"] = json!(id);
        }
        if let Some(active) = self.active {
            patient["active"] = json!(active);
        }
        if self.family.is_some() || !self.given.is_empty() {
            let mut name = json!({});
            if let Some(family) = self.family {
                name["family"] = json!(family);
            }
            if !self.given.is_empty() {
                name["given"] = json!(self.given);
            }
            patient["name"] = json!([name]);
        }
        if let Some(gender) = self.gender {
            patient["gender"] = json!(gender);
        }
        if let Some(birth_date) = self.birth_date {
            patient["birthDate"] = json!(birth_date);
        }
        patient
    }
}

/// Store a patient through the core and return its id.
pub async fn create_patient(core: &Core, id: &str, builder: PatientBuilder) -> anyhow::Result<String> {
    let version = core
        .versions
        .record_create("Patient", id, builder.id(id).build())
        .await?;
    assert_eq!(version, 1);
    Ok(id.to_string())
}

/// A PostgreSQL-backed core living in its own schema.
pub struct TestDb {
    pub core: Core,
    schema: String,
    admin_database_url: String,
}

impl TestDb {
    /// `None` when no test database is configured; callers skip the test.
    pub async fn connect() -> anyhow::Result<Option<Self>> {
        init_tracing();
        let settings = Config::load().context("load test configuration")?;
        let Some(admin_database_url) = settings
            .test_database_url()
            .map(str::to_string)
            .or_else(|| std::env::var("DATABASE_URL").ok())
        else {
            eprintln!("skipping: no VELLUM__DATABASE__TEST_DATABASE_URL or DATABASE_URL set");
            return Ok(None);
        };

        let schema = format!("test_{}", Uuid::new_v4().simple());
        let mut admin_conn = sqlx::PgConnection::connect(&admin_database_url)
            .await
            .context("connect admin db for schema create")?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, schema))
            .execute(&mut admin_conn)
            .await
            .context("create test schema")?;

        let options = PgConnectOptions::from_str(&admin_database_url)?
            .options([("search_path", schema.as_str())]);
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .context("connect test pool")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        let mut config = settings;
        config.database.url = admin_database_url.clone();
        config.database.run_migrations = false;

        Ok(Some(Self {
            core: Core::from_pool(config, pool),
            schema,
            admin_database_url,
        }))
    }

    pub async fn cleanup(self) -> anyhow::Result<()> {
        if let Some(pool) = &self.core.db_pool {
            pool.close().await;
        }
        let mut admin_conn = sqlx::PgConnection::connect(&self.admin_database_url).await?;
        sqlx::query(&format!(r#"DROP SCHEMA IF EXISTS "{}" CASCADE"#, self.schema))
            .execute(&mut admin_conn)
            .await
            .context("drop test schema")?;
        Ok(())
    }
}
