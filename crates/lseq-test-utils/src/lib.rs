//! PostgreSQL for lseq integration tests.
//!
//! One server per test binary, one fresh migrated database per test. The
//! server is `LSEQ_TEST_PG_URL` when set, otherwise a testcontainers
//! PostgreSQL started on first use.

use sqlx::{Executor, PgPool};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use lseq_db::config::DbConfig;
use lseq_db::pool;

struct Server {
    url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SERVER: OnceCell<Server> = OnceCell::const_new();

async fn start_server() -> Server {
    if let Ok(url) = std::env::var("LSEQ_TEST_PG_URL") {
        return Server {
            url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .expect("PostgreSQL container should start");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");
    Server {
        url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Base URL of the shared server, without a database name.
async fn server_url() -> &'static str {
    &SERVER.get_or_init(start_server).await.url
}

/// A migrated database that exists for one test.
pub struct TestDb {
    pub pool: PgPool,
    config: DbConfig,
}

impl TestDb {
    /// Create `lseq_test_<uuid>` on the shared server and migrate it with the
    /// same bootstrap the `db-init` command uses.
    pub async fn create() -> Self {
        let name = format!("lseq_test_{}", Uuid::new_v4().simple());
        let config = DbConfig::new(format!("{}/{name}", server_url().await));
        let pool = pool::bootstrap(&config)
            .await
            .unwrap_or_else(|e| panic!("failed to bootstrap {name}: {e:#}"));
        Self { pool, config }
    }

    fn name(&self) -> &str {
        self.config.database_name().unwrap_or_default()
    }

    /// Close the pool and drop the database.
    pub async fn teardown(self) {
        self.pool.close().await;

        let name = self.name().to_owned();
        let Ok(maintenance) = PgPool::connect(&self.config.maintenance_url()).await else {
            return;
        };
        let _ = maintenance
            .execute(
                format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                     WHERE datname = '{name}' AND pid <> pg_backend_pid()"
                )
                .as_str(),
            )
            .await;
        let _ = maintenance
            .execute(format!("DROP DATABASE IF EXISTS {name}").as_str())
            .await;
        maintenance.close().await;
    }
}
