#![allow(dead_code)]

//! PostgreSQL test infrastructure.
//!
//! One container is started for the whole test run. Every test gets its own freshly
//! created database inside it.

use std::sync::OnceLock;

use postgres::{Client, NoTls};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use crate::config::{ConnectionConfig, DatabaseKind};

/// Default credentials for testcontainers-modules postgres
const PG_USER: &str = "postgres";
const PG_PASSWORD: &str = "postgres";
const PG_DB: &str = "postgres";

struct Shared {
    port: u16,
    // dropping the runtime would stop the container
    _runtime: tokio::runtime::Runtime,
    _container: ContainerAsync<Postgres>,
}

static POSTGRES: OnceLock<Shared> = OnceLock::new();

fn postgres_port() -> u16 {
    POSTGRES
        .get_or_init(|| {
            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let (container, port) = runtime.block_on(async {
                let container = Postgres::default()
                    .start()
                    .await
                    .expect("failed to start postgres container");
                let port = container
                    .get_host_port_ipv4(5432)
                    .await
                    .expect("failed to get postgres port");
                (container, port)
            });
            Shared {
                port,
                _runtime: runtime,
                _container: container,
            }
        })
        .port
}

/// Create an empty database with a unique name and return settings pointing at it.
pub fn fresh_postgres_config() -> ConnectionConfig {
    let port = postgres_port();
    let admin_url = format!(
        "postgres://{}:{}@127.0.0.1:{}/{}",
        PG_USER, PG_PASSWORD, port, PG_DB
    );
    let mut admin = Client::connect(&admin_url, NoTls).expect("failed to connect as admin");

    // unquoted identifiers fold to lower case, and so does a simple uuid
    let database = format!("test_{}", Uuid::new_v4().simple());
    admin
        .batch_execute(&format!("CREATE DATABASE \"{}\"", database))
        .expect("failed to create test database");

    ConnectionConfig {
        kind: DatabaseKind::Postgres,
        host: Some("127.0.0.1".to_string()),
        port: Some(port),
        user: Some(PG_USER.to_string()),
        password: Some(PG_PASSWORD.to_string()),
        database,
        schema: None,
    }
}
