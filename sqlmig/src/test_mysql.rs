#![allow(dead_code)]

//! MySQL test infrastructure.
//!
//! One container is started for the whole test run. Every test gets its own freshly
//! created database inside it.

use std::sync::OnceLock;

use mysql::prelude::*;
use mysql::{Conn, OptsBuilder};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mysql::Mysql;
use uuid::Uuid;

use crate::config::{ConnectionConfig, DatabaseKind};

/// The default image allows root without a password.
const MYSQL_USER: &str = "root";

struct Shared {
    port: u16,
    // dropping the runtime would stop the container
    _runtime: tokio::runtime::Runtime,
    _container: ContainerAsync<Mysql>,
}

static MYSQL: OnceLock<Shared> = OnceLock::new();

fn mysql_port() -> u16 {
    MYSQL
        .get_or_init(|| {
            let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            let (container, port) = runtime.block_on(async {
                let container = Mysql::default()
                    .start()
                    .await
                    .expect("failed to start mysql container");
                let port = container
                    .get_host_port_ipv4(3306)
                    .await
                    .expect("failed to get mysql port");
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
pub fn fresh_mysql_config() -> ConnectionConfig {
    let port = mysql_port();
    let opts = OptsBuilder::new()
        .ip_or_hostname(Some("127.0.0.1"))
        .tcp_port(port)
        .user(Some(MYSQL_USER));
    let mut admin = Conn::new(opts).expect("failed to connect as admin");

    let database = format!("test_{}", Uuid::new_v4().simple());
    admin
        .query_drop(format!(
            "CREATE DATABASE `{}` CHARACTER SET utf8mb4",
            database
        ))
        .expect("failed to create test database");

    ConnectionConfig {
        kind: DatabaseKind::Mysql,
        host: Some("127.0.0.1".to_string()),
        port: Some(port),
        user: Some(MYSQL_USER.to_string()),
        password: None,
        database,
        schema: None,
    }
}
