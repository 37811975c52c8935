// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Internal system database: MySQL or PostgreSQL, each with an image-variant step.

use crate::apimanager_resources::{
    build_configmap, build_container, build_deployment, build_pvc, build_secret, build_service,
    env_from_secret, env_value, pvc_volume, random_alphanumeric, resource_requirements,
    volume_mount, ComponentRef, DeploymentParams,
};
use crate::constants::{DATABASE_STORAGE_SIZE, GENERATED_SECRET_LENGTH, MYSQL_PORT, POSTGRESQL_PORT};
use crate::crd::{APIManager, DatabaseFlavor};
use crate::errors::Result;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{
    configmap_mutator, deployment_mutator, pvc_mutator, secret_mutator, service_mutator,
};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, ConfigMapVolumeSource, Secret, Volume};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const SYSTEM_DATABASE_SECRET: &str = "system-database";
pub const SYSTEM_DATABASE_IMAGE_CONFIGMAP: &str = "system-database-image";
pub const SYSTEM_MYSQL: &str = "system-mysql";
pub const SYSTEM_POSTGRESQL: &str = "system-postgresql";
pub const MYSQL_MAIN_CONF: &str = "mysql-main-conf";
pub const MYSQL_EXTRA_CONF: &str = "mysql-extra-conf";
pub const MYSQL_STORAGE: &str = "mysql-storage";
pub const POSTGRESQL_DATA: &str = "postgresql-data";

pub const DATABASE_URL_KEY: &str = "URL";
const DB_USER_KEY: &str = "DB_USER";
const DB_PASSWORD_KEY: &str = "DB_PASSWORD";
const DB_ROOT_PASSWORD_KEY: &str = "DB_ROOT_PASSWORD";
const DB_NAME_KEY: &str = "DB_NAME";

const DATABASE_NAME: &str = "system";

const MYSQL_COMPONENT: ComponentRef = ComponentRef::new("system", "mysql");
const POSTGRESQL_COMPONENT: ComponentRef = ComponentRef::new("system", "postgresql");

const MYSQL_MAIN_CNF: &str = "!include /etc/my.cnf\n!includedir /etc/my-extra.d\n";
const MYSQL_CHARSET_CNF: &str = "[client]\ndefault-character-set = utf8\n\n[mysql]\ndefault-character-set = utf8\n\n[mysqld]\ncharacter-set-server = utf8\ncollation-server = utf8_unicode_ci\n";

/// MySQL connections authenticate as root with `DB_ROOT_PASSWORD`.
const MYSQL_URL_USER: &str = "root";

/// Connection URL of the internal database server for `flavor`.
#[must_use]
pub fn database_url(flavor: DatabaseFlavor, user: &str, password: &str) -> String {
    match flavor {
        DatabaseFlavor::MySql => {
            format!("mysql2://{user}:{password}@{SYSTEM_MYSQL}/{DATABASE_NAME}")
        }
        DatabaseFlavor::PostgreSql => {
            format!("postgresql://{user}:{password}@{SYSTEM_POSTGRESQL}/{DATABASE_NAME}")
        }
    }
}

fn url_flavor(url: &str) -> Option<DatabaseFlavor> {
    match url.split_once("://")?.0 {
        "mysql2" | "mysql" => Some(DatabaseFlavor::MySql),
        "postgresql" | "postgres" => Some(DatabaseFlavor::PostgreSql),
        _ => None,
    }
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(value) = secret.string_data.as_ref().and_then(|d| d.get(key)) {
        return Some(value.clone());
    }
    let bytes = secret.data.as_ref()?.get(key)?;
    String::from_utf8(bytes.0.clone()).ok()
}

/// [`secret_mutator`], and a rewrite of `URL` when the database flavour changed.
///
/// The new URL is built from the credentials already stored in the Secret, which
/// are the ones the database Deployment reads.
pub fn database_secret_mutator(existing: &mut Secret, desired: &Secret) -> bool {
    let changed = secret_mutator(existing, desired);
    let Some(flavor) = secret_value(desired, DATABASE_URL_KEY).and_then(|url| url_flavor(&url))
    else {
        return changed;
    };
    let current = secret_value(existing, DATABASE_URL_KEY);
    if current.as_deref().and_then(url_flavor) == Some(flavor) {
        return changed;
    }

    let credentials = match flavor {
        DatabaseFlavor::MySql => Some(MYSQL_URL_USER.to_string())
            .zip(secret_value(existing, DB_ROOT_PASSWORD_KEY)),
        DatabaseFlavor::PostgreSql => {
            secret_value(existing, DB_USER_KEY).zip(secret_value(existing, DB_PASSWORD_KEY))
        }
    };
    let Some((user, password)) = credentials else {
        warn!("Database Secret lacks credentials, keeping its URL");
        return changed;
    };

    info!(flavor = ?flavor, "Database flavour changed, rewriting connection URL");
    if let Some(data) = existing.data.as_mut() {
        data.remove(DATABASE_URL_KEY);
    }
    existing.string_data.get_or_insert_with(BTreeMap::new).insert(
        DATABASE_URL_KEY.to_string(),
        database_url(flavor, &user, &password),
    );
    true
}

/// Credentials Secret for the selected database flavour.
#[must_use]
pub fn desired_database_secret(apim: &APIManager, flavor: DatabaseFlavor) -> Secret {
    let password = random_alphanumeric(GENERATED_SECRET_LENGTH);
    let data = match flavor {
        DatabaseFlavor::MySql => {
            let root_password = random_alphanumeric(GENERATED_SECRET_LENGTH);
            BTreeMap::from([
                (DB_USER_KEY.to_string(), "mysql".to_string()),
                (DB_PASSWORD_KEY.to_string(), password),
                (
                    DATABASE_URL_KEY.to_string(),
                    database_url(flavor, MYSQL_URL_USER, &root_password),
                ),
                (DB_ROOT_PASSWORD_KEY.to_string(), root_password),
            ])
        }
        DatabaseFlavor::PostgreSql => BTreeMap::from([
            (DB_USER_KEY.to_string(), DATABASE_NAME.to_string()),
            (DB_NAME_KEY.to_string(), DATABASE_NAME.to_string()),
            (
                DATABASE_URL_KEY.to_string(),
                database_url(flavor, DATABASE_NAME, &password),
            ),
            (DB_PASSWORD_KEY.to_string(), password),
        ]),
    };
    let component = match flavor {
        DatabaseFlavor::MySql => MYSQL_COMPONENT,
        DatabaseFlavor::PostgreSql => POSTGRESQL_COMPONENT,
    };
    build_secret(apim, SYSTEM_DATABASE_SECRET, component, data)
}

fn configmap_volume(name: &str, configmap: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: configmap.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn desired_mysql_deployment(apim: &APIManager, image: &str) -> Deployment {
    let env = vec![
        env_from_secret("MYSQL_USER", SYSTEM_DATABASE_SECRET, DB_USER_KEY),
        env_from_secret("MYSQL_PASSWORD", SYSTEM_DATABASE_SECRET, DB_PASSWORD_KEY),
        env_from_secret("MYSQL_ROOT_PASSWORD", SYSTEM_DATABASE_SECRET, DB_ROOT_PASSWORD_KEY),
        env_value("MYSQL_DATABASE", DATABASE_NAME),
        env_value("MYSQL_DEFAULTS_FILE", "/etc/my-extra/my.cnf"),
    ];
    let mut container = build_container(
        SYSTEM_MYSQL,
        image,
        &[("mysql", MYSQL_PORT)],
        env,
        None,
        resource_requirements(apim, ("250m", "512Mi"), ("1", "2Gi")),
    );
    container.volume_mounts = Some(vec![
        volume_mount("mysql-storage", "/var/lib/mysql/data"),
        volume_mount("mysql-extra-conf", "/etc/my-extra.d"),
        volume_mount("mysql-main-conf", "/etc/my-extra"),
    ]);

    build_deployment(
        apim,
        MYSQL_COMPONENT,
        DeploymentParams {
            name: SYSTEM_MYSQL.to_string(),
            replicas: 1,
            containers: vec![container],
            volumes: vec![
                pvc_volume("mysql-storage", MYSQL_STORAGE),
                configmap_volume("mysql-extra-conf", MYSQL_EXTRA_CONF),
                configmap_volume("mysql-main-conf", MYSQL_MAIN_CONF),
            ],
            recreate: true,
            ..Default::default()
        },
    )
}

#[must_use]
pub fn desired_postgresql_deployment(apim: &APIManager, image: &str) -> Deployment {
    let env = vec![
        env_from_secret("POSTGRESQL_USER", SYSTEM_DATABASE_SECRET, DB_USER_KEY),
        env_from_secret("POSTGRESQL_PASSWORD", SYSTEM_DATABASE_SECRET, DB_PASSWORD_KEY),
        env_from_secret("POSTGRESQL_DATABASE", SYSTEM_DATABASE_SECRET, DB_NAME_KEY),
    ];
    let mut container = build_container(
        SYSTEM_POSTGRESQL,
        image,
        &[("postgresql", POSTGRESQL_PORT)],
        env,
        None,
        resource_requirements(apim, ("250m", "512Mi"), ("1", "2Gi")),
    );
    container.volume_mounts = Some(vec![volume_mount(
        "postgresql-data",
        "/var/lib/pgsql/data",
    )]);

    build_deployment(
        apim,
        POSTGRESQL_COMPONENT,
        DeploymentParams {
            name: SYSTEM_POSTGRESQL.to_string(),
            replicas: 1,
            containers: vec![container],
            volumes: vec![pvc_volume("postgresql-data", POSTGRESQL_DATA)],
            recreate: true,
            ..Default::default()
        },
    )
}

/// ConfigMap recording which database image the platform runs.
#[must_use]
pub fn desired_database_image_configmap(
    apim: &APIManager,
    flavor: DatabaseFlavor,
    image: &str,
) -> ConfigMap {
    let (flavor_name, component) = match flavor {
        DatabaseFlavor::MySql => ("mysql", MYSQL_COMPONENT),
        DatabaseFlavor::PostgreSql => ("postgresql", POSTGRESQL_COMPONENT),
    };
    build_configmap(
        apim,
        SYSTEM_DATABASE_IMAGE_CONFIGMAP,
        component,
        BTreeMap::from([
            ("flavor".to_string(), flavor_name.to_string()),
            ("image".to_string(), image.to_string()),
        ]),
    )
}

pub struct SystemMySqlReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for SystemMySqlReconciler {
    fn name(&self) -> &'static str {
        "system-mysql"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        let apim = base.apim;
        base.reconcile(
            desired_database_secret(apim, DatabaseFlavor::MySql),
            database_secret_mutator,
        )
        .await?;
        base.reconcile(
            build_configmap(
                apim,
                MYSQL_MAIN_CONF,
                MYSQL_COMPONENT,
                BTreeMap::from([("my.cnf".to_string(), MYSQL_MAIN_CNF.to_string())]),
            ),
            configmap_mutator,
        )
        .await?;
        base.reconcile(
            build_configmap(
                apim,
                MYSQL_EXTRA_CONF,
                MYSQL_COMPONENT,
                BTreeMap::from([(
                    "mysql-charset.cnf".to_string(),
                    MYSQL_CHARSET_CNF.to_string(),
                )]),
            ),
            configmap_mutator,
        )
        .await?;
        base.reconcile(
            build_pvc(
                apim,
                MYSQL_STORAGE,
                MYSQL_COMPONENT,
                "ReadWriteOnce",
                DATABASE_STORAGE_SIZE,
            ),
            pvc_mutator,
        )
        .await?;
        base.reconcile(
            build_service(
                apim,
                SYSTEM_MYSQL,
                MYSQL_COMPONENT,
                SYSTEM_MYSQL,
                &[("system-mysql", MYSQL_PORT, MYSQL_PORT)],
            ),
            service_mutator,
        )
        .await?;
        base.reconcile(
            desired_mysql_deployment(apim, &base.images.system_mysql),
            deployment_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}

pub struct SystemMySqlImageReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for SystemMySqlImageReconciler {
    fn name(&self) -> &'static str {
        "system-mysql-image"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        base.reconcile(
            desired_database_image_configmap(
                base.apim,
                DatabaseFlavor::MySql,
                &base.images.system_mysql,
            ),
            configmap_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}

pub struct SystemPostgreSqlReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for SystemPostgreSqlReconciler {
    fn name(&self) -> &'static str {
        "system-postgresql"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        let apim = base.apim;
        base.reconcile(
            desired_database_secret(apim, DatabaseFlavor::PostgreSql),
            database_secret_mutator,
        )
        .await?;
        base.reconcile(
            build_pvc(
                apim,
                POSTGRESQL_DATA,
                POSTGRESQL_COMPONENT,
                "ReadWriteOnce",
                DATABASE_STORAGE_SIZE,
            ),
            pvc_mutator,
        )
        .await?;
        base.reconcile(
            build_service(
                apim,
                SYSTEM_POSTGRESQL,
                POSTGRESQL_COMPONENT,
                SYSTEM_POSTGRESQL,
                &[("system-postgresql", POSTGRESQL_PORT, POSTGRESQL_PORT)],
            ),
            service_mutator,
        )
        .await?;
        base.reconcile(
            desired_postgresql_deployment(apim, &base.images.system_postgresql),
            deployment_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}

pub struct SystemPostgreSqlImageReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for SystemPostgreSqlImageReconciler {
    fn name(&self) -> &'static str {
        "system-postgresql-image"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        base.reconcile(
            desired_database_image_configmap(
                base.apim,
                DatabaseFlavor::PostgreSql,
                &base.images.system_postgresql,
            ),
            configmap_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}

#[cfg(test)]
#[path = "system_database_tests.rs"]
mod system_database_tests;
