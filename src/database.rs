//! Module for connecting to a postgres database and storing data records in it.
//!
//! Also contains the worker thread that creates the records received by the ingestion socket.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time;

use openssl::ssl::{SslConnector, SslFiletype, SslMethod, SslVerifyMode};
use postgres::{Client, Config, Row};
use postgres::error::SqlState;
use postgres_openssl::MakeTlsConnector;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::gateway::PersistenceGateway;
use crate::record::{CandidateRecord, DataQuery, DataRecord};
use crate::store::{DataStore, OrganizationLookup};

static SQL_CREATE_DATABASE: &'static str = include_str!("sql/create_database.sql");

static SQL_SELECT_ORGANIZATION_EXISTS: &'static str = include_str!("sql/select_organization_exists.sql");

static SQL_INSERT_DATA: &'static str = include_str!("sql/insert_data.sql");
static SQL_SELECT_DATA_BY_ID: &'static str = include_str!("sql/select_data_by_id.sql");
static SQL_SELECT_DATA: &'static str = include_str!("sql/select_data.sql");
static SQL_UPDATE_DATA: &'static str = include_str!("sql/update_data.sql");
static SQL_DELETE_DATA: &'static str = include_str!("sql/delete_data.sql");

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct modeling the parameters required for a database connection.
///
/// This includes SSL/TLS encryption.
pub struct DatabaseParameters
{
    /// The hostname of the database server.
    pub hostname: String,
    /// The port for the database server.
    pub port: u16,
    /// The username to connect as.
    pub username: String,
    /// The password to connect with.
    pub password: String,
    /// The database to open on the server.
    pub database: String,
    /// Flag to enable tls for the database server connection.
    pub tls_enable: bool,
    /// Parameters for the tls connection to the database server.
    pub tls_params: Option<DatabaseTlsParameters>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct for the parameters required for a tls connection to the database.
pub struct DatabaseTlsParameters {
    /// The path to the server certificate for TLS encryption.
    pub server_ca_path: String,
    /// The path to the client certificate for TLS encryption.
    pub client_cert_path: String,
    /// The path to the client key for TLS encryption.
    pub client_key_path: String,
    /// Verify the server certificate against the CA.
    #[serde(default)]
    pub verify_server: bool,
}

impl DatabaseParameters {
    /// Builds the postgres client configuration from the parameters.
    pub fn client_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.hostname)
            .port(self.port)
            .user(&self.username)
            .password(&self.password)
            .dbname(&self.database)
            .application_name("sensorlog");
        config
    }
}

fn tls_connector(tls_params: &DatabaseTlsParameters) -> Result<MakeTlsConnector, StoreError> {
    let mut ssl_connection_builder = SslConnector::builder(SslMethod::tls())
        .map_err(|err| StoreError::Tls(format!("Could not create ssl connection builder: {}", err)))?;

    if tls_params.verify_server {
        ssl_connection_builder.set_verify(SslVerifyMode::PEER);
    } else {
        ssl_connection_builder.set_verify(SslVerifyMode::NONE);
    }

    ssl_connection_builder.set_ca_file(&tls_params.server_ca_path)
        .map_err(|err| StoreError::Tls(format!("Could not set ssl ca file: {}", err)))?;
    ssl_connection_builder.set_certificate_file(&tls_params.client_cert_path, SslFiletype::PEM)
        .map_err(|err| StoreError::Tls(format!("Could not set ssl client cert file: {}", err)))?;
    ssl_connection_builder.set_private_key_file(&tls_params.client_key_path, SslFiletype::PEM)
        .map_err(|err| StoreError::Tls(format!("Could not set ssl client key file: {}", err)))?;

    Ok(MakeTlsConnector::new(ssl_connection_builder.build()))
}

/// Opens a connection to the database server.
///
/// # Errors
///
/// Errors occur when one of the following conditions is met:
///
/// * TLS is enabled without TLS parameters.
///
/// * The files for the TLS connection cannot be found.
///
/// * The connection cannot be established or the user is not authorized for the database.
///
pub fn connect(connection_parameters: &DatabaseParameters) -> Result<Client, StoreError> {
    let config = connection_parameters.client_config();

    let client = if connection_parameters.tls_enable {
        let tls_params = connection_parameters.tls_params.as_ref()
            .ok_or_else(|| StoreError::Tls(String::from("TLS enabled but no TLS parameters specified!")))?;
        config.connect(tls_connector(tls_params)?)?
    } else {
        config.connect(postgres::NoTls)?
    };

    log::info!(target: "sensorlog::db", "Database connection established!");
    Ok(client)
}

/// Record store backed by a postgres connection.
pub struct PostgresStore
{
    client: Client,
}

impl PostgresStore {
    pub fn new(client: Client) -> PostgresStore {
        PostgresStore { client }
    }

    pub fn connect(connection_parameters: &DatabaseParameters) -> Result<PostgresStore, StoreError> {
        Ok(PostgresStore::new(connect(connection_parameters)?))
    }

    /// Creates the tables if they do not exist yet.
    pub fn create_schema(&mut self) -> Result<(), StoreError> {
        self.client.batch_execute(SQL_CREATE_DATABASE)?;
        log::info!(target: "sensorlog::db", "Database schema is present");
        Ok(())
    }
}

fn record_from_row(row: &Row) -> Result<DataRecord, StoreError> {
    Ok(DataRecord {
        id: row.try_get("id")?,
        soil_moisture: row.try_get("soil_moisture")?,
        light_level: row.try_get("light_level")?,
        relative_humidity: row.try_get("relative_humidity")?,
        temperature: row.try_get("temperature")?,
        date: row.try_get("date")?,
        organization_id: row.try_get("organization_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn write_error(err: postgres::Error) -> StoreError {
    if err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        log::warn!(target: "sensorlog::db", "Write rejected by foreign key: \'{}\'", err);
        StoreError::ForeignKey(err.to_string())
    } else {
        log::warn!(target: "sensorlog::db", "Could not write record into database: \'{}\'", err);
        StoreError::Database(err)
    }
}

impl DataStore for PostgresStore {
    fn insert(&mut self, record: &DataRecord) -> Result<(), StoreError> {
        self.client.execute(SQL_INSERT_DATA,
                            &[&record.id, &record.soil_moisture, &record.light_level,
                                &record.relative_humidity, &record.temperature, &record.date,
                                &record.organization_id, &record.created_at, &record.updated_at])
            .map_err(write_error)?;
        Ok(())
    }

    fn fetch(&mut self, id: &str) -> Result<Option<DataRecord>, StoreError> {
        match self.client.query_opt(SQL_SELECT_DATA_BY_ID, &[&id])? {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    fn replace(&mut self, record: &DataRecord) -> Result<bool, StoreError> {
        let changed = self.client.execute(SQL_UPDATE_DATA,
                                          &[&record.id, &record.soil_moisture, &record.light_level,
                                              &record.relative_humidity, &record.temperature, &record.date,
                                              &record.organization_id, &record.updated_at])
            .map_err(write_error)?;
        Ok(changed == 1)
    }

    fn select(&mut self, query: &DataQuery) -> Result<Vec<DataRecord>, StoreError> {
        let limit: Option<i64> = query.limit.map(i64::from);
        let offset: i64 = query.offset.map_or(0, i64::from);
        let rows = self.client.query(SQL_SELECT_DATA,
                                     &[&query.id, &query.organization_id, &limit, &offset])?;
        rows.iter().map(record_from_row).collect()
    }

    fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        Ok(self.client.execute(SQL_DELETE_DATA, &[&id])? == 1)
    }
}

impl OrganizationLookup for PostgresStore {
    fn exists(&mut self, organization_id: &str) -> Result<bool, StoreError> {
        let row = self.client.query_one(SQL_SELECT_ORGANIZATION_EXISTS, &[&organization_id])?;
        Ok(row.try_get("found")?)
    }
}

/// Thread function for the database connection.
///
/// This thread establishes a database connection and creates a data record for every candidate
/// in the receive channel. Candidates that fail validation or reference an unknown organization
/// are logged and dropped.
///
/// This function will run until the `thread_finish` parameter was set or the connection cannot
/// be established.
///
/// # Arguments
///
/// * `rx` - The channel to receive the candidates from.
///
/// * `thread_finish` - Indicates that the thread should finish operation and should return.
///
/// * `connection_parameters` - Parameters for the database connection.
///
pub fn database_thread(rx: Receiver<CandidateRecord>, thread_finish: Arc<AtomicBool>, connection_parameters: DatabaseParameters)
{
    let store = match PostgresStore::connect(&connection_parameters) {
        Ok(store) => store,
        Err(err) => {
            log::error!(target: "sensorlog::db", "Could not establish database connection: \'{}\'", err);
            thread_finish.store(true, Ordering::SeqCst);
            return;
        }
    };

    let mut gateway = PersistenceGateway::new(store);
    let timeout = time::Duration::from_millis(100);

    while !thread_finish.load(Ordering::SeqCst) {
        let candidate = match rx.recv_timeout(timeout) {
            Ok(candidate) => candidate,
            Err(_) => {
                continue;
            }
        };

        match gateway.create(&candidate) {
            Ok(record) => log::debug!(target: "sensorlog::db", "Stored datagram as \'{}\'", record.id),
            Err(err) => {
                log::error!(target: "sensorlog::db", "Database insert failed: \'{}\'", err);
                continue;
            }
        }
    }
}
