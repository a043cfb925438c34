extern crate clap;
extern crate ctrlc;
extern crate log;
extern crate log4rs;
extern crate serde_json;

use std::io::Read;
use std::process::exit;
use std::sync::{mpsc, Arc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use clap::{App, ArgMatches};
use serde::Serialize;
use serde_json::Value;

use sensorlog::config::Configuration;
use sensorlog::database::{self, PostgresStore};
use sensorlog::error::GatewayError;
use sensorlog::gateway::PersistenceGateway;
use sensorlog::record::{CandidateRecord, DataQuery};
use sensorlog::socket;

const EXIT_SETUP: i32 = 1;
const EXIT_VALIDATION: i32 = 2;
const EXIT_REFERENCE: i32 = 3;
const EXIT_NOT_FOUND: i32 = 4;
const EXIT_STORE: i32 = 5;

fn main() {
    let cli_yaml = clap::load_yaml!("cli.yml");
    let matches = App::from_yaml(cli_yaml).get_matches();

    let log_config = matches.value_of("log-config").unwrap_or("resources/log.yml");
    match log4rs::init_file(log_config, Default::default()) {
        Ok(_) => {}
        Err(err) => {
            eprintln!("Could not create logger from yaml configuration: {}", err);
            exit(EXIT_SETUP);
        }
    };

    let config_path = matches.value_of("config").unwrap_or("resources/sensorlog.yml");
    let configuration = match Configuration::from_file(config_path) {
        Ok(configuration) => configuration,
        Err(err) => {
            log::error!(target: "sensorlog", "Cannot load the configuration \'{}\': {}", config_path, err);
            exit(EXIT_SETUP);
        }
    };

    if let ("ingest", Some(_)) = matches.subcommand() {
        ingest(configuration);
        log::info!(target: "sensorlog", "Exiting");
        exit(0);
    }

    let store = match PostgresStore::connect(&configuration.database_connection_parameters) {
        Ok(store) => store,
        Err(err) => {
            log::error!(target: "sensorlog", "Could not establish database connection: \'{}\'", err);
            exit(EXIT_STORE);
        }
    };
    let mut gateway = PersistenceGateway::new(store);

    let result = match matches.subcommand() {
        ("init", Some(_)) => gateway.store_mut().create_schema()
            .map(|_| Value::Null)
            .map_err(GatewayError::from),
        ("create", Some(sub)) => match read_candidate(sub, std::io::stdin()) {
            Ok(candidate) => gateway.create(&candidate).and_then(to_json),
            Err(err) => usage_error(err),
        },
        ("update", Some(sub)) => match read_candidate(sub, std::io::stdin()) {
            Ok(candidate) => gateway.update_by_id(sub.value_of("id").unwrap_or_default(), &candidate).and_then(to_json),
            Err(err) => usage_error(err),
        },
        ("get", Some(sub)) => gateway.get_by_id(sub.value_of("id").unwrap_or_default()).and_then(to_json),
        ("delete", Some(sub)) => gateway.delete_by_id(sub.value_of("id").unwrap_or_default()).and_then(to_json),
        ("list", Some(sub)) => match read_query(sub) {
            Ok(query) => gateway.list(&query).and_then(to_json),
            Err(err) => usage_error(err),
        },
        _ => usage_error(String::from("Unknown subcommand")),
    };

    match result {
        Ok(Value::Null) => exit(0),
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{}", text),
                Err(err) => {
                    log::error!(target: "sensorlog", "Cannot serialize output: \'{}\'", err);
                    exit(EXIT_SETUP);
                }
            }
            exit(0);
        }
        Err(err) => {
            log::error!(target: "sensorlog", "{}", err);
            if let GatewayError::Validation(validation) = &err {
                for field_error in &validation.errors {
                    eprintln!("{}: {}", field_error.field, field_error.issue);
                }
            } else {
                eprintln!("{}", err);
            }
            exit(exit_code(&err));
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, GatewayError> {
    serde_json::to_value(value)
        .map_err(|err| GatewayError::Store(sensorlog::StoreError::Backend(err.to_string())))
}

fn usage_error(message: String) -> Result<Value, GatewayError> {
    eprintln!("{}", message);
    exit(EXIT_SETUP);
}

fn exit_code(err: &GatewayError) -> i32 {
    match err {
        GatewayError::Validation(_) => EXIT_VALIDATION,
        GatewayError::Reference(_) => EXIT_REFERENCE,
        GatewayError::NotFound(_) => EXIT_NOT_FOUND,
        GatewayError::Store(_) => EXIT_STORE,
    }
}

/// Builds a candidate from `--json` or `--stdin`, then applies the per-field flags on top.
fn read_candidate<R: Read>(matches: &ArgMatches, mut input: R) -> Result<CandidateRecord, String> {
    let base = if let Some(json) = matches.value_of("json") {
        serde_json::from_str::<CandidateRecord>(json)
            .map_err(|err| format!("Cannot parse --json candidate: {}", err))?
    } else if matches.is_present("stdin") {
        let mut buffer = String::new();
        input.read_to_string(&mut buffer)
            .map_err(|err| format!("Cannot read candidate from stdin: {}", err))?;
        serde_json::from_str::<CandidateRecord>(buffer.as_str())
            .map_err(|err| format!("Cannot parse candidate from stdin: {}", err))?
    } else {
        CandidateRecord::default()
    };

    let flag = |name: &str| matches.value_of(name).map(|value| Value::String(value.to_string()));
    Ok(base.overlay(CandidateRecord {
        soil_moisture: flag("soil-moisture"),
        light_level: flag("light-level"),
        relative_humidity: flag("relative-humidity"),
        temperature: flag("temperature"),
        date: flag("date"),
        organization_id: flag("organization"),
    }))
}

fn read_query(matches: &ArgMatches) -> Result<DataQuery, String> {
    let number = |name: &str| -> Result<Option<u32>, String> {
        match matches.value_of(name) {
            Some(value) => value.parse::<u32>()
                .map(Some)
                .map_err(|err| format!("Invalid --{} \'{}\': {}", name, value, err)),
            None => Ok(None),
        }
    };
    Ok(DataQuery {
        id: matches.value_of("id").map(String::from),
        organization_id: matches.value_of("organization").map(String::from),
        limit: number("limit")?,
        offset: number("offset")?,
    })
}

fn ingest(configuration: Configuration) {
    let (tx, rx): (Sender<CandidateRecord>, Receiver<CandidateRecord>) = mpsc::channel();

    let terminate_programm = Arc::new(AtomicBool::new(false));
    let terminate_main_thread = Arc::clone(&terminate_programm);
    let terminate_socket_thread = Arc::clone(&terminate_programm);
    let terminate_database_thread = Arc::clone(&terminate_programm);

    let socket_configuration = configuration.socket_connection_parameters.clone();
    let socket_thread = match thread::Builder::new()
        .name("socket".to_string())
        .spawn(move || {
            socket::socket_thread(tx, terminate_socket_thread, socket_configuration);
        }) {
        Ok(socket_handle) => socket_handle,
        Err(err) => {
            log::error!(target: "sensorlog", "Cannot start the udp socket thread: \'{}\'", err);
            exit(201);
        }
    };

    let database_configuration = configuration.database_connection_parameters.clone();
    let database_thread = match thread::Builder::new()
        .name("database".to_string())
        .spawn(move || {
            database::database_thread(rx, terminate_database_thread, database_configuration);
        }) {
        Ok(database_handle) => database_handle,
        Err(err) => {
            log::error!(target: "sensorlog", "Cannot start the database thread: \'{}\'", err);
            exit(202);
        }
    };

    match ctrlc::set_handler(move || {
        log::info!(target: "sensorlog", "Termination signal received!");
        terminate_main_thread.store(true, Ordering::SeqCst);
    }) {
        Ok(_) => {}
        Err(err) => {
            log::error!(target: "sensorlog", "Error setting Ctrl-C handler: \'{}\'", err);
            exit(EXIT_SETUP);
        }
    };

    match socket_thread.join() {
        Ok(_) => log::debug!(target: "sensorlog", "Joined socket thread!"),
        Err(_) => {
            log::error!(target: "sensorlog", "Could not join the socket thread!");
            exit(301);
        }
    };
    match database_thread.join() {
        Ok(_) => log::debug!(target: "sensorlog", "Joined database thread!"),
        Err(_) => {
            log::error!(target: "sensorlog", "Could not join the database thread!");
            exit(301);
        }
    };
}
