//! UDP ingestion of candidate records.
//!
//! Every datagram carries one JSON encoded candidate which is forwarded to the database thread.
use std::{io, time};
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::sleep;

use serde::{Deserialize, Serialize};

use crate::record::CandidateRecord;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SocketParameters {
    pub address: String,
    pub port: u16,
}

/// Decodes a received datagram into a candidate.
pub fn decode_datagram(buf: &[u8]) -> Result<CandidateRecord, String> {
    let recv_data_str = std::str::from_utf8(buf)
        .map_err(|err| format!("Received data cannot be converted to UTF-8 str: {}", err))?;
    let recv_data_str_trimmed = recv_data_str.trim_end_matches(char::from(0)).trim();
    if recv_data_str_trimmed.is_empty() {
        return Err(String::from("Received empty packet"));
    }
    serde_json::from_str::<CandidateRecord>(recv_data_str_trimmed)
        .map_err(|err| format!("Received data cannot be deserialized via JSON: {}", err))
}

pub fn socket_thread(tx: Sender<CandidateRecord>, thread_finished: Arc<AtomicBool>, params: SocketParameters) {
    let socket: UdpSocket = match UdpSocket::bind((params.address.as_str(), params.port)) {
        Ok(socket) => socket,
        Err(err) => {
            log::error!(target: "sensorlog::udp", "Could not open udp socket: \'{}\'", err);
            thread_finished.store(true, Ordering::SeqCst);
            return;
        }
    };
    match socket.set_nonblocking(true) {
        Ok(_) => log::debug!(target: "sensorlog::udp", "Set socket to nonblocking mode!"),
        Err(err) => {
            log::error!(target: "sensorlog::udp", "Could not set socket to nonblocking mode: \'{}\'", err);
            thread_finished.store(true, Ordering::SeqCst);
            return;
        }
    }

    match socket.local_addr() {
        Ok(res) => {
            log::info!(target: "sensorlog::udp", "Socket Addr: \'{}\'", res);
        }
        Err(err) => {
            log::error!(target: "sensorlog::udp", "Could not get socket address: \'{}\'", err);
            thread_finished.store(true, Ordering::SeqCst);
            return;
        }
    }

    let timeout = time::Duration::from_millis(100);
    let mut buf: [u8; 1024] = [0; 1024];

    while !thread_finished.load(Ordering::SeqCst) {
        let (buf_size, addr) = match socket.recv_from(&mut buf) {
            Ok(res) => res,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                sleep(timeout);
                continue;
            }
            Err(msg) => {
                log::error!(target: "sensorlog::udp", "Socket cannot recv data: \'{}\'", msg);
                continue;
            }
        };

        log::debug!(target: "sensorlog::udp", "Received data with length: \'{}\' from \'{}\'!", &buf_size, &addr);

        let candidate = match decode_datagram(&buf[..buf_size]) {
            Ok(candidate) => candidate,
            Err(err) => {
                log::warn!(target: "sensorlog::udp", "Dropping datagram from \'{}\': {}", &addr, err);
                continue;
            }
        };

        match tx.send(candidate) {
            Ok(_) => log::debug!(target: "sensorlog::udp", "Send candidate to database thread!"),
            Err(err) => {
                log::error!(target: "sensorlog::udp", "Could not send candidate to database thread: \'{}\'", err);
            }
        };
    }
}
