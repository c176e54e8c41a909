//! Newline-delimited JSON transport to a remote robot base
//!
//! Each request is one JSON object on its own line, answered by exactly one
//! reply line. [`serve`] exposes any local [`RobotTransport`] the same way, which
//! is what the `sim_robot` binary does with the simulator.

use super::RobotTransport;
use crate::common::Command;
use crate::error::{CoreError, Result};
use crate::perception::RobotSnapshot;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Port the robot server listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 8101;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    EnableMotors,
    Step,
    Command(Command),
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Snapshot(RobotSnapshot),
    Error { message: String },
}

struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Robot reached over TCP
pub struct TcpRobot {
    host: String,
    port: u16,
    timeout: Duration,
    connection: Option<Connection>,
}

impl TcpRobot {
    pub fn new(host: &str, port: u16) -> Self {
        TcpRobot {
            host: host.to_string(),
            port,
            timeout: Duration::from_secs(2),
            connection: None,
        }
    }

    /// Connect and read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn connection_failed(&self, reason: impl ToString) -> CoreError {
        CoreError::ConnectionFailed {
            target: self.target(),
            reason: reason.to_string(),
        }
    }

    fn request(&mut self, request: &Request) -> Result<Reply> {
        let connection = self.connection.as_mut().ok_or(CoreError::NotConnected)?;
        write_line(&mut connection.writer, request)?;

        let mut line = String::new();
        if connection.reader.read_line(&mut line)? == 0 {
            self.connection = None;
            return Err(CoreError::Transport("robot closed the connection".to_string()));
        }
        let reply: Reply = serde_json::from_str(line.trim_end())?;
        if let Reply::Error { message } = reply {
            return Err(CoreError::Transport(message));
        }
        Ok(reply)
    }
}

impl RobotTransport for TcpRobot {
    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect(&mut self) -> Result<()> {
        let addrs: Vec<_> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.connection_failed(e))?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_nodelay(true)?;
                    let writer = stream.try_clone()?;
                    self.connection = Some(Connection {
                        reader: BufReader::new(stream),
                        writer,
                    });
                    info!("Connected to robot at {}", addr);
                    return Ok(());
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => self.connection_failed(e),
            None => self.connection_failed("host did not resolve to any address"),
        })
    }

    fn enable_motors(&mut self) -> Result<()> {
        self.request(&Request::EnableMotors).map(|_| ())
    }

    fn step_synchronously(&mut self) -> Result<RobotSnapshot> {
        match self.request(&Request::Step)? {
            Reply::Snapshot(snapshot) => Ok(snapshot),
            other => Err(CoreError::Transport(format!(
                "expected a snapshot, got {:?}",
                other
            ))),
        }
    }

    fn send_command(&mut self, command: &Command) -> Result<()> {
        self.request(&Request::Command(*command)).map(|_| ())
    }

    fn disconnect(&mut self) {
        if self.connection.is_some() {
            if let Err(e) = self.request(&Request::Disconnect) {
                debug!("Disconnect request failed: {}", e);
            }
        }
        self.connection = None;
    }
}

fn write_line<T: Serialize>(writer: &mut TcpStream, message: &T) -> Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

/// Serve one client at a time on `listener`, forwarding requests to `robot`.
/// Returns after `max_clients` clients have disconnected, or never if `None`
pub fn serve<T: RobotTransport>(
    listener: &TcpListener,
    robot: &mut T,
    max_clients: Option<usize>,
) -> Result<()> {
    let mut served = 0;
    while max_clients.map_or(true, |max| served < max) {
        let (stream, peer) = listener.accept()?;
        info!("Client connected from {}", peer);
        if let Err(e) = serve_client(stream, robot) {
            warn!("Client {} dropped: {}", peer, e);
        }
        // a departed client must not leave the robot driving
        robot.send_command(&Command::stop())?;
        served += 1;
    }
    Ok(())
}

fn serve_client<T: RobotTransport>(stream: TcpStream, robot: &mut T) -> Result<()> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                write_line(&mut writer, &Reply::Error { message: e.to_string() })?;
                continue;
            }
        };
        let outcome = match request {
            Request::EnableMotors => robot.enable_motors().map(|_| Reply::Ok),
            Request::Step => robot.step_synchronously().map(Reply::Snapshot),
            Request::Command(command) => robot.send_command(&command).map(|_| Reply::Ok),
            Request::Disconnect => {
                write_line(&mut writer, &Reply::Ok)?;
                break;
            }
        };
        let reply = outcome.unwrap_or_else(|e| Reply::Error { message: e.to_string() });
        write_line(&mut writer, &reply)?;
    }
    info!("Client disconnected");
    Ok(())
}
