//! The TCP filter service.
//!
//! Maps wire requests onto the filter façade: one thread per connection,
//! one request frame per line, one response frame back. A connection gate
//! bounds how many connections are served at once; excess accepts wait.

use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::config::FilterServiceConfig;
use crate::error::{ErrorKind, Result};
use crate::filter::Filter;
use crate::service::wire::{self, Request, Response};

/// Bounds the number of concurrently served connections. Acquire blocks
/// the accept loop once the limit is reached; releases wake it.
struct ConnectionGate {
    limit: usize,
    active: Mutex<usize>,
    released: Condvar,
}

impl ConnectionGate {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            active: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut active = self.active.lock();
        while *active >= self.limit {
            self.released.wait(&mut active);
        }
        *active += 1;
    }

    fn release(&self) {
        let mut active = self.active.lock();
        *active -= 1;
        drop(active);
        self.released.notify_one();
    }
}

/// The filter service: a [`Filter`] behind the wire protocol.
pub struct FilterService {
    config: FilterServiceConfig,
    filter: Arc<Filter>,
    gate: Arc<ConnectionGate>,
}

impl FilterService {
    /// Builds the service and the filter behind it.
    ///
    /// # Errors
    ///
    /// Returns configuration and construction errors from the filter.
    pub fn new(config: FilterServiceConfig) -> Result<Self> {
        config.validate()?;
        let filter = Arc::new(Filter::new(config.filter.clone())?);
        log::info!(
            "locking policy: {}, filter max capacity: {}",
            config.filter.variant,
            config.filter.capacity
        );
        let gate = Arc::new(ConnectionGate::new(config.worker_threads));
        Ok(Self {
            config,
            filter,
            gate,
        })
    }

    /// The filter served by this service. Mostly useful in tests.
    #[must_use]
    pub fn filter(&self) -> &Arc<Filter> {
        &self.filter
    }

    /// Binds the configured port and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the port cannot be bound.
    pub fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))?;
        log::info!(
            "filter server <{}> running at port: {}",
            self.config.name,
            self.config.port
        );
        self.serve(&listener)
    }

    /// Serves connections from an already-bound listener. Exposed so
    /// tests can bind an ephemeral port first.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if accepting fails fatally.
    pub fn serve(&self, listener: &TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("filter accept error: {e}");
                    continue;
                }
            };
            self.gate.acquire();
            let filter = Arc::clone(&self.filter);
            let gate = Arc::clone(&self.gate);
            std::thread::spawn(move || {
                log::debug!("filter connection from {peer}");
                if let Err(e) = handle_connection(&filter, stream) {
                    log::debug!("filter connection {peer} ended: {e}");
                }
                gate.release();
            });
        }
    }
}

/// Serves one connection: read a frame, dispatch, answer, repeat until
/// EOF. Malformed frames get an error response; I/O failures end the
/// session.
fn handle_connection(filter: &Filter, stream: TcpStream) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    loop {
        let request: Request = match wire::read_frame(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()), // clean EOF
            Err(e) if e.kind() == ErrorKind::Protocol => {
                wire::write_frame(&mut writer, &Response::from_error(&e))?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let started = Instant::now();
        let response = dispatch(filter, &request);
        log::debug!(
            "{};{};{}us",
            request.op(),
            response.describe(),
            started.elapsed().as_micros()
        );
        wire::write_frame(&mut writer, &response)?;
    }
}

/// Maps one request onto the façade.
fn dispatch(filter: &Filter, request: &Request) -> Response {
    let result = match request {
        Request::InsertItem { item } => filter.insert(item.clone()).map(|()| Response::success()),
        Request::GetMaxItem => filter.get_max().map(Response::with_item),
        Request::GetMinItem => filter.get_min().map(Response::with_item),
        Request::RemoveMaxItem => filter.remove_max().map(Response::with_item),
        Request::RemoveMinItem => filter.remove_min().map(Response::with_item),
        Request::GetSize => Ok(Response::with_size(filter.size() as u64)),
        Request::Clear => filter.clear().map(|()| Response::success()),
    };
    result.unwrap_or_else(|e| Response::from_error(&e))
}
