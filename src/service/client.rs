//! Blocking client for the filter service wire protocol.
//!
//! One connection, one in-flight request at a time. The connection is
//! opened lazily and dropped on any I/O failure, so the next call dials
//! again; callers that can retry get a fresh connection for free.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::Result;
use crate::item::Item;
use crate::service::wire::{self, Request, Response};

struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self { reader, writer })
    }
}

/// A blocking filter-service client.
pub struct FilterClient {
    addr: String,
    conn: Mutex<Option<Connection>>,
}

impl FilterClient {
    /// Creates a client for the given address. No connection is made
    /// until the first call.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            conn: Mutex::new(None),
        }
    }

    /// The upstream address this client dials.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends one request and reads one response frame. Error frames are
    /// surfaced as typed errors; the call is logged with its duration.
    pub fn call(&self, request: &Request) -> Result<Response> {
        let started = Instant::now();
        let outcome = self.exchange(request);
        let describe = match &outcome {
            Ok(response) => response.describe(),
            Err(e) => e.to_string(),
        };
        log::debug!(
            "wire;{};{};{}us",
            request.op(),
            describe,
            started.elapsed().as_micros()
        );
        outcome.and_then(Response::into_result)
    }

    fn exchange(&self, request: &Request) -> Result<Response> {
        let mut slot = self.conn.lock();
        if slot.is_none() {
            *slot = Some(Connection::open(&self.addr)?);
        }
        let conn = slot.as_mut().expect("connection just established");

        let round_trip = wire::write_frame(&mut conn.writer, request).and_then(|()| {
            wire::read_frame::<_, Response>(&mut conn.reader)?
                .ok_or_else(|| crate::error::Error::protocol("connection closed mid-request"))
        });

        if round_trip.is_err() {
            // Drop the broken connection; the next call dials again.
            *slot = None;
        }
        round_trip
    }

    /// Admits an item into the upstream filter.
    pub fn insert(&self, item: Item) -> Result<()> {
        self.call(&Request::InsertItem { item }).map(|_| ())
    }

    /// Reads the highest-scored item.
    pub fn get_max(&self) -> Result<Item> {
        self.call(&Request::GetMaxItem)
            .and_then(Self::expect_item)
    }

    /// Reads the lowest-scored item.
    pub fn get_min(&self) -> Result<Item> {
        self.call(&Request::GetMinItem)
            .and_then(Self::expect_item)
    }

    /// Removes the highest-scored item.
    pub fn remove_max(&self) -> Result<Item> {
        self.call(&Request::RemoveMaxItem)
            .and_then(Self::expect_item)
    }

    /// Removes the lowest-scored item.
    pub fn remove_min(&self) -> Result<Item> {
        self.call(&Request::RemoveMinItem)
            .and_then(Self::expect_item)
    }

    /// Reads the current item count.
    pub fn get_size(&self) -> Result<u64> {
        match self.call(&Request::GetSize)? {
            Response::Success { size: Some(size), .. } => Ok(size),
            other => Err(crate::error::Error::protocol(format!(
                "expected a size payload, got {}",
                other.describe()
            ))),
        }
    }

    /// Drops all items from the upstream filter.
    pub fn clear(&self) -> Result<()> {
        self.call(&Request::Clear).map(|_| ())
    }

    fn expect_item(response: Response) -> Result<Item> {
        match response {
            Response::Success { item: Some(item), .. } => Ok(item),
            other => Err(crate::error::Error::protocol(format!(
                "expected an item payload, got {}",
                other.describe()
            ))),
        }
    }
}

impl std::fmt::Debug for FilterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterClient")
            .field("addr", &self.addr)
            .field("connected", &self.conn.lock().is_some())
            .finish()
    }
}
