//! Serial-over-I2C: half-duplex, chunked request/response transactions
//! against a Notecard-style peripheral.
//!
//! The peripheral has no interrupt line, so the host paces everything: a
//! newline-terminated request goes out in length-prefixed chunks, then the
//! host polls with small "read tickets" until the newline-terminated reply
//! has been reassembled. One caller-owned buffer is reused for both
//! directions, so the request bytes are destroyed by the transaction.

use log::{debug, trace};

use crate::buffer::Buffer;

/// Default I2C address of the peripheral (the Notecard).
pub const DEFAULT_ADDR: u16 = 0x17;

/// Most payload bytes allowed in one transmit chunk.
const CHUNK_MAX: usize = 250;
/// Pause after each transmitted chunk, in milliseconds.
const CHUNK_SETTLE_MS: u32 = 250;
/// Total budget for a response to arrive.
const RESPONSE_BUDGET_MS: u32 = 5_000;
/// Idle poll interval while waiting for a response.
const POLL_MS: u32 = 50;
/// Size of the `[available, returned]` reply header.
const HDR: usize = 2;

/// The raw I2C primitives the transactor is driven through.
///
/// Implementations supply plain write/read transfers and a blocking delay;
/// the transactor owns all chunking and pacing on top of them. The
/// transactor itself never sleeps except through [`Link::delay_ms`].
pub trait Link {
    type Error;

    /// Write `data` to the peripheral at `addr`.
    fn tx(&mut self, addr: u16, data: &[u8]) -> ::std::result::Result<(), Self::Error>;

    /// Read exactly `data.len()` bytes from the peripheral at `addr`.
    fn rx(&mut self, addr: u16, data: &mut [u8]) -> ::std::result::Result<(), Self::Error>;

    /// Block for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// What to do with the peripheral's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Receive the newline-terminated reply into the buffer.
    RequestResponse,
    /// Receive the reply but discard it, draining until its newline.
    Request,
    /// Fire and forget; the peripheral sends no reply.
    Command,
}

/// Transaction failures. [`TransactError::code`] maps each onto the wire
/// status numbering, where 0 is success.
#[derive(Debug, ::thiserror::Error)]
pub enum TransactError<E> {
    /// The buffer is smaller than the 5-byte minimum.
    #[error("buffer smaller than the transaction minimum")]
    Config,

    /// The request is not newline-terminated.
    #[error("request is not newline-terminated")]
    Terminator,

    /// No room to prefix the transmit header.
    #[error("no room for the transmit chunk header")]
    TxBufferOverflow,

    /// The reply exceeds the buffer and the buffer cannot grow.
    #[error("reply does not fit the buffer")]
    RxBufferOverflow,

    /// An I2C write failed.
    #[error("i2c transmit failed")]
    Transmit(E),

    /// An I2C read failed.
    #[error("i2c receive failed")]
    Receive(E),

    /// No reply arrived within the polling budget.
    #[error("no reply within the polling budget")]
    Timeout,

    /// The peripheral returned a chunk of a size other than the one
    /// requested; host and peripheral are out of sync.
    #[error("peripheral returned {returned} bytes where {requested} were requested")]
    BadSizeReturned { requested: u8, returned: u8 },
}

impl<E> TransactError<E> {
    /// Wire status code; success is 0.
    pub fn code(&self) -> u8 {
        match self {
            Self::Config => 1,
            Self::Terminator => 2,
            Self::TxBufferOverflow => 3,
            Self::RxBufferOverflow => 4,
            Self::Transmit(_) => 5,
            Self::Receive(_) => 6,
            Self::Timeout => 7,
            Self::BadSizeReturned { .. } => 8,
        }
    }
}

/// Drives transactions against one peripheral over an injected [`Link`].
///
/// Contexts are exclusively owned and single-threaded; drive several
/// peripherals with several transactors.
pub struct Transactor<L> {
    link: L,
    addr: u16,
}

impl<L: Link> Transactor<L> {
    /// A transactor for the default peripheral address.
    pub fn new(link: L) -> Self {
        Self::with_addr(link, DEFAULT_ADDR)
    }

    /// A transactor for a specific address; 0 falls back to the default.
    pub fn with_addr(link: L, addr: u16) -> Self {
        Self {
            link,
            addr: if addr == 0 { DEFAULT_ADDR } else { addr },
        }
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    /// Send and receive (the common case).
    pub fn request_response<B: Buffer>(
        &mut self,
        buf: &mut B,
    ) -> ::std::result::Result<usize, TransactError<L::Error>> {
        self.transact(Exchange::RequestResponse, buf)
    }

    /// Send, then drain and discard the reply.
    pub fn request<B: Buffer>(
        &mut self,
        buf: &mut B,
    ) -> ::std::result::Result<usize, TransactError<L::Error>> {
        self.transact(Exchange::Request, buf)
    }

    /// Send a command that produces no reply.
    pub fn command<B: Buffer>(
        &mut self,
        buf: &mut B,
    ) -> ::std::result::Result<usize, TransactError<L::Error>> {
        self.transact(Exchange::Command, buf)
    }

    /// Flush anything pending on the peripheral from before this host was
    /// reset, so the next transaction starts clean.
    pub fn reset(&mut self) -> ::std::result::Result<(), TransactError<L::Error>> {
        let mut flush = [0u8; 25];
        flush[0] = b'\n';
        self.transact(Exchange::Request, &mut flush).map(|_| ())
    }

    /// Perform one transaction. On entry `buf` holds a newline-terminated
    /// request; on success it holds the reply (if one was kept) and the
    /// reply length is returned. The buffer contents are clobbered either
    /// way, since it serves as the I/O buffer for both directions.
    pub fn transact<B: Buffer>(
        &mut self,
        exchange: Exchange,
        buf: &mut B,
    ) -> ::std::result::Result<usize, TransactError<L::Error>> {
        let cap = buf.capacity();
        if cap < 5 {
            return Err(TransactError::Config);
        }

        let request_len = {
            let data = buf.as_mut_slice();
            let request_len = match data.iter().position(|&b| b == b'\n') {
                Some(at) => at + 1,
                None => return Err(TransactError::Terminator),
            };

            // One byte of headroom for the chunk-length prefix.
            if cap - request_len < 1 {
                return Err(TransactError::TxBufferOverflow);
            }
            data.copy_within(..request_len, 1);

            let mut left = request_len;
            while left > 0 {
                let chunk = left.min(CHUNK_MAX);
                data[0] = chunk as u8;
                self.link
                    .tx(self.addr, &data[..1 + chunk])
                    .map_err(TransactError::Transmit)?;
                self.link.delay_ms(CHUNK_SETTLE_MS);
                left -= chunk;
                data.copy_within(1 + chunk..1 + chunk + left, 1);
                trace!("sent {} byte chunk, {} left", chunk, left);
            }
            request_len
        };
        debug!("request sent: {} bytes", request_len);

        if exchange == Exchange::Command {
            return Ok(0);
        }

        let mut ms_left = RESPONSE_BUDGET_MS;
        let mut used = 0usize;
        let mut chunk = 0usize;
        let mut saw_newline = false;
        loop {
            // Make room before settling on the next chunk size; fixed
            // buffers clamp instead.
            if used + HDR + chunk > buf.capacity() {
                let shortfall = used + HDR + chunk - buf.capacity();
                let _ = buf.grow(shortfall);
            }
            let cap = buf.capacity();
            if used + HDR + chunk > cap {
                let room = cap - used - HDR;
                if room == 0 && chunk > 0 {
                    return Err(TransactError::RxBufferOverflow);
                }
                chunk = chunk.min(room);
            }

            // A two-byte write announcing that a read comes next, and how
            // much of the reply it wants.
            let data = buf.as_mut_slice();
            data[used] = 0;
            data[used + 1] = chunk as u8;
            self.link
                .tx(self.addr, &data[used..used + HDR])
                .map_err(TransactError::Transmit)?;
            self.link.delay_ms(1);

            self.link
                .rx(self.addr, &mut data[used..used + HDR + chunk])
                .map_err(TransactError::Receive)?;
            self.link.delay_ms(5);

            let available = data[used] as usize;
            let returned = data[used + 1];
            if returned as usize != chunk {
                return Err(TransactError::BadSizeReturned {
                    requested: chunk as u8,
                    returned,
                });
            }

            saw_newline |= data[used + HDR..used + HDR + chunk].contains(&b'\n');

            // Compact the header out so the reply stays contiguous.
            if exchange == Exchange::RequestResponse && chunk > 0 {
                data.copy_within(used + HDR..used + HDR + chunk, used);
                used += chunk;
            }

            chunk = available;
            if chunk > 0 {
                continue;
            }
            if saw_newline {
                break;
            }
            if ms_left < POLL_MS {
                return Err(TransactError::Timeout);
            }
            self.link.delay_ms(POLL_MS);
            ms_left -= POLL_MS;
        }
        debug!("reply received: {} bytes", used);
        Ok(used)
    }
}
