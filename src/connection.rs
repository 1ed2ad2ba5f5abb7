use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use bytes::Bytes;
use itertools::Itertools;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{Error, RawRead, RawWrite};
use crate::commands;
use crate::config::Config;
use crate::frame::Frame;
use crate::reader::FrameReader;
use crate::writer::{FrameWriter, SharedWriter};

/// One peer: a reader and a writer bound to the two directions of the same transport.
pub struct Connection<R, W> {
    pub id: Uuid,
    pub client_address: SocketAddr,
    reader: FrameReader<R>,
    writer: SharedWriter<W>,
}

impl<R: RawRead, W: RawWrite> Connection<R, W> {
    pub fn new(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        client_address: SocketAddr,
    ) -> Connection<R, W> {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            reader,
            writer: SharedWriter::new(writer),
        }
    }

    /// A handle for producers other than the request loop, e.g. out-of-band pushes.
    pub fn writer(&self) -> SharedWriter<W> {
        self.writer.clone()
    }

    pub fn read_frame(&mut self) -> Result<Frame, Error> {
        self.reader.read_frame()
    }

    /// Writes and flushes one complete reply.
    pub fn send(&self, frame: &Frame) -> Result<(), Error> {
        self.writer.send(frame)
    }

    /// Answers commands until the peer goes away.
    ///
    /// Returns `Ok(())` when the peer closes the stream and an error on any other I/O failure.
    /// Malformed input is answered with an error reply and does not end the connection, unless a
    /// length or the nesting depth is over the reader's limits: that is answered and then the
    /// connection is closed.
    pub fn serve(&mut self) -> Result<(), Error> {
        match self.serve_frames() {
            Err(Error::EndOfStream) => {
                info!("Connection closed");
                Ok(())
            }
            result => result,
        }
    }

    fn serve_frames(&mut self) -> Result<(), Error> {
        loop {
            let frame = match self.read_frame() {
                Ok(frame) => frame,
                Err(e @ Error::Invalid(_)) => {
                    warn!("Discarding malformed input: {}", e);
                    // Whatever is still buffered belongs to the broken frame or to an unknown
                    // position after it.
                    self.reader.discard_buffered();
                    self.send(&Frame::BulkError(Bytes::from(format!("ERR {}", e))))?;
                    continue;
                }
                Err(e @ Error::LimitExceeded(_)) => {
                    warn!("Closing connection: {}", e);
                    self.send(&Frame::BulkError(Bytes::from(format!("ERR {}", e))))?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if let Some(line) = command_line(&frame) {
                info!("Command: {}", line);
            }
            debug!("Received frame from client: {}", frame);

            let reply = commands::dispatch(frame);

            debug!("Sending response to client: {}", reply);
            self.send(&reply)?;
        }
    }
}

/// Binds a connection to a blocking TCP stream, using one handle per direction.
pub fn tcp_connection(
    stream: TcpStream,
    config: &Config,
) -> io::Result<Connection<impl RawRead + Send, impl RawWrite + Send>> {
    let client_address = stream.peer_addr()?;
    stream.set_nodelay(true)?;

    let mut read_half = stream.try_clone()?;
    let mut write_half = stream;

    let reader = FrameReader::with_capacity(
        move |buf: &mut [u8]| -> io::Result<usize> { read_half.read(buf) },
        config.buffer_capacity,
    )
    .with_limits(config.limits());
    let writer = FrameWriter::with_capacity(
        move |buf: &[u8]| -> io::Result<usize> { write_half.write(buf) },
        config.buffer_capacity,
    );

    Ok(Connection::new(reader, writer, client_address))
}

// Printable form of a command line, for logging only.
fn command_line(frame: &Frame) -> Option<String> {
    let Frame::Array(parts) = frame else {
        return None;
    };

    let line = parts
        .iter()
        .map(|part| match part {
            Frame::Simple(s) => s.clone(),
            Frame::Bulk(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            frame => frame.to_string(),
        })
        .join(" ");

    Some(line)
}
