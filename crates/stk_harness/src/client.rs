//! Synchronous Connect command client.
//!
//! One client owns one TCP connection. Commands are issued strictly in
//! program order; the protocol has no multiplexing, so the client must not
//! be shared across concurrent callers.

use std::io::{Read, Write};
use std::net::TcpStream;

use log::debug;

use crate::codec::{self, CommandShape};
use crate::error::{StkError, StkResult};

/// Result of one command invocation: the ack outcome and any payload
/// records. The ack flag is only meaningful while ack-mode is enabled.
#[derive(Debug, Clone, Default)]
pub struct ResponseFrame {
    pub acked: bool,
    pub records: Vec<String>,
}

impl ResponseFrame {
    /// All payload records joined with the record separator.
    pub fn text(&self) -> String {
        self.records.join("\n")
    }

    pub fn first_record(&self) -> Option<&str> {
        self.records.first().map(String::as_str)
    }
}

/// Client for the STK Connect command protocol.
///
/// Generic over the stream so the framing logic can be driven by scripted
/// transports in tests; production code uses [`ConnectClient::connect`].
pub struct ConnectClient<S: Read + Write = TcpStream> {
    stream: Option<S>,
    ack: bool,
    async_mode: bool,
}

impl ConnectClient<TcpStream> {
    /// Open the connection and perform the session handshake: TCP no-delay,
    /// ack-mode on, async-mode off, then host-side error reporting on and
    /// verbose output off.
    ///
    /// A refused connection surfaces as [`StkError::Connect`] so callers can
    /// poll; the client never retries internally.
    pub fn connect(host: &str, port: u16) -> StkResult<Self> {
        let stream = TcpStream::connect((host, port)).map_err(StkError::Connect)?;
        stream.set_nodelay(true).map_err(StkError::Connect)?;

        let mut client = Self {
            stream: Some(stream),
            ack: false,
            async_mode: false,
        };
        client.ack_on()?;
        client.async_off()?;
        client.send_command("ConControl / ErrorOn VerboseOff")?;
        Ok(client)
    }
}

impl<S: Read + Write> ConnectClient<S> {
    /// Wrap an already-open stream. Test seam; skips the handshake.
    pub(crate) fn from_stream(stream: S, ack: bool) -> Self {
        Self {
            stream: Some(stream),
            ack,
            async_mode: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    #[cfg(test)]
    pub(crate) fn stream_mut(&mut self) -> Option<&mut S> {
        self.stream.as_mut()
    }

    /// Client-side shadow of the host-negotiated ack mode.
    pub fn is_ack_on(&self) -> bool {
        self.ack
    }

    /// Client-side shadow of the host-negotiated async mode.
    pub fn is_async_on(&self) -> bool {
        self.async_mode
    }

    /// Enable ack-mode and inform the host.
    pub fn ack_on(&mut self) -> StkResult<ResponseFrame> {
        self.ack = true;
        self.send_command("ConControl / AckOn")
    }

    /// Disable ack-mode and inform the host.
    pub fn ack_off(&mut self) -> StkResult<ResponseFrame> {
        self.ack = false;
        self.send_command("ConControl / AckOff")
    }

    /// Disable asynchronous messages and inform the host.
    pub fn async_off(&mut self) -> StkResult<ResponseFrame> {
        self.async_mode = false;
        self.send_command("ConControl / AsyncOff")
    }

    /// Send one command line and consume its full response.
    ///
    /// The first whitespace token is the verb. `ConControl` arguments are
    /// additionally scanned for ack/async mode changes so the client-side
    /// flags track what the host was told. When ack-mode is on a nack
    /// short-circuits the call: no payload is read and the frame carries
    /// `acked == false`. Commands with a declared response shape then yield
    /// one or more payload records.
    pub fn send_command(&mut self, input: &str) -> StkResult<ResponseFrame> {
        let stream = self.stream.as_mut().ok_or(StkError::NotConnected)?;

        let tokens: Vec<&str> = input.split_whitespace().collect();
        let Some((&verb, data)) = tokens.split_first() else {
            return Ok(ResponseFrame::default());
        };

        if verb.eq_ignore_ascii_case("ConControl") {
            let mut found_ack = false;
            let mut found_async = false;
            for token in data {
                if !found_ack {
                    if token.eq_ignore_ascii_case("AckOn") {
                        self.ack = true;
                        found_ack = true;
                    } else if token.eq_ignore_ascii_case("AckOff") {
                        self.ack = false;
                        found_ack = true;
                    }
                }
                if !found_async {
                    if token.eq_ignore_ascii_case("AsyncOn") {
                        self.async_mode = true;
                        found_async = true;
                    } else if token.eq_ignore_ascii_case("AsyncOff") {
                        self.async_mode = false;
                        found_async = true;
                    }
                }
            }
        }

        // SetState carries a file path in its arguments; re-tokenizing would
        // corrupt any embedded whitespace, so that one command goes verbatim.
        let line = if verb.eq_ignore_ascii_case("SetState") && input.contains("TLE") {
            input.to_string()
        } else {
            let mut line = verb.to_string();
            for token in data {
                line.push(' ');
                line.push_str(token);
            }
            line
        };

        debug!("connect >> {line}");
        stream
            .write_all(&codec::encode_command(&line))
            .map_err(StkError::Transport)?;
        stream.flush().map_err(StkError::Transport)?;

        let acked = if self.ack {
            codec::read_ack(stream)?
        } else {
            false
        };

        let mut records = Vec::new();
        let shape = codec::response_shape(verb);
        let payload_expected = shape != CommandShape::NoData && (!self.ack || acked);
        if payload_expected {
            match shape {
                CommandShape::SingleRecord => records.push(codec::read_record(stream)?),
                CommandShape::MultiRecord => records = codec::read_multi_records(stream)?,
                CommandShape::NoData => {}
            }
        }

        Ok(ResponseFrame { acked, records })
    }

    /// Send a command that must succeed; a nack becomes [`StkError::HostRejected`].
    pub fn send_expecting_ack(&mut self, input: &str) -> StkResult<ResponseFrame> {
        let frame = self.send_command(input)?;
        if self.ack && !frame.acked {
            return Err(StkError::rejected(input));
        }
        Ok(frame)
    }

    /// Drain one pending asynchronous message into its payload lines.
    /// Only meaningful while async-mode is enabled.
    pub fn read_async(&mut self) -> StkResult<Vec<String>> {
        let stream = self.stream.as_mut().ok_or(StkError::NotConnected)?;
        codec::read_async_message(stream)
    }

    /// Notify the host and close the connection. Idempotent; teardown I/O
    /// errors are swallowed because the socket is going away regardless.
    pub fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.write_all(&codec::encode_command("ConControl / disconnect"));
            let _ = stream.flush();
        }
    }
}

impl<S: Read + Write> Drop for ConnectClient<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
