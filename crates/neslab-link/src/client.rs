//! Request/response client
//!
//! The chiller has no request IDs and no pipelining: every request must be
//! followed by its response before the next request goes out. [`Chiller`]
//! enforces this by holding the stream behind an async mutex for the whole
//! write-then-read exchange, so it can be shared between tasks.

use std::io;
use std::time::Duration;

use neslab_protocol::frame::MIN_FRAME_LEN;
use neslab_protocol::{
    AnalogReading, CommandSpec, FrameBuilder, FrameDecoder, Keystroke, OnOff, Params, ParseError,
    Response, StatusReport,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::error::LinkError;
use crate::transport::LinkConfig;

/// A chiller reachable over an async byte stream
pub struct Chiller<S> {
    stream: Mutex<Option<S>>,
    builder: FrameBuilder,
    timeout: Duration,
}

impl<S> Chiller<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an open stream
    pub fn new(stream: S, config: LinkConfig) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
            builder: FrameBuilder::new()
                .with_interface(config.interface)
                .with_address(config.address),
            timeout: config.timeout,
        }
    }

    /// Frame builder for this link's interface and address
    pub fn builder(&self) -> &FrameBuilder {
        &self.builder
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write one frame and read the response to it
    ///
    /// Bytes already waiting on the stream are discarded before the write,
    /// and verified frames that answer some other command are skipped, so a
    /// reply that arrived after an earlier timeout is never taken as this
    /// request's answer. A damaged frame is handed back once the deadline
    /// passes so the caller can report it as a checksum error rather than a
    /// timeout.
    pub async fn transact(&self, frame: &[u8]) -> Result<Vec<u8>, LinkError> {
        let command = frame.get(3).copied().ok_or(LinkError::Parse(ParseError::TooShort {
            needed: MIN_FRAME_LEN,
            actual: frame.len(),
        }))?;

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(LinkError::NotOpen)?;

        let stale = discard_pending(stream).await?;
        if stale > 0 {
            warn!("Discarded {} stale bytes before request", stale);
        }

        trace!("TX {:02X?}", frame);
        stream.write_all(frame).await?;
        stream.flush().await?;

        let response = read_frame(stream, command, self.timeout).await?;
        trace!("RX {:02X?}", response);
        Ok(response)
    }

    /// Send a catalog command and decode the response by its expected shape
    pub async fn request(&self, command: &str, params: &Params) -> Result<Response, LinkError> {
        let spec = CommandSpec::lookup(command)?;
        let frame = self.builder.build_spec(spec, params)?;
        let response = self.transact(&frame).await?;
        let decoded = Response::parse(spec.response_kind(), &response)?;
        debug!("{} -> {:?}", spec.name, decoded);
        Ok(decoded)
    }

    /// Ask for the protocol version; true if the chiller speaks version 0
    pub async fn ack(&self) -> Result<bool, LinkError> {
        match self.request("req_ack", &Params::new()).await? {
            Response::Ack(ok) => Ok(ok),
            _ => Err(unexpected("req_ack")),
        }
    }

    /// Read an analog value (measurement, alarm limit, setpoint, PID term)
    pub async fn read_value(&self, command: &str) -> Result<AnalogReading, LinkError> {
        match self.request(command, &Params::new()).await? {
            Response::Analog(reading) => Ok(reading),
            _ => Err(unexpected(command)),
        }
    }

    /// Write a raw integer with a `set_*` command; returns the echoed value
    pub async fn write_raw(&self, command: &str, raw: u16) -> Result<AnalogReading, LinkError> {
        match self.request(command, &Params::value(raw)).await? {
            Response::Analog(reading) => Ok(reading),
            _ => Err(unexpected(command)),
        }
    }

    /// Write a value in engineering units with a `set_*` command
    ///
    /// Set frames carry no qualifier, so the matching request is sent first
    /// to learn the precision the chiller expects.
    pub async fn write_value(&self, command: &str, value: f64) -> Result<AnalogReading, LinkError> {
        let spec = CommandSpec::lookup(command)?;
        let request = matching_request(spec).ok_or_else(|| LinkError::NoMatchingRequest {
            command: command.to_string(),
        })?;
        let current = self.read_value(request.name).await?;
        let raw = current.raw_for(value).ok_or_else(|| LinkError::ValueOutOfRange {
            command: command.to_string(),
            value,
        })?;
        self.write_raw(command, raw).await
    }

    /// Read the four status bytes
    pub async fn status(&self) -> Result<StatusReport, LinkError> {
        match self.request("req_status", &Params::new()).await? {
            Response::Status(report) => Ok(report),
            _ => Err(unexpected("req_status")),
        }
    }

    /// Press a front panel key
    pub async fn press(&self, key: Keystroke) -> Result<(), LinkError> {
        self.request("set_keystroke", &Params::new().d1(key as u8))
            .await
            .map(|_| ())
    }

    /// Switch the unit on or off; returns whether it is running afterwards
    pub async fn set_power(&self, state: OnOff) -> Result<bool, LinkError> {
        match self
            .request("set_onoff_array", &Params::new().d1(state as u8))
            .await?
        {
            Response::Raw(data) => match data.first() {
                Some(&running) => Ok(running == 0x01),
                None => Err(unexpected("set_onoff_array")),
            },
            _ => Err(unexpected("set_onoff_array")),
        }
    }

    /// Shut down the stream; later requests fail with [`LinkError::NotOpen`]
    pub async fn close(&self) -> Result<(), LinkError> {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            stream.shutdown().await?;
            debug!("Link closed");
        }
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.stream.lock().await.is_some()
    }
}

/// The `req_*` command that reads what a `set_*` command writes
pub fn matching_request(set: &CommandSpec) -> Option<&'static CommandSpec> {
    let code = set.code() & 0x7F;
    CommandSpec::all()
        .iter()
        .find(|c| c.name.starts_with("req_") && c.code() == code)
}

fn unexpected(command: &str) -> LinkError {
    LinkError::UnexpectedResponse {
        command: command.to_string(),
    }
}

/// Command byte of an error response
const ERROR_COMMAND: u8 = 0x0F;

/// Drop whatever the peer sent since the last exchange
async fn discard_pending<S>(stream: &mut S) -> Result<usize, LinkError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 64];
    let mut discarded = 0;
    loop {
        // A zero timeout still polls the read once
        match timeout(Duration::ZERO, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Err(_) => return Ok(discarded),
            Ok(Ok(n)) => {
                trace!("Stale {:02X?}", &buf[..n]);
                discarded += n;
            }
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}

/// Read until a verified frame answering `command` arrives or the deadline passes
async fn read_frame<S>(stream: &mut S, command: u8, limit: Duration) -> Result<Vec<u8>, LinkError>
where
    S: AsyncRead + Unpin,
{
    let deadline = Instant::now() + limit;
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 64];
    let mut mismatched = false;

    loop {
        match timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed").into())
            }
            Ok(Ok(n)) => {
                decoder.push_bytes(&buf[..n]);
                while let Some(frame) = decoder.next_frame() {
                    if frame[3] == command || frame[3] == ERROR_COMMAND {
                        if decoder.buffered() > 0 {
                            warn!("Discarding {} trailing bytes", decoder.buffered());
                        }
                        return Ok(frame);
                    }
                    warn!(
                        "Skipping response to 0x{:02X} while waiting for 0x{:02X}: {:02X?}",
                        frame[3], command, frame
                    );
                    mismatched = true;
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return match decoder.take_partial() {
                    Some(partial) => {
                        warn!("Unverified response at deadline: {:02X?}", partial);
                        Ok(partial)
                    }
                    None if mismatched => Err(LinkError::UnexpectedResponse {
                        command: format!("command 0x{:02X}", command),
                    }),
                    None => Err(LinkError::Timeout(limit)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_request() {
        let set = CommandSpec::lookup("set_setp1").unwrap();
        assert_eq!(matching_request(set).unwrap().name, "req_setp1");

        let set = CommandSpec::lookup("set_hi_temp1").unwrap();
        assert_eq!(matching_request(set).unwrap().name, "req_high_temp1");

        let set = CommandSpec::lookup("set_lo_res1").unwrap();
        assert_eq!(matching_request(set).unwrap().name, "req_lo_res1");
    }

    #[tokio::test]
    async fn test_read_frame_times_out_on_silence() {
        let (_peer, mut stream) = tokio::io::duplex(64);
        let err = read_frame(&mut stream, 0x00, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Timeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_read_frame_returns_damaged_frame_at_deadline() {
        let (mut peer, mut stream) = tokio::io::duplex(64);
        peer.write_all(&[0xCA, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0xFA])
            .await
            .unwrap();
        let frame = read_frame(&mut stream, 0x00, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(frame.len(), 8);
    }

    #[tokio::test]
    async fn test_read_frame_skips_answer_to_other_command() {
        let (mut peer, mut stream) = tokio::io::duplex(64);
        // Late setpoint answer followed by the supply temperature answer
        peer.write_all(&[0xCA, 0x00, 0x01, 0x70, 0x03, 0x11, 0x00, 0xC8, 0xB2])
            .await
            .unwrap();
        let mut supply = vec![0xCA, 0x00, 0x01, 0x20, 0x03, 0x11, 0x00, 0xB7];
        supply.push(neslab_protocol::checksum(&supply[1..]));
        peer.write_all(&supply).await.unwrap();

        let frame = read_frame(&mut stream, 0x20, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(frame, supply);
    }

    #[tokio::test]
    async fn test_read_frame_only_other_answers_is_unexpected() {
        let (mut peer, mut stream) = tokio::io::duplex(64);
        peer.write_all(&[0xCA, 0x00, 0x01, 0x70, 0x03, 0x11, 0x00, 0xC8, 0xB2])
            .await
            .unwrap();
        assert!(matches!(
            read_frame(&mut stream, 0x20, Duration::from_millis(20)).await,
            Err(LinkError::UnexpectedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_accepts_error_frame() {
        let (mut peer, mut stream) = tokio::io::duplex(64);
        let error = [0xCA, 0x00, 0x01, 0x0F, 0x02, 0x01, 0x08, 0x33, 0x96, 0x1B];
        peer.write_all(&error).await.unwrap();
        let frame = read_frame(&mut stream, 0x08, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(frame[3], 0x0F);
    }

    #[tokio::test]
    async fn test_discard_pending_empties_stream() {
        let (mut peer, mut stream) = tokio::io::duplex(64);
        peer.write_all(&[0xCA, 0x00, 0x01, 0x70]).await.unwrap();
        assert_eq!(discard_pending(&mut stream).await.unwrap(), 4);
        assert_eq!(discard_pending(&mut stream).await.unwrap(), 0);
    }
}
