//! Virtual chiller actor task
//!
//! Runs a [`VirtualChiller`] behind an async byte stream, the way a real
//! controller sits behind a serial line. The task uses a select! loop to:
//! - Read request bytes, extract frames and write back responses
//! - Handle control commands (status injection, shutdown) from a channel

use std::io;

use neslab_protocol::FrameDecoder;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::VirtualChiller;

/// Commands that can be sent to a virtual chiller task
#[derive(Debug, Clone)]
pub enum VirtualChillerCommand {
    /// Replace the status bytes d1..d4
    SetStatus([u8; 4]),
    /// Overwrite the raw value behind a catalog command
    SetRegister { command: String, raw: u16 },
    /// Shutdown the virtual chiller task
    Shutdown,
}

/// Run the virtual chiller task until the stream closes or a shutdown arrives
///
/// Returns the chiller so callers can inspect its final state.
pub async fn run_chiller_task<S>(
    mut stream: S,
    mut chiller: VirtualChiller,
    mut cmd_rx: mpsc::Receiver<VirtualChillerCommand>,
) -> io::Result<VirtualChiller>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 256];

    info!("Starting virtual chiller task for {}", chiller.id());

    loop {
        tokio::select! {
            // Control commands queued before a request are applied first
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualChillerCommand::SetStatus(status)) => {
                        info!("Virtual chiller {} status set to {:02X?}", chiller.id(), status);
                        chiller.set_status(status);
                    }
                    Some(VirtualChillerCommand::SetRegister { command, raw }) => {
                        if !chiller.set_register(&command, raw) {
                            warn!("Virtual chiller {} has no register for {}", chiller.id(), command);
                        }
                    }
                    Some(VirtualChillerCommand::Shutdown) => {
                        info!("Shutdown requested for virtual chiller {}", chiller.id());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual chiller {}", chiller.id());
                        break;
                    }
                }
            }

            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual chiller stream closed for {}", chiller.id());
                        break;
                    }
                    Ok(n) => {
                        let data = &buf[..n];
                        debug!("Virtual chiller {} received {} bytes: {:02X?}", chiller.id(), n, data);

                        decoder.push_bytes(data);
                        while let Some(frame) = decoder.next_frame() {
                            if let Some(response) = chiller.handle_frame(&frame) {
                                debug!("Virtual chiller {} responding: {:02X?}", chiller.id(), response);
                                stream.write_all(&response).await?;
                                stream.flush().await?;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Virtual chiller {} stream error: {}", chiller.id(), e);
                        return Err(e);
                    }
                }
            }
        }
    }

    info!("Virtual chiller task ended for {}", chiller.id());
    Ok(chiller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use neslab_protocol::{build, decode_analog, Params};

    #[tokio::test]
    async fn test_task_answers_over_stream() {
        let (mut client, server) = tokio::io::duplex(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let handle = tokio::spawn(run_chiller_task(server, VirtualChiller::new("Task"), cmd_rx));

        let request = build("req_setp1", &Params::new()).unwrap();
        // Split the write to exercise frame reassembly
        client.write_all(&request[..2]).await.unwrap();
        client.write_all(&request[2..]).await.unwrap();

        let mut response = [0u8; 9];
        client.read_exact(&mut response).await.unwrap();
        assert_eq!(decode_analog(&response).unwrap().raw, 200);

        cmd_tx
            .send(VirtualChillerCommand::SetRegister {
                command: "req_temp1".into(),
                raw: 187,
            })
            .await
            .unwrap();
        cmd_tx.send(VirtualChillerCommand::Shutdown).await.unwrap();

        let chiller = handle.await.unwrap().unwrap();
        assert_eq!(chiller.register("req_temp1").unwrap().raw, 187);
    }

    #[tokio::test]
    async fn test_task_ends_when_stream_closes() {
        let (client, server) = tokio::io::duplex(64);
        let (_cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(client);
        let chiller = run_chiller_task(server, VirtualChiller::new("Closed"), cmd_rx)
            .await
            .unwrap();
        assert_eq!(chiller.id(), "Closed");
    }
}
