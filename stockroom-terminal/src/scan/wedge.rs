//! Keyboard-wedge scanner
//!
//! USB scanners in keyboard mode type the decoded barcode followed by Enter.
//! Each non-blank line read while the device runs becomes a
//! [`DecodeEvent::Decoded`]; read failures become
//! [`DecodeEvent::DecodeError`].
//!
//! An activation delivers at most one barcode: after it the reader waits to
//! be stopped, so lines typed ahead stay in the input for the next start.

use super::device::{DecodeDevice, DecodeEvent, DecodeSink, ScanConfig, ScanResult};
use shared::models::Barcode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio_util::sync::CancellationToken;

pub struct KeyboardWedge<R> {
    lines: Arc<tokio::sync::Mutex<Lines<BufReader<R>>>>,
    running: Option<CancellationToken>,
    eof: CancellationToken,
}

impl<R> KeyboardWedge<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: Arc::new(tokio::sync::Mutex::new(BufReader::new(reader).lines())),
            running: None,
            eof: CancellationToken::new(),
        }
    }

    /// Cancelled once the input is exhausted
    pub fn eof_token(&self) -> CancellationToken {
        self.eof.clone()
    }
}

impl<R> DecodeDevice for KeyboardWedge<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn start(&mut self, _config: &ScanConfig, sink: DecodeSink) -> ScanResult<()> {
        self.stop();

        let cancel = CancellationToken::new();
        self.running = Some(cancel.clone());
        let input = self.lines.clone();
        let eof = self.eof.clone();

        tokio::spawn(async move {
            // Waits for a reader task of a previous start to let go
            let mut lines = tokio::select! {
                _ = cancel.cancelled() => return,
                guard = input.lock() => guard,
            };

            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => break,
                    line = lines.next_line() => line,
                };

                match line {
                    Ok(Some(line)) => {
                        let value = line.trim();
                        if value.is_empty() {
                            continue;
                        }
                        let is_barcode = Barcode::parse(value).is_ok();
                        if sink.send(DecodeEvent::Decoded(value.to_string())).is_err() {
                            break;
                        }
                        if is_barcode {
                            cancel.cancelled().await;
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("Keyboard wedge input closed");
                        eof.cancel();
                        break;
                    }
                    Err(e) => {
                        let _ = sink.send(DecodeEvent::DecodeError(e.to_string()));
                        eof.cancel();
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.running.take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_lines_become_decode_events() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut wedge = KeyboardWedge::new(reader);
        let (sink, mut events) = mpsc::unbounded_channel();

        wedge.start(&ScanConfig::default(), sink).unwrap();
        writer.write_all(b"not-a-code\n\n  3017620422003 \n").await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(DecodeEvent::Decoded("not-a-code".into()))
        );
        assert_eq!(
            events.recv().await,
            Some(DecodeEvent::Decoded("3017620422003".into()))
        );
    }

    #[tokio::test]
    async fn test_one_barcode_per_activation() {
        let mut wedge = KeyboardWedge::new(&b"111\n222\n"[..]);

        let (sink, mut first) = mpsc::unbounded_channel();
        wedge.start(&ScanConfig::default(), sink).unwrap();
        assert_eq!(first.recv().await, Some(DecodeEvent::Decoded("111".into())));
        let ahead = tokio::time::timeout(std::time::Duration::from_millis(50), first.recv()).await;
        assert!(ahead.is_err());
        wedge.stop();

        let (sink, mut second) = mpsc::unbounded_channel();
        wedge.start(&ScanConfig::default(), sink).unwrap();
        assert_eq!(second.recv().await, Some(DecodeEvent::Decoded("222".into())));
    }

    #[tokio::test]
    async fn test_eof_cancels_token() {
        let mut wedge = KeyboardWedge::new(&b"end\n"[..]);
        let eof = wedge.eof_token();
        let (sink, mut events) = mpsc::unbounded_channel();

        wedge.start(&ScanConfig::default(), sink).unwrap();
        assert_eq!(events.recv().await, Some(DecodeEvent::Decoded("end".into())));
        eof.cancelled().await;
    }

    #[tokio::test]
    async fn test_restart_keeps_reading_same_input() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut wedge = KeyboardWedge::new(reader);

        let (sink, mut first) = mpsc::unbounded_channel();
        wedge.start(&ScanConfig::default(), sink).unwrap();
        writer.write_all(b"111\n").await.unwrap();
        assert_eq!(first.recv().await, Some(DecodeEvent::Decoded("111".into())));
        wedge.stop();

        let (sink, mut second) = mpsc::unbounded_channel();
        wedge.start(&ScanConfig::default(), sink).unwrap();
        writer.write_all(b"222\n").await.unwrap();
        assert_eq!(second.recv().await, Some(DecodeEvent::Decoded("222".into())));
    }
}
