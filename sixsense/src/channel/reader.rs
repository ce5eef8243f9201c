//! Background task draining a channel's byte stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, trace};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::decoder::ChunkDecoder;
use super::output::ChannelOutput;

/// Handle to a running stream reader.
pub struct StreamReader {
    channel_name: String,
    closing: Arc<AtomicBool>,
    close: Arc<Notify>,
    task: JoinHandle<()>,
}

impl StreamReader {
    /// Start draining `stream` into `output` until end of stream or close.
    pub fn spawn<R>(
        channel_name: impl Into<String>,
        mut stream: R,
        output: Arc<ChannelOutput>,
        mut decoder: ChunkDecoder,
        buffer_size: usize,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let channel_name = channel_name.into();
        let closing = Arc::new(AtomicBool::new(false));
        let close = Arc::new(Notify::new());

        let name = channel_name.clone();
        let task_closing = closing.clone();
        let task_close = close.clone();

        let task = tokio::spawn(async move {
            let mut buffer = vec![0u8; buffer_size.max(1)];
            loop {
                tokio::select! {
                    biased;
                    _ = task_close.notified() => {
                        trace!("{}: reader closed", name);
                        break;
                    }
                    read = stream.read(&mut buffer) => match read {
                        Ok(0) => {
                            debug!("{}: end of stream", name);
                            break;
                        }
                        Ok(n) => {
                            let text = decoder.decode(&buffer[..n]);
                            if !text.is_empty() {
                                trace!("{}: read {:?}", name, text);
                                output.append(&text);
                            }
                        }
                        Err(e) => {
                            if task_closing.load(Ordering::SeqCst) {
                                debug!("{}: read interrupted by close: {}", name, e);
                            } else {
                                error!("{}: failed to read channel: {}", name, e);
                            }
                            break;
                        }
                    }
                }
            }
            output.mark_closed();
        });

        Self {
            channel_name,
            closing,
            close,
            task,
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Mark the coming end of stream as expected.
    pub fn expect_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    /// Stop reading and wait for the task to finish.
    pub async fn close(self) {
        self.expect_close();
        self.close.notify_one();
        if let Err(e) = self.task.await {
            debug!("{}: reader task ended abnormally: {}", self.channel_name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::rules::{SubstitutionRule, compile_rules};
    use std::time::Duration;

    fn decoder() -> ChunkDecoder {
        ChunkDecoder::new(compile_rules(&SubstitutionRule::defaults()).unwrap(), true)
    }

    #[tokio::test]
    async fn test_reads_until_end_of_stream() {
        let mock = tokio_test::io::Builder::new()
            .read(b"Welcome\r\nuser@host:~$ ")
            .read(b"echo 1\r\n1\r\n")
            .read(b"user@host:~$ ")
            .build();

        let output = Arc::new(ChannelOutput::new());
        let reader = StreamReader::spawn("LOCAL", mock, output.clone(), decoder(), 1024);
        reader.task.await.unwrap();

        assert!(output.is_closed());
        assert_eq!(
            output.snapshot(),
            vec!["Welcome", "user@host:~$ echo 1", "1", "user@host:~$ "]
        );
    }

    #[tokio::test]
    async fn test_small_buffer_reassembles_lines() {
        let mock = tokio_test::io::Builder::new()
            .read(b"abcdef\r\nghi")
            .build();

        let output = Arc::new(ChannelOutput::new());
        let reader = StreamReader::spawn("LOCAL", mock, output.clone(), decoder(), 3);
        reader.task.await.unwrap();

        assert_eq!(output.snapshot(), vec!["abcdef", "ghi"]);
    }

    #[tokio::test]
    async fn test_read_error_ends_reader() {
        let mock = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(std::io::Error::other("reset"))
            .build();

        let output = Arc::new(ChannelOutput::new());
        let reader = StreamReader::spawn("REMOTE", mock, output.clone(), decoder(), 1024);
        reader.task.await.unwrap();

        assert!(output.is_closed());
        assert_eq!(output.snapshot(), vec!["partial"]);
    }

    #[tokio::test]
    async fn test_close_stops_idle_reader() {
        let (client, _server) = tokio::io::duplex(64);
        let output = Arc::new(ChannelOutput::new());
        let reader = StreamReader::spawn("LOCAL", client, output.clone(), decoder(), 1024);

        tokio::time::timeout(Duration::from_secs(1), reader.close())
            .await
            .expect("close should not hang");
        assert!(output.is_closed());
    }
}
