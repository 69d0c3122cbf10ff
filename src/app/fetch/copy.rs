//! Chunked copy helpers shared by the serving paths

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{FetchError, FetchResult};

/// Fill `buffer` once, failing if no byte arrives within `timeout`
pub(crate) async fn read_chunk<R>(
    reader: &mut R,
    buffer: &mut [u8],
    timeout: Duration,
) -> FetchResult<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match tokio::time::timeout(timeout, reader.read(buffer)).await {
        Ok(read) => Ok(read?),
        Err(_) => Err(FetchError::Stalled {
            seconds: timeout.as_secs(),
        }),
    }
}

/// Copy `reader` to `writer` until end of stream
///
/// With a `timeout`, every buffer fill is bounded by it. Returns the number
/// of bytes copied.
pub(crate) async fn copy_stream<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    timeout: Option<Duration>,
) -> FetchResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = match timeout {
            Some(timeout) => read_chunk(reader, &mut buffer, timeout).await?,
            None => reader.read(&mut buffer).await?,
        };
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        copied += n as u64;
    }

    writer.flush().await?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_stream_small_buffer() {
        let mut reader: &[u8] = b"abcdefghij";
        let mut writer = Vec::new();

        let copied = copy_stream(&mut reader, &mut writer, 3, None).await.unwrap();
        assert_eq!(copied, 10);
        assert_eq!(writer, b"abcdefghij");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_read_times_out() {
        let (mut reader, _writer) = tokio::io::duplex(64);
        let mut buffer = [0u8; 16];

        let error = read_chunk(&mut reader, &mut buffer, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::Stalled { seconds: 60 }));
    }
}
