/// Per-connection handler: read the first chunk, close the connection,
/// extract the hostname.
use crate::report::Observation;
use std::io;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ReadLimits {
    pub recv_size: usize,
    pub timeout: Duration,
}

/// One bounded read, then the connection is dropped before parsing. A client
/// that closes without sending anything is `NotFound`.
pub async fn observe(mut client: TcpStream, limits: ReadLimits) -> io::Result<Observation> {
    let mut buf = vec![0u8; limits.recv_size];

    let n = tokio::time::timeout(limits.timeout, client.read(&mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no data before read timeout"))??;
    drop(client);

    Ok(Observation::from(sniff_proto::extract(&buf[..n])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener;
    use sniff_proto::Hostname;
    use tokio::io::AsyncWriteExt;

    const LIMITS: ReadLimits = ReadLimits {
        recv_size: 4096,
        timeout: Duration::from_secs(5),
    };

    async fn observe_payload(payload: &'static [u8], limits: ReadLimits) -> io::Result<Observation> {
        let listener = listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(payload).await.unwrap();
            stream
        });
        let (stream, _) = listener.accept().await.unwrap();
        let result = observe(stream, limits).await;
        drop(client.await.unwrap());
        result
    }

    #[tokio::test]
    async fn test_observe_http() {
        let obs = observe_payload(b"GET / HTTP/1.1\r\nHost: example.org\r\n\r\n", LIMITS)
            .await
            .unwrap();
        assert_eq!(obs, Observation::Found(Hostname::Http("example.org".into())));
    }

    #[tokio::test]
    async fn test_recv_size_bounds_the_read() {
        let limits = ReadLimits {
            recv_size: 16,
            ..LIMITS
        };
        let obs = observe_payload(b"GET / HTTP/1.1\r\nHost: example.org\r\n\r\n", limits)
            .await
            .unwrap();
        assert_eq!(obs, Observation::NotFound);
    }

    #[tokio::test]
    async fn test_truncated_tls_is_reported() {
        let obs = observe_payload(&[0x16, 0x03, 0x01, 0x02, 0x00, 0x01], LIMITS)
            .await
            .unwrap();
        assert!(matches!(obs, Observation::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out() {
        let listener = listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();

        let err = observe(stream, LIMITS).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
