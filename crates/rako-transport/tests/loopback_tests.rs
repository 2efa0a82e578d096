//! Loopback exercises for the UDP, stream and HTTP transports

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;

use rako_core::{Command, CommandType, DATAGRAM_ACK};
use rako_transport::{
    CacheClient, CommandLink, StatusSocket, StreamConfig, TelnetLink, TransportError,
    UdpCommandLink, UdpConfig,
};

fn short_udp_config() -> UdpConfig {
    UdpConfig {
        ack_timeout: Duration::from_millis(200),
    }
}

fn short_stream_config() -> StreamConfig {
    StreamConfig {
        reply_timeout: Duration::from_millis(200),
        keepalive_secs: 0,
    }
}

async fn read_line(stream: &mut TcpStream) -> Vec<u8> {
    let mut line = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        let len = stream.read(&mut buf).await.unwrap();
        assert!(len > 0, "connection closed before CRLF");
        line.extend_from_slice(&buf[..len]);
        if line.ends_with(b"\r\n") {
            return line;
        }
    }
}

#[tokio::test]
async fn test_udp_deliver_acknowledged() {
    let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let controller = responder.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut buf = [0u8; 64];
        let (len, from) = responder.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[0], b'R');
        // A valid frame sums to zero mod 256 over everything after the marker
        let total: u32 = buf[1..len].iter().map(|&b| u32::from(b)).sum();
        assert_eq!(total % 256, 0);
        responder.send_to(DATAGRAM_ACK, from).await.unwrap();
    });

    let link = UdpCommandLink::with_config(controller, short_udp_config())
        .await
        .unwrap();
    link.deliver(&Command::set_level(4, 2, 255)).await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn test_udp_missing_ack_times_out() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let controller = silent.local_addr().unwrap();

    let link = UdpCommandLink::with_config(controller, short_udp_config())
        .await
        .unwrap();
    let result = link.deliver(&Command::set_level(1, 1, 0)).await;

    assert!(matches!(result, Err(TransportError::AckTimeout)));
}

#[tokio::test]
async fn test_udp_mismatched_ack_is_accepted() {
    let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let controller = responder.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut buf = [0u8; 64];
        let (_, from) = responder.recv_from(&mut buf).await.unwrap();
        responder.send_to(b"NAK\r\n", from).await.unwrap();
    });

    let link = UdpCommandLink::with_config(controller, short_udp_config())
        .await
        .unwrap();
    link.deliver(&Command::set_scene(1, 0, 1)).await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn test_status_socket_decodes_frames() {
    let socket = StatusSocket::bind_port(0).await.unwrap();
    let port = socket.local_addr().unwrap().port();
    let target = SocketAddr::from(([127, 0, 0, 1], port));
    let mut rx = socket.start_receiver();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // Noise is dropped, the level frame behind it comes through
    sender.send_to(b"garbage", target).await.unwrap();
    sender
        .send_to(&[b'S', 11, 0x00, 4, 2, 0x34, 0x02, 0xFF], target)
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.room, 4);
    assert_eq!(event.channel, 2);
    assert_eq!(event.command, CommandType::SetLevel);
    assert_eq!(event.brightness, Some(255));
}

#[tokio::test]
async fn test_telnet_scene_line_exchange() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let line = read_line(&mut stream).await;
        stream.write_all(b"OK\r\n").await.unwrap();
        line
    });

    let link = TelnetLink::with_config(addr, short_stream_config());
    link.deliver(&Command::set_scene(4, 0, 2)).await.unwrap();

    let line = server.await.unwrap();
    assert_eq!(line, b"ROOM04,CHANNEL00,SCENE02\r\n");
}

#[tokio::test]
async fn test_telnet_level_line_exchange() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let line = read_line(&mut stream).await;
        stream.write_all(b"Command OK\r\n").await.unwrap();
        line
    });

    let link = TelnetLink::with_config(addr, short_stream_config());
    link.deliver(&Command::set_level(4, 2, 255)).await.unwrap();

    let line = server.await.unwrap();
    assert_eq!(line, b"ROOM04,CHANNEL02,LEVEL255\r\n");
}

#[tokio::test]
async fn test_telnet_error_reply_is_not_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_line(&mut stream).await;
        stream.write_all(b"ERROR\r\n").await.unwrap();
    });

    let link = TelnetLink::with_config(addr, short_stream_config());
    link.deliver(&Command::set_scene(1, 0, 1)).await.unwrap();
}

#[tokio::test]
async fn test_telnet_unsupported_command_refused_before_connect() {
    // Discard port; the link must refuse before dialing
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let link = TelnetLink::with_config(addr, short_stream_config());

    let result = link
        .deliver(&Command::explicit(1, 1, CommandType::Stop))
        .await;
    assert!(matches!(result, Err(TransportError::UnsupportedLine(_))));
}

#[tokio::test]
async fn test_telnet_reconnects_after_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // First connection is dropped without a reply
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_line(&mut stream).await;
        drop(stream);

        // Second connection completes the exchange
        let (mut stream, _) = listener.accept().await.unwrap();
        let line = read_line(&mut stream).await;
        stream.write_all(b"OK\r\n").await.unwrap();
        line
    });

    let link = TelnetLink::with_config(addr, short_stream_config());
    assert!(link.deliver(&Command::set_scene(1, 0, 1)).await.is_err());
    link.deliver(&Command::set_scene(1, 0, 1)).await.unwrap();

    let line = server.await.unwrap();
    assert_eq!(line, b"ROOM01,CHANNEL00,SCENE01\r\n");
}

#[tokio::test]
async fn test_telnet_monitor_tails_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"ROOM004,CHANNEL001,SCENE2\r\n").await.unwrap();
    });

    let link = TelnetLink::with_config(addr, short_stream_config());
    let mut rx = link.monitor().await.unwrap();

    let chunk = timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(chunk.starts_with(b"ROOM"));

    // The connection dropping closes the channel
    let end = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(end.is_none());
}

async fn serve_document(body: String, status: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(len) => {
                        request.extend_from_slice(&buf[..len]);
                        if request.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
        }
    });

    addr
}

#[tokio::test]
async fn test_cache_client_fetches_scenes() {
    let addr = serve_document("10064004".to_string(), "200 OK").await;
    let client = CacheClient::with_base_url(&format!("http://{addr}"));

    let scenes = client.fetch_scenes().await.unwrap();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].room, 6);
    assert_eq!(scenes[0].scene, 1);
    assert_eq!(scenes[1].room, 4);
    assert_eq!(scenes[1].scene, 4);
}

#[tokio::test]
async fn test_cache_client_fetches_levels() {
    let mut bytes = vec![0x58, 0x04, 0x81, 0x04, 0x07];
    bytes.extend((0u8..16).map(|i| i * 16));
    let body: String = bytes.iter().map(|b| format!("{b:02X}")).collect();

    let addr = serve_document(body, "200 OK").await;
    let client = CacheClient::with_base_url(&format!("http://{addr}"));

    let levels = client.fetch_levels().await.unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].room, 260);
    assert_eq!(levels[0].channel, 7);
    assert!(levels[0].active);
    assert!(!levels[0].deleted);
    assert_eq!(levels[0].levels[1], 16);
}

#[tokio::test]
async fn test_cache_client_propagates_http_failure() {
    let addr = serve_document(String::new(), "404 Not Found").await;
    let client = CacheClient::with_base_url(&format!("http://{addr}"));

    let result = client.fetch_levels().await;
    assert!(matches!(result, Err(TransportError::Http(_))));
}

#[tokio::test]
async fn test_discovery_gives_up_quickly() {
    let result = rako_transport::discovery::discover(59761, Duration::from_millis(100)).await;
    assert!(result.is_err());
}
