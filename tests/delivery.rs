//! End-to-end delivery over a loopback socket.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use inkcal::{
    packed_len, DeliveryServer, Error, PackedImage, Quantizer, Raster, Rgb, ServeSummary,
    ServerConfig, SessionOutcome,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn write_frame(dir: &Path, width: u32, height: u32) -> (std::path::PathBuf, Vec<u8>) {
    let raster = Raster::from_fn(width, height, |x, y| match (x + y) % 3 {
        0 => Rgb::WHITE,
        1 => Rgb::BLACK,
        _ => Rgb::RED,
    });
    let packed = PackedImage::encode(&raster, &Quantizer::default()).unwrap();
    let path = dir.join("compressed_image.bin");
    packed.write_binary(&path).unwrap();
    (path, packed.into_bytes())
}

fn local_config(source: &Path) -> ServerConfig {
    ServerConfig::default()
        .with_host("127.0.0.1")
        .with_port(0)
        .with_source(source)
}

async fn fetch(addr: SocketAddr) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();
    received
}

#[tokio::test]
async fn client_reads_exact_frame_then_eof() {
    let dir = tempfile::tempdir().unwrap();
    let (source, frame) = write_frame(dir.path(), 400, 300);

    let mut server = DeliveryServer::bind(&local_config(&source)).await.unwrap();
    let addr = server.local_addr().unwrap();
    assert_eq!(server.frame_len(), packed_len(400, 300));

    let client = tokio::spawn(fetch(addr));
    let outcome = server.serve_one().await.unwrap();

    assert!(matches!(outcome, SessionOutcome::Completed { bytes } if bytes == 30_000));
    let received = client.await.unwrap();
    assert_eq!(received.len(), packed_len(400, 300));
    assert_eq!(received, frame);
}

#[tokio::test]
async fn clients_are_served_one_after_another() {
    let dir = tempfile::tempdir().unwrap();
    let (source, frame) = write_frame(dir.path(), 64, 48);

    let config = local_config(&source).with_chunk_size(100);
    let server = DeliveryServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_until(async move {
        let _ = stop_rx.await;
    }));

    for _ in 0..3 {
        assert_eq!(fetch(addr).await, frame);
    }

    stop_tx.send(()).unwrap();
    let summary = handle.await.unwrap();
    assert_eq!(
        summary,
        ServeSummary {
            completed: 3,
            failed: 0
        }
    );
}

#[tokio::test]
async fn disconnect_mid_send_does_not_stop_listener() {
    let dir = tempfile::tempdir().unwrap();
    // Far larger than the loopback socket buffers, so the drop lands mid-send
    let frame = vec![0x55u8; 32 << 20];
    let source = dir.path().join("compressed_image.bin");
    std::fs::write(&source, &frame).unwrap();

    let server = DeliveryServer::bind(&local_config(&source)).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_until(async move {
        let _ = stop_rx.await;
    }));

    {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut partial = vec![0u8; 1024];
        stream.read_exact(&mut partial).await.unwrap();
        assert_eq!(&partial[..], &frame[..1024]);
        // Dropping with unread data resets the connection
    }

    let received = tokio::time::timeout(Duration::from_secs(30), fetch(addr))
        .await
        .expect("server stopped accepting after a client reset");
    assert_eq!(received.len(), frame.len());

    stop_tx.send(()).unwrap();
    let summary = handle.await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn shutdown_closes_listener() {
    let dir = tempfile::tempdir().unwrap();
    let (source, _) = write_frame(dir.path(), 8, 8);

    let server = DeliveryServer::bind(&local_config(&source)).await.unwrap();
    let addr = server.local_addr().unwrap();

    let summary = server.serve_until(async {}).await;
    assert_eq!(summary, ServeSummary::default());

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn missing_source_refuses_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("compressed_image.bin");

    let err = DeliveryServer::bind(&local_config(&missing))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SourceMissing(ref p) if p == &missing));
}

#[tokio::test]
async fn one_pixel_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.bin");
    let packed = PackedImage::encode(&Raster::new(1, 1, Rgb::RED), &Quantizer::default()).unwrap();
    packed.write_binary(&path).unwrap();

    let mut server = DeliveryServer::bind(&local_config(&path)).await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = tokio::spawn(fetch(addr));
    server.serve_one().await.unwrap();
    assert_eq!(client.await.unwrap(), vec![0x80]);
}
