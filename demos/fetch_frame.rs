//! Panel-side client: fetch one frame and save a preview
//!
//! Run with: cargo run --example fetch_frame -- 127.0.0.1:8122 preview.png
//!
//! Behaves like the e-ink panel firmware: connect, read until the server
//! closes the socket, and interpret the bytes as a 400x300 packed frame.

use std::io::Read;
use std::net::TcpStream;

use inkcal::{packed_len, PackedImage, DEFAULT_HEIGHT, DEFAULT_WIDTH};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:8122".to_string());
    let output = args.next().unwrap_or_else(|| "preview.png".to_string());

    println!("Connecting to {}", addr);
    let mut stream = TcpStream::connect(&addr)?;

    let mut bytes = Vec::with_capacity(packed_len(DEFAULT_WIDTH, DEFAULT_HEIGHT));
    stream.read_to_end(&mut bytes)?;
    println!("Received {} bytes", bytes.len());

    let frame = PackedImage::from_bytes(DEFAULT_WIDTH, DEFAULT_HEIGHT, bytes)?;
    frame.to_raster().save(&output)?;
    println!("Preview written to {}", output);

    Ok(())
}
