//! C header output for static embedding in firmware.
//!
//! The generated file looks like:
//!
//! ```c
//! #ifndef MY_IMAGE_H
//! #define MY_IMAGE_H
//!
//! const unsigned char my_image[] = {
//!     0x00, 0x15, 0xAA, ...
//! };
//!
//! const int my_image_width = 400;
//! const int my_image_height = 300;
//!
//! #endif
//! ```

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Error;
use crate::packer::PackedImage;

/// Byte literals per array line.
pub const BYTES_PER_LINE: usize = 12;

/// Whether `name` is usable as a C identifier.
pub fn is_valid_array_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render packed bytes as a C header.
///
/// Every byte is written as `0xNN, ` (uppercase hex, trailing comma on the
/// last one too), twelve to a line, each line indented by four spaces.
///
/// # Example
///
/// ```
/// use inkcal::header::render_header;
///
/// let text = render_header(&[0x00], 2, 1, "frame");
/// assert!(text.starts_with("#ifndef FRAME_H\n#define FRAME_H\n"));
/// assert!(text.contains("    0x00, \n};"));
/// assert!(text.contains("const int frame_width = 2;"));
/// ```
pub fn render_header(bytes: &[u8], width: u32, height: u32, name: &str) -> String {
    let guard = name.to_uppercase();
    let mut out = String::with_capacity(bytes.len() * 6 + 256);

    // Writing to a String cannot fail
    let _ = writeln!(out, "#ifndef {}_H", guard);
    let _ = writeln!(out, "#define {}_H", guard);
    out.push('\n');
    let _ = writeln!(out, "const unsigned char {}[] = {{", name);

    for line in bytes.chunks(BYTES_PER_LINE) {
        out.push_str("    ");
        for byte in line {
            let _ = write!(out, "0x{:02X}, ", byte);
        }
        out.push('\n');
    }

    out.push_str("};\n\n");
    let _ = writeln!(out, "const int {}_width = {};", name, width);
    let _ = writeln!(out, "const int {}_height = {};", name, height);
    out.push('\n');
    out.push_str("#endif\n");
    out
}

impl PackedImage {
    /// Render this frame as a C header, see [`render_header`].
    pub fn to_header(&self, name: &str) -> String {
        render_header(self.bytes(), self.width(), self.height(), name)
    }

    /// Write this frame as a C header file.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `name` is not a C identifier, [`Error::Io`] if the
    /// file cannot be written.
    pub fn write_header<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<(), Error> {
        if !is_valid_array_name(name) {
            return Err(Error::Config(format!(
                "'{}' is not a valid C array name",
                name
            )));
        }
        let path = path.as_ref();
        std::fs::write(path, self.to_header(name)).map_err(|e| Error::io(path, e))?;
        tracing::info!("Header file '{}' has been generated", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_exact_layout() {
        let text = render_header(&[0x00], 2, 1, "my_image");
        let expected = "\
#ifndef MY_IMAGE_H
#define MY_IMAGE_H

const unsigned char my_image[] = {
    0x00,\x20
};

const int my_image_width = 2;
const int my_image_height = 1;

#endif
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_header_wraps_at_twelve() {
        let bytes: Vec<u8> = (0..25).collect();
        let text = render_header(&bytes, 10, 10, "img");
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("    0x"))
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].matches("0x").count(), 12);
        assert_eq!(lines[1].matches("0x").count(), 12);
        assert_eq!(lines[2], "    0x18, ");
        assert!(lines[0].starts_with("    0x00, 0x01, 0x02, "));
        assert!(text.contains("0x0A, 0x0B, \n"));
    }

    #[test]
    fn test_header_exact_multiple_has_no_blank_line() {
        let bytes = [0xABu8; 12];
        let text = render_header(&bytes, 4, 12, "x");
        assert!(text.contains("0xAB, \n};\n"));
        assert!(!text.contains("\n\n};"));
    }

    #[test]
    fn test_header_uppercase_hex() {
        let text = render_header(&[0xab, 0x0f], 8, 1, "img");
        assert!(text.contains("0xAB, 0x0F, "));
    }

    #[test]
    fn test_valid_array_names() {
        assert!(is_valid_array_name("my_image"));
        assert!(is_valid_array_name("_frame2"));
        assert!(!is_valid_array_name(""));
        assert!(!is_valid_array_name("2frame"));
        assert!(!is_valid_array_name("my-image"));
    }

    #[test]
    fn test_write_header_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compressed_image.h");
        let packed = PackedImage::from_bytes(2, 1, vec![0x00]).unwrap();

        packed.write_header(&path, "my_image").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, packed.to_header("my_image"));

        let err = packed.write_header(&path, "bad name").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_write_header_unwritable() {
        let packed = PackedImage::from_bytes(1, 1, vec![0x80]).unwrap();
        let err = packed
            .write_header("/nonexistent/dir/out.h", "img")
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
