//! Decoder for the minimal bitmap container the runtime uses for
//! research imagery (Windows BMP, the only variant the eye cameras emit).
//!
//! Pure parsing, no I/O. [`BitmapView`] is a zero-copy pixel grid over a
//! borrowed buffer; [`BitmapImage`] owns its bytes and is the usual way
//! to hold the result of a research image fetch.

use crate::types::RawImage;
use crate::BitmapError;

/// Byte length of the fixed header prefix we require: file header
/// (14 bytes) plus the info header fields through bits-per-pixel.
const MIN_HEADER_LEN: usize = 30;

/// Parsed bitmap header fields.
///
/// BMP rows are stored bottom-up by default, signaled by a positive
/// height in the header; a negative stored height means top-down. The
/// sign is folded into [`BmpHeader::flipped`] and `height` is always the
/// actual row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    /// Total container size as declared at offset 2.
    pub file_size: u32,
    /// Offset of the pixel array, declared at offset 10.
    pub data_offset: u32,
    pub width: u32,
    /// Row count, always positive.
    pub height: u32,
    /// Bytes per pixel (bits-per-pixel / 8).
    pub channels: u32,
    /// True when rows are stored bottom-up and consumers that assume
    /// top-down order must flip.
    pub flipped: bool,
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Parse and validate the fixed bitmap header.
///
/// Fails on buffers shorter than the fixed header or on a magic other
/// than `"BM"`; never reads past the buffer.
pub fn parse_header(buf: &[u8]) -> Result<BmpHeader, BitmapError> {
    if buf.len() < MIN_HEADER_LEN {
        return Err(BitmapError::Truncated(buf.len()));
    }
    if buf[0] != b'B' || buf[1] != b'M' {
        return Err(BitmapError::BadMagic);
    }

    let file_size = read_u32(buf, 2);
    let data_offset = read_u32(buf, 10);
    let width = read_u32(buf, 18);
    let raw_height = read_u32(buf, 22) as i32;
    let flipped = raw_height > 0;
    let height = raw_height.unsigned_abs();
    let bits_per_pixel = u16::from_le_bytes([buf[28], buf[29]]) as u32;

    Ok(BmpHeader {
        file_size,
        data_offset,
        width,
        height,
        channels: bits_per_pixel / 8,
        flipped,
    })
}

/// Zero-copy pixel grid over a borrowed bitmap buffer.
#[derive(Debug, Clone, Copy)]
pub struct BitmapView<'a> {
    header: BmpHeader,
    /// The pixel array only, `height * width * channels` bytes starting
    /// at the header's declared data offset.
    pixels: &'a [u8],
}

impl<'a> BitmapView<'a> {
    /// Decode a bitmap buffer without copying the payload.
    pub fn decode(buf: &'a [u8]) -> Result<BitmapView<'a>, BitmapError> {
        let header = parse_header(buf)?;
        let len = header
            .height
            .checked_mul(header.width)
            .and_then(|n| n.checked_mul(header.channels))
            .ok_or(BitmapError::PayloadOutOfBounds)? as usize;
        let start = header.data_offset as usize;
        let end = start.checked_add(len).ok_or(BitmapError::PayloadOutOfBounds)?;
        if end > buf.len() {
            return Err(BitmapError::PayloadOutOfBounds);
        }
        Ok(BitmapView {
            header,
            pixels: &buf[start..end],
        })
    }

    pub fn header(&self) -> &BmpHeader {
        &self.header
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn channels(&self) -> u32 {
        self.header.channels
    }

    /// True when rows are stored bottom-up; see [`BmpHeader::flipped`].
    pub fn flipped(&self) -> bool {
        self.header.flipped
    }

    /// The whole pixel array in storage order.
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// One row in storage order. Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(y < self.header.height, "row {} out of range", y);
        let stride = (self.header.width * self.header.channels) as usize;
        &self.pixels[y as usize * stride..(y as usize + 1) * stride]
    }

    /// One row counted from the top of the image, regardless of storage
    /// order.
    pub fn row_top_down(&self, y: u32) -> &'a [u8] {
        if self.header.flipped {
            self.row(self.header.height - 1 - y)
        } else {
            self.row(y)
        }
    }

    /// The channel bytes of one pixel, in storage order. Panics on
    /// out-of-range coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> &'a [u8] {
        assert!(x < self.header.width, "column {} out of range", x);
        let c = self.header.channels as usize;
        let row = self.row(y);
        &row[x as usize * c..(x as usize + 1) * c]
    }
}

/// A decoded research image owning its bytes.
#[derive(Debug, Clone)]
pub struct BitmapImage {
    raw: RawImage,
    header: BmpHeader,
}

impl BitmapImage {
    /// Decode a raw research image buffer, validating header and payload
    /// bounds up front.
    pub fn decode(raw: RawImage) -> Result<BitmapImage, BitmapError> {
        let header = *BitmapView::decode(&raw.data)?.header();
        Ok(BitmapImage { raw, header })
    }

    pub fn header(&self) -> &BmpHeader {
        &self.header
    }

    pub fn timestamp_us(&self) -> u64 {
        self.raw.timestamp_us
    }

    /// Borrow the pixel grid.
    pub fn view(&self) -> BitmapView<'_> {
        // bounds were validated in decode
        BitmapView {
            header: self.header,
            pixels: &self.raw.data[self.header.data_offset as usize..]
                [..(self.header.height * self.header.width * self.header.channels) as usize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageType;

    /// Build a bitmap buffer with the given raw (signed) height field.
    fn make_bmp(width: u32, raw_height: i32, bits_per_pixel: u16) -> Vec<u8> {
        let rows = raw_height.unsigned_abs();
        let channels = (bits_per_pixel / 8) as u32;
        let data_offset = 54u32;
        let payload = rows * width * channels;
        let mut buf = vec![0u8; (data_offset + payload) as usize];
        buf[0] = b'B';
        buf[1] = b'M';
        buf[2..6].copy_from_slice(&(data_offset + payload).to_le_bytes());
        buf[10..14].copy_from_slice(&data_offset.to_le_bytes());
        buf[14..18].copy_from_slice(&40u32.to_le_bytes());
        buf[18..22].copy_from_slice(&width.to_le_bytes());
        buf[22..26].copy_from_slice(&raw_height.to_le_bytes());
        buf[26..28].copy_from_slice(&1u16.to_le_bytes());
        buf[28..30].copy_from_slice(&bits_per_pixel.to_le_bytes());
        for (i, b) in buf[data_offset as usize..].iter_mut().enumerate() {
            *b = i as u8;
        }
        buf
    }

    #[test]
    fn short_buffer_is_a_format_error() {
        for len in [0, 1, 29] {
            let buf = vec![0u8; len];
            assert_eq!(parse_header(&buf), Err(BitmapError::Truncated(len)));
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = make_bmp(4, -2, 24);
        buf[1] = b'A';
        assert_eq!(parse_header(&buf), Err(BitmapError::BadMagic));
    }

    #[test]
    fn top_down_header_fields() {
        let buf = make_bmp(4, -2, 24);
        let header = parse_header(&buf).unwrap();
        assert!(!header.flipped);
        assert_eq!(header.width, 4);
        assert_eq!(header.height, 2);
        assert_eq!(header.channels, 3);
        assert_eq!(header.data_offset, 54);
    }

    #[test]
    fn bottom_up_header_sets_flipped() {
        let buf = make_bmp(4, 2, 24);
        let header = parse_header(&buf).unwrap();
        assert!(header.flipped);
        assert_eq!(header.height, 2);
    }

    #[test]
    fn pixel_data_starts_at_declared_offset() {
        let buf = make_bmp(4, -2, 24);
        let view = BitmapView::decode(&buf).unwrap();
        // first payload byte was written as 0 at offset 54
        assert_eq!(view.pixel(0, 0), &[0, 1, 2]);
        assert_eq!(view.row(1)[0], 12); // second row starts one stride in
    }

    #[test]
    fn payload_shorter_than_declared_grid_is_rejected() {
        let mut buf = make_bmp(4, -2, 24);
        buf.truncate(buf.len() - 1);
        assert_eq!(
            BitmapView::decode(&buf).unwrap_err(),
            BitmapError::PayloadOutOfBounds
        );
    }

    #[test]
    fn decoded_view_is_debug_printable() {
        let buf = make_bmp(2, 2, 24);
        let view = BitmapView::decode(&buf).unwrap();
        assert!(format!("{:?}", view).contains("BmpHeader"));
    }

    #[test]
    fn top_down_rows_account_for_storage_order() {
        let bottom_up = make_bmp(2, 2, 24);
        let view = BitmapView::decode(&bottom_up).unwrap();
        // bottom-up storage: the image's top row is the last stored row
        assert_eq!(view.row_top_down(0), view.row(1));

        let top_down = make_bmp(2, -2, 24);
        let view = BitmapView::decode(&top_down).unwrap();
        assert_eq!(view.row_top_down(0), view.row(0));
    }

    #[test]
    fn owned_image_decodes_and_exposes_a_view() {
        let raw = RawImage {
            image_type: ImageType::StereoEye,
            timestamp_us: 7,
            data: make_bmp(4, 2, 24),
        };
        let img = BitmapImage::decode(raw).unwrap();
        assert_eq!(img.timestamp_us(), 7);
        assert_eq!(img.header().width, 4);
        assert_eq!(img.view().row(0).len(), 12);
    }
}
