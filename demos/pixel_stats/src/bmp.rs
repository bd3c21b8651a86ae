use anyhow::{ensure, Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

// Classic uncompressed 24-bit BMP: 54-byte header, then BGR pixel triplets.
const HEADER_SIZE: usize = 54;
const CHANNELS: usize = 3;
const WIDTH_OFFSET: usize = 18;
const HEIGHT_OFFSET: usize = 22;

#[derive(Clone, Copy, Debug)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    fn byte_offset(self) -> usize {
        match self {
            Channel::Blue => 0,
            Channel::Green => 1,
            Channel::Red => 2,
        }
    }
}

pub struct ChannelPlane<T> {
    pub width: u32,
    pub height: u32,
    pub values: Vec<T>,
}

pub fn load_channel<T: From<u8>>(path: impl AsRef<Path>, channel: Channel) -> Result<ChannelPlane<T>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.display()))?;
    parse_channel(&map, channel).with_context(|| format!("decode {}", path.display()))
}

/// One decode path for every operator: the element width is whatever `T` the
/// caller's reduction needs. The buffer invariant (header plus exactly three
/// bytes per pixel) is checked once here; everything after is plain indexed
/// reads.
pub fn parse_channel<T: From<u8>>(buffer: &[u8], channel: Channel) -> Result<ChannelPlane<T>> {
    ensure!(buffer.len() > HEADER_SIZE, "truncated BMP: {} bytes", buffer.len());
    let width = i32::from_le_bytes([
        buffer[WIDTH_OFFSET],
        buffer[WIDTH_OFFSET + 1],
        buffer[WIDTH_OFFSET + 2],
        buffer[WIDTH_OFFSET + 3],
    ]);
    let height = i32::from_le_bytes([
        buffer[HEIGHT_OFFSET],
        buffer[HEIGHT_OFFSET + 1],
        buffer[HEIGHT_OFFSET + 2],
        buffer[HEIGHT_OFFSET + 3],
    ]);
    ensure!(width > 0 && height > 0, "bad BMP dimensions {}x{}", width, height);
    let plane_len = width as usize * height as usize;
    let expected = HEADER_SIZE + CHANNELS * plane_len;
    ensure!(
        buffer.len() == expected,
        "BMP is {} bytes, expected {} for {}x{} BGR pixels",
        buffer.len(),
        expected,
        width,
        height
    );
    let offset = channel.byte_offset();
    let values = (0..plane_len)
        .map(|px| T::from(buffer[HEADER_SIZE + px * CHANNELS + offset]))
        .collect();
    Ok(ChannelPlane { width: width as u32, height: height as u32, values })
}
