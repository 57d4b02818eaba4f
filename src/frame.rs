use crate::{
    core::{FrameIndex, Resolution},
    error::{ShotblastError, ShotblastResult},
};

/// One captured frame: straight-alpha RGBA8 pixels plus the frame index it was
/// captured at. Buffers are owned by exactly one pipeline stage at a time and
/// handed off by value between stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    pub index: FrameIndex,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new_filled(index: FrameIndex, resolution: Resolution, rgba: [u8; 4]) -> Self {
        let mut data = vec![0u8; resolution.pixel_count() * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self {
            index,
            width: resolution.width,
            height: resolution.height,
            data,
        }
    }

    pub fn from_rgba8(
        index: FrameIndex,
        resolution: Resolution,
        data: Vec<u8>,
    ) -> ShotblastResult<Self> {
        if data.len() != resolution.pixel_count() * 4 {
            return Err(ShotblastError::validation(format!(
                "frame buffer data length {} does not match {} rgba8 pixels",
                data.len(),
                resolution
            )));
        }
        Ok(Self {
            index,
            width: resolution.width,
            height: resolution.height,
            data,
        })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_buffer_has_uniform_pixels() {
        let res = Resolution::new(4, 3).unwrap();
        let f = FrameBuffer::new_filled(FrameIndex(1), res, [10, 20, 30, 255]);
        assert_eq!(f.data.len(), 4 * 3 * 4);
        assert_eq!(f.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(f.pixel(3, 2), Some([10, 20, 30, 255]));
        assert_eq!(f.pixel(4, 0), None);
    }

    #[test]
    fn from_rgba8_rejects_length_mismatch() {
        let res = Resolution::new(2, 2).unwrap();
        assert!(FrameBuffer::from_rgba8(FrameIndex(0), res, vec![0u8; 15]).is_err());
        assert!(FrameBuffer::from_rgba8(FrameIndex(0), res, vec![0u8; 16]).is_ok());
    }
}
