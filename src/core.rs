use crate::error::{ShotblastError, ShotblastResult};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub i64);

/// Inclusive frame range `[start, end]`, matching host animation ranges where
/// both endpoints are playable frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex,
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> ShotblastResult<Self> {
        if start.0 > end.0 {
            return Err(ShotblastError::validation(format!(
                "frame range start ({}) must be <= end ({})",
                start.0, end.0
            )));
        }
        Ok(Self { start, end })
    }

    pub fn len_frames(self) -> u64 {
        (self.end.0 - self.start.0) as u64 + 1
    }

    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 <= self.end.0
    }

    pub fn iter(self) -> impl Iterator<Item = FrameIndex> {
        (self.start.0..=self.end.0).map(FrameIndex)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> ShotblastResult<Self> {
        let res = Self { width, height };
        res.validate()?;
        Ok(res)
    }

    pub fn validate(self) -> ShotblastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ShotblastError::validation(
                "resolution width/height must be > 0",
            ));
        }
        Ok(())
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let r = FrameRange::new(FrameIndex(10), FrameIndex(12)).unwrap();
        assert_eq!(r.len_frames(), 3);
        assert!(r.contains(FrameIndex(10)));
        assert!(r.contains(FrameIndex(12)));
        assert!(!r.contains(FrameIndex(13)));
        let frames: Vec<i64> = r.iter().map(|f| f.0).collect();
        assert_eq!(frames, vec![10, 11, 12]);
    }

    #[test]
    fn range_rejects_start_after_end() {
        assert!(FrameRange::new(FrameIndex(10), FrameIndex(5)).is_err());
    }

    #[test]
    fn single_frame_range_is_valid() {
        let r = FrameRange::new(FrameIndex(4), FrameIndex(4)).unwrap();
        assert_eq!(r.len_frames(), 1);
    }

    #[test]
    fn resolution_rejects_zero_dimension() {
        assert!(Resolution::new(0, 1080).is_err());
        assert!(Resolution::new(1920, 0).is_err());
        assert!(Resolution::new(1920, 1080).is_ok());
    }
}
