//! Video frame types

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::CameraError;

/// Clockwise rotation needed to bring the sensor image upright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Rotation in degrees
    pub fn degrees(&self) -> u16 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Map a rotation in degrees to an orientation, if it is a right angle
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Orientation::Deg0),
            90 => Some(Orientation::Deg90),
            180 => Some(Orientation::Deg180),
            270 => Some(Orientation::Deg270),
            _ => None,
        }
    }
}

/// RGB video frame as delivered by the cabin camera
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Monotonic arrival timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
    /// Orientation hint for the detector
    pub orientation: Orientation,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
        orientation: Orientation,
    ) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
            orientation,
        }
    }

    /// Arrival timestamp in milliseconds
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ns / 1_000_000
    }

    /// Rotate the payload so that the face is upright, following the orientation hint
    pub fn upright_image(&self) -> Result<RgbImage, CameraError> {
        let img = RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CameraError::Format(format!(
                "{} bytes do not form a {}x{} RGB image",
                self.data.len(),
                self.width,
                self.height
            ))
        })?;

        Ok(match self.orientation {
            Orientation::Deg0 => img,
            Orientation::Deg90 => imageops::rotate90(&img),
            Orientation::Deg180 => imageops::rotate180(&img),
            Orientation::Deg270 => imageops::rotate270(&img),
        })
    }
}
