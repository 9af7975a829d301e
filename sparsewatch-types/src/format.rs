//! Memory layout tags for fetched activation tensors.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

/// Memory layout of a rank-4 activation tensor.
///
/// The layout decides which axes are spatial when a tensor is reduced to a
/// [`SpatialMask`](crate::SpatialMask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub enum DataFormat {
    /// Channel-last: `[batch, height, width, channels]`.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "NHWC"))]
    #[cfg_attr(feature = "minicbor", n(0))]
    Nhwc,

    /// Channel-first: `[batch, channels, height, width]`.
    #[cfg_attr(feature = "serde", serde(rename = "NCHW"))]
    #[cfg_attr(feature = "minicbor", n(1))]
    Nchw,
}

impl DataFormat {
    /// Axis indices of `(height, width)` in a rank-4 tensor.
    pub const fn spatial_axes(self) -> (usize, usize) {
        match self {
            DataFormat::Nhwc => (1, 2),
            DataFormat::Nchw => (2, 3),
        }
    }

    /// Axis index of the channel dimension in a rank-4 tensor.
    pub const fn channel_axis(self) -> usize {
        match self {
            DataFormat::Nhwc => 3,
            DataFormat::Nchw => 1,
        }
    }

    /// The canonical tag, e.g. `"NHWC"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            DataFormat::Nhwc => "NHWC",
            DataFormat::Nchw => "NCHW",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a layout tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDataFormatError(String);

impl fmt::Display for ParseDataFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown data format '{}' (expected NHWC or NCHW)", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseDataFormatError {}

impl FromStr for DataFormat {
    type Err = ParseDataFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("nhwc") || s.eq_ignore_ascii_case("channels_last") {
            Ok(DataFormat::Nhwc)
        } else if s.eq_ignore_ascii_case("nchw") || s.eq_ignore_ascii_case("channels_first") {
            Ok(DataFormat::Nchw)
        } else {
            Err(ParseDataFormatError(s.to_string()))
        }
    }
}
