use std::fmt::{Display, Formatter};

use crate::stage::PictureInfo;

/// A decoded video picture: pixel planes, line strides and dimensions.
///
/// The decoder keeps one of these and overwrites it on every receive, so a
/// `&mut DecodedPicture` handed out by the decoder is only good until the
/// next receive call.
pub struct DecodedPicture {
    frame: ffmpeg_next::frame::Video,
}

impl DecodedPicture {
    pub fn empty() -> Self {
        Self {
            frame: ffmpeg_next::frame::Video::empty(),
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn format(&self) -> ffmpeg_next::format::Pixel {
        self.frame.format()
    }

    pub fn pts(&self) -> Option<i64> {
        self.frame.pts()
    }

    pub fn planes(&self) -> usize {
        self.frame.planes()
    }

    /// Bytes per line of `plane`, padding included.
    pub fn stride(&self, plane: usize) -> usize {
        if plane < self.frame.planes() {
            self.frame.stride(plane)
        } else {
            0
        }
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        self.frame.data(index)
    }

    pub fn is_key(&self) -> bool {
        self.frame.is_key()
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::frame::Video {
        &mut self.frame
    }

}

impl From<ffmpeg_next::frame::Video> for DecodedPicture {
    fn from(frame: ffmpeg_next::frame::Video) -> Self {
        Self { frame }
    }
}

impl PictureInfo for DecodedPicture {
    fn width(&self) -> u32 {
        DecodedPicture::width(self)
    }

    fn height(&self) -> u32 {
        DecodedPicture::height(self)
    }

    fn stride(&self, plane: usize) -> usize {
        DecodedPicture::stride(self, plane)
    }
}

impl Display for DecodedPicture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodedPicture {}x{}, format: {:?}, stride: {}, pts: {:?}, is_key: {}",
            self.width(),
            self.height(),
            self.format(),
            self.stride(0),
            self.pts(),
            self.is_key()
        )
    }
}
