use bytes::Bytes;

/// Borrowed view of the packet an encoder just produced.
///
/// The view holds a borrow of the encoder, so the encoder cannot be asked for
/// the next packet until this one is dropped. Dropping it is the release.
#[derive(Debug, Clone, Copy)]
pub struct EncodedPacket<'a> {
    data: &'a [u8],
    pts: Option<i64>,
    dts: Option<i64>,
    is_key: bool,
}

impl<'a> EncodedPacket<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pts: None,
            dts: None,
            is_key: false,
        }
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn dts(&self) -> Option<i64> {
        self.dts
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    /// Copies the payload out so it can outlive the view.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data)
    }
}

impl<'a> From<&'a ffmpeg_next::codec::packet::Packet> for EncodedPacket<'a> {
    fn from(packet: &'a ffmpeg_next::codec::packet::Packet) -> Self {
        Self {
            data: packet.data().unwrap_or_default(),
            pts: packet.pts(),
            dts: packet.dts(),
            is_key: packet.is_key(),
        }
    }
}
