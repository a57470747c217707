//! The relay's only framed messages: the announce frame (server to client,
//! carrying the freshly assigned id) and the bind frame (client to server,
//! naming the intended peer). Both use the same fixed 12-byte layout - all
//! numbers in network byte order (BE):
//!
//! ```ascii
//! 0:  magic: 82 96 44 a1
//! 4:  payload length: u32, always 4
//! 8:  zid: u32
//! ```
//!
//! After a successful bind the connection carries an opaque byte stream and
//! no further framing applies.

use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};

use crate::zid::Zid;

pub const FRAME_MAGIC: [u8; 4] = [0x82, 0x96, 0x44, 0xa1];
pub const FRAME_LEN: usize = 12;

const PAYLOAD_LEN: u32 = 4;

/// A single announce / bind frame. The two directions share the layout; only
/// the meaning of the zid differs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Frame {
    pub zid: Zid,
}

impl Frame {
    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_slice(&FRAME_MAGIC);
        buf.put_u32(PAYLOAD_LEN);
        buf.put_u32(self.zid.0);
    }

    pub fn try_read(buf: &mut impl Buf) -> anyhow::Result<Frame> {
        let magic = buf.try_get_u32()?;
        if magic != u32::from_be_bytes(FRAME_MAGIC) {
            bail!("invalid frame magic: {:08x}", magic);
        }
        let payload_len = buf.try_get_u32()?;
        if payload_len != PAYLOAD_LEN {
            bail!("invalid payload length: {}", payload_len);
        }
        let zid = Zid(buf.try_get_u32()?);
        Ok(Frame { zid })
    }
}

/// Hex rendering of raw frame bytes for log output.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(0xdead_beef)]
    #[case(u32::MAX)]
    fn test_ser_try_read(#[case] raw: u32) {
        let original = Frame { zid: Zid(raw) };

        let mut buf = BytesMut::new();
        original.ser(&mut buf);
        assert_eq!(buf.len(), FRAME_LEN);

        let mut b: &[u8] = &buf;
        let deser = Frame::try_read(&mut b).unwrap();
        assert!(b.is_empty());
        assert_eq!(deser, original);
    }

    #[test]
    fn test_wire_layout() {
        let mut buf = BytesMut::new();
        Frame { zid: Zid(0xdead_beef) }.ser(&mut buf);

        assert_eq!(
            buf.as_ref(),
            &[0x82, 0x96, 0x44, 0xa1, 0, 0, 0, 4, 0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[rstest]
    #[case::bad_magic(&[0x82, 0x96, 0x44, 0xa2, 0, 0, 0, 4, 0, 0, 0, 1])]
    #[case::bad_payload_len(&[0x82, 0x96, 0x44, 0xa1, 0, 0, 0, 5, 0, 0, 0, 1])]
    #[case::truncated(&[0x82, 0x96, 0x44, 0xa1, 0, 0])]
    #[case::empty(&[])]
    fn test_try_read_rejects(#[case] raw: &[u8]) {
        let mut b: &[u8] = raw;
        assert!(Frame::try_read(&mut b).is_err());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x82, 0x96, 0x44, 0xa1]), "829644a1");
        assert_eq!(to_hex(&[]), "");
    }
}
