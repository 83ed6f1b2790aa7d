use super::{Packet, ETHERNET_TYPE_VLAN};
use bytes::BufMut;
use nom::bytes::complete::take;
use std::fmt::{Debug, Formatter};

pub struct Ethernet<'a, P> {
    pub dst: &'a [u8],
    pub src: &'a [u8],
    /// 802.1Q tag control information, when the frame is tagged.
    pub vlan_tci: Option<u16>,
    /// Inner ether type for tagged frames.
    pub ether_type: u16,
    pub payload: P,
}

impl<'a, P> Ethernet<'a, P> {
    pub fn get_dst_mac(&self) -> [u8; 6] {
        to_mac(self.dst)
    }

    pub fn get_src_mac(&self) -> [u8; 6] {
        to_mac(self.src)
    }

    pub fn vlan_id(&self) -> Option<u16> {
        self.vlan_tci.map(|tci| tci & 0x0fff)
    }
}

fn to_mac(b: &[u8]) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&b[..6]);
    mac
}

impl<'a, P> Debug for Ethernet<'a, P> {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "src: {:02x?}, dst: {:02x?}, vlan: {:?}, type: {:#06x}",
            self.src,
            self.dst,
            self.vlan_id(),
            self.ether_type
        )
    }
}

impl<'a, P> Packet<'a> for Ethernet<'a, P>
where
    P: Packet<'a>,
{
    type Payload = P;

    fn self_bytes_hint(&self) -> usize {
        if self.vlan_tci.is_some() {
            18
        } else {
            14
        }
    }

    fn from_bytes(b: &'a [u8]) -> Option<Self> {
        let (b, dst) = take::<_, _, ()>(6u8)(b).ok()?;
        let (b, src) = take::<_, _, ()>(6u8)(b).ok()?;
        let (mut b, mut ether_type) = nom::number::complete::be_u16::<()>(b).ok()?;
        let mut vlan_tci = None;
        if ether_type == ETHERNET_TYPE_VLAN {
            let (rest, tci) = nom::number::complete::be_u16::<()>(b).ok()?;
            let (rest, inner) = nom::number::complete::be_u16::<()>(rest).ok()?;
            vlan_tci = Some(tci);
            ether_type = inner;
            b = rest;
        }
        let payload = P::from_bytes(b)?;
        Some(Ethernet {
            dst,
            src,
            vlan_tci,
            ether_type,
            payload,
        })
    }

    fn write_self_to_buf<T: BufMut>(&self, buf: &mut T) {
        buf.put_slice(self.dst);
        buf.put_slice(self.src);
        if let Some(tci) = self.vlan_tci {
            buf.put_u16(ETHERNET_TYPE_VLAN);
            buf.put_u16(tci);
        }
        buf.put_u16(self.ether_type);
    }

    fn get_payload(&self) -> Option<&Self::Payload> {
        Some(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_and_keep_payload() {
        let frame = [
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00,
            0xde, 0xad,
        ];
        let eth = Ethernet::<&[u8]>::from_bytes(&frame).unwrap();
        assert_eq!(eth.get_dst_mac(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(eth.get_src_mac(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(eth.ether_type, 0x800);
        assert_eq!(eth.vlan_id(), None);
        assert_eq!(eth.payload, &[0xde, 0xad][..]);
        assert_eq!(eth.write_to_bytes().as_ref(), &frame[..]);
    }

    #[test]
    fn vlan_tag_is_skipped() {
        let frame = [
            0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x81, 0x00,
            0x20, 0x0a, 0x08, 0x00, 0xde, 0xad,
        ];
        let eth = Ethernet::<&[u8]>::from_bytes(&frame).unwrap();
        assert_eq!(eth.ether_type, 0x800);
        assert_eq!(eth.vlan_id(), Some(10));
        assert_eq!(eth.payload, &[0xde, 0xad][..]);
        assert_eq!(eth.self_bytes_hint(), 18);
        assert_eq!(eth.write_to_bytes().as_ref(), &frame[..]);

        assert!(Ethernet::<&[u8]>::from_bytes(&frame[..16]).is_none());
    }

    #[test]
    fn truncated_header_is_rejected() {
        let frame = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x11];
        assert!(Ethernet::<&[u8]>::from_bytes(&frame).is_none());
    }
}
