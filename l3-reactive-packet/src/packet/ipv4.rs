use super::Packet;
use bytes::BufMut;
use nom::bytes::complete::take;
use std::net::Ipv4Addr;

#[derive(Debug)]
pub struct Ipv4<'a, P> {
    version: u8,
    ihl: u8,
    dscp: u8,
    ecn: u8,
    total_len: u16,
    identification: u16,
    flags: u8,
    frag_offset: u16,
    ttl: u8,
    protocol: u8,
    hdr_checksum: u16,
    src: &'a [u8],
    dst: &'a [u8],
    options: &'a [u8],
    pub payload: P,
}

impl<'a, P> Ipv4<'a, P> {
    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.src[0], self.src[1], self.src[2], self.src[3])
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.dst[0], self.dst[1], self.dst[2], self.dst[3])
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Offset in 8-byte units; non-zero means the payload does not start
    /// with the transport header.
    pub fn frag_offset(&self) -> u16 {
        self.frag_offset
    }
}

impl<'a, P> Packet<'a> for Ipv4<'a, P>
where
    P: Packet<'a>,
{
    type Payload = P;

    fn self_bytes_hint(&self) -> usize {
        20 + self.options.len()
    }

    fn from_bytes(b: &'a [u8]) -> Option<Self> {
        let (b, version_ihl) = nom::number::complete::be_u8::<()>(b).ok()?;
        let version = (version_ihl & 0b11110000) >> 4;
        let ihl = version_ihl & 0b00001111;
        if version != 4 || ihl < 5 {
            return None;
        }
        let (b, dscp_ecn) = nom::number::complete::be_u8::<()>(b).ok()?;
        let dscp = (dscp_ecn & 0b11111100) >> 2;
        let ecn = dscp_ecn & 0b00000011;
        let (b, total_len) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, identification) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, flags_fragmentoffset) = nom::number::complete::be_u16::<()>(b).ok()?;
        let flags = ((flags_fragmentoffset & 0b1110_0000_0000_0000) >> 13) as u8;
        let frag_offset = flags_fragmentoffset & 0b0001_1111_1111_1111;
        let (b, ttl) = nom::number::complete::be_u8::<()>(b).ok()?;
        let (b, protocol) = nom::number::complete::be_u8::<()>(b).ok()?;
        let (b, hdr_checksum) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, src_ip) = take::<_, _, ()>(4u8)(b).ok()?;
        let (b, dst_ip) = take::<_, _, ()>(4u8)(b).ok()?;
        let options_len = (ihl as usize - 5) * 4;
        let (b, options) = take::<_, _, ()>(options_len)(b).ok()?;
        let payload = P::from_bytes(b)?;
        Some(Self {
            version,
            ihl,
            dscp,
            ecn,
            total_len,
            identification,
            flags,
            frag_offset,
            ttl,
            protocol,
            hdr_checksum,
            src: src_ip,
            dst: dst_ip,
            options,
            payload,
        })
    }

    fn write_self_to_buf<T: BufMut>(&self, buf: &mut T) {
        let version_ihl = (self.version << 4) + (self.ihl & 0b00001111);
        buf.put_u8(version_ihl);
        let dscp_ecn = (self.dscp << 2) + (self.ecn & 0b00000011);
        buf.put_u8(dscp_ecn);
        buf.put_u16(self.total_len);
        buf.put_u16(self.identification);
        let flags_fragmentoffset =
            ((self.flags as u16) << 13) + (self.frag_offset & 0b0001_1111_1111_1111);
        buf.put_u16(flags_fragmentoffset);
        buf.put_u8(self.ttl);
        buf.put_u8(self.protocol);
        buf.put_u16(self.hdr_checksum);
        buf.put_slice(self.src);
        buf.put_slice(self.dst);
        buf.put_slice(self.options);
    }

    fn get_payload(&self) -> Option<&Self::Payload> {
        Some(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x40, 0x69, 0x27, 0x40, 0x00, 0x40, 0x11, 0x4d, 0x0d, 0xc0, 0xa8, 0x01,
        0x2a, 0xc0, 0xa8, 0x01, 0xfe,
    ];

    #[test]
    fn parse_addresses() {
        let header = Ipv4::<()>::from_bytes(&HEADER).unwrap();
        assert_eq!(header.src_addr(), Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(header.dst_addr(), Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(header.protocol(), 17);
        assert_eq!(header.ttl(), 64);
        assert_eq!(header.frag_offset(), 0);
        assert_eq!(header.write_to_bytes().as_ref(), &HEADER[..]);
    }

    #[test]
    fn options_are_skipped() {
        let mut data = HEADER.to_vec();
        data[0] = 0x46;
        data.extend_from_slice(&[0x01, 0x01, 0x01, 0x00]);
        data.extend_from_slice(&[0xca, 0xfe]);
        let header = Ipv4::<&[u8]>::from_bytes(&data).unwrap();
        assert_eq!(header.payload, &[0xca, 0xfe][..]);
        assert_eq!(header.self_bytes_hint(), 24);
    }

    #[test]
    fn fragment_offset_is_exposed() {
        let mut data = HEADER;
        data[6] = 0x20;
        data[7] = 0xb9;
        let header = Ipv4::<()>::from_bytes(&data).unwrap();
        assert_eq!(header.frag_offset(), 185);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut data = HEADER;
        data[0] = 0x65;
        assert!(Ipv4::<()>::from_bytes(&data).is_none());
    }
}
