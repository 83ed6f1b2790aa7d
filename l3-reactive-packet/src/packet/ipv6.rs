use super::Packet;
use bytes::BufMut;
use nom::bytes::complete::take;
use std::convert::TryInto;
use std::net::Ipv6Addr;

#[derive(Debug)]
pub struct Ipv6<'a, P> {
    traffic_class: u8,
    flow_label: u32,
    payload_len: u16,
    next_header: u8,
    hop_limit: u8,
    src: &'a [u8],
    dst: &'a [u8],
    pub payload: P,
}

fn to_addr(b: &[u8]) -> Ipv6Addr {
    let octets: [u8; 16] = b.try_into().unwrap_or([0u8; 16]);
    Ipv6Addr::from(octets)
}

impl<'a, P> Ipv6<'a, P> {
    pub fn src_addr(&self) -> Ipv6Addr {
        to_addr(self.src)
    }

    pub fn dst_addr(&self) -> Ipv6Addr {
        to_addr(self.dst)
    }

    /// Extension headers are not walked, so this is the first next-header value.
    pub fn next_header(&self) -> u8 {
        self.next_header
    }
}

impl<'a, P> Packet<'a> for Ipv6<'a, P>
where
    P: Packet<'a>,
{
    type Payload = P;

    fn self_bytes_hint(&self) -> usize {
        40
    }

    fn from_bytes(b: &'a [u8]) -> Option<Self> {
        let (b, first) = nom::number::complete::be_u32::<()>(b).ok()?;
        if first >> 28 != 6 {
            return None;
        }
        let traffic_class = ((first >> 20) & 0xff) as u8;
        let flow_label = first & 0x000f_ffff;
        let (b, payload_len) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, next_header) = nom::number::complete::be_u8::<()>(b).ok()?;
        let (b, hop_limit) = nom::number::complete::be_u8::<()>(b).ok()?;
        let (b, src) = take::<_, _, ()>(16u8)(b).ok()?;
        let (b, dst) = take::<_, _, ()>(16u8)(b).ok()?;
        let payload = P::from_bytes(b)?;
        Some(Self {
            traffic_class,
            flow_label,
            payload_len,
            next_header,
            hop_limit,
            src,
            dst,
            payload,
        })
    }

    fn write_self_to_buf<T: BufMut>(&self, buf: &mut T) {
        let first = (6u32 << 28) | ((self.traffic_class as u32) << 20) | (self.flow_label & 0x000f_ffff);
        buf.put_u32(first);
        buf.put_u16(self.payload_len);
        buf.put_u8(self.next_header);
        buf.put_u8(self.hop_limit);
        buf.put_slice(self.src);
        buf.put_slice(self.dst);
    }

    fn get_payload(&self) -> Option<&Self::Payload> {
        Some(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(next_header: u8) -> Vec<u8> {
        let mut data = vec![0x60, 0x00, 0x00, 0x00, 0x00, 0x08, next_header, 0x40];
        data.extend_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
        data.extend_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());
        data
    }

    #[test]
    fn parse_addresses() {
        let data = header(17);
        let packet = Ipv6::<()>::from_bytes(&data).unwrap();
        assert_eq!(packet.src_addr(), "2001:db8::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(packet.dst_addr(), "2001:db8::2".parse::<Ipv6Addr>().unwrap());
        assert_eq!(packet.next_header(), 17);
        assert_eq!(packet.write_to_bytes().as_ref(), &data[..]);
    }

    #[test]
    fn ipv4_header_is_rejected() {
        let mut data = header(6);
        data[0] = 0x45;
        assert!(Ipv6::<()>::from_bytes(&data).is_none());
    }
}
