use super::Packet;
use bytes::BufMut;

#[derive(Debug)]
pub struct Udp<P> {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
    pub payload: P,
}

impl<'a, P> Packet<'a> for Udp<P>
where
    P: Packet<'a>,
{
    type Payload = P;

    fn self_bytes_hint(&self) -> usize {
        8
    }

    fn from_bytes(b: &'a [u8]) -> Option<Self> {
        let (b, src_port) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, dst_port) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, length) = nom::number::complete::be_u16::<()>(b).ok()?;
        let (b, checksum) = nom::number::complete::be_u16::<()>(b).ok()?;
        let payload = P::from_bytes(b)?;
        Some(Udp {
            src_port,
            dst_port,
            length,
            checksum,
            payload,
        })
    }

    fn write_self_to_buf<T: BufMut>(&self, buf: &mut T) {
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u16(self.length);
        buf.put_u16(self.checksum);
    }

    fn get_payload(&self) -> Option<&Self::Payload> {
        Some(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_gtpu_ports() {
        let data = [0x08, 0x68, 0x08, 0x68, 0x00, 0x0a, 0x00, 0x00, 0x30, 0xff];
        let udp = Udp::<&[u8]>::from_bytes(&data).unwrap();
        assert_eq!(udp.src_port, 2152);
        assert_eq!(udp.dst_port, 2152);
        assert_eq!(udp.payload, &[0x30, 0xff][..]);
    }

    #[test]
    fn short_header_is_rejected() {
        assert!(Udp::<()>::from_bytes(&[0x08, 0x68, 0x08]).is_none());
    }
}
