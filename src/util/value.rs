use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

#[derive(Eq, Hash, PartialEq, PartialOrd, Ord, Clone, Copy)]
pub struct MAC(pub [u8; 6]);

impl MAC {
    pub fn broadcast() -> MAC {
        MAC([0xff; 6])
    }

    pub fn zero() -> MAC {
        MAC([0x00; 6])
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

impl From<[u8; 6]> for MAC {
    fn from(b: [u8; 6]) -> Self {
        MAC(b)
    }
}

impl FromStr for MAC {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vec = hex::decode(s.replace(':', ""))?;
        if vec.len() != 6 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&vec);
        Ok(MAC(mac))
    }
}

impl Debug for MAC {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl Display for MAC {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl Serialize for MAC {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MAC {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_print() {
        let mac: MAC = "aa:bb:cc:00:11:22".parse().unwrap();
        assert_eq!(mac, MAC([0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22]));
        assert_eq!(mac.to_string(), "aa:bb:cc:00:11:22");
        assert!(!mac.is_broadcast());
        assert!(MAC::broadcast().is_broadcast());
    }

    #[test]
    fn reject_bad_length() {
        assert!("aa:bb:cc".parse::<MAC>().is_err());
        assert!("zz:bb:cc:00:11:22".parse::<MAC>().is_err());
    }

    #[test]
    fn json_uses_string_form() {
        let mac: MAC = serde_json::from_str("\"00:00:00:00:00:01\"").unwrap();
        assert_eq!(mac, MAC([0, 0, 0, 0, 0, 1]));
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"00:00:00:00:00:01\"");
    }
}
