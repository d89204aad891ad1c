use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// The identity of a resource inside a package: the `(type, group,
/// instance)` triple. Immutable; equality and hashing use all three
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub type_id: u32,
    pub group: u32,
    pub instance: u64,
}

impl ResourceKey {
    pub fn new(type_id: u32, group: u32, instance: u64) -> ResourceKey {
        ResourceKey {
            type_id,
            group,
            instance,
        }
    }

    pub fn instance_high(&self) -> u32 {
        (self.instance >> 32) as u32
    }

    pub fn instance_low(&self) -> u32 {
        self.instance as u32
    }

    pub fn from_halves(type_id: u32, group: u32, high: u32, low: u32) -> ResourceKey {
        ResourceKey {
            type_id,
            group,
            instance: (high as u64) << 32 | low as u64,
        }
    }
}

/// Keys format as `T!G!I` hex, e.g. `0166038C!00000000!DEADBEEFCAFEBABE`.
impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}!{:08X}!{:016X}",
            self.type_id, self.group, self.instance
        )
    }
}

impl FromStr for ResourceKey {
    type Err = Error;

    fn from_str(text: &str) -> Result<ResourceKey> {
        let mut parts = text.split('!');
        let mut next = |field: &'static str| {
            parts
                .next()
                .ok_or(Error::invalid(field, 0u32, 0))
                .and_then(|part| {
                    u64::from_str_radix(part, 16).map_err(|_| Error::invalid(field, 0u32, 0))
                })
        };
        let type_id = next("key type")? as u32;
        let group = next("key group")? as u32;
        let instance = next("key instance")?;
        if parts.next().is_some() {
            return Err(Error::invalid("key", 0u32, 0));
        }
        Ok(ResourceKey::new(type_id, group, instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_round_trip() {
        let key = ResourceKey::new(0x0166_038C, 0x8000_0000, 0xDEAD_BEEF_CAFE_BABE);
        assert_eq!(key.to_string(), "0166038C!80000000!DEADBEEFCAFEBABE");
        assert_eq!(key.to_string().parse::<ResourceKey>().unwrap(), key);
    }

    #[test]
    fn halves_recompose() {
        let key = ResourceKey::from_halves(1, 2, 0xAABB_CCDD, 0x1122_3344);
        assert_eq!(key.instance, 0xAABB_CCDD_1122_3344);
        assert_eq!(key.instance_high(), 0xAABB_CCDD);
        assert_eq!(key.instance_low(), 0x1122_3344);
    }
}
