use crate::binary::{ByteReader, ByteWriter};
use crate::{ResourceKey, Result};

/// One entry of an embedded TGI block list. The wire order of the three
/// fields varies by resource format, so readers and writers are
/// parameterized over [`TgiOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TgiBlock {
    pub type_id: u32,
    pub group: u32,
    pub instance: u64,
}

/// Field order of a serialized TGI block.
///
/// Sim Outfit stores its trailing list as instance, group, type instead of
/// the conventional type, group, instance. The quirk is part of the format
/// and is preserved on both read and write; do not "correct" it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TgiOrder {
    /// type, group, instance
    Tgi,
    /// instance, group, type
    Igt,
}

impl TgiBlock {
    pub fn new(type_id: u32, group: u32, instance: u64) -> TgiBlock {
        TgiBlock {
            type_id,
            group,
            instance,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.type_id, self.group, self.instance)
    }

    pub fn read(reader: &mut ByteReader<'_>, order: TgiOrder) -> Result<TgiBlock> {
        Ok(match order {
            TgiOrder::Tgi => {
                let type_id = reader.read_u32()?;
                let group = reader.read_u32()?;
                let instance = reader.read_u64()?;
                TgiBlock::new(type_id, group, instance)
            }
            TgiOrder::Igt => {
                let instance = reader.read_u64()?;
                let group = reader.read_u32()?;
                let type_id = reader.read_u32()?;
                TgiBlock::new(type_id, group, instance)
            }
        })
    }

    pub fn write(&self, writer: &mut ByteWriter, order: TgiOrder) {
        match order {
            TgiOrder::Tgi => {
                writer.write_u32(self.type_id);
                writer.write_u32(self.group);
                writer.write_u64(self.instance);
            }
            TgiOrder::Igt => {
                writer.write_u64(self.instance);
                writer.write_u32(self.group);
                writer.write_u32(self.type_id);
            }
        }
    }
}

/// Read `count` blocks in the given order.
pub fn read_tgi_list(
    reader: &mut ByteReader<'_>,
    count: usize,
    order: TgiOrder,
) -> Result<Vec<TgiBlock>> {
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        blocks.push(TgiBlock::read(reader, order)?);
    }
    Ok(blocks)
}

pub fn write_tgi_list(writer: &mut ByteWriter, blocks: &[TgiBlock], order: TgiOrder) {
    for block in blocks {
        block.write(writer, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_round_trip() {
        let block = TgiBlock::new(0x034A_EECB, 0x2, 0x1122_3344_5566_7788);
        for order in [TgiOrder::Tgi, TgiOrder::Igt] {
            let mut writer = ByteWriter::new();
            block.write(&mut writer, order);
            let bytes = writer.into_bytes();
            assert_eq!(bytes.len(), 16);
            let mut reader = ByteReader::new(&bytes);
            assert_eq!(TgiBlock::read(&mut reader, order).unwrap(), block);
        }
    }

    #[test]
    fn igt_puts_instance_first_type_last() {
        let block = TgiBlock::new(0xAABBCCDD, 0x11223344, 0x0102030405060708);
        let mut writer = ByteWriter::new();
        block.write(&mut writer, TgiOrder::Igt);
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[0..8], &0x0102030405060708u64.to_le_bytes());
        assert_eq!(&bytes[12..16], &0xAABBCCDDu32.to_le_bytes());
    }
}
