use super::NULL_OFFSET;

/// Growable little-endian writer used by the resource serializers.
///
/// Serializers that store relative offsets work in two phases: phase one
/// emits zero placeholders through [`ByteWriter::reserve_u32`] while
/// recording each slot's absolute position, phase two patches the slots
/// with [`ByteWriter::patch_offset`] once the targets are known.
#[derive(Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> ByteWriter {
        ByteWriter::default()
    }

    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16_be(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Emit a zero placeholder and return the slot position for later
    /// patching.
    pub fn reserve_u32(&mut self) -> usize {
        let slot = self.position();
        self.write_u32(0);
        slot
    }

    pub fn patch_u32(&mut self, slot: usize, value: u32) {
        self.data[slot..slot + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Patch a reserved slot with the offset of `target` relative to the
    /// slot itself, or with the null sentinel when there is no target.
    pub fn patch_offset(&mut self, slot: usize, target: Option<usize>) {
        let value = match target {
            Some(target) => (target as i64 - slot as i64) as u32,
            None => NULL_OFFSET,
        };
        self.patch_u32(slot, value);
    }

    /// Zero-pad to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        while self.data.len() % alignment != 0 {
            self.data.push(0);
        }
    }

    /// Write a NUL-terminated ASCII string.
    pub fn write_cstring(&mut self, text: &str) {
        self.data.extend(text.bytes());
        self.data.push(0);
    }

    /// Write UTF-16 code units in little-endian order, no prefix and no
    /// terminator.
    pub fn write_utf16(&mut self, text: &str) {
        for unit in text.encode_utf16() {
            self.write_u16(unit);
        }
    }

    /// Write a big-endian UTF-16 string prefixed with a u32 code-unit
    /// count. Only the CAS Part name field is stored this way.
    pub fn write_utf16_be(&mut self, text: &str) {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.write_u32(units.len() as u32);
        for unit in units {
            self.write_u16_be(unit);
        }
    }
}
