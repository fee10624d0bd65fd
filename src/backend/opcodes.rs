//! The source instruction set, as laid out in CODE lumps by the frontend.
//!
//! Each instruction is one base opcode byte. `LdConst` is followed by a
//! secondary type-tag byte selecting the constant's width; other opcodes
//! take fixed-width little-endian immediates. There are no backward
//! jumps in this instruction set, so a single forward cursor is enough
//! to decode a whole body.

use crate::errors::CompileError;

/// Base operations of the source bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    Illegal = 0x01,
    Invalid = 0x02,
    /// Followed by a [`TypeTag`] byte, then the constant payload.
    LdConst = 0x03,
    /// Pushes a 32-bit struct-type id onto the type declaration stack.
    LdType = 0x04,
    /// Pushes an 8-bit primitive type tag onto the type declaration stack.
    LdPType = 0x05,
    /// 16-bit local slot index.
    LdLocal = 0x06,
    /// 16-bit local slot index.
    SetLocal = 0x07,
    /// Two 16-bit counts: struct count, then primitive count.
    EnterFrame = 0x08,
    LeaveFrame = 0x09,
    /// 32-bit image-wide directory index of the call target.
    Call = 0x0A,
    Ret = 0x0B,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        match byte {
            0x00 => Some(Opcode::Nop),
            0x01 => Some(Opcode::Illegal),
            0x02 => Some(Opcode::Invalid),
            0x03 => Some(Opcode::LdConst),
            0x04 => Some(Opcode::LdType),
            0x05 => Some(Opcode::LdPType),
            0x06 => Some(Opcode::LdLocal),
            0x07 => Some(Opcode::SetLocal),
            0x08 => Some(Opcode::EnterFrame),
            0x09 => Some(Opcode::LeaveFrame),
            0x0A => Some(Opcode::Call),
            0x0B => Some(Opcode::Ret),
            _ => None,
        }
    }
}

/// Type tags used both as `LdConst` secondary tags and as the payload of
/// `LdPType` declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Void = 0,
    Null = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    I128 = 6,
    U8 = 7,
    U16 = 8,
    U32 = 9,
    U64 = 10,
    U128 = 11,
    F32 = 12,
    F64 = 13,
    Bool = 14,
    Char = 15,
    Str = 16,
    Arr = 17,
    Struct = 18,
}

impl TypeTag {
    pub fn from_byte(byte: u8) -> Option<TypeTag> {
        match byte {
            0 => Some(TypeTag::Void),
            1 => Some(TypeTag::Null),
            2 => Some(TypeTag::I8),
            3 => Some(TypeTag::I16),
            4 => Some(TypeTag::I32),
            5 => Some(TypeTag::I64),
            6 => Some(TypeTag::I128),
            7 => Some(TypeTag::U8),
            8 => Some(TypeTag::U16),
            9 => Some(TypeTag::U32),
            10 => Some(TypeTag::U64),
            11 => Some(TypeTag::U128),
            12 => Some(TypeTag::F32),
            13 => Some(TypeTag::F64),
            14 => Some(TypeTag::Bool),
            15 => Some(TypeTag::Char),
            16 => Some(TypeTag::Str),
            17 => Some(TypeTag::Arr),
            18 => Some(TypeTag::Struct),
            _ => None,
        }
    }
}

/// Forward cursor over one CODE lump.
///
/// Multi-byte immediates are little-endian. Running off the end of the
/// lump mid-instruction means the frontend truncated the stream.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> ByteReader<'a> {
        ByteReader { bytes, pos: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CompileError> {
        let end = self.pos.checked_add(count).filter(|e| *e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(CompileError::malformed(format!(
                "bytecode stream ended mid-instruction at offset {} (wanted {} more bytes)",
                self.pos, count
            ))),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, CompileError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CompileError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, CompileError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, CompileError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, CompileError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, CompileError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i64(&mut self) -> Result<i64, CompileError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_round_trip() {
        for byte in 0x00..=0x0B {
            let op = Opcode::from_byte(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(Opcode::from_byte(0x0C), None);
        assert_eq!(Opcode::from_byte(0xFF), None);
    }

    #[test]
    fn type_tag_bytes_round_trip() {
        for byte in 0..=18 {
            let tag = TypeTag::from_byte(byte).unwrap();
            assert_eq!(tag as u8, byte);
        }
        assert_eq!(TypeTag::from_byte(19), None);
    }

    #[test]
    fn reader_decodes_little_endian_immediates() {
        let mut r = ByteReader::new(&[0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFF]);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0x12345678);
        assert_eq!(r.read_i8().unwrap(), -1);
        assert!(r.is_at_end());
    }

    #[test]
    fn truncated_stream_is_malformed() {
        let mut r = ByteReader::new(&[0x01]);
        let err = r.read_u32().unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::MalformedImage);
    }
}
