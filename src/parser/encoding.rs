//! Binary encoding primitives for WebAssembly modules.
//!
//! Holds the byte constants of the binary format and the LEB128 integer codec.
//! The codec works over closures and `Vec<u8>` so that both the forward
//! [`Buffer`](super::buffer::Buffer) and the reversed operand
//! [`Stack`](crate::runtime::stack::Stack) can share it.

use super::error::DecodeError;

// ---------------------------------------------------------------------------
// Preamble
// ---------------------------------------------------------------------------

pub const MAGIC: [u8; 4] = *b"\0asm";
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

// ---------------------------------------------------------------------------
// Section ids
// ---------------------------------------------------------------------------

pub const SECTION_CUSTOM: u8 = 0;
pub const SECTION_TYPE: u8 = 1;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_FUNCTION: u8 = 3;
pub const SECTION_TABLE: u8 = 4;
pub const SECTION_MEMORY: u8 = 5;
pub const SECTION_GLOBAL: u8 = 6;
pub const SECTION_EXPORT: u8 = 7;
pub const SECTION_START: u8 = 8;
pub const SECTION_ELEMENT: u8 = 9;
pub const SECTION_CODE: u8 = 10;
pub const SECTION_DATA: u8 = 11;
pub const SECTION_DATA_COUNT: u8 = 12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const TYPE_FUNC: u8 = 0x60;

pub const VALTYPE_I32: u8 = 0x7f;
pub const VALTYPE_I64: u8 = 0x7e;
pub const VALTYPE_F32: u8 = 0x7d;
pub const VALTYPE_F64: u8 = 0x7c;

pub const REFTYPE_FUNCREF: u8 = 0x70;
pub const REFTYPE_EXTERNREF: u8 = 0x6f;

pub const LIMITS_MIN: u8 = 0x00;
pub const LIMITS_MIN_MAX: u8 = 0x01;

pub const MUT_CONST: u8 = 0x00;
pub const MUT_VAR: u8 = 0x01;

// Import/export descriptor kinds
pub const DESC_FUNC: u8 = 0x00;
pub const DESC_TABLE: u8 = 0x01;
pub const DESC_MEMORY: u8 = 0x02;
pub const DESC_GLOBAL: u8 = 0x03;

// Element segment flags.
// bit 0 = non-active, bit 1 = explicit table (or declarative), bit 2 = expressions
pub const ELEMKIND_FUNCREF: u8 = 0x00;
pub const ELEM_ACTIVE_FUNCS: u32 = 0;
pub const ELEM_PASSIVE_FUNCS: u32 = 1;
pub const ELEM_ACTIVE_TABLE_FUNCS: u32 = 2;
pub const ELEM_DECLARATIVE_FUNCS: u32 = 3;
pub const ELEM_ACTIVE_EXPRS: u32 = 4;
pub const ELEM_PASSIVE_EXPRS: u32 = 5;
pub const ELEM_ACTIVE_TABLE_EXPRS: u32 = 6;
pub const ELEM_DECLARATIVE_EXPRS: u32 = 7;

// Data segment flags
pub const DATA_ACTIVE: u32 = 0;
pub const DATA_PASSIVE: u32 = 1;
pub const DATA_ACTIVE_EXPLICIT: u32 = 2;

pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

/// Deepest `block`/`loop`/`if` nesting accepted by the decoder.
pub const MAX_NESTING_DEPTH: usize = 256;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_UNREACHABLE: u8 = 0x00;
pub const OP_NOP: u8 = 0x01;
pub const OP_BLOCK: u8 = 0x02;
pub const OP_LOOP: u8 = 0x03;
pub const OP_IF: u8 = 0x04;
pub const OP_ELSE: u8 = 0x05;
pub const OP_END: u8 = 0x0b;
pub const OP_BR: u8 = 0x0c;
pub const OP_BR_IF: u8 = 0x0d;
pub const OP_BR_TABLE: u8 = 0x0e;
pub const OP_RETURN: u8 = 0x0f;
pub const OP_CALL: u8 = 0x10;
pub const OP_CALL_INDIRECT: u8 = 0x11;
pub const OP_LOCAL_GET: u8 = 0x20;
pub const OP_LOCAL_SET: u8 = 0x21;
pub const OP_LOCAL_TEE: u8 = 0x22;
pub const OP_GLOBAL_GET: u8 = 0x23;
pub const OP_GLOBAL_SET: u8 = 0x24;
pub const OP_I32_LOAD: u8 = 0x28;
pub const OP_I32_STORE: u8 = 0x36;
pub const OP_I32_CONST: u8 = 0x41;
pub const OP_I32_EQZ: u8 = 0x45;
pub const OP_I32_LT_S: u8 = 0x48;
pub const OP_I32_GE_S: u8 = 0x4e;
pub const OP_I32_GE_U: u8 = 0x4f;
pub const OP_I32_ADD: u8 = 0x6a;
pub const OP_I32_REM_S: u8 = 0x6f;

// ---------------------------------------------------------------------------
// Unsigned LEB128
// ---------------------------------------------------------------------------

/// Decodes an unsigned LEB128 u32, pulling bytes from `next`.
///
/// `next` returns `None` once the source is exhausted, which is reported as
/// [`DecodeError::UnexpectedEof`] rather than looping on a sentinel.
pub fn read_vu32<F>(next: &mut F) -> Result<u32, DecodeError>
where
    F: FnMut() -> Option<u8>,
{
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = next().ok_or(DecodeError::UnexpectedEof)?;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 35 {
            return Err(DecodeError::IntegerOverflow);
        }
    }
    u32::try_from(result).map_err(|_| DecodeError::IntegerOverflow)
}

/// Appends the unsigned LEB128 encoding of `value` to `buf`.
pub fn write_vu32(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

// ---------------------------------------------------------------------------
// Signed LEB128
// ---------------------------------------------------------------------------

/// Decodes a signed LEB128 i32, pulling bytes from `next`.
///
/// The value is sign-extended from the terminating byte's bit 6 when fewer
/// than 32 bits have been consumed.
pub fn read_vs32<F>(next: &mut F) -> Result<i32, DecodeError>
where
    F: FnMut() -> Option<u8>,
{
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = next().ok_or(DecodeError::UnexpectedEof)?;
        result |= ((byte & 0x7f) as i64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 32 && byte & 0x40 != 0 {
                result |= !0i64 << shift;
            }
            break;
        }
        if shift >= 35 {
            return Err(DecodeError::IntegerOverflow);
        }
    }
    // a fifth byte carries the top 4 bits; truncation keeps the two's complement
    Ok(result as i32)
}

/// Appends the signed LEB128 encoding of `value` to `buf`.
pub fn write_vs32(buf: &mut Vec<u8>, mut value: i32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn encode_vu32(v: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vu32(&mut buf, v);
        buf
    }

    fn encode_vs32(v: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vs32(&mut buf, v);
        buf
    }

    fn decode_vu32(bytes: &[u8]) -> Result<u32, DecodeError> {
        let mut iter = bytes.iter().copied();
        read_vu32(&mut || iter.next())
    }

    fn decode_vs32(bytes: &[u8]) -> Result<i32, DecodeError> {
        let mut iter = bytes.iter().copied();
        read_vs32(&mut || iter.next())
    }

    #[test]
    fn test_write_vu32() {
        assert_eq!(encode_vu32(0), vec![0x00]);
        assert_eq!(encode_vu32(1), vec![0x01]);
        assert_eq!(encode_vu32(127), vec![0x7f]);
        assert_eq!(encode_vu32(128), vec![0x80, 0x01]);
        assert_eq!(encode_vu32(624485), vec![0xe5, 0x8e, 0x26]);
        assert_eq!(encode_vu32(u32::MAX), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn test_write_vs32() {
        assert_eq!(encode_vs32(0), vec![0x00]);
        assert_eq!(encode_vs32(-1), vec![0x7f]);
        assert_eq!(encode_vs32(63), vec![0x3f]);
        assert_eq!(encode_vs32(64), vec![0xc0, 0x00]);
        assert_eq!(encode_vs32(-64), vec![0x40]);
        assert_eq!(encode_vs32(-123456), vec![0xc0, 0xbb, 0x78]);
        assert_eq!(encode_vs32(i32::MAX), vec![0xff, 0xff, 0xff, 0xff, 0x07]);
        assert_eq!(encode_vs32(i32::MIN), vec![0x80, 0x80, 0x80, 0x80, 0x78]);
    }

    #[test]
    fn test_read_vu32() {
        assert_eq!(decode_vu32(&[0x00]).unwrap(), 0);
        assert_eq!(decode_vu32(&[0xe5, 0x8e, 0x26]).unwrap(), 624485);
        assert_eq!(decode_vu32(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap(), u32::MAX);
        // non-minimal encodings are accepted
        assert_eq!(decode_vu32(&[0x80, 0x00]).unwrap(), 0);
    }

    #[test]
    fn test_read_vs32() {
        assert_eq!(decode_vs32(&[0x7f]).unwrap(), -1);
        assert_eq!(decode_vs32(&[0x40]).unwrap(), -64);
        assert_eq!(decode_vs32(&[0xc0, 0xbb, 0x78]).unwrap(), -123456);
        assert_eq!(decode_vs32(&[0x80, 0x80, 0x80, 0x80, 0x78]).unwrap(), i32::MIN);
        assert_eq!(decode_vs32(&[0xff, 0xff, 0xff, 0xff, 0x07]).unwrap(), i32::MAX);
    }

    #[test]
    fn test_truncated_leb() {
        assert!(matches!(decode_vu32(&[0x80, 0x80]), Err(DecodeError::UnexpectedEof)));
        assert!(matches!(decode_vs32(&[0xff]), Err(DecodeError::UnexpectedEof)));
        assert!(matches!(decode_vu32(&[]), Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn test_overlong_leb() {
        assert!(matches!(
            decode_vu32(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]),
            Err(DecodeError::IntegerOverflow)
        ));
        assert!(matches!(
            decode_vu32(&[0xff, 0xff, 0xff, 0xff, 0x1f]),
            Err(DecodeError::IntegerOverflow)
        ));
    }

    #[test]
    fn test_vu32_round_trip_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let v: u32 = rng.gen();
            assert_eq!(decode_vu32(&encode_vu32(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_vs32_round_trip_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let v: i32 = rng.gen();
            assert_eq!(decode_vs32(&encode_vs32(v)).unwrap(), v);
        }
    }
}
