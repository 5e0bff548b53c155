/// Storage classes of embedded-SQL host variables.
///
/// The numeric codes are written by the code generator into the translated
/// program and travel back to the runtime inside every parameter descriptor,
/// so they are part of the call contract and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CobolVarType {
    /// PIC 9(n), USAGE DISPLAY
    UnsignedNumber = 1,
    /// PIC S9(n), sign overpunched on the trailing digit
    SignedNumberTc = 2,
    /// PIC S9(n) SIGN TRAILING SEPARATE
    SignedNumberTs = 3,
    /// PIC S9(n) SIGN LEADING, overpunched on the leading digit
    SignedNumberLc = 4,
    /// PIC S9(n) SIGN LEADING SEPARATE
    SignedNumberLs = 5,
    /// PIC 9(n) COMP-3
    UnsignedNumberPd = 6,
    /// PIC S9(n) COMP-3
    SignedNumberPd = 7,
    /// PIC 9(n) COMP / COMP-5 / BINARY
    UnsignedBinary = 8,
    /// PIC S9(n) COMP / COMP-5 / BINARY
    SignedBinary = 9,
    /// PIC X(n)
    Alphanumeric = 10,
    /// PIC N(n)
    Japanese = 11,
}

impl CobolVarType {
    pub fn from_code(code: u16) -> Option<CobolVarType> {
        match code {
            1 => Some(CobolVarType::UnsignedNumber),
            2 => Some(CobolVarType::SignedNumberTc),
            3 => Some(CobolVarType::SignedNumberTs),
            4 => Some(CobolVarType::SignedNumberLc),
            5 => Some(CobolVarType::SignedNumberLs),
            6 => Some(CobolVarType::UnsignedNumberPd),
            7 => Some(CobolVarType::SignedNumberPd),
            8 => Some(CobolVarType::UnsignedBinary),
            9 => Some(CobolVarType::SignedBinary),
            10 => Some(CobolVarType::Alphanumeric),
            11 => Some(CobolVarType::Japanese),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, CobolVarType::Alphanumeric | CobolVarType::Japanese)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            CobolVarType::SignedNumberTc
                | CobolVarType::SignedNumberTs
                | CobolVarType::SignedNumberLc
                | CobolVarType::SignedNumberLs
                | CobolVarType::SignedNumberPd
                | CobolVarType::SignedBinary
        )
    }

    /// Display numerics store one ASCII digit per byte.
    pub fn is_display_numeric(self) -> bool {
        matches!(
            self,
            CobolVarType::UnsignedNumber
                | CobolVarType::SignedNumberTc
                | CobolVarType::SignedNumberTs
                | CobolVarType::SignedNumberLc
                | CobolVarType::SignedNumberLs
        )
    }
}

/// Flag word bits carried in every generated parameter descriptor.
pub const FLAG_NONE: u32 = 0x00;
/// The payload is raw bytes and binds in binary format (BYTEA).
pub const FLAG_BINARY: u32 = 0x01;
/// The storage starts with a length-prefix counter subfield.
pub const FLAG_VARLEN: u32 = 0x02;
/// A null indicator variable is attached to the host variable.
pub const FLAG_NULLIND: u32 = 0x04;
/// Trailing spaces are stripped before binding (PIC X treated as VARCHAR).
pub const FLAG_AUTOTRIM: u32 = 0x08;

/// Length sentinel: a parameter whose length equals this binds as SQL NULL.
pub const DB_NULL: i32 = -1;

/// Width of the native-endian length counter in front of a varlen payload.
pub const VARLEN_PREFIX_SZ: usize = 4;

/// PIC X fields longer than this become varlen when `picx_as_varchar` is on.
pub const VARLEN_PICX_THRESHOLD: u32 = 255;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for code in 1..=11u16 {
            let t = CobolVarType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert!(CobolVarType::from_code(0).is_none());
        assert!(CobolVarType::from_code(12).is_none());
    }

    #[test]
    fn test_classification() {
        assert!(CobolVarType::SignedNumberPd.is_numeric());
        assert!(CobolVarType::SignedNumberPd.is_signed());
        assert!(!CobolVarType::UnsignedBinary.is_signed());
        assert!(!CobolVarType::Alphanumeric.is_numeric());
        assert!(CobolVarType::SignedNumberLc.is_display_numeric());
        assert!(!CobolVarType::SignedBinary.is_display_numeric());
    }
}
