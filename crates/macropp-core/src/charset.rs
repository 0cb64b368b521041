//! A 256-bit set over byte values, used for the operator / extended-operator
//! / identifier character classes a [`crate::mode::Mode`] is parameterized
//! over.

/// Bitset over all 256 byte values, stored as four `u64` words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Charset([u64; 4]);

impl Charset {
    pub fn empty() -> Self {
        Charset([0; 4])
    }

    pub fn contains(&self, byte: u8) -> bool {
        let word = (byte >> 6) as usize;
        let bit = byte & 0x3f;
        self.0[word] & (1u64 << bit) != 0
    }

    pub fn insert(&mut self, byte: u8) {
        let word = (byte >> 6) as usize;
        let bit = byte & 0x3f;
        self.0[word] |= 1u64 << bit;
    }

    pub fn insert_range(&mut self, from: u8, to: u8) {
        let mut b = from;
        loop {
            self.insert(b);
            if b == to {
                break;
            }
            b += 1;
        }
    }

    /// Builds a charset from a spec string of the form `"a-zA-Z0-9_"`: plain
    /// characters and `-`-joined ranges. Disallows the whitespace/negation
    /// meta-class escapes that are valid in delimiter patterns but make no
    /// sense in a charset spec (there is nothing to negate a byte-set
    /// membership test against, and `\w`/`\W`/`\i`/`\o`/`\O` are variable
    /// width).
    pub fn from_spec(spec: &str) -> Result<Self, CharsetError> {
        let bytes = spec.as_bytes();
        let mut set = Charset::empty();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                return Err(CharsetError::EscapeNotAllowed);
            }
            if i + 2 < bytes.len() && bytes[i + 1] == b'-' {
                let (from, to) = (bytes[i], bytes[i + 2]);
                if from > to {
                    return Err(CharsetError::BadRange(from, to));
                }
                set.insert_range(from, to);
                i += 3;
            } else {
                set.insert(bytes[i]);
                i += 1;
            }
        }
        Ok(set)
    }

    pub fn union(mut self, other: &Charset) -> Charset {
        for i in 0..4 {
            self.0[i] |= other.0[i];
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CharsetError {
    #[error("meta-class escapes are not allowed in a charset specifier")]
    EscapeNotAllowed,
    #[error("invalid range {0}-{1} in charset specifier")]
    BadRange(u8, u8),
}

/// `gpp.c: DEFAULT_OP_STRING`
pub const DEFAULT_OP_STRING: &str = "+-*/\\^<>=`~:.?@#&!%|";
/// `gpp.c: PROLOG_OP_STRING` (drops `%|` relative to the default)
pub const PROLOG_OP_STRING: &str = "+-*/\\^<>=`~:.?@#&!";
/// `gpp.c: DEFAULT_OP_PLUS` — the extended/grouping operator class.
pub const DEFAULT_OP_PLUS: &str = "()[]{}";

pub fn default_op_set() -> Charset {
    Charset::from_spec(DEFAULT_OP_STRING).expect("constant charset spec is well-formed")
}

pub fn prolog_op_set() -> Charset {
    Charset::from_spec(PROLOG_OP_STRING).expect("constant charset spec is well-formed")
}

pub fn default_ext_op_set() -> Charset {
    Charset::from_spec(DEFAULT_OP_PLUS).expect("constant charset spec is well-formed")
}

pub fn default_id_set() -> Charset {
    let mut set = Charset::empty();
    set.insert_range(b'a', b'z');
    set.insert_range(b'A', b'Z');
    set.insert_range(b'0', b'9');
    set.insert(b'_');
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_contains_nothing() {
        let set = Charset::empty();
        for b in 0..=255u8 {
            assert!(!set.contains(b));
        }
    }

    #[test]
    fn range_spec() {
        let set = Charset::from_spec("a-z0-9_").unwrap();
        assert!(set.contains(b'm'));
        assert!(set.contains(b'5'));
        assert!(set.contains(b'_'));
        assert!(!set.contains(b'A'));
    }

    #[test]
    fn escape_rejected() {
        assert!(matches!(
            Charset::from_spec("a-z\\i"),
            Err(CharsetError::EscapeNotAllowed)
        ));
    }

    #[test]
    fn default_id_set_matches_identifier_chars() {
        let set = default_id_set();
        assert!(set.contains(b'_'));
        assert!(set.contains(b'Z'));
        assert!(!set.contains(b' '));
        assert!(!set.contains(b'-'));
    }

    #[test]
    fn default_op_set_has_expected_members() {
        let set = default_op_set();
        assert!(set.contains(b'+'));
        assert!(set.contains(b'|'));
        assert!(!set.contains(b'('));
    }
}
