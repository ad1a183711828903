/// XOR checksum over the bytes between `$` and `*`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    value: u8,
}

impl Checksum {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn put_u8(&mut self, byte: u8) {
        self.value ^= byte;
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.put_u8(*b);
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}


/// Check that a complete sentence carries a matching checksum.
///
/// Trailing CR/LF is ignored. The checksum digits are compared by value, so
/// both `*0A` and `*A` are accepted.
pub fn verify(sentence: &str) -> bool {
    let sentence = sentence.trim_end_matches(['\r', '\n']);

    let Some(body) = sentence.strip_prefix('$') else {
        return false;
    };

    let Some((payload, digits)) = body.rsplit_once('*') else {
        return false;
    };

    let Ok(expected) = u8::from_str_radix(digits, 16) else {
        return false;
    };

    let mut crc = Checksum::new();
    crc.put_bytes(payload.as_bytes());
    crc.value() == expected
}
