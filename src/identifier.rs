use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use crate::encoding::bufparser::BufParser;
use crate::encoding::ParseError;

/// A 16 byte identifier naming a box. Identifiers are either random (see [`Identifier::random`])
/// or derived from some content (see [`Identifier::from_content`]). In both cases the version 4
/// layout bits are set, so they print like ordinary UUIDs.
///
/// Identifiers compare bytewise. Boxes are always iterated in identifier order, which is what makes
/// graph snapshots deterministic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Identifier([u8; 16]);

impl Identifier {
    pub const LENGTH: usize = 16;

    pub const LOWEST: Identifier = Identifier([0; 16]);
    pub const HIGHEST: Identifier = Identifier([0xff; 16]);

    pub fn random() -> Self {
        Self::random_from(&mut rand::thread_rng())
    }

    /// Generate an identifier from a specific RNG. Useful with a seeded rng in tests.
    pub fn random_from<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        Self::with_version_bits(bytes)
    }

    /// Derive an identifier from content. The same content always produces the same identifier,
    /// which lets imports of the same asset share one box.
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self::with_version_bits(bytes)
    }

    /// Places `n` in the last 4 bytes (big-endian, so ordering follows `n`). Handy for tests which
    /// want readable, ordered identifiers.
    pub fn from_int(n: u32) -> Self {
        let mut bytes = [0u8; 16];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Identifier(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Identifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    fn with_version_bits(mut bytes: [u8; 16]) -> Self {
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Identifier(bytes)
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let mut bytes = [0u8; 16];
        let mut n = 0;
        let mut chars = s.bytes().filter(|&c| c != b'-');
        while let Some(hi) = chars.next() {
            let lo = chars.next().ok_or(ParseError::InvalidIdentifier)?;
            if n >= 16 { return Err(ParseError::InvalidIdentifier); }
            bytes[n] = (hex_value(hi)? << 4) | hex_value(lo)?;
            n += 1;
        }
        if n != 16 { return Err(ParseError::InvalidIdentifier); }

        // Only accept the canonical 8-4-4-4-12 layout or no hyphens at all.
        let hyphens: Vec<usize> = s.match_indices('-').map(|(i, _)| i).collect();
        if !hyphens.is_empty() && hyphens != [8, 13, 18, 23] {
            return Err(ParseError::InvalidIdentifier);
        }
        Ok(Identifier(bytes))
    }

    pub(crate) fn write(&self, into: &mut Vec<u8>) {
        into.extend_from_slice(&self.0);
    }

    pub(crate) fn read(parser: &mut BufParser) -> Result<Self, ParseError> {
        Ok(Identifier(parser.next_array::<16>()?))
    }
}

fn hex_value(c: u8) -> Result<u8, ParseError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(ParseError::InvalidIdentifier),
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) { f.write_str("-")?; }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl Debug for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Identifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

#[cfg(test)]
mod test {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use super::*;

    #[test]
    fn random_has_version_bits() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            let id = Identifier::random_from(&mut rng);
            assert_eq!(id.as_bytes()[6] >> 4, 4);
            assert_eq!(id.as_bytes()[8] & 0xc0, 0x80);
        }
        assert_ne!(Identifier::random(), Identifier::random());
    }

    #[test]
    fn content_identifiers_are_stable() {
        let a = Identifier::from_content(b"kick.wav");
        let b = Identifier::from_content(b"kick.wav");
        let c = Identifier::from_content(b"snare.wav");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_bytes()[6] >> 4, 4);
    }

    #[test]
    fn print_and_parse() {
        let id = Identifier::from_bytes([
            0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0x4d, 0xef,
            0x80, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
        ]);
        let s = id.to_string();
        assert_eq!(s, "12345678-9abc-4def-8011-223344556677");
        assert_eq!(Identifier::parse(&s).unwrap(), id);
        assert_eq!(s.to_uppercase().parse::<Identifier>().unwrap(), id);
        assert_eq!(Identifier::parse("123456789abc4def8011223344556677").unwrap(), id);

        assert!(Identifier::parse("1234").is_err());
        assert!(Identifier::parse("1234567-89abc-4def-8011-223344556677").is_err());
        assert!(Identifier::parse("12345678-9abc-4def-8011-22334455667z").is_err());
    }

    #[test]
    fn ordering_is_bytewise() {
        assert!(Identifier::LOWEST < Identifier::from_int(1));
        assert!(Identifier::from_int(1) < Identifier::from_int(2));
        assert!(Identifier::from_int(u32::MAX) < Identifier::HIGHEST);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let id = Identifier::from_int(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<Identifier>(&json).unwrap(), id);
    }
}
