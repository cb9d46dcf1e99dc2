use std::fmt;
use std::str::FromStr;

///////////////////////////////
/// Bases matched by an IUPAC nucleotide code, as a bitmask over A=1, C=2, G=4, T=8
fn iupac_mask(code: u8) -> Option<u8> {
    let mask = match code.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        b'R' => 0b0101, //G,A
        b'Y' => 0b1010, //T,C
        b'M' => 0b0011, //C,A
        b'K' => 0b1100, //G,T
        b'W' => 0b1001, //T,A
        b'S' => 0b0110, //G,C
        b'B' => 0b1110, //G,T,C
        b'D' => 0b1101, //G,T,A
        b'H' => 0b1011, //C,T,A
        b'V' => 0b0111, //G,C,A
        b'N' => 0b1111,
        _ => return None,
    };
    Some(mask)
}

fn base_mask(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        //N and anything else in a read never matches
        _ => 0,
    }
}

///////////////////////////////
/// Degenerate sequence pattern such as "BDVHBDVHBDVHBDVHBDVH"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IupacPattern {
    pattern: String,
    masks: Vec<u8>,
}

impl IupacPattern {
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    ///////////////////////////////
    /// Check if a sequence fits the pattern. Sequences of another length never match
    pub fn matches(&self, seq: &[u8]) -> bool {
        seq.len() == self.masks.len()
            && seq
                .iter()
                .zip(self.masks.iter())
                .all(|(base, mask)| base_mask(*base) & mask != 0)
    }
}

impl FromStr for IupacPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let masks = s
            .bytes()
            .map(|c| iupac_mask(c).ok_or_else(|| format!("Invalid IUPAC code '{}' in pattern {}", c as char, s)))
            .collect::<Result<Vec<u8>, String>>()?;
        if masks.is_empty() {
            return Err("Empty IUPAC pattern".to_string());
        }
        Ok(IupacPattern {
            pattern: s.to_ascii_uppercase(),
            masks,
        })
    }
}

impl fmt::Display for IupacPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_matches_every_base() {
        let pattern: IupacPattern = "N".parse().unwrap();
        for base in [b"A", b"C", b"G", b"T"] {
            assert!(pattern.matches(base));
        }
        assert!(!pattern.matches(b"N"));
    }

    #[test]
    fn test_r() {
        let pattern: IupacPattern = "R".parse().unwrap();
        assert!(pattern.matches(b"G"));
        assert!(pattern.matches(b"A"));
        assert!(!pattern.matches(b"C"));
        assert!(!pattern.matches(b"T"));
    }

    #[test]
    fn test_length_mismatch() {
        let pattern: IupacPattern = "NNNN".parse().unwrap();
        assert!(pattern.matches(b"ACGT"));
        assert!(!pattern.matches(b"ACG"));
        assert!(!pattern.matches(b"ACGTA"));
    }

    #[test]
    fn test_dbs_pattern() {
        let pattern: IupacPattern = "bdvh".parse().unwrap();
        assert_eq!(pattern.to_string(), "BDVH");
        assert!(pattern.matches(b"CAGA"));
        //B excludes A
        assert!(!pattern.matches(b"AAGA"));
    }

    #[test]
    fn test_lowercase_sequence() {
        let pattern: IupacPattern = "BDVH".parse().unwrap();
        assert!(pattern.matches(b"caga"));
        assert!(pattern.matches(b"CaGa"));
        assert!(!pattern.matches(b"aaga"));
    }

    #[test]
    fn test_invalid() {
        assert!("ACGX".parse::<IupacPattern>().is_err());
        assert!("".parse::<IupacPattern>().is_err());
    }
}
