#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DNA {
    A,
    C,
    G,
    T,
}

impl DNA {
    /// Convert nucleotide to its character representation.
    pub fn to_char(&self) -> char {
        match self {
            DNA::A => 'A',
            DNA::C => 'C',
            DNA::G => 'G',
            DNA::T => 'T',
        }
    }

    pub fn from_char(c: char) -> Option<DNA> {
        match c.to_ascii_uppercase() {
            'A' => Some(DNA::A),
            'C' => Some(DNA::C),
            'G' => Some(DNA::G),
            'T' | 'U' => Some(DNA::T),
            _ => None,
        }
    }

    pub fn complement(&self) -> DNA {
        match self {
            DNA::A => DNA::T,
            DNA::C => DNA::G,
            DNA::G => DNA::C,
            DNA::T => DNA::A,
        }
    }
}

/// Complement of one IUPAC nucleotide code, keeping case.
/// Unknown symbols are returned as-is.
pub fn complement(c: char) -> char {
    let upper = c.to_ascii_uppercase();
    let comp = match DNA::from_char(upper) {
        Some(base) => base.complement().to_char(),
        None => match upper {
            'R' => 'Y',
            'Y' => 'R',
            'K' => 'M',
            'M' => 'K',
            'B' => 'V',
            'V' => 'B',
            'D' => 'H',
            'H' => 'D',
            other => other,
        },
    };
    if c.is_ascii_lowercase() {
        comp.to_ascii_lowercase()
    } else {
        comp
    }
}

/// Reverse complement of a nucleotide string, e.g. a barcode.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement).collect()
}
