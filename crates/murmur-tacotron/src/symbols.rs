//! Input symbols and the id table of the exported model.
//!
//! The NVIDIA Tacotron2 checkpoint accepts characters and ARPAbet phones in
//! one vocabulary of 148 entries: padding, punctuation, space, `A-Z`, `a-z`,
//! then every ARPAbet phone, vowels followed by their stressed variants.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuation {
    Dash,
    ExclamationMark,
    Apostrophe,
    OpenBracket,
    CloseBracket,
    Comma,
    FullStop,
    Colon,
    SemiColon,
    QuestionMark,
}

impl Punctuation {
    /// Table order.
    pub const ALL: [Punctuation; 10] = [
        Self::Dash,
        Self::ExclamationMark,
        Self::Apostrophe,
        Self::OpenBracket,
        Self::CloseBracket,
        Self::Comma,
        Self::FullStop,
        Self::Colon,
        Self::SemiColon,
        Self::QuestionMark,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '-' => Self::Dash,
            '!' => Self::ExclamationMark,
            '\'' => Self::Apostrophe,
            '(' => Self::OpenBracket,
            ')' => Self::CloseBracket,
            ',' => Self::Comma,
            '.' => Self::FullStop,
            ':' => Self::Colon,
            ';' => Self::SemiColon,
            '?' => Self::QuestionMark,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Dash => '-',
            Self::ExclamationMark => '!',
            Self::Apostrophe => '\'',
            Self::OpenBracket => '(',
            Self::CloseBracket => ')',
            Self::Comma => ',',
            Self::FullStop => '.',
            Self::Colon => ':',
            Self::SemiColon => ';',
            Self::QuestionMark => '?',
        }
    }

    pub fn is_sentence_end(self) -> bool {
        matches!(
            self,
            Self::FullStop | Self::QuestionMark | Self::ExclamationMark
        )
    }

    pub fn is_pause(self) -> bool {
        matches!(
            self,
            Self::Comma | Self::Colon | Self::SemiColon | Self::Dash
        )
    }
}

/// ARPAbet base phones as used by CMUdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arpa {
    Aa,
    Ae,
    Ah,
    Ao,
    Aw,
    Ay,
    B,
    Ch,
    D,
    Dh,
    Eh,
    Er,
    Ey,
    F,
    G,
    Hh,
    Ih,
    Iy,
    Jh,
    K,
    L,
    M,
    N,
    Ng,
    Ow,
    Oy,
    P,
    R,
    S,
    Sh,
    T,
    Th,
    Uh,
    Uw,
    V,
    W,
    Y,
    Z,
    Zh,
}

impl Arpa {
    /// Alphabetical, which is also table order.
    pub const ALL: [Arpa; 39] = [
        Self::Aa,
        Self::Ae,
        Self::Ah,
        Self::Ao,
        Self::Aw,
        Self::Ay,
        Self::B,
        Self::Ch,
        Self::D,
        Self::Dh,
        Self::Eh,
        Self::Er,
        Self::Ey,
        Self::F,
        Self::G,
        Self::Hh,
        Self::Ih,
        Self::Iy,
        Self::Jh,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::Ng,
        Self::Ow,
        Self::Oy,
        Self::P,
        Self::R,
        Self::S,
        Self::Sh,
        Self::T,
        Self::Th,
        Self::Uh,
        Self::Uw,
        Self::V,
        Self::W,
        Self::Y,
        Self::Z,
        Self::Zh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aa => "AA",
            Self::Ae => "AE",
            Self::Ah => "AH",
            Self::Ao => "AO",
            Self::Aw => "AW",
            Self::Ay => "AY",
            Self::B => "B",
            Self::Ch => "CH",
            Self::D => "D",
            Self::Dh => "DH",
            Self::Eh => "EH",
            Self::Er => "ER",
            Self::Ey => "EY",
            Self::F => "F",
            Self::G => "G",
            Self::Hh => "HH",
            Self::Ih => "IH",
            Self::Iy => "IY",
            Self::Jh => "JH",
            Self::K => "K",
            Self::L => "L",
            Self::M => "M",
            Self::N => "N",
            Self::Ng => "NG",
            Self::Ow => "OW",
            Self::Oy => "OY",
            Self::P => "P",
            Self::R => "R",
            Self::S => "S",
            Self::Sh => "SH",
            Self::T => "T",
            Self::Th => "TH",
            Self::Uh => "UH",
            Self::Uw => "UW",
            Self::V => "V",
            Self::W => "W",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::Zh => "ZH",
        }
    }

    /// Vowels carry lexical stress.
    pub fn is_vowel(self) -> bool {
        matches!(
            self,
            Self::Aa
                | Self::Ae
                | Self::Ah
                | Self::Ao
                | Self::Aw
                | Self::Ay
                | Self::Eh
                | Self::Er
                | Self::Ey
                | Self::Ih
                | Self::Iy
                | Self::Ow
                | Self::Oy
                | Self::Uh
                | Self::Uw
        )
    }
}

impl FromStr for Arpa {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arpa::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| Error::UnknownSymbol(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stress {
    Unstressed,
    Primary,
    Secondary,
}

impl Stress {
    pub const ALL: [Stress; 3] = [Self::Unstressed, Self::Primary, Self::Secondary];

    fn digit(self) -> char {
        match self {
            Self::Unstressed => '0',
            Self::Primary => '1',
            Self::Secondary => '2',
        }
    }
}

/// A phone with optional lexical stress, e.g. `AE1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Phone {
    pub arpa: Arpa,
    pub stress: Option<Stress>,
}

impl Phone {
    pub fn new(arpa: Arpa) -> Self {
        Self { arpa, stress: None }
    }

    pub fn stressed(arpa: Arpa, stress: Stress) -> Self {
        Self {
            arpa,
            stress: Some(stress),
        }
    }
}

impl FromStr for Phone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, stress) = match s.chars().last() {
            Some('0') => (&s[..s.len() - 1], Some(Stress::Unstressed)),
            Some('1') => (&s[..s.len() - 1], Some(Stress::Primary)),
            Some('2') => (&s[..s.len() - 1], Some(Stress::Secondary)),
            _ => (s, None),
        };
        let arpa: Arpa = base
            .parse()
            .map_err(|_| Error::UnknownSymbol(s.to_string()))?;
        if stress.is_some() && !arpa.is_vowel() {
            return Err(Error::UnknownSymbol(s.to_string()));
        }
        Ok(Self { arpa, stress })
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arpa.as_str())?;
        if let Some(stress) = self.stress {
            write!(f, "{}", stress.digit())?;
        }
        Ok(())
    }
}

/// One unit of model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Padding,
    Punct(Punctuation),
    Space,
    Char(char),
    Phone(Phone),
}

impl Symbol {
    /// Character-level symbols for raw text. Runs of whitespace become one
    /// space; characters outside the vocabulary are dropped.
    pub fn from_text(text: &str) -> Vec<Symbol> {
        let mut symbols = Vec::with_capacity(text.len());
        for c in text.chars() {
            let symbol = if c.is_whitespace() {
                if symbols.last() == Some(&Symbol::Space) {
                    continue;
                }
                Symbol::Space
            } else if let Some(p) = Punctuation::from_char(c) {
                Symbol::Punct(p)
            } else if c.is_ascii_alphabetic() {
                Symbol::Char(c)
            } else {
                tracing::warn!(character = %c, "Dropping character outside the model vocabulary");
                continue;
            };
            symbols.push(symbol);
        }
        symbols
    }

    /// Parse a whitespace-separated phone string such as `"HH AH0 L OW1 , W ER1 L D"`.
    pub fn parse_phones(text: &str) -> Result<Vec<Symbol>, Error> {
        text.split_whitespace().map(str::parse).collect()
    }

    /// How good a window boundary directly after this symbol is.
    pub fn split_score(&self) -> u8 {
        match self {
            Symbol::Punct(p) if p.is_sentence_end() => 3,
            Symbol::Padding => 3,
            Symbol::Punct(p) if p.is_pause() => 2,
            Symbol::Space => 1,
            _ => 0,
        }
    }
}

impl FromStr for Symbol {
    type Err = Error;

    /// `" "` is a space and `"_"` padding. Punctuation parses from its
    /// character. ARPAbet phones parse from their upper-case spelling with an
    /// optional stress digit, optionally prefixed with `@`. Any other single
    /// ASCII letter is a character.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == " " {
            return Ok(Symbol::Space);
        }
        if s == "_" {
            return Ok(Symbol::Padding);
        }

        let mut chars = s.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };
        if let Some(p) = single.and_then(Punctuation::from_char) {
            return Ok(Symbol::Punct(p));
        }

        let phone_str = s.strip_prefix('@').unwrap_or(s);
        if let Ok(phone) = phone_str.parse::<Phone>() {
            return Ok(Symbol::Phone(phone));
        }

        match single {
            Some(c) if c.is_ascii_alphabetic() => Ok(Symbol::Char(c)),
            _ => Err(Error::UnknownSymbol(s.to_string())),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Padding => f.write_str("_"),
            Symbol::Punct(p) => write!(f, "{}", p.as_char()),
            Symbol::Space => f.write_str(" "),
            Symbol::Char(c) => write!(f, "{}", c),
            Symbol::Phone(p) => write!(f, "@{}", p),
        }
    }
}

/// Ordered vocabulary: a symbol's index is its model input id.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    /// The vocabulary of the NVIDIA Tacotron2 export.
    pub fn tacotron2() -> Self {
        let mut symbols = Vec::with_capacity(148);
        symbols.push(Symbol::Padding);
        symbols.extend(Punctuation::ALL.iter().map(|&p| Symbol::Punct(p)));
        symbols.push(Symbol::Space);
        symbols.extend(('A'..='Z').map(Symbol::Char));
        symbols.extend(('a'..='z').map(Symbol::Char));
        for arpa in Arpa::ALL {
            symbols.push(Symbol::Phone(Phone::new(arpa)));
            if arpa.is_vowel() {
                for stress in Stress::ALL {
                    symbols.push(Symbol::Phone(Phone::stressed(arpa, stress)));
                }
            }
        }
        Self { symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<Symbol> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.symbols.get(i))
            .copied()
    }

    /// Id for `symbol`. A phone whose exact stress is absent resolves to the
    /// first entry with the same base phone.
    pub fn id_of(&self, symbol: &Symbol) -> Option<i64> {
        if let Some(i) = self.symbols.iter().position(|s| s == symbol) {
            return Some(i as i64);
        }
        match symbol {
            Symbol::Phone(phone) => self
                .symbols
                .iter()
                .position(|s| matches!(s, Symbol::Phone(p) if p.arpa == phone.arpa))
                .map(|i| i as i64),
            _ => None,
        }
    }

    /// Ids for `symbols`, skipping (and logging) anything without one.
    pub fn encode(&self, symbols: &[Symbol]) -> Vec<i64> {
        symbols
            .iter()
            .filter_map(|s| {
                let id = self.id_of(s);
                if id.is_none() {
                    tracing::warn!(symbol = %s, "No model id for symbol, skipping");
                }
                id
            })
            .collect()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::tacotron2()
    }
}
