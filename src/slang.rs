use std::fmt;

/// An output shading language.
///
/// The discriminant order is the iteration order everywhere in the
/// pipeline, which keeps the emitted header byte-stable.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub enum Slang {
    Glsl330,
    Glsl100,
    Glsl300Es,
    Hlsl5,
    MetalMacos,
    MetalIos,
}

impl Slang {
    pub const COUNT: usize = 6;
    pub const ALL: [Slang; Slang::COUNT] = [
        Slang::Glsl330,
        Slang::Glsl100,
        Slang::Glsl300Es,
        Slang::Hlsl5,
        Slang::MetalMacos,
        Slang::MetalIos,
    ];

    pub fn index(self) -> usize {
        match self {
            Slang::Glsl330 => 0,
            Slang::Glsl100 => 1,
            Slang::Glsl300Es => 2,
            Slang::Hlsl5 => 3,
            Slang::MetalMacos => 4,
            Slang::MetalIos => 5,
        }
    }

    pub fn bit(self) -> u32 {
        1 << self.index()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slang::Glsl330 => "glsl330",
            Slang::Glsl100 => "glsl100",
            Slang::Glsl300Es => "glsl300es",
            Slang::Hlsl5 => "hlsl5",
            Slang::MetalMacos => "metal_macos",
            Slang::MetalIos => "metal_ios",
        }
    }

    pub fn parse_token(s: &str) -> Option<Slang> {
        Slang::ALL.iter().copied().find(|slang| slang.as_str() == s)
    }

    pub fn is_glsl(self) -> bool {
        matches!(self, Slang::Glsl330 | Slang::Glsl100 | Slang::Glsl300Es)
    }

    pub fn is_hlsl(self) -> bool {
        matches!(self, Slang::Hlsl5)
    }

    pub fn is_msl(self) -> bool {
        matches!(self, Slang::MetalMacos | Slang::MetalIos)
    }

    /// File extension of a dumped shader for this language.
    pub fn file_extension(self, binary: bool) -> &'static str {
        match self {
            Slang::Glsl330 | Slang::Glsl100 | Slang::Glsl300Es => ".glsl",
            Slang::Hlsl5 => {
                if binary {
                    ".fxc"
                } else {
                    ".hlsl"
                }
            }
            Slang::MetalMacos | Slang::MetalIos => {
                if binary {
                    ".metallib"
                } else {
                    ".metal"
                }
            }
        }
    }
}

impl fmt::Display for Slang {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A non-empty selection of target languages, stored as a bitmask.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct SlangSet(u32);

impl SlangSet {
    pub fn empty() -> SlangSet {
        SlangSet(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, slang: Slang) {
        self.0 |= slang.bit();
    }

    pub fn contains(self, slang: Slang) -> bool {
        self.0 & slang.bit() != 0
    }

    /// Members in `Slang` enum order.
    pub fn iter(self) -> impl Iterator<Item = Slang> {
        Slang::ALL.into_iter().filter(move |slang| self.contains(*slang))
    }

    /// Parse a colon-separated target list, e.g. `glsl330:hlsl5:metal_macos`.
    pub fn parse(text: &str) -> Result<SlangSet, String> {
        let mut set = SlangSet::empty();
        for token in text.split(':').filter(|t| !t.is_empty()) {
            match Slang::parse_token(token) {
                Some(slang) => set.insert(slang),
                None => return Err(format!("unknown target language '{}'", token)),
            }
        }
        Ok(set)
    }
}

impl fmt::Display for SlangSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sep = false;
        for slang in self.iter() {
            if sep {
                write!(f, ":")?;
            }
            write!(f, "{}", slang.as_str())?;
            sep = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_distinct() {
        let mut mask = 0u32;
        for slang in Slang::ALL {
            assert_eq!(mask & slang.bit(), 0);
            mask |= slang.bit();
        }
    }

    #[test]
    fn token_round_trip() {
        for slang in Slang::ALL {
            assert_eq!(Slang::parse_token(slang.as_str()), Some(slang));
        }
        assert_eq!(Slang::parse_token("wgsl"), None);
    }

    #[test]
    fn parse_set_and_display() {
        let set = SlangSet::parse("hlsl5:glsl330:metal_ios").unwrap();
        assert!(set.contains(Slang::Glsl330));
        assert!(set.contains(Slang::Hlsl5));
        assert!(set.contains(Slang::MetalIos));
        assert!(!set.contains(Slang::Glsl100));
        // display follows enum order, not argument order
        assert_eq!(set.to_string(), "glsl330:hlsl5:metal_ios");
    }

    #[test]
    fn parse_rejects_unknown_token() {
        assert!(SlangSet::parse("glsl330:dxil").is_err());
    }

    #[test]
    fn empty_list_parses_to_empty_set() {
        assert!(SlangSet::parse("").unwrap().is_empty());
    }

    #[test]
    fn iteration_is_in_enum_order() {
        let set = SlangSet::parse("metal_macos:glsl100").unwrap();
        let langs: Vec<Slang> = set.iter().collect();
        assert_eq!(langs, vec![Slang::Glsl100, Slang::MetalMacos]);
    }
}
