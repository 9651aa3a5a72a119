use std::fmt::{self, Display, Formatter};

// NOTE: Indexed by atomic number, so the placeholder at index 0 keeps everything lined up
const SYMBOLS: [&str; 119] = [
    "", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y",
    "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce",
    "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir",
    "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc",
    "Lv", "Ts", "Og",
];

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Element(u8);

impl Element {
    pub const H: Self = Self(1);
    pub const B: Self = Self(5);
    pub const C: Self = Self(6);
    pub const N: Self = Self(7);
    pub const O: Self = Self(8);
    pub const F: Self = Self(9);
    pub const P: Self = Self(15);
    pub const S: Self = Self(16);
    pub const CL: Self = Self(17);
    pub const AS: Self = Self(33);
    pub const SE: Self = Self(34);
    pub const BR: Self = Self(35);
    pub const I: Self = Self(53);

    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let number = SYMBOLS.iter().skip(1).position(|&s| s == symbol)?;
        u8::try_from(number + 1).ok().map(Self)
    }

    #[must_use]
    pub fn from_atomic_number(number: u8) -> Option<Self> {
        (1..SYMBOLS.len()).contains(&usize::from(number)).then_some(Self(number))
    }

    #[must_use]
    pub const fn atomic_number(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        SYMBOLS[self.0 as usize]
    }

    /// The standard valences of the SMILES organic subset, or an empty slice for any other element
    #[must_use]
    pub const fn default_valences(self) -> &'static [u8] {
        match self {
            Self::B => &[3],
            Self::C => &[4],
            Self::N | Self::P => &[3, 5],
            Self::O => &[2],
            Self::S => &[2, 4, 6],
            Self::F | Self::CL | Self::BR | Self::I => &[1],
            _ => &[],
        }
    }

    #[must_use]
    pub const fn is_organic_subset(self) -> bool {
        !self.default_valences().is_empty()
    }

    #[must_use]
    pub const fn can_be_aromatic(self) -> bool {
        matches!(
            self,
            Self::B | Self::C | Self::N | Self::O | Self::P | Self::S | Self::AS | Self::SE
        )
    }

    /// Whether an aromatic atom of this element donates one electron to the ring through a multiple bond, as
    /// opposed to a lone pair, which decides whether it needs one fewer hydrogen
    pub(crate) const fn aromatic_pi_bond(self) -> bool {
        matches!(self, Self::B | Self::C | Self::N | Self::P | Self::AS)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_lookup() {
        assert_eq!(Element::from_symbol("C"), Some(Element::C));
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CL));
        assert_eq!(Element::from_symbol("Og").map(Element::atomic_number), Some(118));
        assert_eq!(Element::from_symbol("Xx"), None);
        assert_eq!(Element::from_symbol(""), None);
        assert_eq!(Element::from_symbol("cl"), None);
    }

    #[test]
    fn atomic_numbers() {
        assert_eq!(Element::from_atomic_number(1), Some(Element::H));
        assert_eq!(Element::from_atomic_number(0), None);
        assert_eq!(Element::from_atomic_number(119), None);
        for number in 1..=118 {
            let element = Element::from_atomic_number(number).unwrap();
            assert_eq!(Element::from_symbol(element.symbol()), Some(element));
        }
    }

    #[test]
    fn organic_subset() {
        let organic: Vec<_> = (1..=118)
            .filter_map(Element::from_atomic_number)
            .filter(|e| e.is_organic_subset())
            .map(|e| e.to_string())
            .collect();
        assert_eq!(organic, ["B", "C", "N", "O", "F", "P", "S", "Cl", "Br", "I"]);
        assert_eq!(Element::S.default_valences(), &[2, 4, 6]);
        assert!(Element::SE.can_be_aromatic());
        assert!(!Element::CL.can_be_aromatic());
    }
}
