//! Four-character record, group and sub-record signatures

use std::fmt;

/// A four-byte tag such as `GRUP`, `MISC` or `EDID`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Signature([u8; 4]);

impl Signature {
    /// Wrap raw signature bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw bytes as stored in the file
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Little-endian integer view, handy for group labels
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Build from a little-endian integer
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl From<[u8; 4]> for Signature {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&str> for Signature {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let bytes: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| format!("signature must be exactly 4 bytes: {value:?}"))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Signature {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        value.to_string()
    }
}

/// Well-known signatures
#[allow(missing_docs)]
pub mod sigs {
    use super::Signature;

    // Container framing
    pub const GRUP: Signature = Signature::new(*b"GRUP");
    pub const TES4: Signature = Signature::new(*b"TES4");
    pub const XXXX: Signature = Signature::new(*b"XXXX");

    // File header fields
    pub const HEDR: Signature = Signature::new(*b"HEDR");
    pub const CNAM: Signature = Signature::new(*b"CNAM");
    pub const SNAM: Signature = Signature::new(*b"SNAM");
    pub const MAST: Signature = Signature::new(*b"MAST");
    pub const DATA: Signature = Signature::new(*b"DATA");

    // Record fields
    pub const EDID: Signature = Signature::new(*b"EDID");
    pub const OBND: Signature = Signature::new(*b"OBND");
    pub const FULL: Signature = Signature::new(*b"FULL");
    pub const MODL: Signature = Signature::new(*b"MODL");
    pub const MODT: Signature = Signature::new(*b"MODT");
    pub const ICON: Signature = Signature::new(*b"ICON");
    pub const KSIZ: Signature = Signature::new(*b"KSIZ");
    pub const KWDA: Signature = Signature::new(*b"KWDA");
    pub const FNAM: Signature = Signature::new(*b"FNAM");
    pub const FLTV: Signature = Signature::new(*b"FLTV");
    pub const LNAM: Signature = Signature::new(*b"LNAM");
    pub const LVLD: Signature = Signature::new(*b"LVLD");
    pub const LVLF: Signature = Signature::new(*b"LVLF");
    pub const LVLG: Signature = Signature::new(*b"LVLG");
    pub const LLCT: Signature = Signature::new(*b"LLCT");
    pub const LVLO: Signature = Signature::new(*b"LVLO");
    pub const COED: Signature = Signature::new(*b"COED");

    // Record categories with a typed model
    pub const GMST: Signature = Signature::new(*b"GMST");
    pub const GLOB: Signature = Signature::new(*b"GLOB");
    pub const KYWD: Signature = Signature::new(*b"KYWD");
    pub const FLST: Signature = Signature::new(*b"FLST");
    pub const MISC: Signature = Signature::new(*b"MISC");
    pub const LVLI: Signature = Signature::new(*b"LVLI");
}

/// Top-level group order used by Skyrim Special Edition
///
/// A written plugin emits its top groups in this order; signatures missing
/// from the list go last, sorted by signature.
pub const TOP_GROUP_ORDER: &[[u8; 4]] = &[
    *b"GMST", *b"KYWD", *b"LCRT", *b"AACT", *b"TXST", *b"GLOB", *b"CLAS", *b"FACT", *b"HDPT",
    *b"HAIR", *b"EYES", *b"RACE", *b"SOUN", *b"ASPC", *b"MGEF", *b"SCPT", *b"LTEX", *b"ENCH",
    *b"SPEL", *b"SCRL", *b"ACTI", *b"TACT", *b"ARMO", *b"BOOK", *b"CONT", *b"DOOR", *b"INGR",
    *b"LIGH", *b"MISC", *b"APPA", *b"STAT", *b"SCOL", *b"MSTT", *b"PWAT", *b"GRAS", *b"TREE",
    *b"CLDC", *b"FLOR", *b"FURN", *b"WEAP", *b"AMMO", *b"NPC_", *b"LVLN", *b"KEYM", *b"ALCH",
    *b"IDLM", *b"COBJ", *b"PROJ", *b"HAZD", *b"SLGM", *b"LVLI", *b"WTHR", *b"CLMT", *b"SPGD",
    *b"RFCT", *b"REGN", *b"NAVI", *b"CELL", *b"WRLD", *b"DIAL", *b"QUST", *b"IDLE", *b"PACK",
    *b"CSTY", *b"LSCR", *b"LVSP", *b"ANIO", *b"WATR", *b"EFSH", *b"EXPL", *b"DEBR", *b"IMGS",
    *b"IMAD", *b"FLST", *b"PERK", *b"BPTD", *b"ADDN", *b"AVIF", *b"CAMS", *b"CPTH", *b"VTYP",
    *b"MATT", *b"IPCT", *b"IPDS", *b"ARMA", *b"ECZN", *b"LCTN", *b"MESG", *b"RGDL", *b"DOBJ",
    *b"LGTM", *b"MUSC", *b"FSTP", *b"FSTS", *b"SMBN", *b"SMQN", *b"SMEN", *b"DLBR", *b"MUST",
    *b"DLVW", *b"WOOP", *b"SHOU", *b"EQUP", *b"RELA", *b"SCEN", *b"ASTP", *b"OTFT", *b"ARTO",
    *b"MATO", *b"VOLI", *b"MOVT", *b"SNDR", *b"DUAL", *b"SNCT", *b"SOPM", *b"COLL", *b"CLFM",
    *b"REVB", *b"LENS",
];

/// Position of a top group in [`TOP_GROUP_ORDER`]
pub fn top_group_rank(signature: Signature) -> usize {
    TOP_GROUP_ORDER
        .iter()
        .position(|s| *s == signature.0)
        .unwrap_or(TOP_GROUP_ORDER.len())
}
