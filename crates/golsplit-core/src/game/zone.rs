use serde::{Deserialize, Serialize};

/// Map-id prefixes and the level each belongs to.
///
/// Order matters: classification keeps the last matching entry, so special
/// cases go after the prefix they override.
const BUILTIN_ZONES: &[(&str, &str)] = &[
    ("alc_1_", "Temple Grounds"),
    ("alc_2_", "Spider Tomb"),
    ("alc_3_", "The Summoning"),
    ("alc_4_", "Toxic Swamp"),
    ("alc_5_", "Flooded Passage"),
    // the arrow shrine is loaded as part of the next level
    ("alc_5_lt_arrow_shrine", "Temple of Light"),
    ("alc_6_", "Temple of Light"),
    ("alc_7_", "The Jaws of Death"),
    ("alc_8_", "Forgotten Gate"),
    ("alc_9_", "Twisting Bridge"),
    ("alc_10_", "Belly of the Beast"),
    ("alc_11_", "Xolotl's Stronghold"),
    ("alc_12_", "The Mirror's Wake"),
    ("alc_13_", "Fiery Depths"),
    ("alc_14_", "Stronghold Passage"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub prefix: String,
    pub name: String,
}

/// Ordered prefix table turning raw map ids into level names
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZoneNameTable {
    entries: Vec<ZoneEntry>,
}

impl ZoneNameTable {
    pub fn new<I, P, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, N)>,
        P: Into<String>,
        N: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(prefix, name)| ZoneEntry {
                    prefix: prefix.into(),
                    name: name.into(),
                })
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_ZONES.iter().copied())
    }

    /// Name of the last entry whose prefix matches `map_id`.
    ///
    /// Later entries win over earlier ones regardless of prefix length.
    pub fn classify(&self, map_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .filter(|entry| map_id.starts_with(entry.prefix.as_str()))
            .last()
            .map(|entry| entry.name.as_str())
    }

    pub fn entries(&self) -> &[ZoneEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
