//! The controlled fragrance-note vocabulary and the validated note set built from it.

use std::{collections::HashMap, fmt, sync::LazyLock};

use crate::error::{ApiError, Result};

/// Number of notes the extractor must return for one description.
pub const NOTE_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteCategory {
    Citrus,
    Floral,
    Fruity,
    Woody,
    Spicy,
    Green,
    Other,
}

impl NoteCategory {
    pub const ALL: [NoteCategory; 7] = [
        NoteCategory::Citrus,
        NoteCategory::Floral,
        NoteCategory::Fruity,
        NoteCategory::Woody,
        NoteCategory::Spicy,
        NoteCategory::Green,
        NoteCategory::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NoteCategory::Citrus => "CITRUS",
            NoteCategory::Floral => "FLORAL",
            NoteCategory::Fruity => "FRUITY",
            NoteCategory::Woody => "WOODY",
            NoteCategory::Spicy => "SPICY",
            NoteCategory::Green => "GREEN",
            NoteCategory::Other => "OTHER",
        }
    }

    pub fn notes(self) -> &'static [&'static str] {
        match self {
            NoteCategory::Citrus => &[
                "Lemon",
                "Lime",
                "Bergamot",
                "Grapefruit",
                "Yuzu",
                "Mandarin Orange",
                "Kaffir Lime",
                "Pomelo",
                "Calamansi",
            ],
            NoteCategory::Floral => &[
                "Lavender",
                "Rose",
                "Jasmine",
                "Ylang-Ylang",
                "Lily of the Valley",
                "Orchid",
                "Tuberose",
                "Peony",
                "Orange Blossom",
                "Neroli",
            ],
            NoteCategory::Fruity => &[
                "Apple",
                "Strawberry",
                "Raspberry",
                "Pineapple",
                "Mango",
                "Peach",
                "Black Currant",
                "Pear",
                "Fig",
            ],
            NoteCategory::Woody => &[
                "Cedarwood",
                "Sandalwood",
                "Vetiver",
                "Patchouli",
                "Oud",
                "Amberwood",
                "Guaiac Wood",
            ],
            NoteCategory::Spicy => &[
                "Pink Pepper",
                "Black Pepper",
                "Cinnamon",
                "Clove",
                "Cardamom",
                "Nutmeg",
                "Ginger",
            ],
            NoteCategory::Green => &[
                "Basil",
                "Mint",
                "Green Tea",
                "Grass",
                "Tomato Leaf",
                "Galbanum",
                "Violet Leaf",
            ],
            NoteCategory::Other => &[
                "Vanilla",
                "Musk",
                "Amber",
                "Tonka Bean",
                "Leather",
                "Incense",
                "Coffee",
            ],
        }
    }
}

static NOTE_INDEX: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    NoteCategory::ALL
        .iter()
        .flat_map(|category| category.notes().iter())
        .map(|note| (note.to_lowercase(), *note))
        .collect()
});

/// Looks a label up in the taxonomy, ignoring case and surrounding whitespace.
pub fn canonical_note(label: &str) -> Option<&'static str> {
    NOTE_INDEX.get(&label.trim().to_lowercase()).copied()
}

/// Exactly [`NOTE_COUNT`] taxonomy labels describing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSet {
    notes: Vec<&'static str>,
}

impl NoteSet {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        if labels.len() != NOTE_COUNT {
            return Err(ApiError::InvalidInput(format!(
                "Expected {} notes from the extractor, got {}",
                NOTE_COUNT,
                labels.len()
            )));
        }

        let notes = labels
            .iter()
            .map(|label| {
                canonical_note(label.as_ref()).ok_or_else(|| {
                    ApiError::InvalidInput(format!(
                        "Extracted note '{}' is not in the note vocabulary",
                        label.as_ref()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { notes })
    }

    pub fn labels(&self) -> &[&'static str] {
        &self.notes
    }

    /// The space-joined form fed to the text vectorizer.
    pub fn joined(&self) -> String {
        self.notes.join(" ")
    }
}

impl fmt::Display for NoteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}
