//! Static product catalog keyed by detector class id.
//!
//! The records ship with the crate as JSON and are parsed once when the
//! pipeline is wired up. Lookups never touch the network.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Nutri-Score grade letter.
///
/// Letters outside A to E deserialize as `Unknown` and render white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NutriGrade {
    A,
    B,
    C,
    D,
    E,
    #[serde(other)]
    Unknown,
}

impl NutriGrade {
    pub fn letter(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::Unknown => "?",
        }
    }

    /// Display colour of the grade on the Nutri-Score label.
    pub fn color(&self) -> Rgba {
        match self {
            Self::A => Rgba::from_rgb8(3, 129, 65, 0.8),
            Self::B => Rgba::from_rgb8(133, 187, 47, 0.8),
            Self::C => Rgba::from_rgb8(254, 203, 2, 0.8),
            Self::D => Rgba::from_rgb8(238, 129, 0, 0.8),
            Self::E => Rgba::from_rgb8(230, 62, 17, 0.8),
            Self::Unknown => Rgba::WHITE,
        }
    }
}

impl fmt::Display for NutriGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// Linear RGBA colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn from_rgb8(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
            a,
        }
    }
}

/// One nutrient value per 100 g/ml with its traffic-light grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub value: f64,
    pub grade: NutriGrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub calories: Nutrient,
    pub sugar: Nutrient,
    pub fat: Nutrient,
    pub protein: Nutrient,
    pub fiber: Nutrient,
}

/// Product information for one detector class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: u32,
    pub gtin: String,
    pub name: String,
    pub nutri_score: i32,
    pub grade: NutriGrade,
    pub nutrients: Nutrients,
}

impl ProductRecord {
    pub fn display_color(&self) -> Rgba {
        self.grade.color()
    }
}

/// Lookup of product records by detector class id.
pub trait ProductCatalog: Send + Sync {
    fn lookup(&self, class_id: u32) -> Option<&ProductRecord>;
}

/// In-memory id to record map.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    records: HashMap<u32, ProductRecord>,
}

impl StaticCatalog {
    /// Parse the catalog bundled with this crate.
    pub fn builtin() -> ModelResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse a JSON array of product records.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let records: Vec<ProductRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<ProductRecord>) -> ModelResult<Self> {
        if records.is_empty() {
            return Err(ModelError::invalid_catalog("no product records"));
        }

        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            let id = record.id;
            if map.insert(id, record).is_some() {
                return Err(ModelError::DuplicateId(id));
            }
        }

        Ok(Self { records: map })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProductCatalog for StaticCatalog {
    fn lookup(&self, class_id: u32) -> Option<&ProductRecord> {
        self.records.get(&class_id)
    }
}
