//! Object categories and the project-scoped category registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::ids::CategoryId;
use crate::error::EditorError;

/// An RGBA display color with 8 bits per channel.
///
/// Serialized as `#rrggbbaa` so registry files stay readable and diffable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Creates an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates a color with an explicit alpha channel.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Deterministic color for a category name.
    ///
    /// The hue comes from the CRC-32C of the name; saturation and value are
    /// fixed so every generated color is readable on a dark image overlay.
    pub fn for_name(name: &str) -> Self {
        let hue = (crc32c::crc32c(name.as_bytes()) % 360) as f64;
        hsv_to_rgb(hue, 0.65, 0.9)
    }
}

fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Color {
    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let to_u8 = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::rgb(to_u8(r), to_u8(g), to_u8(b))
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r, self.g, self.b, self.a
        )
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parses `#rrggbb` or `#rrggbbaa` (case-insensitive, `#` optional).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let hex = raw.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!("invalid color '{raw}'; expected #rrggbb or #rrggbbaa"));
        }
        let channel = |idx: usize| {
            u8::from_str_radix(&hex[idx..idx + 2], 16)
                .map_err(|_| format!("invalid color '{raw}'; non-hex digit"))
        };
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A named object category with a display color.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectCategory {
    pub id: CategoryId,
    pub name: String,
    pub color: Color,
}

impl ObjectCategory {
    /// Creates a new category with the given properties.
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>, color: Color) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
        }
    }
}

/// Registry of all categories known to a project.
///
/// Names are unique. Iteration follows insertion order, which is also the
/// order categories are persisted in.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "Vec<ObjectCategory>", into = "Vec<ObjectCategory>")]
pub struct CategoryRegistry {
    categories: Vec<ObjectCategory>,
    // `None` once `u64::MAX` has been handed out or restored.
    next_id: Option<u64>,
}

impl CategoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            next_id: Some(1),
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Iterates categories in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectCategory> {
        self.categories.iter()
    }

    /// Adds a new category and returns its freshly assigned ID.
    ///
    /// Fails with [`EditorError::CategoryIdExhausted`] once the ID space is
    /// used up; IDs are never reused, even after removal.
    pub fn add(&mut self, name: impl Into<String>, color: Color) -> Result<CategoryId, EditorError> {
        let name = name.into();
        self.check_name_available(&name, None)?;
        let mut next = self.next_id.ok_or(EditorError::CategoryIdExhausted)?;
        while self.contains(CategoryId::new(next)) {
            next = next.checked_add(1).ok_or(EditorError::CategoryIdExhausted)?;
        }
        let id = CategoryId::new(next);
        self.next_id = next.checked_add(1);
        self.categories.push(ObjectCategory { id, name, color });
        Ok(id)
    }

    /// Inserts a category keeping its existing ID (used when restoring a project).
    pub fn insert(&mut self, category: ObjectCategory) -> Result<(), EditorError> {
        if self.contains(category.id) {
            return Err(EditorError::DuplicateCategoryId { id: category.id });
        }
        self.check_name_available(&category.name, None)?;
        self.next_id = match (self.next_id, category.id.as_u64().checked_add(1)) {
            (Some(next), Some(after)) => Some(next.max(after)),
            _ => None,
        };
        self.categories.push(category);
        Ok(())
    }

    /// Looks up a category by name, creating it with a name-derived color if missing.
    pub fn get_or_create(&mut self, name: &str) -> Result<CategoryId, EditorError> {
        match self.id_of(name) {
            Some(id) => Ok(id),
            None => self.add(name, Color::for_name(name)),
        }
    }

    pub fn get(&self, id: CategoryId) -> Option<&ObjectCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.get(id).is_some()
    }

    pub fn by_name(&self, name: &str) -> Option<&ObjectCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn id_of(&self, name: &str) -> Option<CategoryId> {
        self.by_name(name).map(|c| c.id)
    }

    /// Name of a category, or an error naming the dangling ID.
    pub fn name_of(&self, id: CategoryId) -> Result<&str, EditorError> {
        self.get(id)
            .map(|c| c.name.as_str())
            .ok_or(EditorError::UnknownCategory { id })
    }

    /// Renames a category. Fails if another category already uses `new_name`.
    pub fn rename(&mut self, id: CategoryId, new_name: impl Into<String>) -> Result<(), EditorError> {
        let new_name = new_name.into();
        self.check_name_available(&new_name, Some(id))?;
        let category = self.get_mut(id)?;
        category.name = new_name;
        Ok(())
    }

    pub fn set_color(&mut self, id: CategoryId, color: Color) -> Result<(), EditorError> {
        self.get_mut(id)?.color = color;
        Ok(())
    }

    /// Removes a category unconditionally.
    ///
    /// Callers holding shapes should go through
    /// [`ImageAnnotationData::remove_category`](super::ImageAnnotationData::remove_category),
    /// which refuses while the category is still in use.
    pub fn remove(&mut self, id: CategoryId) -> Result<ObjectCategory, EditorError> {
        let idx = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or(EditorError::UnknownCategory { id })?;
        Ok(self.categories.remove(idx))
    }

    /// Name to color mapping for exchange with other projects.
    pub fn color_map(&self) -> BTreeMap<String, Color> {
        self.categories
            .iter()
            .map(|c| (c.name.clone(), c.color))
            .collect()
    }

    /// Applies colors from an exchanged mapping to categories with matching names.
    ///
    /// Returns the number of categories whose color was set.
    pub fn apply_colors(&mut self, colors: &BTreeMap<String, Color>) -> usize {
        let mut applied = 0;
        for category in &mut self.categories {
            if let Some(color) = colors.get(&category.name) {
                category.color = *color;
                applied += 1;
            }
        }
        applied
    }

    fn get_mut(&mut self, id: CategoryId) -> Result<&mut ObjectCategory, EditorError> {
        self.categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(EditorError::UnknownCategory { id })
    }

    fn check_name_available(&self, name: &str, except: Option<CategoryId>) -> Result<(), EditorError> {
        if name.trim().is_empty() {
            return Err(EditorError::EmptyCategoryName);
        }
        match self.by_name(name) {
            Some(existing) if Some(existing.id) != except => Err(EditorError::DuplicateCategory {
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// The ID counter is bookkeeping, not content.
impl PartialEq for CategoryRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.categories == other.categories
    }
}

impl TryFrom<Vec<ObjectCategory>> for CategoryRegistry {
    type Error = EditorError;

    fn try_from(categories: Vec<ObjectCategory>) -> Result<Self, Self::Error> {
        let mut registry = CategoryRegistry::new();
        for category in categories {
            registry.insert(category)?;
        }
        Ok(registry)
    }
}

impl From<CategoryRegistry> for Vec<ObjectCategory> {
    fn from(registry: CategoryRegistry) -> Self {
        registry.categories
    }
}
