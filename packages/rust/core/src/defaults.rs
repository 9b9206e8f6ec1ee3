//! Category-level defaults used when a material omits a field.

use matkb_shared::{Category, Complexity};

/// Defaults shared by every material in a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryDefaults {
    pub category: Category,
    pub complexity: Complexity,
    pub difficulty_score: i64,
    pub applications: &'static [&'static str],
}

impl CategoryDefaults {
    pub fn for_category(category: Category) -> Self {
        let (complexity, difficulty_score) = match category {
            Category::Masonry => (Complexity::Medium, 2),
            Category::Metal | Category::Stone | Category::Wood => (Complexity::Medium, 3),
            Category::Semiconductor => (Complexity::High, 5),
            Category::Ceramic | Category::Composite | Category::Glass | Category::Plastic => {
                (Complexity::High, 4)
            }
        };

        Self {
            category,
            complexity,
            difficulty_score,
            applications: default_applications(category),
        }
    }

    pub fn applications(&self) -> Vec<String> {
        self.applications.iter().map(|s| (*s).to_string()).collect()
    }
}

fn default_applications(category: Category) -> &'static [&'static str] {
    match category {
        Category::Ceramic => &["Aerospace Components", "Medical Devices", "Electronics"],
        Category::Composite => &["Aerospace", "Automotive", "Marine"],
        Category::Glass => &["Optics", "Architecture", "Laboratory Equipment"],
        Category::Masonry => &["Heritage Restoration", "Construction", "Graffiti Removal"],
        Category::Metal => &["Industrial Manufacturing", "Automotive", "Aerospace"],
        Category::Plastic => &["Mold Cleaning", "Automotive Interiors", "Consumer Products"],
        Category::Semiconductor => &["Wafer Processing", "Microelectronics", "Photovoltaics"],
        Category::Stone => &["Monument Conservation", "Architecture", "Sculpture"],
        Category::Wood => &[
            "Furniture Restoration",
            "Heritage Timber",
            "Fire Damage Remediation",
        ],
    }
}

/// Category used when nothing in the input names a valid one.
pub const FALLBACK_CATEGORY: Category = Category::Metal;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_valid_defaults() {
        for category in Category::ALL {
            let defaults = CategoryDefaults::for_category(category);
            assert_eq!(defaults.category, category);
            assert!((1..=5).contains(&defaults.difficulty_score));
            assert!(!defaults.applications.is_empty());
        }
    }
}
