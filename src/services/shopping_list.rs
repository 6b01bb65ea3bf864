//! Shopping list aggregation
//!
//! Folds cart entries into one list: the source recipe names in cart order,
//! and for each ingredient the summed amount per measurement unit. Amounts
//! in different units of the same ingredient are kept apart, never converted.

use crate::models::CartEntry;
use std::collections::HashMap;

/// Summed amounts of one ingredient, per unit in first-seen order
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientTotal {
    pub name: String,
    pub units: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShoppingList {
    /// Recipe names in cart order, duplicates kept
    pub recipe_names: Vec<String>,
    /// Ingredients in first-seen order
    pub totals: Vec<IngredientTotal>,
}

impl ShoppingList {
    pub fn from_entries(entries: &[CartEntry]) -> Self {
        let mut list = ShoppingList::default();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for entry in entries {
            list.recipe_names.push(entry.recipe_name.clone());

            for line in &entry.lines {
                let slot = *index.entry(line.name.as_str()).or_insert_with(|| {
                    list.totals.push(IngredientTotal {
                        name: line.name.clone(),
                        units: Vec::new(),
                    });
                    list.totals.len() - 1
                });

                let units = &mut list.totals[slot].units;
                match units.iter_mut().find(|(unit, _)| *unit == line.measurement_unit) {
                    Some((_, amount)) => *amount += line.amount,
                    None => units.push((line.measurement_unit.clone(), line.amount)),
                }
            }
        }

        list
    }

    pub fn is_empty(&self) -> bool {
        self.recipe_names.is_empty()
    }

    /// Summed amount of `name` measured in `unit`
    pub fn total(&self, name: &str, unit: &str) -> Option<f64> {
        self.totals
            .iter()
            .find(|t| t.name == name)?
            .units
            .iter()
            .find(|(u, _)| u == unit)
            .map(|(_, amount)| *amount)
    }

    /// `Shopping list for: <names>.`, or empty for an empty list
    pub fn header(&self) -> String {
        if self.recipe_names.is_empty() {
            return String::new();
        }
        format!("Shopping list for: {}.", self.recipe_names.join(", "))
    }

    /// Plain-text rendering: header, blank line, one `name: amount unit` line
    /// per ingredient and unit.
    pub fn to_text(&self) -> String {
        let mut text = self.header();
        text.push_str("\n\n");
        for total in &self.totals {
            for (unit, amount) in &total.units {
                text.push_str(&format!("{}: {} {}\n", total.name, amount, unit));
            }
        }
        text
    }
}
