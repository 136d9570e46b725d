//! Drink composer.
//!
//! A drink is a named, ordered list of (liquid name, volume) parts. The
//! aggregate ABV and total volume are derived from the live liquid registry
//! whenever the part list is mutated, and never on read: editing a liquid's
//! ABV afterwards does not change a drink until it is recomputed.

use crate::liquid::LiquidRegistry;
use crate::profile::ProfileRegistry;
use crate::types::validate_name;
use crate::{Error, Limits, Result};
use serde::Serialize;

/// One liquid used in a drink
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DrinkPart {
    pub liquid: String,
    /// Volume in fl oz
    pub volume: f64,
}

impl DrinkPart {
    pub fn new(liquid: impl Into<String>, volume: f64) -> Self {
        Self {
            liquid: liquid.into(),
            volume,
        }
    }
}

/// A composed drink
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Drink {
    name: String,
    parts: Vec<DrinkPart>,
    abv: f64,
    total_volume: f64,
}

impl Drink {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[DrinkPart] {
        &self.parts
    }

    /// Volume-weighted ABV as of the last mutation
    pub fn abv(&self) -> f64 {
        self.abv
    }

    /// Total volume in fl oz
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    pub fn contains_liquid(&self, liquid: &str) -> bool {
        self.parts.iter().any(|p| p.liquid == liquid)
    }

    fn derive(&mut self, liquids: &LiquidRegistry) {
        let mut alcohol = 0.0;
        let mut total = 0.0;
        for part in &self.parts {
            match liquids.lookup_by_name(&part.liquid) {
                Some(liquid) => alcohol += liquid.abv() * part.volume,
                None => tracing::warn!(
                    "Drink {} references missing liquid {}",
                    self.name,
                    part.liquid
                ),
            }
            total += part.volume;
        }
        self.total_volume = total;
        self.abv = if total > 0.0 { alcohol / total } else { 0.0 };
    }
}

fn validate_parts(parts: &[DrinkPart], liquids: &LiquidRegistry, max: usize) -> Result<()> {
    if parts.is_empty() {
        return Err(Error::Validation("Must include at least one liquid".into()));
    }
    if parts.len() > max {
        return Err(Error::Validation(format!(
            "Max {} liquids in a drink",
            max
        )));
    }
    for part in parts {
        validate_part(part, liquids)?;
    }
    Ok(())
}

fn validate_part(part: &DrinkPart, liquids: &LiquidRegistry) -> Result<()> {
    if liquids.lookup_by_name(&part.liquid).is_none() {
        return Err(Error::Validation(format!(
            "Unknown liquid: {}",
            part.liquid
        )));
    }
    if !(part.volume.is_finite() && part.volume > 0.0) {
        return Err(Error::Validation(format!(
            "Volume of {} must be positive",
            part.liquid
        )));
    }
    Ok(())
}

/// Registry of drinks in insertion order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrinkComposer {
    drinks: Vec<Drink>,
    limits: Limits,
}

impl DrinkComposer {
    pub fn new(limits: Limits) -> Self {
        Self {
            drinks: Vec::new(),
            limits,
        }
    }

    /// Compose a new drink from `(liquid name, volume)` pairs
    pub fn compose(
        &mut self,
        name: &str,
        pairs: &[(&str, f64)],
        liquids: &LiquidRegistry,
    ) -> Result<&Drink> {
        let parts = pairs
            .iter()
            .map(|(liquid, volume)| DrinkPart::new(*liquid, *volume))
            .collect();
        self.insert(name, parts, liquids, true)
    }

    /// Insert a decoded drink without applying the configured name length,
    /// part count or registry capacity.
    pub(crate) fn restore(
        &mut self,
        name: &str,
        parts: Vec<DrinkPart>,
        liquids: &LiquidRegistry,
    ) -> Result<&Drink> {
        self.insert(name, parts, liquids, false)
    }

    fn insert(
        &mut self,
        name: &str,
        parts: Vec<DrinkPart>,
        liquids: &LiquidRegistry,
        enforce_limits: bool,
    ) -> Result<&Drink> {
        let (name_max, parts_max) = if enforce_limits {
            (self.limits.drink_name_max, self.limits.max_liquids_per_drink)
        } else {
            (usize::MAX, usize::MAX)
        };
        validate_name("Drink", name, name_max)?;
        if self.lookup_by_name(name).is_some() {
            return Err(Error::Validation(format!(
                "Drink with same name already exists: {}",
                name
            )));
        }
        validate_parts(&parts, liquids, parts_max)?;
        if enforce_limits && self.drinks.len() >= self.limits.max_drinks {
            return Err(Error::Capacity(format!(
                "Max drink storage of {} reached",
                self.limits.max_drinks
            )));
        }

        let mut drink = Drink {
            name: name.to_string(),
            parts,
            abv: 0.0,
            total_volume: 0.0,
        };
        drink.derive(liquids);
        tracing::debug!(
            "Composed drink {} ({:.3} abv, {} oz)",
            drink.name,
            drink.abv,
            drink.total_volume
        );
        self.drinks.push(drink);
        Ok(&self.drinks[self.drinks.len() - 1])
    }

    /// Linear scan in insertion order, first match wins
    pub fn lookup_by_name(&self, name: &str) -> Option<&Drink> {
        self.drinks.iter().find(|d| d.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Drink> {
        self.drinks
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(format!("Drink {}", name)))
    }

    /// Append a part to an existing drink
    pub fn add_liquid(
        &mut self,
        drink: &str,
        liquid: &str,
        volume: f64,
        liquids: &LiquidRegistry,
    ) -> Result<()> {
        let max = self.limits.max_liquids_per_drink;
        let target = self.get_mut(drink)?;
        if target.parts.len() >= max {
            return Err(Error::Capacity(format!(
                "{} already has the maximum of {} liquids",
                drink, max
            )));
        }
        let part = DrinkPart::new(liquid, volume);
        validate_part(&part, liquids)?;
        target.parts.push(part);
        target.derive(liquids);
        Ok(())
    }

    /// Drop the first part using `liquid`. A drink is never left empty.
    pub fn remove_liquid(
        &mut self,
        drink: &str,
        liquid: &str,
        liquids: &LiquidRegistry,
    ) -> Result<()> {
        let target = self.get_mut(drink)?;
        let idx = target
            .parts
            .iter()
            .position(|p| p.liquid == liquid)
            .ok_or_else(|| Error::NotFound(format!("{} is not part of {}", liquid, drink)))?;
        if target.parts.len() == 1 {
            return Err(Error::Validation(format!(
                "Cannot remove the last liquid of {}",
                drink
            )));
        }
        target.parts.remove(idx);
        target.derive(liquids);
        Ok(())
    }

    /// Rename a drink. Uniqueness against other drinks is the caller's job.
    pub fn rename(&mut self, drink: &str, new_name: &str) -> Result<()> {
        validate_name("Drink", new_name, self.limits.drink_name_max)?;
        self.get_mut(drink)?.name = new_name.to_string();
        Ok(())
    }

    /// Re-read liquid ABVs for one drink
    pub fn recompute(&mut self, drink: &str, liquids: &LiquidRegistry) -> Result<()> {
        self.get_mut(drink)?.derive(liquids);
        Ok(())
    }

    /// Remove a drink no profile history refers to
    pub fn remove(&mut self, name: &str, profiles: &ProfileRegistry) -> Result<Drink> {
        let idx = self
            .drinks
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(format!("Drink {}", name)))?;
        if profiles.references_drink(name) {
            return Err(Error::Constraint(format!(
                "Cannot delete {}: in a profile's drink history",
                name
            )));
        }
        tracing::info!("Removed drink {}", name);
        Ok(self.drinks.remove(idx))
    }

    pub fn references_liquid(&self, liquid: &str) -> bool {
        self.drinks.iter().any(|d| d.contains_liquid(liquid))
    }

    /// Point every part naming `old` at `new`
    pub(crate) fn rename_liquid_refs(&mut self, old: &str, new: &str) {
        for part in self.drinks.iter_mut().flat_map(|d| d.parts.iter_mut()) {
            if part.liquid == old {
                part.liquid = new.to_string();
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Drink> {
        self.drinks.iter()
    }

    pub fn len(&self) -> usize {
        self.drinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drinks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stocked() -> LiquidRegistry {
        let mut liquids = LiquidRegistry::new(Limits::default());
        liquids.register("Vodka", 0.4, 0.916).unwrap();
        liquids.register("Syrup", 0.0, 0.95).unwrap();
        liquids.register("Scotch", 0.43, 0.94).unwrap();
        liquids.register("151 Rum", 0.755, 0.98).unwrap();
        liquids.register("Sprite", 0.0, 1.037).unwrap();
        liquids
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_compose_weighted_average() {
        let liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());

        let drink = drinks
            .compose(
                "Strong One",
                &[("Vodka", 1.5), ("Syrup", 1.5), ("Scotch", 2.0), ("151 Rum", 1.5)],
                &liquids,
            )
            .unwrap();

        let expected = (0.4 * 1.5 + 0.0 * 1.5 + 0.43 * 2.0 + 0.755 * 1.5) / 6.5;
        assert!(approx(drink.total_volume(), 6.5));
        assert!(approx(drink.abv(), expected));
        assert_eq!(drink.parts().len(), 4);
        assert_eq!(drink.parts()[0].liquid, "Vodka");
    }

    #[test]
    fn test_compose_validation() {
        let liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());

        assert!(matches!(
            drinks.compose("Nothing", &[], &liquids),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            drinks.compose(
                "Too Many",
                &[
                    ("Vodka", 1.0),
                    ("Syrup", 1.0),
                    ("Scotch", 1.0),
                    ("151 Rum", 1.0),
                    ("Sprite", 1.0)
                ],
                &liquids
            ),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            drinks.compose("Ghost", &[("Absinthe", 1.0)], &liquids),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            drinks.compose("Dry", &[("Vodka", 0.0)], &liquids),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            drinks.compose("Bottomless", &[("Vodka", f64::INFINITY)], &liquids),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            drinks.compose("A name that is far too long", &[("Vodka", 1.0)], &liquids),
            Err(Error::Validation(_))
        ));

        drinks
            .compose("Vodka Sprite", &[("Vodka", 1.5), ("Sprite", 10.5)], &liquids)
            .unwrap();
        assert!(matches!(
            drinks.compose("Vodka Sprite", &[("Vodka", 1.0)], &liquids),
            Err(Error::Validation(_))
        ));
        assert_eq!(drinks.len(), 1);
    }

    #[test]
    fn test_compose_capacity() {
        let liquids = stocked();
        let limits = Limits {
            max_drinks: 1,
            ..Limits::default()
        };
        let mut drinks = DrinkComposer::new(limits);
        drinks.compose("Shot", &[("Vodka", 1.5)], &liquids).unwrap();
        assert!(matches!(
            drinks.compose("Double", &[("Vodka", 3.0)], &liquids),
            Err(Error::Capacity(_))
        ));
    }

    #[test]
    fn test_restore_ignores_current_limits() {
        let liquids = stocked();
        let limits = Limits {
            max_drinks: 1,
            max_liquids_per_drink: 1,
            ..Limits::default()
        };
        let mut drinks = DrinkComposer::new(limits);
        drinks
            .restore("Shot", vec![DrinkPart::new("Vodka", 1.5)], &liquids)
            .unwrap();
        drinks
            .restore(
                "Vodka Sprite",
                vec![DrinkPart::new("Vodka", 1.5), DrinkPart::new("Sprite", 10.5)],
                &liquids,
            )
            .unwrap();
        assert_eq!(drinks.len(), 2);

        assert!(drinks
            .restore("Shot", vec![DrinkPart::new("Vodka", 1.0)], &liquids)
            .is_err());
        assert!(drinks
            .restore("Broken", vec![DrinkPart::new("Vodka", f64::INFINITY)], &liquids)
            .is_err());
    }

    #[test]
    fn test_add_and_remove_liquid_rederive() {
        let liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());
        drinks.compose("Mix", &[("Vodka", 2.0)], &liquids).unwrap();

        drinks.add_liquid("Mix", "Sprite", 6.0, &liquids).unwrap();
        let mix = drinks.lookup_by_name("Mix").unwrap();
        assert!(approx(mix.total_volume(), 8.0));
        assert!(approx(mix.abv(), 0.1));

        drinks.remove_liquid("Mix", "Vodka", &liquids).unwrap();
        let mix = drinks.lookup_by_name("Mix").unwrap();
        assert!(approx(mix.total_volume(), 6.0));
        assert!(approx(mix.abv(), 0.0));

        assert!(matches!(
            drinks.remove_liquid("Mix", "Scotch", &liquids),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            drinks.remove_liquid("Mix", "Sprite", &liquids),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_add_liquid_at_capacity() {
        let liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());
        drinks
            .compose(
                "Full",
                &[("Vodka", 1.0), ("Syrup", 1.0), ("Scotch", 1.0), ("151 Rum", 1.0)],
                &liquids,
            )
            .unwrap();
        assert!(matches!(
            drinks.add_liquid("Full", "Sprite", 1.0, &liquids),
            Err(Error::Capacity(_))
        ));
    }

    #[test]
    fn test_abv_snapshot_until_recompute() {
        let mut liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());
        drinks.compose("Shot", &[("Vodka", 1.5)], &liquids).unwrap();

        liquids.set_abv("Vodka", 0.5).unwrap();
        assert!(approx(drinks.lookup_by_name("Shot").unwrap().abv(), 0.4));

        drinks.recompute("Shot", &liquids).unwrap();
        assert!(approx(drinks.lookup_by_name("Shot").unwrap().abv(), 0.5));
    }

    #[test]
    fn test_rename_checks_length_only() {
        let liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());
        drinks.compose("Shot", &[("Vodka", 1.5)], &liquids).unwrap();
        drinks.compose("Other", &[("Scotch", 1.5)], &liquids).unwrap();

        assert!(matches!(
            drinks.rename("Shot", "A name that is far too long"),
            Err(Error::Validation(_))
        ));
        drinks.rename("Shot", "Vodka Shot").unwrap();
        assert!(drinks.lookup_by_name("Vodka Shot").is_some());

        // Duplicate names are not rejected here; lookup keeps first-match-wins
        drinks.rename("Other", "Vodka Shot").unwrap();
        assert_eq!(
            drinks.lookup_by_name("Vodka Shot").unwrap().parts()[0].liquid,
            "Vodka"
        );
    }

    #[test]
    fn test_remove_blocked_by_profile_history() {
        let liquids = stocked();
        let mut drinks = DrinkComposer::new(Limits::default());
        let mut profiles = ProfileRegistry::new(Limits::default());
        drinks.compose("Shot", &[("Vodka", 1.5)], &liquids).unwrap();
        profiles
            .register("Brian", crate::Sex::Male, 165.0, crate::Experience::Heavy)
            .unwrap();
        profiles.add_consumption("Brian", "Shot", &drinks).unwrap();

        assert!(matches!(
            drinks.remove("Shot", &profiles),
            Err(Error::Constraint(_))
        ));

        let empty = ProfileRegistry::new(Limits::default());
        assert!(drinks.remove("Shot", &empty).is_ok());
        assert!(drinks.is_empty());
    }
}
