//! The bar: the three registries plus the unsaved Guest profile.
//!
//! Operations that span registries live here: constrained deletes,
//! cascading renames, vacate-then-assign container loading and pouring a
//! drink. Profile edits with no cross-registry effect go through
//! `profiles_mut`.

use crate::drink::{Drink, DrinkComposer};
use crate::liquid::LiquidRegistry;
use crate::profile::{local_now, Profile, ProfileRegistry};
use crate::{Container, Error, Experience, Limits, Result, Sex};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Bar {
    liquids: LiquidRegistry,
    drinks: DrinkComposer,
    profiles: ProfileRegistry,
    guest: Profile,
    limits: Limits,
}

impl Bar {
    pub fn new(limits: Limits) -> Self {
        Self::from_parts(
            LiquidRegistry::new(limits),
            DrinkComposer::new(limits),
            ProfileRegistry::new(limits),
        )
    }

    pub fn from_parts(
        liquids: LiquidRegistry,
        drinks: DrinkComposer,
        profiles: ProfileRegistry,
    ) -> Self {
        let limits = *liquids.limits();
        Self {
            liquids,
            drinks,
            profiles,
            guest: Profile::guest(),
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn liquids(&self) -> &LiquidRegistry {
        &self.liquids
    }

    pub fn drinks(&self) -> &DrinkComposer {
        &self.drinks
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    pub fn guest(&self) -> &Profile {
        &self.guest
    }

    pub fn profiles_mut(&mut self) -> &mut ProfileRegistry {
        &mut self.profiles
    }

    // ------------------------------------------------------------------
    // Liquids
    // ------------------------------------------------------------------

    pub fn register_liquid(&mut self, name: &str, abv: f64, density: f64) -> Result<()> {
        self.liquids.register(name, abv, density).map(|_| ())
    }

    /// Load a liquid into a container, first vacating whatever held it.
    ///
    /// Returns the displaced liquid, if another one was there.
    pub fn assign_container(
        &mut self,
        name: &str,
        container: Container,
        volume: f64,
    ) -> Result<Option<String>> {
        if self.liquids.lookup_by_name(name).is_none() {
            return Err(Error::NotFound(format!("Liquid {}", name)));
        }
        self.liquids.validate_fill(container, volume)?;

        let displaced = self
            .liquids
            .vacate(container)
            .filter(|previous| previous != name);
        self.liquids.assign_container(name, container, volume)?;

        if let Some(previous) = &displaced {
            tracing::info!("{} replaced {} in {}", name, previous, container.display_name());
        }
        Ok(displaced)
    }

    /// Empty a container; returns the liquid that was in it
    pub fn unassign(&mut self, container: Container) -> Option<String> {
        self.liquids.vacate(container)
    }

    pub fn remove_liquid(&mut self, name: &str) -> Result<()> {
        self.liquids.remove(name, &self.drinks).map(|_| ())
    }

    /// Rename a liquid and every drink part that uses it
    pub fn rename_liquid(&mut self, name: &str, new_name: &str) -> Result<()> {
        self.liquids.rename(name, new_name)?;
        self.drinks.rename_liquid_refs(name, new_name);
        Ok(())
    }

    /// Change a liquid's ABV. Drinks keep their stored ABV until recomputed.
    pub fn set_liquid_abv(&mut self, name: &str, abv: f64) -> Result<()> {
        self.liquids.set_abv(name, abv)
    }

    pub fn set_liquid_density(&mut self, name: &str, density: f64) -> Result<()> {
        self.liquids.set_density(name, density)
    }

    /// Liquid name currently in each physical slot
    pub fn occupancy(&self) -> BTreeMap<&'static str, Option<String>> {
        self.liquids
            .occupancy()
            .into_iter()
            .map(|(code, liquid)| (code, liquid.map(|l| l.name().to_string())))
            .collect()
    }

    // ------------------------------------------------------------------
    // Drinks
    // ------------------------------------------------------------------

    pub fn compose_drink(&mut self, name: &str, pairs: &[(&str, f64)]) -> Result<()> {
        self.drinks.compose(name, pairs, &self.liquids).map(|_| ())
    }

    pub fn add_liquid_to_drink(&mut self, drink: &str, liquid: &str, volume: f64) -> Result<()> {
        self.drinks.add_liquid(drink, liquid, volume, &self.liquids)
    }

    pub fn remove_liquid_from_drink(&mut self, drink: &str, liquid: &str) -> Result<()> {
        self.drinks.remove_liquid(drink, liquid, &self.liquids)
    }

    /// Re-read liquid ABVs for one drink
    pub fn recompute_drink(&mut self, drink: &str) -> Result<()> {
        self.drinks.recompute(drink, &self.liquids)
    }

    /// Rename a drink, rejecting clashes, and update profile histories
    pub fn rename_drink(&mut self, name: &str, new_name: &str) -> Result<()> {
        if name != new_name && self.drinks.lookup_by_name(new_name).is_some() {
            return Err(Error::Validation(format!(
                "Drink with same name already exists: {}",
                new_name
            )));
        }
        self.drinks.rename(name, new_name)?;
        self.profiles.rename_drink_refs(name, new_name);
        self.guest.rename_drink_refs(name, new_name);
        Ok(())
    }

    /// Remove a drink no saved profile or the Guest has on record
    pub fn remove_drink(&mut self, name: &str) -> Result<()> {
        if self.guest.consumptions().iter().any(|c| c.drink == name) {
            return Err(Error::Constraint(format!(
                "Cannot delete {}: in {}'s drink history",
                name,
                crate::profile::GUEST_NAME
            )));
        }
        self.drinks.remove(name, &self.profiles).map(|_| ())
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn register_profile(
        &mut self,
        name: &str,
        sex: Sex,
        weight: f64,
        experience: Experience,
    ) -> Result<()> {
        self.profiles
            .register(name, sex, weight, experience)
            .map(|_| ())
    }

    pub fn remove_profile(&mut self, name: &str) -> Result<()> {
        self.profiles.remove(name).map(|_| ())
    }

    /// Record a consumption at an explicit time
    pub fn add_consumption_at(
        &mut self,
        profile: &str,
        drink: &str,
        at: NaiveDateTime,
    ) -> Result<f64> {
        self.profiles
            .add_consumption_at(profile, drink, at, &self.drinks)
    }

    /// Current BAC of a profile, or of the Guest when `profile` is `None`
    pub fn bac(&mut self, profile: Option<&str>) -> Result<f64> {
        self.bac_at(profile, local_now())
    }

    pub fn bac_at(&mut self, profile: Option<&str>, now: NaiveDateTime) -> Result<f64> {
        match profile {
            Some(name) => self.profiles.bac_at(name, &self.drinks, now),
            None => Ok(self
                .guest
                .bac_at(&self.drinks, now, self.limits.session_window())),
        }
    }

    // ------------------------------------------------------------------
    // Pouring
    // ------------------------------------------------------------------

    /// Pour a drink for a profile (the Guest when `None`).
    ///
    /// Every liquid must be loaded in a container with enough volume left;
    /// nothing is consumed unless all of them are. Returns the drinker's BAC
    /// after the pour.
    pub fn pour(&mut self, drink: &str, profile: Option<&str>) -> Result<f64> {
        self.pour_at(drink, profile, local_now())
    }

    pub fn pour_at(
        &mut self,
        drink: &str,
        profile: Option<&str>,
        at: NaiveDateTime,
    ) -> Result<f64> {
        let recipe = self
            .drinks
            .lookup_by_name(drink)
            .ok_or_else(|| Error::NotFound(format!("Drink {}", drink)))?;
        if let Some(name) = profile {
            if self.profiles.lookup_by_name(name).is_none() {
                return Err(Error::NotFound(format!("Profile {}", name)));
            }
        }

        let needed = required_volumes(recipe);
        for (liquid, amount) in &needed {
            let stored = self.liquids.lookup_by_name(liquid).ok_or_else(|| {
                Error::NotFound(format!("Liquid {}", liquid))
            })?;
            if !stored.container().is_assigned() {
                return Err(Error::Constraint(format!(
                    "Unable to make {}! {} is not in storage",
                    drink, liquid
                )));
            }
            if *amount > stored.volume_left() {
                return Err(Error::InsufficientVolume {
                    liquid: liquid.clone(),
                    requested: *amount,
                    remaining: stored.volume_left(),
                });
            }
        }

        for (liquid, amount) in &needed {
            self.liquids.consume(liquid, *amount)?;
        }
        tracing::info!("Poured {} for {}", drink, profile.unwrap_or(crate::profile::GUEST_NAME));

        match profile {
            Some(name) => self.profiles.add_consumption_at(name, drink, at, &self.drinks),
            None => {
                let window = self.limits.session_window();
                Ok(self.guest.add_consumption(drink, at, &self.drinks, window))
            }
        }
    }
}

/// Total volume drawn from each liquid, in recipe order
fn required_volumes(drink: &Drink) -> Vec<(String, f64)> {
    let mut needed: Vec<(String, f64)> = Vec::new();
    for part in drink.parts() {
        match needed.iter_mut().find(|(name, _)| *name == part.liquid) {
            Some((_, amount)) => *amount += part.volume,
            None => needed.push((part.liquid.clone(), part.volume)),
        }
    }
    needed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 4, 10)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn stocked() -> Bar {
        let mut bar = Bar::new(Limits::default());
        bar.register_liquid("Vodka", 0.4, 0.916).unwrap();
        bar.register_liquid("Sprite", 0.0, 1.037).unwrap();
        bar.register_liquid("Scotch", 0.43, 0.94).unwrap();
        bar.assign_container("Vodka", Container::BackLeft, 3.0).unwrap();
        bar.assign_container("Sprite", Container::BackRight, 16.0)
            .unwrap();
        bar.compose_drink("Vodka Sprite", &[("Vodka", 1.5), ("Sprite", 10.5)])
            .unwrap();
        bar.compose_drink("Neat", &[("Scotch", 2.0)]).unwrap();
        bar.register_profile("Brian", Sex::Male, 165.0, Experience::Heavy)
            .unwrap();
        bar
    }

    #[test]
    fn test_assign_vacates_previous_occupant() {
        let mut bar = stocked();
        let displaced = bar
            .assign_container("Scotch", Container::BackLeft, 8.0)
            .unwrap();
        assert_eq!(displaced, Some("Vodka".to_string()));

        let vodka = bar.liquids().lookup_by_name("Vodka").unwrap();
        assert_eq!(vodka.container(), Container::Unassigned);
        assert_eq!(vodka.volume_left(), 0.0);
        assert_eq!(bar.occupancy()["BL"], Some("Scotch".to_string()));
    }

    #[test]
    fn test_assign_rejected_before_vacating() {
        let mut bar = stocked();
        assert!(bar
            .assign_container("Scotch", Container::BackLeft, 20.0)
            .is_err());
        assert_eq!(bar.occupancy()["BL"], Some("Vodka".to_string()));
    }

    #[test]
    fn test_refill_same_slot() {
        let mut bar = stocked();
        let displaced = bar
            .assign_container("Vodka", Container::BackLeft, 10.0)
            .unwrap();
        assert_eq!(displaced, None);
        assert_eq!(
            bar.liquids().lookup_by_name("Vodka").unwrap().volume_left(),
            10.0
        );
    }

    #[test]
    fn test_remove_liquid_after_unassign() {
        let mut bar = stocked();
        bar.register_liquid("Gin", 0.4, 0.95).unwrap();
        bar.assign_container("Gin", Container::FrontLeft, 4.0).unwrap();
        assert!(matches!(bar.remove_liquid("Gin"), Err(Error::Constraint(_))));

        bar.assign_container("Gin", Container::Unassigned, 0.0).unwrap();
        bar.remove_liquid("Gin").unwrap();
        assert!(bar.liquids().lookup_by_name("Gin").is_none());
    }

    #[test]
    fn test_rename_liquid_cascades_to_drinks() {
        let mut bar = stocked();
        bar.rename_liquid("Vodka", "Grey Goose").unwrap();
        let drink = bar.drinks().lookup_by_name("Vodka Sprite").unwrap();
        assert_eq!(drink.parts()[0].liquid, "Grey Goose");
        assert!(bar.drinks().references_liquid("Grey Goose"));
        assert!(!bar.drinks().references_liquid("Vodka"));
    }

    #[test]
    fn test_rename_drink_cascades_to_history() {
        let mut bar = stocked();
        bar.pour_at("Vodka Sprite", Some("Brian"), at(20)).unwrap();
        assert!(matches!(
            bar.rename_drink("Vodka Sprite", "Neat"),
            Err(Error::Validation(_))
        ));
        bar.rename_drink("Vodka Sprite", "Highball").unwrap();
        let brian = bar.profiles().lookup_by_name("Brian").unwrap();
        assert_eq!(brian.consumptions()[0].drink, "Highball");
        assert!(matches!(bar.remove_drink("Highball"), Err(Error::Constraint(_))));
    }

    #[test]
    fn test_pour_consumes_and_records() {
        let mut bar = stocked();
        let bac = bar.pour_at("Vodka Sprite", Some("Brian"), at(20)).unwrap();
        assert!(bac > 0.0);

        assert_eq!(bar.liquids().lookup_by_name("Vodka").unwrap().volume_left(), 1.5);
        assert_eq!(bar.liquids().lookup_by_name("Sprite").unwrap().volume_left(), 5.5);
        let brian = bar.profiles().lookup_by_name("Brian").unwrap();
        assert_eq!(brian.consumptions().len(), 1);
        assert_eq!(bar.bac_at(Some("Brian"), at(20)).unwrap(), bac);
    }

    #[test]
    fn test_pour_is_all_or_nothing() {
        let mut bar = stocked();
        bar.pour_at("Vodka Sprite", None, at(20)).unwrap();

        // Sprite now has 5.5 oz left, short of the 10.5 needed
        let err = bar.pour_at("Vodka Sprite", None, at(21)).unwrap_err();
        assert!(matches!(err, Error::InsufficientVolume { .. }));
        assert_eq!(bar.liquids().lookup_by_name("Vodka").unwrap().volume_left(), 1.5);
        assert_eq!(bar.guest().consumptions().len(), 1);
    }

    #[test]
    fn test_pour_requires_loaded_liquid() {
        let mut bar = stocked();
        assert!(matches!(
            bar.pour_at("Neat", None, at(20)),
            Err(Error::Constraint(_))
        ));
        assert!(matches!(
            bar.pour_at("Martini", None, at(20)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            bar.pour_at("Neat", Some("Nobody"), at(20)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_drink_blocked_by_guest_history() {
        let mut bar = stocked();
        bar.pour_at("Vodka Sprite", None, at(20)).unwrap();
        let bac = bar.bac_at(None, at(20)).unwrap();

        assert!(matches!(
            bar.remove_drink("Vodka Sprite"),
            Err(Error::Constraint(_))
        ));
        assert!(bar.drinks().lookup_by_name("Vodka Sprite").is_some());
        assert_eq!(bar.bac_at(None, at(20)).unwrap(), bac);

        bar.remove_drink("Neat").unwrap();
    }

    #[test]
    fn test_guest_bac_is_tracked_in_memory() {
        let mut bar = stocked();
        bar.pour_at("Vodka Sprite", None, at(20)).unwrap();
        assert!(bar.bac_at(None, at(20)).unwrap() > 0.0);
        assert!(bar.profiles().iter().all(|p| p.consumptions().is_empty()));
    }

    #[test]
    fn test_abv_change_applies_on_recompute() {
        let mut bar = stocked();
        let before = bar.drinks().lookup_by_name("Vodka Sprite").unwrap().abv();
        bar.set_liquid_abv("Vodka", 0.5).unwrap();
        assert_eq!(bar.drinks().lookup_by_name("Vodka Sprite").unwrap().abv(), before);

        bar.recompute_drink("Vodka Sprite").unwrap();
        let after = bar.drinks().lookup_by_name("Vodka Sprite").unwrap().abv();
        assert!((after - 0.75 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_edits_through_registry() {
        let mut bar = stocked();
        bar.profiles_mut().set_weight("Brian", 180.0).unwrap();
        bar.profiles_mut().rename("Brian", "Bryan").unwrap();
        assert_eq!(bar.profiles().lookup_by_name("Bryan").unwrap().weight(), 180.0);
        bar.remove_profile("Bryan").unwrap();
        assert!(bar.profiles().is_empty());
    }

    #[test]
    fn test_required_volumes_merges_repeated_liquid() {
        let mut bar = stocked();
        bar.compose_drink("Double", &[("Vodka", 1.0), ("Sprite", 2.0), ("Vodka", 1.5)])
            .unwrap();
        let needed = required_volumes(bar.drinks().lookup_by_name("Double").unwrap());
        assert_eq!(
            needed,
            vec![("Vodka".to_string(), 2.5), ("Sprite".to_string(), 2.0)]
        );
    }
}
