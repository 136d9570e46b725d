//! Drinker profiles and the BAC engine.
//!
//! Each profile keeps an ordered history of consumption records. BAC is
//! never cached: every read recomputes the decayed contribution of each
//! record against the wall clock and prunes records that have fully decayed
//! and are older than the session window.
//!
//! ## Per-drink contribution
//!
//! ```text
//! body_water_ml  = weight_lb / 2.2046 * water_const * 1000
//! grams_alcohol  = 29.57 * (abv * total_volume_oz) * 0.79
//! initial_bac    = grams_alcohol / body_water_ml * 0.806 * 100
//! contribution   = initial_bac - elimination_rate * hours_elapsed
//! ```
//!
//! The profile total is the sum of the positive contributions. Individual
//! contributions are not clamped; a non-positive value marks the record as
//! eligible for expiry once the session window has passed.

use crate::drink::{Drink, DrinkComposer};
use crate::types::validate_name;
use crate::{Error, Experience, Limits, Result, Sex};
use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use serde::Serialize;

/// Reserved name of the in-memory profile used when nobody is signed in
pub const GUEST_NAME: &str = "Guest";

const LB_PER_KG: f64 = 2.2046;
const ML_PER_OZ: f64 = 29.57;
const ETHANOL_DENSITY_G_PER_ML: f64 = 0.79;
const BLOOD_WATER_FRACTION: f64 = 0.806;

/// Current local wall-clock time at one-second precision
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// A drink poured for a profile
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Consumption {
    pub at: NaiveDateTime,
    pub drink: String,
}

/// A drinker profile
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Profile {
    name: String,
    sex: Sex,
    weight: f64,
    experience: Experience,
    consumptions: Vec<Consumption>,
}

impl Profile {
    /// The unsaved Guest profile: Male, 160 lb, Regular
    pub fn guest() -> Self {
        Self {
            name: GUEST_NAME.to_string(),
            sex: Sex::Male,
            weight: 160.0,
            experience: Experience::Regular,
            consumptions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    /// Body weight in pounds
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn experience(&self) -> Experience {
        self.experience
    }

    pub fn consumptions(&self) -> &[Consumption] {
        &self.consumptions
    }

    pub fn is_guest(&self) -> bool {
        self.name == GUEST_NAME
    }

    /// BAC (g/100 mL) a drink adds at the moment it is consumed
    pub fn initial_bac(&self, drink: &Drink) -> f64 {
        let weight_kg = self.weight / LB_PER_KG;
        let body_water_ml = weight_kg * self.sex.water_constant() * 1000.0;
        let oz_alcohol = drink.abv() * drink.total_volume();
        let grams_alcohol = ML_PER_OZ * oz_alcohol * ETHANOL_DENSITY_G_PER_ML;
        grams_alcohol / body_water_ml * BLOOD_WATER_FRACTION * 100.0
    }

    /// Decayed contribution of a drink after `hours_elapsed`. May be negative.
    pub fn contribution(&self, drink: &Drink, hours_elapsed: f64) -> f64 {
        self.initial_bac(drink) - self.experience.elimination_rate() * hours_elapsed
    }

    pub(crate) fn rename_drink_refs(&mut self, old: &str, new: &str) {
        for record in self.consumptions.iter_mut().filter(|c| c.drink == old) {
            record.drink = new.to_string();
        }
    }

    /// Append a record and run a recompute/prune pass as of `at`
    pub fn add_consumption(
        &mut self,
        drink: &str,
        at: NaiveDateTime,
        drinks: &DrinkComposer,
        session_window: Duration,
    ) -> f64 {
        self.consumptions.push(Consumption {
            at: at.trunc_subsecs(0),
            drink: drink.to_string(),
        });
        self.bac_at(drinks, at, session_window)
    }

    /// Recompute BAC as of `now`, pruning expired records
    pub fn bac_at(
        &mut self,
        drinks: &DrinkComposer,
        now: NaiveDateTime,
        session_window: Duration,
    ) -> f64 {
        let mut total = 0.0;
        let before = self.consumptions.len();

        let mut records = std::mem::take(&mut self.consumptions);
        records.retain(|record| {
            let elapsed = now - record.at;
            let hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
            let contribution = drinks
                .lookup_by_name(&record.drink)
                .map(|drink| self.contribution(drink, hours))
                .unwrap_or(0.0);

            if contribution > 0.0 {
                total += contribution;
            }
            contribution > 0.0 || elapsed <= session_window
        });
        self.consumptions = records;

        let pruned = before - self.consumptions.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} expired drinks from {}", pruned, self.name);
        }
        total
    }
}

fn validate_profile_name(name: &str, max: usize) -> Result<()> {
    validate_name("Profile", name, max)?;
    if name.eq_ignore_ascii_case(GUEST_NAME) {
        return Err(Error::Validation(format!(
            "{} is a reserved profile name",
            GUEST_NAME
        )));
    }
    Ok(())
}

fn validate_weight(weight: f64) -> Result<()> {
    if !(weight > 0.0 && weight.is_finite()) {
        return Err(Error::Validation("Weight must be a positive number".into()));
    }
    Ok(())
}

/// Registry of drinker profiles in insertion order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileRegistry {
    profiles: Vec<Profile>,
    limits: Limits,
}

impl ProfileRegistry {
    pub fn new(limits: Limits) -> Self {
        Self {
            profiles: Vec::new(),
            limits,
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        sex: Sex,
        weight: f64,
        experience: Experience,
    ) -> Result<&Profile> {
        self.insert(name, sex, weight, experience, true)
    }

    /// Insert a decoded profile without applying the configured name length
    /// or registry capacity.
    pub(crate) fn restore(
        &mut self,
        name: &str,
        sex: Sex,
        weight: f64,
        experience: Experience,
    ) -> Result<&Profile> {
        self.insert(name, sex, weight, experience, false)
    }

    fn insert(
        &mut self,
        name: &str,
        sex: Sex,
        weight: f64,
        experience: Experience,
        enforce_limits: bool,
    ) -> Result<&Profile> {
        let name_max = if enforce_limits {
            self.limits.profile_name_max
        } else {
            usize::MAX
        };
        validate_profile_name(name, name_max)?;
        if self.lookup_by_name(name).is_some() {
            return Err(Error::Validation(format!(
                "Profile with same name already exists: {}",
                name
            )));
        }
        validate_weight(weight)?;
        if enforce_limits && self.profiles.len() >= self.limits.max_profiles {
            return Err(Error::Capacity(format!(
                "Max of {} profiles reached",
                self.limits.max_profiles
            )));
        }

        self.profiles.push(Profile {
            name: name.to_string(),
            sex,
            weight,
            experience,
            consumptions: Vec::new(),
        });
        tracing::debug!("Registered profile {}", name);
        Ok(&self.profiles[self.profiles.len() - 1])
    }

    /// Linear scan in insertion order, first match wins
    pub fn lookup_by_name(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Profile> {
        self.profiles
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::NotFound(format!("Profile {}", name)))
    }

    /// Record that `profile` drank `drink` now
    pub fn add_consumption(
        &mut self,
        profile: &str,
        drink: &str,
        drinks: &DrinkComposer,
    ) -> Result<f64> {
        self.add_consumption_at(profile, drink, local_now(), drinks)
    }

    /// Record that `profile` drank `drink` at `at`
    pub fn add_consumption_at(
        &mut self,
        profile: &str,
        drink: &str,
        at: NaiveDateTime,
        drinks: &DrinkComposer,
    ) -> Result<f64> {
        if drinks.lookup_by_name(drink).is_none() {
            return Err(Error::NotFound(format!("Drink {}", drink)));
        }
        let window = self.limits.session_window();
        let target = self.get_mut(profile)?;
        Ok(target.add_consumption(drink, at, drinks, window))
    }

    /// Current BAC of a profile; prunes expired records
    pub fn get_bac(&mut self, profile: &str, drinks: &DrinkComposer) -> Result<f64> {
        self.bac_at(profile, drinks, local_now())
    }

    pub fn bac_at(
        &mut self,
        profile: &str,
        drinks: &DrinkComposer,
        now: NaiveDateTime,
    ) -> Result<f64> {
        let window = self.limits.session_window();
        Ok(self.get_mut(profile)?.bac_at(drinks, now, window))
    }

    pub fn remove(&mut self, name: &str) -> Result<Profile> {
        let idx = self
            .profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| Error::NotFound(format!("Profile {}", name)))?;
        tracing::info!("Removed profile {}", name);
        Ok(self.profiles.remove(idx))
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        validate_profile_name(new_name, self.limits.profile_name_max)?;
        if name != new_name && self.lookup_by_name(new_name).is_some() {
            return Err(Error::Validation(format!(
                "Profile with same name already exists: {}",
                new_name
            )));
        }
        self.get_mut(name)?.name = new_name.to_string();
        Ok(())
    }

    pub fn set_sex(&mut self, name: &str, sex: Sex) -> Result<()> {
        self.get_mut(name)?.sex = sex;
        Ok(())
    }

    pub fn set_weight(&mut self, name: &str, weight: f64) -> Result<()> {
        validate_weight(weight)?;
        self.get_mut(name)?.weight = weight;
        Ok(())
    }

    pub fn set_experience(&mut self, name: &str, experience: Experience) -> Result<()> {
        self.get_mut(name)?.experience = experience;
        Ok(())
    }

    pub fn references_drink(&self, drink: &str) -> bool {
        self.profiles
            .iter()
            .flat_map(|p| p.consumptions.iter())
            .any(|c| c.drink == drink)
    }

    /// Point every record naming `old` at `new`
    pub(crate) fn rename_drink_refs(&mut self, old: &str, new: &str) {
        for profile in &mut self.profiles {
            profile.rename_drink_refs(old, new);
        }
    }

    /// Append a decoded record without a prune pass
    pub(crate) fn restore_consumption(&mut self, profile: &str, record: Consumption) -> Result<()> {
        self.get_mut(profile)?.consumptions.push(record);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
