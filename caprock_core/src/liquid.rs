//! Liquid registry.
//!
//! Owns every liquid record. Container occupancy is the caller's contract:
//! assigning a slot never vacates whatever liquid already holds it, use
//! [`LiquidRegistry::vacate`] first.

use crate::drink::DrinkComposer;
use crate::types::validate_name;
use crate::{Container, Error, Limits, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// A stored liquid
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Liquid {
    name: String,
    abv: f64,
    density: f64,
    container: Container,
    volume_left: f64,
}

impl Liquid {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alcohol by volume as a fraction in [0, 1]
    pub fn abv(&self) -> f64 {
        self.abv
    }

    /// Density in g/mL
    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn container(&self) -> Container {
        self.container
    }

    /// Remaining volume in fl oz
    pub fn volume_left(&self) -> f64 {
        self.volume_left
    }
}

fn validate_abv(abv: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&abv) {
        return Err(Error::Validation(
            "Invalid ABV. Must be between 0 and 1".into(),
        ));
    }
    Ok(())
}

/// Registry of liquids in insertion order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LiquidRegistry {
    liquids: Vec<Liquid>,
    limits: Limits,
}

impl LiquidRegistry {
    pub fn new(limits: Limits) -> Self {
        Self {
            liquids: Vec::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Register a new liquid, unassigned and empty
    pub fn register(&mut self, name: &str, abv: f64, density: f64) -> Result<&Liquid> {
        validate_name("Liquid", name, self.limits.liquid_name_max)?;
        self.check_new(name, abv)?;
        if self.liquids.len() >= self.limits.max_liquids {
            return Err(Error::Capacity(format!(
                "Max liquid storage of {} reached",
                self.limits.max_liquids
            )));
        }

        self.liquids.push(Liquid {
            name: name.to_string(),
            abv,
            density,
            container: Container::Unassigned,
            volume_left: 0.0,
        });
        tracing::debug!("Registered liquid {} (abv {})", name, abv);
        Ok(&self.liquids[self.liquids.len() - 1])
    }

    fn check_new(&self, name: &str, abv: f64) -> Result<()> {
        if self.lookup_by_name(name).is_some() {
            return Err(Error::Validation(format!(
                "Liquid with same name already exists: {}",
                name
            )));
        }
        validate_abv(abv)
    }

    /// Linear scan in insertion order, first match wins
    pub fn lookup_by_name(&self, name: &str) -> Option<&Liquid> {
        self.liquids.iter().find(|l| l.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Liquid> {
        self.liquids
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::NotFound(format!("Liquid {}", name)))
    }

    /// Put a liquid in a container with the given fill volume.
    ///
    /// `Unassigned` only accepts a volume of 0. Physical slots accept
    /// multiples of `volume_step` up to `max_volume`.
    pub fn assign_container(
        &mut self,
        name: &str,
        container: Container,
        volume: f64,
    ) -> Result<()> {
        self.validate_fill(container, volume)?;
        let liquid = self.get_mut(name)?;
        liquid.container = container;
        liquid.volume_left = volume;
        tracing::debug!("Assigned {} to {} with {} oz", name, container, volume);
        Ok(())
    }

    pub(crate) fn validate_fill(&self, container: Container, volume: f64) -> Result<()> {
        if !container.is_assigned() {
            if volume != 0.0 {
                return Err(Error::Validation(
                    "An unassigned liquid must have a volume of 0".into(),
                ));
            }
            return Ok(());
        }

        let step = self.limits.volume_step;
        let steps = volume / step;
        let on_step = (steps - steps.round()).abs() < 1e-9;
        if !(volume >= step && volume <= self.limits.max_volume && on_step) {
            return Err(Error::Validation(format!(
                "Volume must be in increments of {} oz from {}-{}",
                step, step, self.limits.max_volume
            )));
        }
        Ok(())
    }

    /// Empty a container, returning the name of the liquid that held it
    pub fn vacate(&mut self, container: Container) -> Option<String> {
        if !container.is_assigned() {
            return None;
        }
        let liquid = self
            .liquids
            .iter_mut()
            .find(|l| l.container == container)?;
        liquid.container = Container::Unassigned;
        liquid.volume_left = 0.0;
        tracing::debug!("Vacated {} from {}", liquid.name, container);
        Some(liquid.name.clone())
    }

    /// Draw `amount` oz from a liquid's remaining volume
    pub fn consume(&mut self, name: &str, amount: f64) -> Result<()> {
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(Error::Validation(format!(
                "Cannot draw {} oz of {}",
                amount, name
            )));
        }
        let liquid = self.get_mut(name)?;
        if amount > liquid.volume_left {
            return Err(Error::InsufficientVolume {
                liquid: name.to_string(),
                requested: amount,
                remaining: liquid.volume_left,
            });
        }
        liquid.volume_left = (liquid.volume_left - amount).max(0.0);
        Ok(())
    }

    /// Remove a liquid that is neither in a container nor used by a drink
    pub fn remove(&mut self, name: &str, drinks: &DrinkComposer) -> Result<Liquid> {
        let idx = self
            .liquids
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| Error::NotFound(format!("Liquid {}", name)))?;

        let container = self.liquids[idx].container;
        if container.is_assigned() {
            return Err(Error::Constraint(format!(
                "Cannot delete {}: currently in container {}",
                name,
                container.display_name()
            )));
        }
        if drinks.references_liquid(name) {
            return Err(Error::Constraint(format!(
                "Cannot delete {}: used by a drink",
                name
            )));
        }

        tracing::info!("Removed liquid {}", name);
        Ok(self.liquids.remove(idx))
    }

    /// Rename a liquid. Drinks referencing the old name are not updated here.
    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        validate_name("Liquid", new_name, self.limits.liquid_name_max)?;
        if name != new_name && self.lookup_by_name(new_name).is_some() {
            return Err(Error::Validation(format!(
                "Liquid with same name already exists: {}",
                new_name
            )));
        }
        self.get_mut(name)?.name = new_name.to_string();
        Ok(())
    }

    pub fn set_abv(&mut self, name: &str, abv: f64) -> Result<()> {
        validate_abv(abv)?;
        self.get_mut(name)?.abv = abv;
        Ok(())
    }

    pub fn set_density(&mut self, name: &str, density: f64) -> Result<()> {
        self.get_mut(name)?.density = density;
        Ok(())
    }

    /// Liquid currently loaded in each physical slot
    pub fn occupancy(&self) -> BTreeMap<&'static str, Option<&Liquid>> {
        Container::SLOTS
            .iter()
            .map(|slot| {
                let occupant = self.liquids.iter().find(|l| l.container == *slot);
                (slot.code(), occupant)
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Liquid> {
        self.liquids.iter()
    }

    pub fn len(&self) -> usize {
        self.liquids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liquids.is_empty()
    }

    /// Insert a decoded record.
    ///
    /// Skips the fill-step rule, the name length limit and the registry
    /// capacity, so stored partial volumes and data saved under looser
    /// limits survive a reload.
    pub(crate) fn restore(
        &mut self,
        name: &str,
        abv: f64,
        density: f64,
        volume_left: f64,
        container: Container,
    ) -> Result<()> {
        validate_name("Liquid", name, usize::MAX)?;
        self.check_new(name, abv)?;
        if !(volume_left.is_finite() && volume_left >= 0.0) {
            return Err(Error::Validation(format!(
                "Invalid volume for liquid {}",
                name
            )));
        }
        self.liquids.push(Liquid {
            name: name.to_string(),
            abv,
            density,
            container,
            volume_left,
        });
        Ok(())
    }
}
