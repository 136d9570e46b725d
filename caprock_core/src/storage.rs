//! Text persistence for liquids, drinks and profiles.
//!
//! Each entity kind lives in its own file as a sequence of records. Fields
//! are one per line in a fixed order and every record ends with a line
//! containing exactly `-----`:
//!
//! ```text
//! liquid_storage.txt   name, abv, density, volume left, container code
//! drink_storage.txt    name, part count N, N x (liquid name, volume)
//! user_storage.txt     name, sex, weight, experience, count N,
//!                      N x (timestamp MM-DD-YY HH:MM:SS, drink name)
//! ```
//!
//! Loading resolves drink parts against the loaded liquids and consumption
//! records against the loaded drinks. A reference that no longer resolves is
//! dropped on its own; the record holding it still loads. A stream that
//! cannot be read or parsed loads as empty and is moved aside to
//! `<file>.corrupt` so the next save does not destroy it.
//!
//! Saving rewrites each file through a temp file that is synced and renamed
//! over the old one.

use crate::bar::Bar;
use crate::drink::{DrinkComposer, DrinkPart};
use crate::liquid::LiquidRegistry;
use crate::profile::{Consumption, ProfileRegistry};
use crate::{Container, Error, Experience, Limits, Result, Sex};
use chrono::NaiveDateTime;
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Line terminating every record
pub const RECORD_SENTINEL: &str = "-----";

/// Consumption timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%y %H:%M:%S";

pub const LIQUID_FILE: &str = "liquid_storage.txt";
pub const DRINK_FILE: &str = "drink_storage.txt";
pub const PROFILE_FILE: &str = "user_storage.txt";

// ============================================================================
// Record framing
// ============================================================================

/// The field lines of one record
struct Record<'a> {
    fields: Vec<(usize, &'a str)>,
    pos: usize,
    end_line: usize,
}

impl<'a> Record<'a> {
    fn next(&mut self, what: &str) -> Result<&'a str> {
        let (_, value) = *self.fields.get(self.pos).ok_or_else(|| Error::Malformed {
            line: self.end_line,
            reason: format!("missing {}", what),
        })?;
        self.pos += 1;
        Ok(value)
    }

    fn line(&self) -> usize {
        self.fields
            .get(self.pos.saturating_sub(1))
            .map(|f| f.0)
            .unwrap_or(self.end_line)
    }

    fn next_f64(&mut self, what: &str) -> Result<f64> {
        let raw = self.next(what)?;
        raw.trim().parse::<f64>().map_err(|e| Error::Malformed {
            line: self.line(),
            reason: format!("invalid {} {:?}: {}", what, raw, e),
        })
    }

    fn next_usize(&mut self, what: &str) -> Result<usize> {
        let raw = self.next(what)?;
        raw.trim().parse::<usize>().map_err(|e| Error::Malformed {
            line: self.line(),
            reason: format!("invalid {} {:?}: {}", what, raw, e),
        })
    }

    fn next_parsed<T>(&mut self, what: &str) -> Result<T>
    where
        T: std::str::FromStr<Err = Error>,
    {
        let raw = self.next(what)?;
        raw.parse::<T>().map_err(|e| Error::Malformed {
            line: self.line(),
            reason: e.to_string(),
        })
    }

    fn finish(&self) -> Result<()> {
        if self.pos < self.fields.len() {
            return Err(Error::Malformed {
                line: self.fields[self.pos].0,
                reason: "unexpected extra field".into(),
            });
        }
        Ok(())
    }
}

/// Split a stream into sentinel-terminated records, skipping blank lines
fn split_records(text: &str) -> Result<Vec<Record<'_>>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line == RECORD_SENTINEL {
            records.push(Record {
                fields: std::mem::take(&mut fields),
                pos: 0,
                end_line: line_num,
            });
        } else if !line.is_empty() {
            fields.push((line_num, line));
        }
    }

    if let Some((line, _)) = fields.first() {
        return Err(Error::Malformed {
            line: *line,
            reason: "record is missing its terminator".into(),
        });
    }
    Ok(records)
}

fn reject(record: &Record<'_>, err: Error) -> Error {
    match err {
        Error::Malformed { .. } => err,
        other => Error::Malformed {
            line: record.end_line,
            reason: other.to_string(),
        },
    }
}

// ============================================================================
// Liquids
// ============================================================================

pub fn encode_liquids(liquids: &LiquidRegistry) -> String {
    let mut out = String::new();
    for liquid in liquids.iter() {
        out.push_str(&format!(
            "{}\n{:.6}\n{:.6}\n{:.6}\n{}\n{}\n",
            liquid.name(),
            liquid.abv(),
            liquid.density(),
            liquid.volume_left(),
            liquid.container().code(),
            RECORD_SENTINEL
        ));
    }
    out
}

pub fn decode_liquids(text: &str, limits: Limits) -> Result<LiquidRegistry> {
    let mut liquids = LiquidRegistry::new(limits);
    for mut record in split_records(text)? {
        let name = record.next("liquid name")?;
        let abv = record.next_f64("abv")?;
        let density = record.next_f64("density")?;
        let volume_left = record.next_f64("volume")?;
        let container = record.next_parsed::<Container>("container")?;
        record.finish()?;

        liquids
            .restore(name, abv, density, volume_left, container)
            .map_err(|e| reject(&record, e))?;
    }
    Ok(liquids)
}

// ============================================================================
// Drinks
// ============================================================================

pub fn encode_drinks(drinks: &DrinkComposer) -> String {
    let mut out = String::new();
    for drink in drinks.iter() {
        out.push_str(&format!("{}\n{}\n", drink.name(), drink.parts().len()));
        for part in drink.parts() {
            out.push_str(&format!("{}\n{:.6}\n", part.liquid, part.volume));
        }
        out.push_str(RECORD_SENTINEL);
        out.push('\n');
    }
    out
}

/// Decode drinks, dropping parts whose liquid is not in `liquids`
pub fn decode_drinks(text: &str, liquids: &LiquidRegistry, limits: Limits) -> Result<DrinkComposer> {
    let mut drinks = DrinkComposer::new(limits);
    for mut record in split_records(text)? {
        let name = record.next("drink name")?;
        let count = record.next_usize("part count")?;

        let mut parts = Vec::new();
        for _ in 0..count {
            let liquid = record.next("part liquid")?;
            let volume = record.next_f64("part volume")?;
            if liquids.lookup_by_name(liquid).is_some() {
                parts.push(DrinkPart::new(liquid, volume));
            } else {
                tracing::debug!("Dropping missing liquid {} from drink {}", liquid, name);
            }
        }
        record.finish()?;

        if parts.is_empty() {
            tracing::warn!("Dropping drink {}: none of its liquids exist", name);
            continue;
        }
        drinks
            .restore(name, parts, liquids)
            .map_err(|e| reject(&record, e))?;
    }
    Ok(drinks)
}

// ============================================================================
// Profiles
// ============================================================================

pub fn encode_profiles(profiles: &ProfileRegistry) -> String {
    let mut out = String::new();
    for profile in profiles.iter() {
        out.push_str(&format!(
            "{}\n{}\n{:.6}\n{}\n{}\n",
            profile.name(),
            profile.sex().name(),
            profile.weight(),
            profile.experience().name(),
            profile.consumptions().len()
        ));
        for record in profile.consumptions() {
            out.push_str(&format!(
                "{}\n{}\n",
                record.at.format(TIMESTAMP_FORMAT),
                record.drink
            ));
        }
        out.push_str(RECORD_SENTINEL);
        out.push('\n');
    }
    out
}

/// Decode profiles, dropping consumption records whose drink is not in `drinks`
pub fn decode_profiles(
    text: &str,
    drinks: &DrinkComposer,
    limits: Limits,
) -> Result<ProfileRegistry> {
    let mut profiles = ProfileRegistry::new(limits);
    for mut record in split_records(text)? {
        let name = record.next("profile name")?;
        let sex = record.next_parsed::<Sex>("sex")?;
        let weight = record.next_f64("weight")?;
        let experience = record.next_parsed::<Experience>("experience")?;
        let count = record.next_usize("consumption count")?;

        let mut history = Vec::new();
        for _ in 0..count {
            let raw = record.next("timestamp")?;
            let at = NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(|e| {
                Error::Malformed {
                    line: record.line(),
                    reason: format!("invalid timestamp {:?}: {}", raw, e),
                }
            })?;
            let drink = record.next("drink name")?;
            if drinks.lookup_by_name(drink).is_some() {
                history.push(Consumption {
                    at,
                    drink: drink.to_string(),
                });
            } else {
                tracing::debug!("Dropping missing drink {} from {}'s history", drink, name);
            }
        }
        record.finish()?;

        profiles
            .restore(name, sex, weight, experience)
            .map_err(|e| reject(&record, e))?;
        for entry in history {
            profiles.restore_consumption(name, entry)?;
        }
    }
    Ok(profiles)
}

// ============================================================================
// On-disk storage
// ============================================================================

/// The three storage files under one data directory
#[derive(Clone, Debug)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn liquid_path(&self) -> PathBuf {
        self.dir.join(LIQUID_FILE)
    }

    pub fn drink_path(&self) -> PathBuf {
        self.dir.join(DRINK_FILE)
    }

    pub fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    /// Load liquids, then drinks, then profiles.
    ///
    /// Fails only when the data directory itself is missing. Each stream
    /// that cannot be read or parsed is logged and comes back empty.
    pub fn load(&self, limits: Limits) -> Result<Bar> {
        if !self.dir.is_dir() {
            return Err(Error::StorageUnavailable(self.dir.clone()));
        }

        let liquids = self
            .load_stream(&self.liquid_path(), |text| decode_liquids(text, limits))
            .unwrap_or_else(|| LiquidRegistry::new(limits));
        let drinks = self
            .load_stream(&self.drink_path(), |text| {
                decode_drinks(text, &liquids, limits)
            })
            .unwrap_or_else(|| DrinkComposer::new(limits));
        let profiles = self
            .load_stream(&self.profile_path(), |text| {
                decode_profiles(text, &drinks, limits)
            })
            .unwrap_or_else(|| ProfileRegistry::new(limits));

        tracing::info!(
            "Loaded {} liquids, {} drinks, {} profiles from {:?}",
            liquids.len(),
            drinks.len(),
            profiles.len(),
            self.dir
        );
        Ok(Bar::from_parts(liquids, drinks, profiles))
    }

    fn load_stream<T, F>(&self, path: &Path, decode: F) -> Option<T>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        if !path.exists() {
            tracing::debug!("No storage file at {:?}", path);
            return None;
        }

        let contents = match read_locked(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}. Using empty storage.", path, e);
                return None;
            }
        };

        match decode(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Failed to parse {:?}: {}. Using empty storage.", path, e);
                quarantine(path);
                None
            }
        }
    }

    /// Rewrite all three files.
    ///
    /// Every stream is attempted; a failed stream keeps its previous file
    /// and the first failure is returned.
    pub fn save(&self, bar: &Bar) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let streams = [
            (self.profile_path(), encode_profiles(bar.profiles())),
            (self.drink_path(), encode_drinks(bar.drinks())),
            (self.liquid_path(), encode_liquids(bar.liquids())),
        ];

        let mut first_error = None;
        for (path, contents) in streams {
            match write_atomic(&path, &contents) {
                Ok(()) => tracing::debug!("Saved {:?}", path),
                Err(e) => {
                    tracing::error!("Failed to save {:?}: {}", path, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("Saved storage to {:?}", self.dir);
                Ok(())
            }
        }
    }
}

fn read_locked(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    let _ = file.unlock();
    read?;
    Ok(contents)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Io(std::io::Error::other("storage path missing parent")))?;
    let temp = NamedTempFile::new_in(parent)?;

    temp.as_file().lock_exclusive()?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Move an unparseable file out of the way of the next save.
///
/// Earlier quarantined copies are kept: the target becomes `<file>.corrupt`,
/// then `<file>.corrupt.1`, `<file>.corrupt.2` and so on.
fn quarantine(path: &Path) {
    let mut base = path.as_os_str().to_owned();
    base.push(".corrupt");

    let mut target = PathBuf::from(&base);
    let mut n = 1u32;
    while target.exists() {
        let mut next = base.clone();
        next.push(format!(".{}", n));
        target = PathBuf::from(next);
        n += 1;
    }

    match std::fs::rename(path, &target) {
        Ok(()) => tracing::warn!("Moved unreadable storage to {:?}", target),
        Err(e) => tracing::warn!("Could not move aside {:?}: {}", path, e),
    }
}
