//! Filament channels, the fixed slot table, and optical profiles
//!
//! The slot order is part of the output contract: slicers map slot indices
//! straight onto physical filaments, so [`Channel::ALL`] must never be
//! reordered.

use serde::{Deserialize, Serialize};

use crate::color::Srgb;
use crate::error::{Error, Result};

/// Number of filament slots in every generated model
pub const SLOT_COUNT: usize = 5;

/// A printable filament channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Reflective base layer (slot 0)
    White,
    /// Subtractive cyan (slot 1)
    Cyan,
    /// Subtractive magenta (slot 2)
    Magenta,
    /// Subtractive yellow (slot 3)
    Yellow,
    /// Light-blocking black spacer (slot 4)
    Spacer,
}

impl Channel {
    /// All channels in slot order
    pub const ALL: [Channel; SLOT_COUNT] = [
        Channel::White,
        Channel::Cyan,
        Channel::Magenta,
        Channel::Yellow,
        Channel::Spacer,
    ];

    /// The subtractive colour channels stacked on top of the White base
    pub const COLORS: [Channel; 3] = [Channel::Cyan, Channel::Magenta, Channel::Yellow];

    /// Fixed filament slot index
    pub const fn slot(self) -> usize {
        match self {
            Channel::White => 0,
            Channel::Cyan => 1,
            Channel::Magenta => 2,
            Channel::Yellow => 3,
            Channel::Spacer => 4,
        }
    }

    /// Channel for a slot index
    pub fn from_slot(slot: usize) -> Option<Channel> {
        Channel::ALL.get(slot).copied()
    }

    /// Human-readable name, also used for part names
    pub const fn name(self) -> &'static str {
        match self {
            Channel::White => "White",
            Channel::Cyan => "Cyan",
            Channel::Magenta => "Magenta",
            Channel::Yellow => "Yellow",
            Channel::Spacer => "Black",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Optical description of one loaded filament
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilamentProfile {
    /// Which channel this filament fills
    pub channel: Channel,
    /// Transmission Distance in millimetres
    pub transmission_distance: f64,
    /// Characteristic colour of the filament
    pub color: Srgb,
}

impl FilamentProfile {
    /// Create a new profile
    pub fn new(channel: Channel, transmission_distance: f64, color: Srgb) -> Self {
        Self {
            channel,
            transmission_distance,
            color,
        }
    }

    /// Default profile for a channel
    pub fn default_for(channel: Channel) -> Self {
        match channel {
            Channel::White => Self::new(channel, 2.0, Srgb::from_u8(0xFF, 0xFF, 0xFF)),
            Channel::Cyan => Self::new(channel, 0.6, Srgb::from_u8(0x00, 0x86, 0xD6)),
            Channel::Magenta => Self::new(channel, 0.6, Srgb::from_u8(0xEC, 0x00, 0x8C)),
            Channel::Yellow => Self::new(channel, 0.8, Srgb::from_u8(0xF4, 0xEE, 0x2A)),
            Channel::Spacer => Self::new(channel, 0.1, Srgb::from_u8(0x00, 0x00, 0x00)),
        }
    }
}

/// Exactly one validated profile per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FilamentProfile>", into = "Vec<FilamentProfile>")]
pub struct FilamentSet {
    profiles: [FilamentProfile; SLOT_COUNT],
}

impl FilamentSet {
    /// Build a set from a list of profiles
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a channel is missing or duplicated,
    /// or if any transmission distance is not a positive finite number.
    pub fn new(profiles: impl IntoIterator<Item = FilamentProfile>) -> Result<Self> {
        let mut slots: [Option<FilamentProfile>; SLOT_COUNT] = [None; SLOT_COUNT];

        for profile in profiles {
            let td = profile.transmission_distance;
            if !td.is_finite() || td <= 0.0 {
                return Err(Error::configuration(format!(
                    "{} filament has transmission distance {} mm; it must be positive",
                    profile.channel, td
                )));
            }
            let slot = &mut slots[profile.channel.slot()];
            if slot.is_some() {
                return Err(Error::configuration(format!(
                    "Duplicate filament profile for channel {}",
                    profile.channel
                )));
            }
            *slot = Some(profile);
        }

        let mut profiles = [FilamentProfile::default_for(Channel::White); SLOT_COUNT];
        for channel in Channel::ALL {
            profiles[channel.slot()] = slots[channel.slot()].ok_or_else(|| {
                Error::configuration(format!("Missing filament profile for channel {}", channel))
            })?;
        }

        Ok(Self { profiles })
    }

    /// Profile for a channel
    pub fn get(&self, channel: Channel) -> &FilamentProfile {
        &self.profiles[channel.slot()]
    }

    /// Transmission distance for a channel in millimetres
    pub fn transmission_distance(&self, channel: Channel) -> f64 {
        self.get(channel).transmission_distance
    }

    /// All profiles in slot order
    pub fn iter(&self) -> impl Iterator<Item = &FilamentProfile> {
        self.profiles.iter()
    }
}

impl Default for FilamentSet {
    fn default() -> Self {
        Self {
            profiles: Channel::ALL.map(FilamentProfile::default_for),
        }
    }
}

impl TryFrom<Vec<FilamentProfile>> for FilamentSet {
    type Error = Error;

    fn try_from(profiles: Vec<FilamentProfile>) -> Result<Self> {
        FilamentSet::new(profiles)
    }
}

impl From<FilamentSet> for Vec<FilamentProfile> {
    fn from(set: FilamentSet) -> Self {
        set.profiles.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_table_is_fixed() {
        let slots: Vec<usize> = Channel::ALL.iter().map(|c| c.slot()).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);
        for slot in 0..SLOT_COUNT {
            assert_eq!(Channel::from_slot(slot).unwrap().slot(), slot);
        }
        assert_eq!(Channel::from_slot(5), None);
    }

    #[test]
    fn test_default_set_is_complete() {
        let set = FilamentSet::default();
        for channel in Channel::ALL {
            assert_eq!(set.get(channel).channel, channel);
            assert!(set.transmission_distance(channel) > 0.0);
        }
    }

    #[test]
    fn test_rejects_non_positive_td() {
        let mut profiles: Vec<_> = Channel::ALL.map(FilamentProfile::default_for).to_vec();
        profiles[2].transmission_distance = 0.0;
        let err = FilamentSet::new(profiles).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("Magenta"));
    }

    #[test]
    fn test_rejects_missing_and_duplicate_channels() {
        let missing: Vec<_> = Channel::ALL[..4]
            .iter()
            .map(|&c| FilamentProfile::default_for(c))
            .collect();
        let err = FilamentSet::new(missing).unwrap_err();
        assert!(err.to_string().contains("Missing filament profile for channel Black"));

        let mut duplicate: Vec<_> = Channel::ALL.map(FilamentProfile::default_for).to_vec();
        duplicate.push(FilamentProfile::default_for(Channel::Cyan));
        let err = FilamentSet::new(duplicate).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_profiles_deserialize_in_any_order() {
        let json = r##"[
            {"channel": "Spacer", "transmission_distance": 0.1, "color": "#000000"},
            {"channel": "Yellow", "transmission_distance": 0.8, "color": "#F4EE2A"},
            {"channel": "White", "transmission_distance": 2.0, "color": "#FFFFFF"},
            {"channel": "Cyan", "transmission_distance": 0.6, "color": "#0086D6"},
            {"channel": "Magenta", "transmission_distance": 0.6, "color": "#EC008C"}
        ]"##;
        let set: FilamentSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.get(Channel::Yellow).color.to_hex(), "#F4EE2A");
        assert_eq!(set.iter().next().unwrap().channel, Channel::White);
    }
}
