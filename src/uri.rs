//! Channel name handling.
//!
//! Device channels are addressed as `PRIMARY:MICRO:UNIT:ATTRIBUTE`, where the
//! first three parts (the PMU) name a device and the last selects what to read
//! or set on it. The SLC device libraries want the older forms of these names,
//! which this module produces.

use std::{fmt, str::FromStr};

use crate::error::AidaError;

/// Does the channel end with `:<attribute>`, ignoring case?
pub fn has_attribute(uri: &str, attribute: &str) -> bool {
    uri.rsplit_once(':')
        .is_some_and(|(d, a)| !d.is_empty() && a.eq_ignore_ascii_case(attribute))
}

/// Everything after the last `:`
pub fn attribute(uri: &str) -> &str {
    uri.rsplit_once(':').map_or("", |(_, a)| a)
}

/// The channel with its attribute removed
///
/// For a device channel this is the device. For a group channel such as
/// `NDRFACET:BUFFACQ` it is the group name.
pub fn device_name(uri: &str) -> &str {
    uri.rsplit_once(':').map_or(uri, |(d, _)| d)
}

/// The SLC database form of a channel, with the last `:` replaced by `.`
pub fn slc_name(uri: &str) -> String {
    match uri.rsplit_once(':') {
        Some((device, attribute)) => format!("{device}.{attribute}"),
        None => uri.to_string(),
    }
}

/// Convert a legacy `DEVICE//ATTRIBUTE` name to `DEVICE:ATTRIBUTE`
pub fn to_new_format(channel: &str) -> String {
    match channel.rsplit_once("//") {
        Some((device, attribute)) => format!("{device}:{attribute}"),
        None => channel.to_string(),
    }
}

/// Remove a `<service>::` prefix used to share a channel between services
pub fn remove_service_prefix(channel: &str) -> &str {
    channel.split_once("::").map_or(channel, |(_, c)| c)
}

/// A device address: primary, micro and unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pmu {
    pub primary: String,
    pub micro: String,
    pub unit: u32,
}

impl FromStr for Pmu {
    type Err = AidaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AidaError::unable_to_get(format!("Invalid device name: {s}"));
        let mut parts = s.split(':');
        let (Some(primary), Some(micro), Some(unit), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if primary.is_empty() || micro.is_empty() {
            return Err(invalid());
        }
        Ok(Pmu {
            primary: primary.to_string(),
            micro: micro.to_string(),
            unit: unit.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Pmu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.primary, self.micro, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes() {
        assert!(has_attribute("KLYS:LI31:31:TACT", "TACT"));
        assert!(has_attribute("KLYS:LI31:31:pcon", "PCON"));
        assert!(!has_attribute("KLYS:LI31:31:XTACT", "TACT"));
        assert!(!has_attribute("TACT", "TACT"));
        assert_eq!(attribute("KLYS:LI31:31:TACT"), "TACT");
        assert_eq!(device_name("KLYS:LI31:31:TACT"), "KLYS:LI31:31");
        assert_eq!(device_name("NDRFACET:BUFFACQ"), "NDRFACET");
    }

    #[test]
    fn name_forms() {
        assert_eq!(slc_name("KLYS:LI31:31:TACT"), "KLYS:LI31:31.TACT");
        assert_eq!(to_new_format("KLYS:LI31:31//TACT"), "KLYS:LI31:31:TACT");
        assert_eq!(to_new_format("KLYS:LI31:31:TACT"), "KLYS:LI31:31:TACT");
        assert_eq!(remove_service_prefix("SLC::KLYS:LI31:31:TACT"), "KLYS:LI31:31:TACT");
        assert_eq!(remove_service_prefix("KLYS:LI31:31:TACT"), "KLYS:LI31:31:TACT");
    }

    #[test]
    fn pmu() {
        let pmu: Pmu = "BPMS:LI02:501".parse().unwrap();
        assert_eq!(pmu.primary, "BPMS");
        assert_eq!(pmu.micro, "LI02");
        assert_eq!(pmu.unit, 501);
        assert_eq!(pmu.to_string(), "BPMS:LI02:501");
        assert!("BPMS:LI02".parse::<Pmu>().is_err());
        assert!("BPMS:LI02:X".parse::<Pmu>().is_err());
        assert!("BPMS:LI02:1:2".parse::<Pmu>().is_err());
    }
}
