//! Variable flags and their textual form.
//!
//! Flags are written as a comma separated, case-insensitive list of names,
//! e.g. `volatile,readonly`.

use crate::config::QueryConfig;
use crate::{Result, VarQueryError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

bitflags::bitflags! {
    /// Flags carried by a registry variable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarFlags: u32 {
        const VOLATILE = 1 << 0;
        const READONLY = 1 << 1;
        const HIDDEN = 1 << 2;
    }
}

const FLAG_NAMES: [(&str, VarFlags); 3] = [
    ("volatile", VarFlags::VOLATILE),
    ("readonly", VarFlags::READONLY),
    ("hidden", VarFlags::HIDDEN),
];

impl FromStr for VarFlags {
    type Err = VarQueryError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() > QueryConfig::MAX_FLAGSPEC_LEN {
            return Err(VarQueryError::Validation {
                field: "flags".to_string(),
                message: format!(
                    "flag list length {} exceeds maximum {}",
                    s.len(),
                    QueryConfig::MAX_FLAGSPEC_LEN
                ),
            });
        }

        let mut flags = VarFlags::empty();
        for name in s.split(',').filter(|name| !name.is_empty()) {
            let (_, flag) = FLAG_NAMES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(name))
                .ok_or_else(|| VarQueryError::Validation {
                    field: "flags".to_string(),
                    message: format!("unknown flag: {}", name),
                })?;
            flags |= *flag;
        }

        Ok(flags)
    }
}

impl fmt::Display for VarFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, flag) in FLAG_NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl Serialize for VarFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VarFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_list() {
        let flags: VarFlags = "volatile,READONLY".parse().unwrap();
        assert_eq!(flags, VarFlags::VOLATILE | VarFlags::READONLY);
    }

    #[test]
    fn test_parse_empty_list_is_no_flags() {
        assert_eq!("".parse::<VarFlags>().unwrap(), VarFlags::empty());
        assert_eq!(",,".parse::<VarFlags>().unwrap(), VarFlags::empty());
    }

    #[test]
    fn test_parse_unknown_flag_fails() {
        let err = "volatile,sticky".parse::<VarFlags>().unwrap_err();
        assert!(err.to_string().contains("sticky"));
    }

    #[test]
    fn test_parse_oversized_list_fails() {
        let long = "volatile,".repeat(QueryConfig::MAX_FLAGSPEC_LEN);
        assert!(long.parse::<VarFlags>().is_err());
    }

    #[test]
    fn test_display_uses_canonical_order() {
        let flags = VarFlags::HIDDEN | VarFlags::VOLATILE;
        assert_eq!(flags.to_string(), "volatile,hidden");
        assert_eq!(VarFlags::empty().to_string(), "");
    }

    #[test]
    fn test_serde_uses_flag_names() {
        let json = serde_json::to_string(&VarFlags::READONLY).unwrap();
        assert_eq!(json, "\"readonly\"");
        let parsed: VarFlags = serde_json::from_str("\"hidden,readonly\"").unwrap();
        assert_eq!(parsed, VarFlags::HIDDEN | VarFlags::READONLY);
    }
}
