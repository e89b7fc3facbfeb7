//! Filter-type selector strings as accepted from the outside world

use std::fmt;
use std::str::FromStr;

use crate::core::error::PlmError;

/// Parsed form of `wip | undefined | latest | released | latest-released |
/// pi-<serial> | <baseline id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSelector {
    Wip,
    Latest,
    Released,
    LatestReleased,
    ProductInstance(String),
    Baseline(u32),
}

impl FromStr for FilterSelector {
    type Err = PlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "wip" | "undefined" => Ok(FilterSelector::Wip),
            "latest" => Ok(FilterSelector::Latest),
            "released" => Ok(FilterSelector::Released),
            "latest-released" => Ok(FilterSelector::LatestReleased),
            _ => {
                if let Some(serial) = s.strip_prefix("pi-") {
                    if serial.is_empty() {
                        return Err(PlmError::InvalidFilterType(s.to_string()));
                    }
                    return Ok(FilterSelector::ProductInstance(serial.to_string()));
                }
                if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                    // digits that overflow are a well-formed id that cannot exist
                    return s
                        .parse::<u32>()
                        .map(FilterSelector::Baseline)
                        .map_err(|_| PlmError::BaselineNotFound(s.to_string()));
                }
                Err(PlmError::InvalidFilterType(s.to_string()))
            }
        }
    }
}

impl fmt::Display for FilterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSelector::Wip => write!(f, "wip"),
            FilterSelector::Latest => write!(f, "latest"),
            FilterSelector::Released => write!(f, "released"),
            FilterSelector::LatestReleased => write!(f, "latest-released"),
            FilterSelector::ProductInstance(serial) => write!(f, "pi-{}", serial),
            FilterSelector::Baseline(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_selectors() {
        assert_eq!("wip".parse::<FilterSelector>().unwrap(), FilterSelector::Wip);
        assert_eq!(
            "undefined".parse::<FilterSelector>().unwrap(),
            FilterSelector::Wip
        );
        assert_eq!(
            "latest".parse::<FilterSelector>().unwrap(),
            FilterSelector::Latest
        );
        assert_eq!(
            "released".parse::<FilterSelector>().unwrap(),
            FilterSelector::Released
        );
        assert_eq!(
            "latest-released".parse::<FilterSelector>().unwrap(),
            FilterSelector::LatestReleased
        );
    }

    #[test]
    fn test_instance_and_baseline() {
        assert_eq!(
            "pi-SN-0042".parse::<FilterSelector>().unwrap(),
            FilterSelector::ProductInstance("SN-0042".to_string())
        );
        assert_eq!(
            "12".parse::<FilterSelector>().unwrap(),
            FilterSelector::Baseline(12)
        );
    }

    #[test]
    fn test_unknown_selector_is_rejected() {
        for bad in ["", "wips", "pi-", "latest_released", "-3", "1.5"] {
            let err = bad.parse::<FilterSelector>().unwrap_err();
            assert!(
                matches!(err, PlmError::InvalidFilterType(_)),
                "expected InvalidFilterType for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["wip", "latest", "released", "latest-released", "pi-7", "3"] {
            assert_eq!(s.parse::<FilterSelector>().unwrap().to_string(), s);
        }
    }
}
