//! VID:PID device filters
//!
//! Filters are written `0xVID:0xPID`; either side may be `*`. The same
//! parser backs configuration validation and the host's device scan.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid filter format '{0}', expected VID:PID (e.g., '0x046d:0xc077' or '0x046d:*')")]
    Format(String),

    #[error("Invalid {field} '{id}', must start with '0x' (e.g., '0x046d')")]
    MissingPrefix { field: &'static str, id: String },

    #[error("Invalid {field} '{id}', expected 1-4 hex digits")]
    BadHex { field: &'static str, id: String },
}

/// One side of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPattern {
    Any,
    Exact(u16),
}

impl IdPattern {
    fn parse(id: &str, field: &'static str) -> Result<Self, FilterError> {
        if id == "*" {
            return Ok(Self::Any);
        }

        let hex = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(|| FilterError::MissingPrefix {
                field,
                id: id.to_string(),
            })?;

        if hex.is_empty() || hex.len() > 4 {
            return Err(FilterError::BadHex {
                field,
                id: id.to_string(),
            });
        }
        u16::from_str_radix(hex, 16)
            .map(Self::Exact)
            .map_err(|_| FilterError::BadHex {
                field,
                id: id.to_string(),
            })
    }

    pub fn matches(self, id: u16) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == id,
        }
    }
}

/// Parsed `VID:PID` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor: IdPattern,
    pub product: IdPattern,
}

impl DeviceFilter {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor.matches(vendor_id) && self.product.matches(product_id)
    }

    /// Parse every filter, stopping at the first invalid one
    pub fn parse_all<S: AsRef<str>>(filters: &[S]) -> Result<Vec<Self>, FilterError> {
        filters.iter().map(|f| f.as_ref().parse()).collect()
    }
}

impl FromStr for DeviceFilter {
    type Err = FilterError;

    fn from_str(filter: &str) -> Result<Self, Self::Err> {
        let (vendor, product) = filter
            .split_once(':')
            .filter(|(_, pid)| !pid.contains(':'))
            .ok_or_else(|| FilterError::Format(filter.to_string()))?;

        Ok(Self {
            vendor: IdPattern::parse(vendor, "VID")?,
            product: IdPattern::parse(product, "PID")?,
        })
    }
}

impl fmt::Display for IdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(id) => write!(f, "{:#06x}", id),
        }
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor, self.product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let filter: DeviceFilter = "0x046d:0xc077".parse().unwrap();
        assert_eq!(filter.vendor, IdPattern::Exact(0x046d));
        assert_eq!(filter.product, IdPattern::Exact(0xc077));

        assert!("0x046d:*".parse::<DeviceFilter>().is_ok());
        assert!("*:0xc077".parse::<DeviceFilter>().is_ok());
        assert!("*:*".parse::<DeviceFilter>().is_ok());
        assert!("0XABCD:0xEF01".parse::<DeviceFilter>().is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            "046d:c077".parse::<DeviceFilter>(),
            Err(FilterError::MissingPrefix { field: "VID", .. })
        ));
        assert!(matches!(
            "0x046d".parse::<DeviceFilter>(),
            Err(FilterError::Format(_))
        ));
        assert!(matches!(
            "0x1:0x2:0x3".parse::<DeviceFilter>(),
            Err(FilterError::Format(_))
        ));
        assert!("0xGHIJ:0x5678".parse::<DeviceFilter>().is_err());
        assert!("0x12345:0x5678".parse::<DeviceFilter>().is_err());
        assert!("0x:0x5678".parse::<DeviceFilter>().is_err());
    }

    #[test]
    fn test_matches() {
        let filters =
            DeviceFilter::parse_all(&["0x046d:0xc077", "0x1BCF:*"]).unwrap();

        assert!(filters[0].matches(0x046d, 0xc077));
        assert!(!filters[0].matches(0x046d, 0xc052));
        assert!(filters[1].matches(0x1bcf, 0xffff));
        assert!(!filters[1].matches(0x045e, 0x0005));
    }

    #[test]
    fn test_display_round_trips() {
        let filter: DeviceFilter = "0x046D:*".parse().unwrap();
        assert_eq!(filter.to_string(), "0x046d:*");
        assert_eq!(filter.to_string().parse::<DeviceFilter>(), Ok(filter));
    }
}
