use domain_spot::{CellRef, OperatingSystem, Quantity};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityArgError {
    #[error("expected TYPE:REGION:OS=N, got '{0}'")]
    Format(String),

    #[error("unknown operating system '{0}', expected Linux or Windows")]
    OperatingSystem(String),

    #[error("{0}")]
    Quantity(String),
}

/// `--quantity m5.large:us-east-1:Linux=3`
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityArg {
    pub cell: CellRef,
    pub quantity: Quantity,
}

impl FromStr for QuantityArg {
    type Err = QuantityArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || QuantityArgError::Format(s.to_string());

        let (cell, count) = s.split_once('=').ok_or_else(format_error)?;
        let mut parts = cell.split(':').map(str::trim);
        let (Some(instance_type), Some(region), Some(os), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format_error());
        };
        if instance_type.is_empty() || region.is_empty() {
            return Err(format_error());
        }

        let os = OperatingSystem::from_str(os)
            .map_err(|_| QuantityArgError::OperatingSystem(os.to_string()))?;
        let quantity = count
            .parse::<Quantity>()
            .map_err(|e| QuantityArgError::Quantity(e.to_string()))?;

        Ok(QuantityArg {
            cell: CellRef::new(instance_type, region, os),
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity_arg() {
        let arg: QuantityArg = "m5.large:us-east-1:windows=3".parse().unwrap();
        assert_eq!(
            arg.cell,
            CellRef::new("m5.large", "us-east-1", OperatingSystem::Windows)
        );
        assert_eq!(arg.quantity.get(), 3);
    }

    #[test]
    fn test_rejects_malformed_cells() {
        for raw in ["m5.large=3", "m5.large:us-east-1=3", "a:b:Linux:x=1", ":us-east-1:Linux=2"] {
            assert!(
                matches!(raw.parse::<QuantityArg>(), Err(QuantityArgError::Format(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_rejects_bad_os_and_counts() {
        assert!(matches!(
            "m5.large:us-east-1:BSD=2".parse::<QuantityArg>(),
            Err(QuantityArgError::OperatingSystem(_))
        ));
        for raw in ["m5.large:us-east-1:Linux=0", "m5.large:us-east-1:Linux=1.5"] {
            assert!(matches!(
                raw.parse::<QuantityArg>(),
                Err(QuantityArgError::Quantity(_))
            ));
        }
    }
}
