use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use utoipa::ToSchema;

use crate::calculator::CellRef;
use crate::error::{SpotError, SpotResult};
use crate::models::OperatingSystem;

/// Instance count for one cell, always a whole number of at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: i64) -> SpotResult<Self> {
        if value < 1 {
            return Err(SpotError::InvalidQuantity(value.to_string()));
        }
        u32::try_from(value)
            .map(Quantity)
            .map_err(|_| SpotError::InvalidQuantity(value.to_string()))
    }

    /// Accepts only finite whole numbers
    pub fn from_f64(value: f64) -> SpotResult<Self> {
        if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > f64::from(u32::MAX) {
            return Err(SpotError::InvalidQuantity(value.to_string()));
        }
        Ok(Quantity(value as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Quantity {
    type Error = SpotError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Quantity::from_f64(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl FromStr for Quantity {
    type Err = SpotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<i64>() {
            Ok(value) => Quantity::new(value),
            Err(_) => trimmed
                .parse::<f64>()
                .map_err(|_| SpotError::InvalidQuantity(trimmed.to_string()))
                .and_then(Quantity::from_f64),
        }
    }
}

/// A stored quantity with its cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuantityCell {
    pub instance_type: String,
    pub region: String,
    pub os: OperatingSystem,
    #[schema(value_type = u32, minimum = 1)]
    pub quantity: Quantity,
}

/// Caller-supplied quantities per cell; absent cells count as 1
#[derive(Debug, Default)]
pub struct QuantityRegistry {
    cells: RwLock<HashMap<CellRef, Quantity>>,
}

impl QuantityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance_type: &str, region: &str, os: OperatingSystem) -> u32 {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells
            .get(&CellRef::new(instance_type, region, os))
            .copied()
            .unwrap_or_default()
            .get()
    }

    pub fn set(&self, instance_type: &str, region: &str, os: OperatingSystem, quantity: Quantity) {
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        cells.insert(CellRef::new(instance_type, region, os), quantity);
    }

    /// Validate a raw count and store it; invalid input leaves the registry untouched
    pub fn try_set(
        &self,
        instance_type: &str,
        region: &str,
        os: OperatingSystem,
        raw: f64,
    ) -> SpotResult<Quantity> {
        let quantity = Quantity::from_f64(raw)?;
        self.set(instance_type, region, os, quantity);
        Ok(quantity)
    }

    pub fn clear(&self) {
        self.cells
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Explicitly set cells, sorted by instance type, region and OS
    pub fn entries(&self) -> Vec<QuantityCell> {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<QuantityCell> = cells
            .iter()
            .map(|(cell, quantity)| QuantityCell {
                instance_type: cell.instance_type.clone(),
                region: cell.region.clone(),
                os: cell.os,
                quantity: *quantity,
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.instance_type, &a.region, a.os).cmp(&(&b.instance_type, &b.region, b.os))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.cells.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_cell_defaults_to_one() {
        let registry = QuantityRegistry::new();
        assert_eq!(registry.get("m5.large", "us-east-1", OperatingSystem::Linux), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cells_are_independent() {
        let registry = QuantityRegistry::new();
        registry
            .try_set("m5.large", "us-east-1", OperatingSystem::Linux, 3.0)
            .unwrap();

        assert_eq!(registry.get("m5.large", "us-east-1", OperatingSystem::Linux), 3);
        assert_eq!(registry.get("m5.large", "us-east-1", OperatingSystem::Windows), 1);
        assert_eq!(registry.get("m5.large", "us-west-2", OperatingSystem::Linux), 1);
    }

    #[test]
    fn test_invalid_quantities_are_rejected_and_not_stored() {
        let registry = QuantityRegistry::new();
        registry
            .try_set("c5.large", "eu-west-1", OperatingSystem::Linux, 2.0)
            .unwrap();

        for raw in [0.0, -4.0, 2.5, f64::INFINITY] {
            let err = registry
                .try_set("c5.large", "eu-west-1", OperatingSystem::Linux, raw)
                .unwrap_err();
            assert!(matches!(err, SpotError::InvalidQuantity(_)));
        }
        assert_eq!(registry.get("c5.large", "eu-west-1", OperatingSystem::Linux), 2);
    }

    #[test]
    fn test_fractional_input_is_rejected() {
        assert!(Quantity::from_f64(2.5).is_err());
        assert!(Quantity::from_f64(f64::NAN).is_err());
        assert!("1.5".parse::<Quantity>().is_err());
        assert!("abc".parse::<Quantity>().is_err());
        assert_eq!("4".parse::<Quantity>().unwrap().get(), 4);
        assert_eq!(Quantity::from_f64(7.0).unwrap().get(), 7);
    }

    #[test]
    fn test_quantity_deserializes_only_whole_numbers() {
        let ok: Quantity = serde_json::from_str("5").unwrap();
        assert_eq!(ok.get(), 5);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("1.25").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "5");
    }

    #[test]
    fn test_entries_are_sorted_and_clear_resets() {
        let registry = QuantityRegistry::new();
        let regions = ["us-east-1", "us-west-2", "eu-west-1"];
        for region in regions {
            registry.set("m5.xlarge", region, OperatingSystem::Linux, Quantity::new(6).unwrap());
        }

        for region in regions {
            assert_eq!(registry.get("m5.xlarge", region, OperatingSystem::Linux), 6);
        }
        assert_eq!(registry.entries().len(), 3);
        assert_eq!(registry.entries()[0].region, "eu-west-1");

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.get("m5.xlarge", "us-east-1", OperatingSystem::Linux), 1);
    }
}
