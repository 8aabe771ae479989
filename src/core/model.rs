use serde::{Deserialize, Serialize};

/// A registered defect on an asset and what it costs to repair.
///
/// Failures are not stored on their own; they only live inside the
/// `Failures` list of the asset that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Failure {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Price")]
    pub price: i64,
}

impl Failure {
    pub fn new(name: impl Into<String>, price: i64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

/// A vehicle on the ledger.
///
/// Field order and names are the wire layout: `ID, CarBrand, CarModel,
/// CarColor, OwnerId, ProductionYear, Price, Failures`. An empty failure
/// list is omitted when encoding and absent fields decode to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "CarBrand")]
    pub car_brand: String,
    #[serde(rename = "CarModel")]
    pub car_model: String,
    #[serde(rename = "CarColor")]
    pub car_color: String,
    #[serde(rename = "OwnerId")]
    pub owner_id: String,
    #[serde(rename = "ProductionYear")]
    pub production_year: i32,
    /// Nominal sale value when undamaged.
    #[serde(rename = "Price")]
    pub price: i64,
    /// Registration order is preserved.
    #[serde(rename = "Failures", skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,
}

impl Asset {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn brand(mut self, brand: &str) -> Self {
        self.car_brand = brand.to_string();
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.car_model = model.to_string();
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.car_color = color.to_string();
        self
    }

    pub fn owner(mut self, owner_id: &str) -> Self {
        self.owner_id = owner_id.to_string();
        self
    }

    pub fn year(mut self, production_year: i32) -> Self {
        self.production_year = production_year;
        self
    }

    pub fn price(mut self, price: i64) -> Self {
        self.price = price;
        self
    }

    pub fn with_failures(mut self, failures: Vec<Failure>) -> Self {
        self.failures = failures;
        self
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// A party that can own assets and hold a money balance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Surname")]
    pub surname: String,
    #[serde(rename = "Email")]
    pub email: String,
    /// May go negative unless the ledger enforces a floor.
    #[serde(rename = "Money")]
    pub money: i64,
}

impl Owner {
    pub fn new(id: impl Into<String>, name: &str, surname: &str, email: &str, money: i64) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            surname: surname.to_string(),
            email: email.to_string(),
            money,
        }
    }
}
