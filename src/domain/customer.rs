use std::fmt;

use serde::{Deserialize, Serialize};

pub type CustomerId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub age: u32,
    /// Driving license number, used as the lookup key.
    pub license: String,
    pub national_id: String,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: impl Into<String>,
        age: u32,
        license: impl Into<String>,
        national_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            age,
            license: license.into(),
            national_id: national_id.into(),
        }
    }

    /// True when either identifier collides with the given ones.
    pub fn matches(&self, license: &str, national_id: &str) -> bool {
        self.license == license || self.national_id == national_id
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} (age {}), license {}, national id {}",
            self.id, self.name, self.age, self.license, self.national_id
        )
    }
}
