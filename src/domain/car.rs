use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{format_cents, Cents, CustomerId};

pub type CarId = u32;

/// The binding of a car to the customer renting it.
///
/// Stored on the car record and keyed by customer id, so a car never holds a
/// reference to a customer and a customer never owns its cars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub customer_id: CustomerId,
    pub rented_at: DateTime<Utc>,
    pub days: u32,
    pub total_price: Cents,
}

impl Rental {
    /// When the car is expected back.
    pub fn due_at(&self) -> DateTime<Utc> {
        self.rented_at + Duration::days(i64::from(self.days))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub name: String,
    pub brand: String,
    pub plate: String,
    pub price_per_day: Cents,
    pub cost_price: Cents,
    pub color: String,
    pub rental: Option<Rental>,
}

impl Car {
    pub fn new(
        id: CarId,
        name: impl Into<String>,
        brand: impl Into<String>,
        plate: impl Into<String>,
        price_per_day: Cents,
        cost_price: Cents,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            brand: brand.into(),
            plate: plate.into(),
            price_per_day,
            cost_price,
            color: color.into(),
            rental: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.rental.is_none()
    }

    pub fn is_rented(&self) -> bool {
        self.rental.is_some()
    }

    /// Id of the customer currently renting this car, if any.
    pub fn renter(&self) -> Option<CustomerId> {
        self.rental.as_ref().map(|r| r.customer_id)
    }

    /// Total charge of the current rental, if any.
    pub fn total_price(&self) -> Option<Cents> {
        self.rental.as_ref().map(|r| r.total_price)
    }
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} [{}] {} - {}/day (cost {})",
            self.id,
            self.brand,
            self.name,
            self.plate,
            self.color,
            format_cents(self.price_per_day),
            format_cents(self.cost_price)
        )?;
        if let Some(rental) = &self.rental {
            write!(
                f,
                ", rented {} day(s) since {}, total {}",
                rental.days,
                rental.rented_at.format("%Y-%m-%d"),
                format_cents(rental.total_price)
            )?;
        }
        Ok(())
    }
}

/// A set of field edits for an existing car.
///
/// Each field is applied only when present; there is no implied grouping
/// between fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarChanges {
    pub color: Option<String>,
    pub price_per_day: Option<Cents>,
    pub cost_price: Option<Cents>,
    pub plate: Option<String>,
}

impl CarChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_price_per_day(mut self, price: Cents) -> Self {
        self.price_per_day = Some(price);
        self
    }

    pub fn with_cost_price(mut self, price: Cents) -> Self {
        self.cost_price = Some(price);
        self
    }

    pub fn with_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = Some(plate.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.price_per_day.is_none()
            && self.cost_price.is_none()
            && self.plate.is_none()
    }

    /// Apply the present fields to `car`.
    pub(crate) fn apply(self, car: &mut Car) {
        if let Some(color) = self.color {
            car.color = color;
        }
        if let Some(price) = self.price_per_day {
            car.price_per_day = price;
        }
        if let Some(cost) = self.cost_price {
            car.cost_price = cost;
        }
        if let Some(plate) = self.plate {
            car.plate = plate;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_car() -> Car {
        Car::new(1, "Corolla", "Toyota", "AB-123", 5000, 2_000_000, "red")
    }

    #[test]
    fn test_new_car_is_available() {
        let car = sample_car();
        assert!(car.is_available());
        assert!(!car.is_rented());
        assert_eq!(car.renter(), None);
        assert_eq!(car.total_price(), None);
    }

    #[test]
    fn test_changes_apply_only_present_fields() {
        let mut car = sample_car();
        CarChanges::new().with_color("blue").apply(&mut car);

        assert_eq!(car.color, "blue");
        assert_eq!(car.price_per_day, 5000);
        assert_eq!(car.cost_price, 2_000_000);
        assert_eq!(car.plate, "AB-123");
    }

    #[test]
    fn test_changes_apply_several_fields() {
        let mut car = sample_car();
        CarChanges::new()
            .with_plate("ZZ-999")
            .with_price_per_day(7500)
            .apply(&mut car);

        assert_eq!(car.plate, "ZZ-999");
        assert_eq!(car.price_per_day, 7500);
        assert_eq!(car.color, "red");
    }

    #[test]
    fn test_empty_changes() {
        assert!(CarChanges::new().is_empty());
        assert!(!CarChanges::new().with_cost_price(1).is_empty());
    }

    #[test]
    fn test_rental_due_date() {
        let rental = Rental {
            customer_id: 1,
            rented_at: Utc.with_ymd_and_hms(2024, 3, 30, 10, 0, 0).unwrap(),
            days: 3,
            total_price: 15000,
        };
        assert_eq!(
            rental.due_at(),
            Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_display_mentions_rental() {
        let mut car = sample_car();
        assert!(!car.to_string().contains("rented"));

        car.rental = Some(Rental {
            customer_id: 1,
            rented_at: Utc::now(),
            days: 2,
            total_price: 10000,
        });
        let text = car.to_string();
        assert!(text.contains("rented 2 day(s)"));
        assert!(text.contains("total 100.00"));
    }
}
