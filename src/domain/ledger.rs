use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    rental_total, Car, CarChanges, CarId, Cents, Customer, CustomerId, LedgerError, Rental,
};

/// Where a car stands in the rent/release cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentalStatus {
    Available,
    Rented { customer: Customer, rental: Rental },
}

/// An active rental joined with both of its parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RentalRecord {
    pub car: Car,
    pub customer: Customer,
    pub rental: Rental,
}

/// A car handed back, together with the rental that just ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Released {
    pub car: Car,
    pub rental: Rental,
}

/// Counts used to verify ledger consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub car_count: usize,
    pub customer_count: usize,
    pub available_count: usize,
    pub rented_count: usize,
    /// Plates of rented cars whose renter is not a known customer.
    pub dangling_rentals: Vec<String>,
    /// Plates that appear on more than one car.
    pub duplicate_plates: Vec<String>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.available_count + self.rented_count == self.car_count
            && self.dangling_rentals.is_empty()
    }
}

/// In-memory store of cars, customers and the rentals binding them.
///
/// Records are kept in id order; lookups by plate or license scan that order
/// and return the first exact match. The ledger does not enforce uniqueness
/// of plates or licenses: that is the caller's job.
#[derive(Debug, Clone)]
pub struct FleetLedger {
    cars: BTreeMap<CarId, Car>,
    customers: BTreeMap<CustomerId, Customer>,
    next_car_id: CarId,
    next_customer_id: CustomerId,
}

impl Default for FleetLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetLedger {
    pub fn new() -> Self {
        Self {
            cars: BTreeMap::new(),
            customers: BTreeMap::new(),
            next_car_id: 1,
            next_customer_id: 1,
        }
    }

    /// Rebuild a ledger from previously saved records.
    ///
    /// Rejects snapshots with repeated ids, ids at or beyond the saved
    /// counters, or rentals pointing at unknown customers.
    pub fn restore(
        cars: Vec<Car>,
        customers: Vec<Customer>,
        next_car_id: CarId,
        next_customer_id: CustomerId,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            cars: BTreeMap::new(),
            customers: BTreeMap::new(),
            next_car_id,
            next_customer_id,
        };

        for customer in customers {
            if customer.id == 0 || customer.id >= next_customer_id {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "customer id {} outside 1..{}",
                    customer.id, next_customer_id
                )));
            }
            if let Some(previous) = ledger.customers.insert(customer.id, customer) {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "duplicate customer id {}",
                    previous.id
                )));
            }
        }

        for car in cars {
            if car.id == 0 || car.id >= next_car_id {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "car id {} outside 1..{}",
                    car.id, next_car_id
                )));
            }
            if let Some(renter) = car.renter() {
                if !ledger.customers.contains_key(&renter) {
                    return Err(LedgerError::CorruptSnapshot(format!(
                        "car {} is rented by unknown customer {}",
                        car.plate, renter
                    )));
                }
            }
            if let Some(previous) = ledger.cars.insert(car.id, car) {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "duplicate car id {}",
                    previous.id
                )));
            }
        }

        Ok(ledger)
    }

    /// Id the next added car will get.
    pub fn next_car_id(&self) -> CarId {
        self.next_car_id
    }

    /// Id the next added customer will get.
    pub fn next_customer_id(&self) -> CustomerId {
        self.next_customer_id
    }

    // ========================
    // Records
    // ========================

    /// Add a car to the fleet. New cars are available.
    pub fn add_car(
        &mut self,
        name: impl Into<String>,
        brand: impl Into<String>,
        plate: impl Into<String>,
        price_per_day: Cents,
        cost_price: Cents,
        color: impl Into<String>,
    ) -> Car {
        let id = self.next_car_id;
        self.next_car_id += 1;

        let car = Car::new(id, name, brand, plate, price_per_day, cost_price, color);
        self.cars.insert(id, car.clone());
        car
    }

    pub fn add_customer(
        &mut self,
        name: impl Into<String>,
        age: u32,
        license: impl Into<String>,
        national_id: impl Into<String>,
    ) -> Customer {
        let id = self.next_customer_id;
        self.next_customer_id += 1;

        let customer = Customer::new(id, name, age, license, national_id);
        self.customers.insert(id, customer.clone());
        customer
    }

    pub fn find_car(&self, plate: &str) -> Option<&Car> {
        self.cars.values().find(|car| car.plate == plate)
    }

    pub fn find_customer(&self, license: &str) -> Option<&Customer> {
        self.customers.values().find(|c| c.license == license)
    }

    /// First customer whose license or national id matches.
    pub fn find_customer_matching(&self, license: &str, national_id: &str) -> Option<&Customer> {
        self.customers
            .values()
            .find(|c| c.matches(license, national_id))
    }

    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    fn find_car_mut(&mut self, plate: &str) -> Result<&mut Car, LedgerError> {
        self.cars
            .values_mut()
            .find(|car| car.plate == plate)
            .ok_or_else(|| LedgerError::CarNotFound(plate.to_string()))
    }

    fn require_customer(&self, license: &str) -> Result<&Customer, LedgerError> {
        self.find_customer(license)
            .ok_or_else(|| LedgerError::CustomerNotFound(license.to_string()))
    }

    fn rented_by(&self, customer_id: CustomerId) -> impl Iterator<Item = &Car> {
        self.cars
            .values()
            .filter(move |car| car.renter() == Some(customer_id))
    }

    /// Remove a car. Rented cars must be released first.
    pub fn remove_car(&mut self, plate: &str) -> Result<Car, LedgerError> {
        let car = self.find_car_mut(plate)?;
        if car.is_rented() {
            return Err(LedgerError::CarIsRented(plate.to_string()));
        }
        let id = car.id;
        self.cars
            .remove(&id)
            .ok_or_else(|| LedgerError::CarNotFound(plate.to_string()))
    }

    /// Remove a customer. Customers still renting cars are refused so no car
    /// is left bound to a missing renter.
    pub fn remove_customer(&mut self, license: &str) -> Result<Customer, LedgerError> {
        let customer = self.require_customer(license)?;
        let id = customer.id;

        let count = self.rented_by(id).count();
        if count > 0 {
            return Err(LedgerError::CustomerHasRentals {
                license: license.to_string(),
                count,
            });
        }

        self.customers
            .remove(&id)
            .ok_or_else(|| LedgerError::CustomerNotFound(license.to_string()))
    }

    /// Edit a car's color, prices or plate. Rentals are keyed by id, so a
    /// plate change keeps an active rental attached.
    pub fn modify_car(&mut self, plate: &str, changes: CarChanges) -> Result<Car, LedgerError> {
        let car = self.find_car_mut(plate)?;
        changes.apply(car);
        Ok(car.clone())
    }

    // ========================
    // Rent / release
    // ========================

    /// Rent the car with `plate` to the customer holding `license`.
    pub fn rent(
        &mut self,
        license: &str,
        plate: &str,
        days: u32,
        rented_at: DateTime<Utc>,
    ) -> Result<Car, LedgerError> {
        let customer_id = self.require_customer(license)?.id;

        let car = self.find_car_mut(plate)?;
        if car.is_rented() {
            return Err(LedgerError::CarNotAvailable(plate.to_string()));
        }
        if days == 0 {
            return Err(LedgerError::InvalidDays);
        }
        let total_price =
            rental_total(car.price_per_day, days).ok_or(LedgerError::PriceOverflow {
                price_per_day: car.price_per_day,
                days,
            })?;

        car.rental = Some(Rental {
            customer_id,
            rented_at,
            days,
            total_price,
        });
        Ok(car.clone())
    }

    /// Hand a rented car back, making it available again.
    pub fn release(&mut self, plate: &str) -> Result<Released, LedgerError> {
        let car = self.find_car_mut(plate)?;
        let rental = car
            .rental
            .take()
            .ok_or_else(|| LedgerError::CarNotRented(plate.to_string()))?;
        Ok(Released {
            car: car.clone(),
            rental,
        })
    }

    pub fn rental_status(&self, plate: &str) -> Result<RentalStatus, LedgerError> {
        let car = self
            .find_car(plate)
            .ok_or_else(|| LedgerError::CarNotFound(plate.to_string()))?;

        match &car.rental {
            None => Ok(RentalStatus::Available),
            Some(rental) => {
                let customer = self.customers.get(&rental.customer_id).ok_or_else(|| {
                    LedgerError::CorruptSnapshot(format!(
                        "car {} is rented by unknown customer {}",
                        plate, rental.customer_id
                    ))
                })?;
                Ok(RentalStatus::Rented {
                    customer: customer.clone(),
                    rental: rental.clone(),
                })
            }
        }
    }

    // ========================
    // Snapshots
    // ========================

    pub fn all_cars(&self) -> Vec<Car> {
        self.cars.values().cloned().collect()
    }

    pub fn available_cars(&self) -> Vec<Car> {
        self.cars
            .values()
            .filter(|car| car.is_available())
            .cloned()
            .collect()
    }

    pub fn rented_cars(&self) -> Vec<Car> {
        self.cars
            .values()
            .filter(|car| car.is_rented())
            .cloned()
            .collect()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.customers.values().cloned().collect()
    }

    pub fn cars_by_name(&self, name: &str) -> Vec<Car> {
        self.cars
            .values()
            .filter(|car| car.name == name)
            .cloned()
            .collect()
    }

    pub fn cars_by_brand(&self, brand: &str) -> Vec<Car> {
        self.cars
            .values()
            .filter(|car| car.brand == brand)
            .cloned()
            .collect()
    }

    /// Cars currently rented by the customer holding `license`.
    pub fn customer_rentals(&self, license: &str) -> Result<Vec<Car>, LedgerError> {
        let customer = self.require_customer(license)?;
        Ok(self.rented_by(customer.id).cloned().collect())
    }

    /// Every active rental with its car and customer.
    pub fn rentals(&self) -> Vec<RentalRecord> {
        self.cars
            .values()
            .filter_map(|car| {
                let rental = car.rental.as_ref()?;
                let customer = self.customers.get(&rental.customer_id)?;
                Some(RentalRecord {
                    car: car.clone(),
                    customer: customer.clone(),
                    rental: rental.clone(),
                })
            })
            .collect()
    }

    pub fn check_integrity(&self) -> IntegrityReport {
        let mut seen = HashSet::new();
        let mut duplicate_plates = Vec::new();
        for car in self.cars.values() {
            if !seen.insert(car.plate.as_str()) && !duplicate_plates.contains(&car.plate) {
                duplicate_plates.push(car.plate.clone());
            }
        }

        IntegrityReport {
            car_count: self.cars.len(),
            customer_count: self.customers.len(),
            available_count: self.cars.values().filter(|c| c.is_available()).count(),
            rented_count: self.cars.values().filter(|c| c.is_rented()).count(),
            dangling_rentals: self
                .cars
                .values()
                .filter(|car| {
                    car.renter()
                        .is_some_and(|id| !self.customers.contains_key(&id))
                })
                .map(|car| car.plate.clone())
                .collect(),
            duplicate_plates,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    /// Two cars and one customer.
    fn seeded() -> FleetLedger {
        let mut ledger = FleetLedger::new();
        ledger.add_car("Corolla", "Toyota", "AB-123", 5000, 2_000_000, "red");
        ledger.add_car("Golf", "Volkswagen", "CD-456", 6000, 2_500_000, "black");
        ledger.add_customer("Ada", 34, "LIC-1", "NID-1");
        ledger
    }

    fn assert_partitioned(ledger: &FleetLedger) {
        let available = ledger.available_cars();
        let rented = ledger.rented_cars();
        for car in ledger.all_cars() {
            let in_available = available.iter().any(|c| c.id == car.id);
            let in_rented = rented.iter().any(|c| c.id == car.id);
            assert!(in_available ^ in_rented, "car {} must be in exactly one set", car.plate);
        }
    }

    #[test]
    fn test_sequential_ids() {
        let mut ledger = FleetLedger::new();
        let ids: Vec<CarId> = (0..5)
            .map(|i| {
                ledger
                    .add_car("Car", "Brand", format!("P-{i}"), 1000, 1000, "white")
                    .id
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let first = ledger.add_customer("A", 20, "L1", "N1");
        let second = ledger.add_customer("B", 21, "L2", "N2");
        assert_eq!((first.id, second.id), (1, 2));
    }

    #[test]
    fn test_new_cars_are_available() {
        let ledger = seeded();
        assert_eq!(ledger.all_cars().len(), 2);
        assert_eq!(ledger.available_cars().len(), 2);
        assert!(ledger.rented_cars().is_empty());
        assert_partitioned(&ledger);
    }

    #[test]
    fn test_find_car_and_customer() {
        let ledger = seeded();
        assert_eq!(ledger.find_car("CD-456").map(|c| c.id), Some(2));
        assert!(ledger.find_car("nope").is_none());
        assert_eq!(ledger.find_customer("LIC-1").map(|c| c.id), Some(1));
        assert!(ledger.find_customer("LIC-2").is_none());
        assert!(ledger.find_customer_matching("other", "NID-1").is_some());
    }

    #[test]
    fn test_find_returns_first_match() {
        let mut ledger = FleetLedger::new();
        ledger.add_car("First", "X", "DUP", 100, 100, "red");
        ledger.add_car("Second", "X", "DUP", 100, 100, "red");
        assert_eq!(ledger.find_car("DUP").map(|c| c.name.as_str()), Some("First"));
        assert_eq!(ledger.check_integrity().duplicate_plates, vec!["DUP".to_string()]);
    }

    #[test]
    fn test_rent_computes_total() {
        let mut ledger = seeded();
        let car = ledger.rent("LIC-1", "AB-123", 3, now()).unwrap();

        let rental = car.rental.unwrap();
        assert_eq!(rental.total_price, 15000);
        assert_eq!(rental.days, 3);
        assert_eq!(rental.customer_id, 1);
        assert_eq!(rental.rented_at, now());
        assert_partitioned(&ledger);
    }

    #[test]
    fn test_rent_binds_both_sides() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "CD-456", 2, now()).unwrap();

        let rented = ledger.customer_rentals("LIC-1").unwrap();
        assert_eq!(rented.len(), 1);
        assert_eq!(rented[0].plate, "CD-456");
        assert_eq!(ledger.find_car("CD-456").unwrap().renter(), Some(1));
    }

    #[test]
    fn test_rent_unknown_customer_or_car() {
        let mut ledger = seeded();
        assert_eq!(
            ledger.rent("LIC-9", "AB-123", 1, now()),
            Err(LedgerError::CustomerNotFound("LIC-9".into()))
        );

        let err = ledger.rent("LIC-1", "ZZ-000", 1, now()).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("not found"));
        assert_eq!(ledger.available_cars().len(), 2);
    }

    #[test]
    fn test_rent_twice_fails_without_mutation() {
        let mut ledger = seeded();
        ledger.add_customer("Bob", 40, "LIC-2", "NID-2");
        ledger.rent("LIC-1", "AB-123", 3, now()).unwrap();

        let available_before = ledger.available_cars();
        let rented_before = ledger.rented_cars();

        let result = ledger.rent("LIC-2", "AB-123", 5, now());
        assert_eq!(result, Err(LedgerError::CarNotAvailable("AB-123".into())));
        assert_eq!(ledger.available_cars(), available_before);
        assert_eq!(ledger.rented_cars(), rented_before);
        assert!(ledger.customer_rentals("LIC-2").unwrap().is_empty());
    }

    #[test]
    fn test_rent_zero_days_rejected() {
        let mut ledger = seeded();
        assert_eq!(
            ledger.rent("LIC-1", "AB-123", 0, now()),
            Err(LedgerError::InvalidDays)
        );
        assert!(ledger.find_car("AB-123").unwrap().is_available());
    }

    #[test]
    fn test_rent_overflow_rejected() {
        let mut ledger = FleetLedger::new();
        ledger.add_car("Hyper", "X", "BIG", i64::MAX, 0, "gold");
        ledger.add_customer("Ada", 34, "LIC-1", "NID-1");
        assert!(matches!(
            ledger.rent("LIC-1", "BIG", 2, now()),
            Err(LedgerError::PriceOverflow { days: 2, .. })
        ));
        assert!(ledger.find_car("BIG").unwrap().is_available());
    }

    #[test]
    fn test_release_restores_availability() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "AB-123", 3, now()).unwrap();

        let released = ledger.release("AB-123").unwrap();
        assert_eq!(released.rental.total_price, 15000);
        assert!(released.car.is_available());

        let car = ledger.find_car("AB-123").unwrap();
        assert_eq!(car.renter(), None);
        assert_eq!(car.total_price(), None);
        assert!(ledger.customer_rentals("LIC-1").unwrap().is_empty());
        assert_eq!(ledger.available_cars().len(), 2);
        assert_partitioned(&ledger);
    }

    #[test]
    fn test_release_available_or_unknown_car() {
        let mut ledger = seeded();
        assert_eq!(
            ledger.release("AB-123"),
            Err(LedgerError::CarNotRented("AB-123".into()))
        );
        assert_eq!(
            ledger.release("nope"),
            Err(LedgerError::CarNotFound("nope".into()))
        );
    }

    #[test]
    fn test_remove_rented_car_fails() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "AB-123", 1, now()).unwrap();

        let err = ledger.remove_car("AB-123").unwrap_err();
        assert!(err.to_string().contains("rented"));
        assert_eq!(ledger.all_cars().len(), 2);
    }

    #[test]
    fn test_remove_available_car() {
        let mut ledger = seeded();
        let removed = ledger.remove_car("CD-456").unwrap();
        assert_eq!(removed.id, 2);
        assert!(ledger.find_car("CD-456").is_none());
        assert!(ledger.available_cars().iter().all(|c| c.plate != "CD-456"));
        assert_eq!(ledger.all_cars().len(), 1);

        // ids are never reused
        assert_eq!(ledger.add_car("New", "X", "EF-789", 1, 1, "grey").id, 3);
    }

    #[test]
    fn test_remove_customer_with_rentals_rejected() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "AB-123", 1, now()).unwrap();

        assert_eq!(
            ledger.remove_customer("LIC-1"),
            Err(LedgerError::CustomerHasRentals {
                license: "LIC-1".into(),
                count: 1
            })
        );
        assert!(ledger.find_customer("LIC-1").is_some());

        ledger.release("AB-123").unwrap();
        assert!(ledger.remove_customer("LIC-1").is_ok());
        assert!(ledger.customers().is_empty());
    }

    #[test]
    fn test_modify_car_renames_rented_plate() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "AB-123", 2, now()).unwrap();

        let car = ledger
            .modify_car("AB-123", CarChanges::new().with_plate("NEW-1"))
            .unwrap();
        assert_eq!(car.plate, "NEW-1");
        assert!(ledger.find_car("AB-123").is_none());
        assert_eq!(ledger.customer_rentals("LIC-1").unwrap()[0].plate, "NEW-1");
        assert!(ledger.release("NEW-1").is_ok());
    }

    #[test]
    fn test_modify_unknown_car() {
        let mut ledger = seeded();
        assert!(
            ledger
                .modify_car("nope", CarChanges::new().with_color("red"))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_search_by_name_and_brand() {
        let mut ledger = seeded();
        ledger.add_car("Corolla", "Toyota", "GH-000", 4500, 1_800_000, "white");

        assert_eq!(ledger.cars_by_name("Corolla").len(), 2);
        assert_eq!(ledger.cars_by_brand("Volkswagen").len(), 1);
        assert!(ledger.cars_by_brand("toyota").is_empty());
    }

    #[test]
    fn test_snapshots_are_copies() {
        let mut ledger = seeded();
        let before = ledger.available_cars();
        ledger.rent("LIC-1", "AB-123", 1, now()).unwrap();
        assert_eq!(before.len(), 2);
        assert!(before[0].is_available());
    }

    #[test]
    fn test_rental_status_and_records() {
        let mut ledger = seeded();
        assert_eq!(ledger.rental_status("AB-123"), Ok(RentalStatus::Available));

        ledger.rent("LIC-1", "AB-123", 4, now()).unwrap();
        match ledger.rental_status("AB-123").unwrap() {
            RentalStatus::Rented { customer, rental } => {
                assert_eq!(customer.name, "Ada");
                assert_eq!(rental.total_price, 20000);
            }
            RentalStatus::Available => panic!("car should be rented"),
        }

        let records = ledger.rentals();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer.license, "LIC-1");
        assert!(ledger.rental_status("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_restore_round_trip() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "AB-123", 2, now()).unwrap();

        let restored = FleetLedger::restore(
            ledger.all_cars(),
            ledger.customers(),
            ledger.next_car_id(),
            ledger.next_customer_id(),
        )
        .unwrap();

        assert_eq!(restored.all_cars(), ledger.all_cars());
        assert_eq!(restored.customers(), ledger.customers());
        assert_eq!(restored.next_car_id(), 3);
        assert!(restored.check_integrity().is_consistent());
    }

    #[test]
    fn test_restore_rejects_dangling_renter() {
        let mut ledger = seeded();
        ledger.rent("LIC-1", "AB-123", 2, now()).unwrap();

        let result = FleetLedger::restore(ledger.all_cars(), Vec::new(), 3, 1);
        assert!(matches!(result, Err(LedgerError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_restore_rejects_ids_past_counter() {
        let ledger = seeded();
        let result = FleetLedger::restore(ledger.all_cars(), ledger.customers(), 2, 2);
        assert!(matches!(result, Err(LedgerError::CorruptSnapshot(_))));
    }
}
