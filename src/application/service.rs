use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    Car, CarChanges, Cents, Customer, FleetLedger, IntegrityReport, LedgerError, Rental,
    RentalRecord, RentalStatus,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level rental desk operations.
/// This is the primary interface for any front end (CLI, TUI, GUI).
pub struct RentalService {
    repo: Repository,
    ledger: FleetLedger,
}

/// Which part of the fleet to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarFilter {
    #[default]
    All,
    Available,
    Rented,
}

/// Outcome of one plate in a multi-car rent.
#[derive(Debug)]
pub struct RentOutcome {
    pub plate: String,
    pub result: Result<Car, LedgerError>,
}

/// Result of handing a car back
#[derive(Debug)]
pub struct ReturnResult {
    pub car: Car,
    pub customer: Customer,
    pub rental: Rental,
}

/// Detailed customer information
#[derive(Debug)]
pub struct CustomerInfo {
    pub customer: Customer,
    pub rented_cars: Vec<Car>,
    pub outstanding: Cents,
}

impl RentalService {
    /// Create a service over an already loaded ledger.
    pub fn new(repo: Repository, ledger: FleetLedger) -> Self {
        Self { repo, ledger }
    }

    /// Initialize a new database at the given path, or open an existing one
    /// and bring its schema up to date.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        let ledger = repo.load_ledger().await?;
        debug!(database = database_path, "database initialized");
        Ok(Self::new(repo, ledger))
    }

    /// Open an existing database and load its ledger.
    pub async fn open(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        let ledger = repo.load_ledger().await?;
        debug!(
            database = database_path,
            cars = ledger.all_cars().len(),
            customers = ledger.customers().len(),
            "ledger loaded"
        );
        Ok(Self::new(repo, ledger))
    }

    /// Read-only access to the ledger for queries not wrapped here.
    pub fn ledger(&self) -> &FleetLedger {
        &self.ledger
    }

    /// Save the current ledger. If the save fails the ledger is put back to
    /// `before`, so memory never runs ahead of the database.
    async fn commit(&mut self, before: FleetLedger) -> Result<(), AppError> {
        if let Err(e) = self.repo.save_ledger(&self.ledger).await {
            warn!(error = %e, "save failed, change rolled back");
            self.ledger = before;
            return Err(e.into());
        }
        Ok(())
    }

    // ========================
    // Car operations
    // ========================

    /// Register a new car. Plates must be unique.
    pub async fn register_car(
        &mut self,
        name: &str,
        brand: &str,
        plate: &str,
        price_per_day: Cents,
        cost_price: Cents,
        color: &str,
    ) -> Result<Car, AppError> {
        self.validate_car(name, brand, plate, price_per_day, cost_price, color)?;

        let before = self.ledger.clone();
        let car = self.ledger.add_car(
            name.trim(),
            brand.trim(),
            plate.trim(),
            price_per_day,
            cost_price,
            color.trim(),
        );
        self.commit(before).await?;

        info!(id = car.id, plate = %car.plate, "car registered");
        Ok(car)
    }

    /// Check a new car against the same rules `register_car` applies,
    /// without touching the fleet.
    pub fn validate_car(
        &self,
        name: &str,
        brand: &str,
        plate: &str,
        price_per_day: Cents,
        cost_price: Cents,
        color: &str,
    ) -> Result<(), AppError> {
        required("name", name)?;
        required("brand", brand)?;
        let plate = required("plate", plate)?;
        required("color", color)?;
        non_negative("price_per_day", price_per_day)?;
        non_negative("cost_price", cost_price)?;

        if self.ledger.find_car(plate).is_some() {
            return Err(AppError::CarAlreadyExists(plate.to_string()));
        }
        Ok(())
    }

    /// Get a car by plate.
    pub fn get_car(&self, plate: &str) -> Result<Car, AppError> {
        self.ledger
            .find_car(plate)
            .cloned()
            .ok_or_else(|| LedgerError::CarNotFound(plate.to_string()).into())
    }

    pub fn list_cars(&self, filter: CarFilter) -> Vec<Car> {
        match filter {
            CarFilter::All => self.ledger.all_cars(),
            CarFilter::Available => self.ledger.available_cars(),
            CarFilter::Rented => self.ledger.rented_cars(),
        }
    }

    pub fn search_by_name(&self, name: &str) -> Vec<Car> {
        self.ledger.cars_by_name(name)
    }

    pub fn search_by_brand(&self, brand: &str) -> Vec<Car> {
        self.ledger.cars_by_brand(brand)
    }

    /// Edit a car. Renaming onto another car's plate is refused.
    pub async fn modify_car(
        &mut self,
        plate: &str,
        mut changes: CarChanges,
    ) -> Result<Car, AppError> {
        if changes.is_empty() {
            return Err(AppError::InvalidInput {
                field: "changes",
                message: "no changes given".to_string(),
            });
        }
        self.get_car(plate)?;

        if let Some(color) = changes.color.take() {
            changes.color = Some(required("color", &color)?.to_string());
        }
        if let Some(price) = changes.price_per_day {
            non_negative("price_per_day", price)?;
        }
        if let Some(cost) = changes.cost_price {
            non_negative("cost_price", cost)?;
        }
        if let Some(new_plate) = changes.plate.take() {
            let new_plate = required("plate", &new_plate)?.to_string();
            if new_plate != plate && self.ledger.find_car(&new_plate).is_some() {
                return Err(AppError::CarAlreadyExists(new_plate));
            }
            changes.plate = Some(new_plate);
        }

        let before = self.ledger.clone();
        let car = self.ledger.modify_car(plate, changes)?;
        self.commit(before).await?;

        info!(id = car.id, plate = %car.plate, "car updated");
        Ok(car)
    }

    /// Remove a car from the fleet. Rented cars must be returned first.
    pub async fn remove_car(&mut self, plate: &str) -> Result<Car, AppError> {
        let before = self.ledger.clone();
        let car = self.ledger.remove_car(plate)?;
        self.commit(before).await?;

        info!(id = car.id, plate = %car.plate, "car removed");
        Ok(car)
    }

    // ========================
    // Customer operations
    // ========================

    /// Register a new customer. Neither the license nor the national id may
    /// belong to an existing customer.
    pub async fn register_customer(
        &mut self,
        name: &str,
        age: u32,
        license: &str,
        national_id: &str,
    ) -> Result<Customer, AppError> {
        let name = required("name", name)?;
        let license = required("license", license)?;
        let national_id = required("national_id", national_id)?;

        if self
            .ledger
            .find_customer_matching(license, national_id)
            .is_some()
        {
            return Err(AppError::CustomerAlreadyExists {
                license: license.to_string(),
                national_id: national_id.to_string(),
            });
        }

        let before = self.ledger.clone();
        let customer = self.ledger.add_customer(name, age, license, national_id);
        self.commit(before).await?;

        info!(id = customer.id, license = %customer.license, "customer registered");
        Ok(customer)
    }

    /// Get a customer with their current rentals.
    pub fn get_customer(&self, license: &str) -> Result<CustomerInfo, AppError> {
        let customer = self
            .ledger
            .find_customer(license)
            .cloned()
            .ok_or_else(|| LedgerError::CustomerNotFound(license.to_string()))?;
        let rented_cars = self.ledger.customer_rentals(license)?;
        let outstanding = rented_cars
            .iter()
            .filter_map(Car::total_price)
            .try_fold(0, Cents::checked_add)
            .ok_or_else(|| LedgerError::OutstandingOverflow(license.to_string()))?;

        Ok(CustomerInfo {
            customer,
            rented_cars,
            outstanding,
        })
    }

    pub fn list_customers(&self) -> Vec<Customer> {
        self.ledger.customers()
    }

    pub fn customer_rentals(&self, license: &str) -> Result<Vec<Car>, AppError> {
        Ok(self.ledger.customer_rentals(license)?)
    }

    /// Remove a customer. Customers with cars still out are refused.
    pub async fn remove_customer(&mut self, license: &str) -> Result<Customer, AppError> {
        let before = self.ledger.clone();
        let customer = self.ledger.remove_customer(license)?;
        self.commit(before).await?;

        info!(id = customer.id, license = %customer.license, "customer removed");
        Ok(customer)
    }

    // ========================
    // Rentals
    // ========================

    /// Rent one car.
    pub async fn rent_car(
        &mut self,
        license: &str,
        plate: &str,
        days: u32,
        rented_at: DateTime<Utc>,
    ) -> Result<RentalRecord, AppError> {
        let before = self.ledger.clone();
        let car = self.ledger.rent(license, plate, days, rented_at)?;
        self.commit(before).await?;

        let record = self.record_for(car)?;
        info!(
            plate = %record.car.plate,
            license = %record.customer.license,
            days,
            total = record.rental.total_price,
            "car rented"
        );
        Ok(record)
    }

    /// Rent several cars to one customer for the same number of days.
    ///
    /// Each plate succeeds or fails on its own; an unknown customer fails
    /// the whole call before any car is touched.
    pub async fn rent_cars(
        &mut self,
        license: &str,
        plates: &[String],
        days: u32,
        rented_at: DateTime<Utc>,
    ) -> Result<Vec<RentOutcome>, AppError> {
        if self.ledger.find_customer(license).is_none() {
            return Err(LedgerError::CustomerNotFound(license.to_string()).into());
        }

        let before = self.ledger.clone();
        let outcomes: Vec<RentOutcome> = plates
            .iter()
            .map(|plate| RentOutcome {
                plate: plate.clone(),
                result: self.ledger.rent(license, plate, days, rented_at),
            })
            .collect();

        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                warn!(plate = %outcome.plate, error = %e, "car not rented");
            }
        }

        let rented = outcomes.iter().filter(|o| o.result.is_ok()).count();
        if rented > 0 {
            self.commit(before).await?;
            info!(license, rented, "cars rented");
        }
        Ok(outcomes)
    }

    /// Take a rented car back.
    pub async fn return_car(&mut self, plate: &str) -> Result<ReturnResult, AppError> {
        let before = self.ledger.clone();
        let released = self.ledger.release(plate)?;
        self.commit(before).await?;

        let customer = self
            .ledger
            .customer(released.rental.customer_id)
            .cloned()
            .ok_or_else(|| {
                LedgerError::CorruptSnapshot(format!(
                    "car {} was rented by unknown customer {}",
                    plate, released.rental.customer_id
                ))
            })?;

        info!(plate, license = %customer.license, "car returned");
        Ok(ReturnResult {
            car: released.car,
            customer,
            rental: released.rental,
        })
    }

    pub fn rental_status(&self, plate: &str) -> Result<RentalStatus, AppError> {
        Ok(self.ledger.rental_status(plate)?)
    }

    pub fn rentals(&self) -> Vec<RentalRecord> {
        self.ledger.rentals()
    }

    fn record_for(&self, car: Car) -> Result<RentalRecord, AppError> {
        let rental = car
            .rental
            .clone()
            .ok_or_else(|| LedgerError::CarNotRented(car.plate.clone()))?;
        let customer = self
            .ledger
            .customer(rental.customer_id)
            .cloned()
            .ok_or_else(|| {
                LedgerError::CorruptSnapshot(format!(
                    "car {} is rented by unknown customer {}",
                    car.plate, rental.customer_id
                ))
            })?;
        Ok(RentalRecord {
            car,
            customer,
            rental,
        })
    }

    // ========================
    // Integrity
    // ========================

    pub fn check(&self) -> IntegrityReport {
        self.ledger.check_integrity()
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidInput {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

fn non_negative(field: &'static str, amount: Cents) -> Result<(), AppError> {
    if amount < 0 {
        return Err(AppError::InvalidInput {
            field,
            message: "must not be negative".to_string(),
        });
    }
    Ok(())
}
