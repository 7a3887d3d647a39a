use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{CarFilter, RentalService};
use crate::domain::{format_cents, Car, Customer};

/// Full fleet snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub cars: Vec<Car>,
    pub customers: Vec<Customer>,
}

/// Exporter for writing fleet data out as CSV or JSON
pub struct Exporter<'a> {
    service: &'a RentalService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a RentalService) -> Self {
        Self { service }
    }

    /// Export cars to CSV. The output can be read back by the car importer.
    pub fn export_cars_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let cars = self.service.list_cars(CarFilter::All);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "brand",
            "plate",
            "price_per_day",
            "cost_price",
            "color",
            "status",
        ])?;

        for car in &cars {
            csv_writer.write_record([
                car.id.to_string(),
                car.name.clone(),
                car.brand.clone(),
                car.plate.clone(),
                format_cents(car.price_per_day),
                format_cents(car.cost_price),
                car.color.clone(),
                if car.is_rented() { "rented" } else { "available" }.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(cars.len())
    }

    /// Export customers to CSV
    pub fn export_customers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let customers = self.service.list_customers();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "age", "license", "national_id"])?;

        for customer in &customers {
            csv_writer.write_record([
                customer.id.to_string(),
                customer.name.clone(),
                customer.age.to_string(),
                customer.license.clone(),
                customer.national_id.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(customers.len())
    }

    /// Export active rentals to CSV
    pub fn export_rentals_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let rentals = self.service.rentals();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "license",
            "plate",
            "rented_at",
            "days",
            "due_at",
            "total_price",
        ])?;

        for record in &rentals {
            csv_writer.write_record([
                record.customer.license.clone(),
                record.car.plate.clone(),
                record.rental.rented_at.to_rfc3339(),
                record.rental.days.to_string(),
                record.rental.due_at().to_rfc3339(),
                format_cents(record.rental.total_price),
            ])?;
        }

        csv_writer.flush()?;
        Ok(rentals.len())
    }

    /// Export the whole fleet as a JSON snapshot
    pub fn export_full_json<W: Write>(&self, mut writer: W) -> Result<FleetSnapshot> {
        let snapshot = FleetSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            cars: self.service.list_cars(CarFilter::All),
            customers: self.service.list_customers(),
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
