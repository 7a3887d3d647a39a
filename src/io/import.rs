use anyhow::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;

use crate::application::{AppError, RentalService};
use crate::domain::{Cents, parse_price};

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub skip_duplicates: bool,
}

/// One car row. Columns are matched by header name, extra columns ignored.
#[derive(Debug, Deserialize)]
struct CarRow {
    name: String,
    brand: String,
    plate: String,
    price_per_day: String,
    cost_price: String,
    color: String,
}

/// Importer for loading cars into the fleet
pub struct Importer<'a> {
    service: &'a mut RentalService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a mut RentalService) -> Self {
        Self { service }
    }

    /// Import cars from CSV with header
    /// `name,brand,plate,price_per_day,cost_price,color`.
    pub async fn import_cars_csv<R: Read>(
        &mut self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();
        // Plates a dry run would have registered so far.
        let mut planned = HashSet::new();

        for (line_num, result) in csv_reader.deserialize::<CarRow>().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let row = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let price_per_day = match parse_price(&row.price_per_day) {
                Ok(p) => p,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: Some("price_per_day".to_string()),
                        error: format!("Invalid price: {}", e),
                    });
                    continue;
                }
            };
            let cost_price = match parse_price(&row.cost_price) {
                Ok(p) => p,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: Some("cost_price".to_string()),
                        error: format!("Invalid price: {}", e),
                    });
                    continue;
                }
            };

            let outcome = if options.dry_run {
                self.check_row(&row, price_per_day, cost_price, &mut planned)
            } else {
                self.service
                    .register_car(
                        &row.name,
                        &row.brand,
                        &row.plate,
                        price_per_day,
                        cost_price,
                        &row.color,
                    )
                    .await
                    .map(|_| ())
            };

            match outcome {
                Ok(()) => imported += 1,
                Err(AppError::CarAlreadyExists(plate)) => {
                    if options.skip_duplicates {
                        skipped += 1;
                    } else {
                        errors.push(duplicate_error(line, &plate));
                    }
                }
                Err(AppError::InvalidInput { field, message }) => errors.push(ImportError {
                    line,
                    field: Some(field.to_string()),
                    error: message,
                }),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ImportResult {
            imported,
            skipped,
            errors,
        })
    }

    /// Dry-run counterpart of `register_car`: the same checks, with plates
    /// from earlier rows of the file counted as taken.
    fn check_row(
        &self,
        row: &CarRow,
        price_per_day: Cents,
        cost_price: Cents,
        planned: &mut HashSet<String>,
    ) -> Result<(), AppError> {
        self.service.validate_car(
            &row.name,
            &row.brand,
            &row.plate,
            price_per_day,
            cost_price,
            &row.color,
        )?;

        let plate = row.plate.trim();
        if !planned.insert(plate.to_string()) {
            return Err(AppError::CarAlreadyExists(plate.to_string()));
        }
        Ok(())
    }
}

fn duplicate_error(line: usize, plate: &str) -> ImportError {
    ImportError {
        line,
        field: Some("plate".to_string()),
        error: format!("Car with license plate {} already exists", plate),
    }
}
