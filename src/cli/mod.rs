use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Parser, Subcommand};

use crate::application::{CarFilter, RentalService};
use crate::domain::{format_cents, parse_price, Car, CarChanges, Cents, RentalStatus};

/// autorent - Car Rental Ledger
#[derive(Parser)]
#[command(name = "autorent")]
#[command(about = "Keep track of a rental fleet, its customers and who is driving what")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "AUTORENT_DB", default_value = "autorent.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Fleet management commands
    #[command(subcommand)]
    Car(CarCommands),

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Rent one or more cars to a customer
    Rent {
        /// License plate(s) of the car(s) to rent
        #[arg(required = true)]
        plates: Vec<String>,

        /// Customer's driving license number
        #[arg(short, long)]
        customer: String,

        /// Number of rental days
        #[arg(long)]
        days: u32,

        /// Start date of the rental (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Take a rented car back
    Release {
        /// License plate
        plate: String,
    },

    /// Show whether a car is rented and to whom
    Status {
        /// License plate
        plate: String,
    },

    /// List all active rentals
    Rentals,

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: cars, customers, rentals, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import cars from CSV
    Import {
        /// What to import: cars
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip cars whose plate already exists
        #[arg(long)]
        skip_duplicates: bool,
    },
}

#[derive(Subcommand)]
pub enum CarCommands {
    /// Add a car to the fleet
    Add {
        /// Model name (e.g., "Corolla")
        name: String,

        /// Brand (e.g., "Toyota")
        #[arg(short, long)]
        brand: String,

        /// License plate (must be unique)
        #[arg(short, long)]
        plate: String,

        /// Rent price per day (e.g., "50" or "49.90")
        #[arg(long)]
        price: String,

        /// Cost price of the car
        #[arg(long)]
        cost: String,

        /// Color
        #[arg(short, long)]
        color: String,
    },

    /// List cars
    List {
        /// Only cars that can be rented
        #[arg(long, conflicts_with = "rented")]
        available: bool,

        /// Only cars currently rented
        #[arg(long)]
        rented: bool,
    },

    /// Show detailed car information
    Show {
        /// License plate
        plate: String,
    },

    /// Remove a car (it must not be rented)
    Remove {
        /// License plate
        plate: String,
    },

    /// Change a car's color, prices or plate
    Edit {
        /// Current license plate
        plate: String,

        /// New color
        #[arg(long)]
        color: Option<String>,

        /// New rent price per day
        #[arg(long)]
        price: Option<String>,

        /// New cost price
        #[arg(long)]
        cost: Option<String>,

        /// New license plate
        #[arg(long = "new-plate")]
        new_plate: Option<String>,
    },

    /// Find cars by name or brand
    #[command(group(ArgGroup::new("by").required(true).args(["name", "brand"])))]
    Search {
        /// Exact model name
        #[arg(long)]
        name: Option<String>,

        /// Exact brand
        #[arg(long)]
        brand: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a customer
    Add {
        /// Full name
        name: String,

        /// Age in years
        #[arg(short, long)]
        age: u32,

        /// Driving license number (must be unique)
        #[arg(short, long)]
        license: String,

        /// National ID number (must be unique)
        #[arg(short, long)]
        national_id: String,
    },

    /// List all customers
    List,

    /// Show customer details and current rentals
    Show {
        /// Driving license number
        license: String,
    },

    /// Remove a customer (they must have no cars out)
    Remove {
        /// Driving license number
        license: String,
    },

    /// List cars currently rented by a customer
    Rentals {
        /// Driving license number
        license: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                RentalService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Car(car_cmd) => {
                let mut service = RentalService::open(&self.database).await?;
                run_car_command(&mut service, car_cmd).await?;
            }

            Commands::Customer(customer_cmd) => {
                let mut service = RentalService::open(&self.database).await?;
                run_customer_command(&mut service, customer_cmd).await?;
            }

            Commands::Rent {
                plates,
                customer,
                days,
                date,
            } => {
                let mut service = RentalService::open(&self.database).await?;
                let rented_at = match date {
                    Some(date_str) => parse_date(&date_str).with_context(|| {
                        format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)
                    })?,
                    None => Utc::now(),
                };
                run_rent_command(&mut service, &customer, &plates, days, rented_at).await?;
            }

            Commands::Release { plate } => {
                let mut service = RentalService::open(&self.database).await?;
                let result = service.return_car(&plate).await?;
                println!(
                    "Released {} ({}) from {}: {} day(s), total {}",
                    result.car.name,
                    result.car.plate,
                    result.customer.name,
                    result.rental.days,
                    format_cents(result.rental.total_price)
                );
            }

            Commands::Status { plate } => {
                let service = RentalService::open(&self.database).await?;
                match service.rental_status(&plate)? {
                    RentalStatus::Available => {
                        println!("{} is available, not rented out", plate);
                    }
                    RentalStatus::Rented { customer, rental } => {
                        println!("{} is rented", plate);
                        println!("  Customer:    {} ({})", customer.name, customer.license);
                        println!("  Since:       {}", rental.rented_at.format("%Y-%m-%d"));
                        println!("  Days:        {}", rental.days);
                        println!("  Due:         {}", rental.due_at().format("%Y-%m-%d"));
                        println!("  Total price: {}", format_cents(rental.total_price));
                    }
                }
            }

            Commands::Rentals => {
                let service = RentalService::open(&self.database).await?;
                run_rentals_command(&service);
            }

            Commands::Check => {
                let service = RentalService::open(&self.database).await?;
                run_check_command(&service)?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = RentalService::open(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref())?;
            }

            Commands::Import {
                import_type,
                input,
                dry_run,
                skip_duplicates,
            } => {
                let mut service = RentalService::open(&self.database).await?;
                run_import_command(
                    &mut service,
                    &import_type,
                    input.as_deref(),
                    dry_run,
                    skip_duplicates,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_car_command(service: &mut RentalService, cmd: CarCommands) -> Result<()> {
    match cmd {
        CarCommands::Add {
            name,
            brand,
            plate,
            price,
            cost,
            color,
        } => {
            let price = parse_amount(&price, "price")?;
            let cost = parse_amount(&cost, "cost")?;
            let car = service
                .register_car(&name, &brand, &plate, price, cost, &color)
                .await?;
            println!("Added car #{}: {} {} ({})", car.id, car.brand, car.name, car.plate);
        }

        CarCommands::List { available, rented } => {
            let filter = if available {
                CarFilter::Available
            } else if rented {
                CarFilter::Rented
            } else {
                CarFilter::All
            };
            print_cars(&service.list_cars(filter));
        }

        CarCommands::Show { plate } => {
            let car = service.get_car(&plate)?;
            println!("Car: {} {}", car.brand, car.name);
            println!("  ID:            {}", car.id);
            println!("  Plate:         {}", car.plate);
            println!("  Color:         {}", car.color);
            println!("  Price per day: {}", format_cents(car.price_per_day));
            println!("  Cost price:    {}", format_cents(car.cost_price));
            match &car.rental {
                None => println!("  Status:        available"),
                Some(rental) => {
                    let renter = service
                        .ledger()
                        .customer(rental.customer_id)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| format!("customer #{}", rental.customer_id));
                    println!("  Status:        rented by {}", renter);
                    println!("  Rented on:     {}", rental.rented_at.format("%Y-%m-%d"));
                    println!("  Days:          {}", rental.days);
                    println!("  Total price:   {}", format_cents(rental.total_price));
                }
            }
        }

        CarCommands::Remove { plate } => {
            let car = service.remove_car(&plate).await?;
            println!("Removed car: {}", car);
        }

        CarCommands::Edit {
            plate,
            color,
            price,
            cost,
            new_plate,
        } => {
            let mut changes = CarChanges::new();
            if let Some(color) = color {
                changes = changes.with_color(color);
            }
            if let Some(price) = price {
                changes = changes.with_price_per_day(parse_amount(&price, "price")?);
            }
            if let Some(cost) = cost {
                changes = changes.with_cost_price(parse_amount(&cost, "cost")?);
            }
            if let Some(new_plate) = new_plate {
                changes = changes.with_plate(new_plate);
            }

            let car = service.modify_car(&plate, changes).await?;
            println!("Updated car: {}", car);
        }

        CarCommands::Search { name, brand } => {
            let cars = match (name, brand) {
                (Some(name), _) => service.search_by_name(&name),
                (None, Some(brand)) => service.search_by_brand(&brand),
                (None, None) => Vec::new(),
            };
            print_cars(&cars);
        }
    }
    Ok(())
}

async fn run_customer_command(service: &mut RentalService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add {
            name,
            age,
            license,
            national_id,
        } => {
            let customer = service
                .register_customer(&name, age, &license, &national_id)
                .await?;
            println!("Added customer #{}: {} ({})", customer.id, customer.name, customer.license);
        }

        CustomerCommands::List => {
            let customers = service.list_customers();
            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!(
                    "{:<4} {:<24} {:>4} {:<16} {:<16}",
                    "ID", "NAME", "AGE", "LICENSE", "NATIONAL ID"
                );
                println!("{}", "-".repeat(68));
                for c in customers {
                    println!(
                        "{:<4} {:<24} {:>4} {:<16} {:<16}",
                        c.id, c.name, c.age, c.license, c.national_id
                    );
                }
            }
        }

        CustomerCommands::Show { license } => {
            let info = service.get_customer(&license)?;
            let customer = &info.customer;
            println!("Customer: {}", customer.name);
            println!("  ID:          {}", customer.id);
            println!("  Age:         {}", customer.age);
            println!("  License:     {}", customer.license);
            println!("  National ID: {}", customer.national_id);
            println!("  Cars out:    {}", info.rented_cars.len());
            for car in &info.rented_cars {
                println!("    - {}", car);
            }
            if !info.rented_cars.is_empty() {
                println!("  Outstanding: {}", format_cents(info.outstanding));
            }
        }

        CustomerCommands::Remove { license } => {
            let customer = service.remove_customer(&license).await?;
            println!("Removed customer: {}", customer);
        }

        CustomerCommands::Rentals { license } => {
            let cars = service.customer_rentals(&license)?;
            if cars.is_empty() {
                println!("No rentals found for this customer.");
            } else {
                print_cars(&cars);
            }
        }
    }
    Ok(())
}

async fn run_rent_command(
    service: &mut RentalService,
    license: &str,
    plates: &[String],
    days: u32,
    rented_at: DateTime<Utc>,
) -> Result<()> {
    if let [plate] = plates {
        let record = service.rent_car(license, plate, days, rented_at).await?;
        println!(
            "Rented {} ({}) to {} for {} day(s). Total price: {}",
            record.car.name,
            record.car.plate,
            record.customer.name,
            record.rental.days,
            format_cents(record.rental.total_price)
        );
        return Ok(());
    }

    let outcomes = service.rent_cars(license, plates, days, rented_at).await?;
    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(car) => println!(
                "  {}: rented, total {}",
                outcome.plate,
                car.total_price().map(format_cents).unwrap_or_default()
            ),
            Err(e) => {
                failed += 1;
                println!("  {}: {}", outcome.plate, e);
            }
        }
    }
    println!(
        "Rented {} of {} car(s)",
        outcomes.len() - failed,
        outcomes.len()
    );
    if failed == outcomes.len() {
        anyhow::bail!("No car was rented");
    }
    Ok(())
}

fn run_rentals_command(service: &RentalService) {
    let rentals = service.rentals();
    if rentals.is_empty() {
        println!("No car rented out yet.");
        return;
    }

    println!(
        "{:<16} {:<12} {:<12} {:>5} {:>12}",
        "LICENSE", "PLATE", "RENTED ON", "DAYS", "TOTAL"
    );
    println!("{}", "-".repeat(61));
    for record in rentals {
        println!(
            "{:<16} {:<12} {:<12} {:>5} {:>12}",
            record.customer.license,
            record.car.plate,
            record.rental.rented_at.format("%Y-%m-%d").to_string(),
            record.rental.days,
            format_cents(record.rental.total_price)
        );
    }
}

fn run_check_command(service: &RentalService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check();
    println!("Cars:      {}", report.car_count);
    println!("  available: {}", report.available_count);
    println!("  rented:    {}", report.rented_count);
    println!("Customers: {}", report.customer_count);
    println!();

    if !report.duplicate_plates.is_empty() {
        println!("Warning: plates used by more than one car:");
        for plate in &report.duplicate_plates {
            println!("  - {}", plate);
        }
    }

    if report.is_consistent() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for plate in &report.dangling_rentals {
            println!("  - car {} is rented by an unknown customer", plate);
        }
        anyhow::bail!("Ledger integrity check failed");
    }
    Ok(())
}

fn run_export_command(
    service: &RentalService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let summary = match export_type {
        "cars" => format!("Exported {} cars", exporter.export_cars_csv(writer)?),
        "customers" => format!(
            "Exported {} customers",
            exporter.export_customers_csv(writer)?
        ),
        "rentals" => format!("Exported {} rentals", exporter.export_rentals_csv(writer)?),
        "full" => {
            let snapshot = exporter.export_full_json(writer)?;
            format!(
                "Exported full fleet: {} cars, {} customers",
                snapshot.cars.len(),
                snapshot.customers.len()
            )
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: cars, customers, rentals, full",
                export_type
            );
        }
    };

    if output.is_some() {
        eprintln!("{}", summary);
    }
    Ok(())
}

async fn run_import_command(
    service: &mut RentalService,
    import_type: &str,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{stdin, Read};

    if import_type != "cars" {
        anyhow::bail!("Invalid import type '{}'. Valid types: cars", import_type);
    }

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        skip_duplicates,
    };
    let result = Importer::new(service)
        .import_cars_csv(reader, options)
        .await?;

    if dry_run {
        println!("Dry run complete");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            let field = error
                .field
                .as_ref()
                .map(|f| format!("{}: ", f))
                .unwrap_or_default();
            println!("  Line {}: {}{}", error.line, field, error.error);
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

fn print_cars(cars: &[Car]) {
    if cars.is_empty() {
        println!("No cars found.");
        return;
    }

    println!(
        "{:<4} {:<12} {:<14} {:<14} {:<10} {:>10} {:<10}",
        "ID", "PLATE", "BRAND", "NAME", "COLOR", "PER DAY", "STATUS"
    );
    println!("{}", "-".repeat(80));
    for car in cars {
        println!(
            "{:<4} {:<12} {:<14} {:<14} {:<10} {:>10} {:<10}",
            car.id,
            car.plate,
            car.brand,
            car.name,
            car.color,
            format_cents(car.price_per_day),
            if car.is_rented() { "rented" } else { "available" }
        );
    }
}

fn parse_amount(input: &str, what: &str) -> Result<Cents> {
    parse_price(input).with_context(|| format!("Invalid {} '{}'. Use '50' or '49.90'", what, input))
}

/// Parse a YYYY-MM-DD date as midnight UTC.
fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;
    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-02-29").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-02-29T00:00:00+00:00");
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("29/02/2024").is_err());
    }

    #[test]
    fn test_parse_amount_reports_field() {
        assert_eq!(parse_amount("49.90", "price").unwrap(), 4990);
        let err = parse_amount("cheap", "price").unwrap_err();
        assert!(err.to_string().contains("Invalid price 'cheap'"));
    }

    #[test]
    fn test_cli_parses_multi_car_rent() {
        let cli = Cli::try_parse_from([
            "autorent", "rent", "AB-1", "CD-2", "--customer", "LIC-1", "--days", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Rent {
                plates, customer, days, ..
            } => {
                assert_eq!(plates, vec!["AB-1", "CD-2"]);
                assert_eq!(customer, "LIC-1");
                assert_eq!(days, 3);
            }
            _ => panic!("expected rent command"),
        }
    }

    #[test]
    fn test_cli_search_requires_a_criterion() {
        assert!(Cli::try_parse_from(["autorent", "car", "search"]).is_err());
        assert!(Cli::try_parse_from(["autorent", "car", "search", "--brand", "Toyota"]).is_ok());
    }

    #[test]
    fn test_cli_list_filters_conflict() {
        assert!(
            Cli::try_parse_from(["autorent", "car", "list", "--available", "--rented"]).is_err()
        );
    }
}
