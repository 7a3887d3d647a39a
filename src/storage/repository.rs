use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{Car, Customer, FleetLedger, Rental};

use super::MIGRATION_001_INITIAL;

/// Repository persisting a snapshot of the fleet ledger.
///
/// The ledger is the source of truth while the process runs; the database
/// only carries its state from one invocation to the next.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Loading
    // ========================

    /// Rebuild the ledger from the stored snapshot.
    pub async fn load_ledger(&self) -> Result<FleetLedger> {
        let customers = self.load_customers().await?;
        let cars = self.load_cars().await?;
        let next_car_id = self.counter("car_id").await?;
        let next_customer_id = self.counter("customer_id").await?;

        FleetLedger::restore(cars, customers, next_car_id, next_customer_id)
            .context("Stored ledger is inconsistent")
    }

    async fn load_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, name, age, license, national_id FROM customers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    async fn load_cars(&self) -> Result<Vec<Car>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.brand, c.plate, c.price_per_day, c.cost_price, c.color,
                   r.customer_id, r.rented_at, r.days, r.total_price
            FROM cars c
            LEFT JOIN rentals r ON r.car_id = c.id
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list cars")?;

        rows.iter().map(Self::row_to_car).collect()
    }

    async fn counter(&self, name: &str) -> Result<u32> {
        let row = sqlx::query("SELECT value FROM sequence_counter WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to read counter {}", name))?;

        to_u32(row.get("value"), name)
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
        Ok(Customer {
            id: to_u32(row.get("id"), "customer id")?,
            name: row.get("name"),
            age: to_u32(row.get("age"), "customer age")?,
            license: row.get("license"),
            national_id: row.get("national_id"),
        })
    }

    fn row_to_car(row: &sqlx::sqlite::SqliteRow) -> Result<Car> {
        let customer_id: Option<i64> = row.get("customer_id");
        let rental = match customer_id {
            Some(customer_id) => {
                let rented_at: String = row.get("rented_at");
                Some(Rental {
                    customer_id: to_u32(customer_id, "rental customer id")?,
                    rented_at: DateTime::parse_from_rfc3339(&rented_at)
                        .context("Invalid rented_at timestamp")?
                        .with_timezone(&Utc),
                    days: to_u32(row.get("days"), "rental days")?,
                    total_price: row.get("total_price"),
                })
            }
            None => None,
        };

        Ok(Car {
            id: to_u32(row.get("id"), "car id")?,
            name: row.get("name"),
            brand: row.get("brand"),
            plate: row.get("plate"),
            price_per_day: row.get("price_per_day"),
            cost_price: row.get("cost_price"),
            color: row.get("color"),
            rental,
        })
    }

    // ========================
    // Saving
    // ========================

    /// Replace the stored snapshot with the ledger's current state.
    /// Runs in one transaction, so a failed save leaves the old snapshot.
    pub async fn save_ledger(&self, ledger: &FleetLedger) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for table in ["rentals", "cars", "customers"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {}", table))?;
        }

        for customer in ledger.customers() {
            sqlx::query(
                r#"
                INSERT INTO customers (id, name, age, license, national_id)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(customer.id))
            .bind(&customer.name)
            .bind(i64::from(customer.age))
            .bind(&customer.license)
            .bind(&customer.national_id)
            .execute(&mut *tx)
            .await
            .context("Failed to save customer")?;
        }

        for car in ledger.all_cars() {
            sqlx::query(
                r#"
                INSERT INTO cars (id, name, brand, plate, price_per_day, cost_price, color)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(car.id))
            .bind(&car.name)
            .bind(&car.brand)
            .bind(&car.plate)
            .bind(car.price_per_day)
            .bind(car.cost_price)
            .bind(&car.color)
            .execute(&mut *tx)
            .await
            .context("Failed to save car")?;

            if let Some(rental) = &car.rental {
                sqlx::query(
                    r#"
                    INSERT INTO rentals (car_id, customer_id, rented_at, days, total_price)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(i64::from(car.id))
                .bind(i64::from(rental.customer_id))
                .bind(rental.rented_at.to_rfc3339())
                .bind(i64::from(rental.days))
                .bind(rental.total_price)
                .execute(&mut *tx)
                .await
                .context("Failed to save rental")?;
            }
        }

        for (name, value) in [
            ("car_id", ledger.next_car_id()),
            ("customer_id", ledger.next_customer_id()),
        ] {
            sqlx::query("UPDATE sequence_counter SET value = ? WHERE name = ?")
                .bind(i64::from(value))
                .bind(name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to update counter {}", name))?;
        }

        tx.commit().await.context("Failed to commit snapshot")?;
        Ok(())
    }
}

fn to_u32(value: i64, what: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("Invalid {}: {}", what, value))
}
