// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use autorent::application::RentalService;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(RentalService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = RentalService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Reopen the database behind a temp dir created by `test_service`
pub async fn reopen(temp_dir: &TempDir) -> Result<RentalService> {
    let db_path = temp_dir.path().join("test.db");
    Ok(RentalService::open(db_path.to_str().unwrap()).await?)
}

/// Drop a table behind the service's back so its next save fails
pub async fn drop_table(temp_dir: &TempDir, table: &str) -> Result<()> {
    let db_path = temp_dir.path().join("test.db");
    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path.display())).await?;
    sqlx::query(&format!("DROP TABLE {}", table))
        .execute(&pool)
        .await?;
    pool.close().await;
    Ok(())
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Test fixture: a small fleet and two customers
pub struct StandardFleet;

impl StandardFleet {
    /// Cars AB-123 (Toyota Corolla, 50.00/day), CD-456 (Volkswagen Golf,
    /// 60.00/day), EF-789 (Toyota Yaris, 35.00/day)
    pub async fn create_cars(service: &mut RentalService) -> Result<()> {
        service
            .register_car("Corolla", "Toyota", "AB-123", 5000, 2_000_000, "red")
            .await?;
        service
            .register_car("Golf", "Volkswagen", "CD-456", 6000, 2_500_000, "black")
            .await?;
        service
            .register_car("Yaris", "Toyota", "EF-789", 3500, 1_500_000, "white")
            .await?;
        Ok(())
    }

    /// Customers LIC-1 (Ada) and LIC-2 (Bob)
    pub async fn create_customers(service: &mut RentalService) -> Result<()> {
        service
            .register_customer("Ada Lovelace", 36, "LIC-1", "NID-1")
            .await?;
        service
            .register_customer("Bob Smith", 41, "LIC-2", "NID-2")
            .await?;
        Ok(())
    }

    pub async fn create(service: &mut RentalService) -> Result<()> {
        Self::create_cars(service).await?;
        Self::create_customers(service).await
    }
}
