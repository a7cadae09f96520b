//! Dataset Seeder
//!
//! Populates the three data sources the gateway serves: raw patient rows,
//! the pseudonymized projection derived from them, and a synthetic set for
//! the developer view. Re-seeding replaces all three.

use chrono::{Datelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::database::{Database, DatabaseError};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const FIRST_NAMES: &[&str] = &[
    "Aarav", "Ananya", "Arjun", "Diya", "Ishaan", "Kavya", "Meera", "Nikhil",
    "Priya", "Rahul", "Rohan", "Sanya", "Tanvi", "Vihaan", "Zara",
];

const LAST_NAMES: &[&str] = &[
    "Sharma", "Patel", "Reddy", "Iyer", "Khan", "Gupta", "Nair", "Singh",
    "Mehta", "Joshi", "Rao", "Das", "Kapoor", "Bose", "Verma",
];

const CITIES: &[&str] = &[
    "Mumbai", "Delhi", "Bengaluru", "Hyderabad", "Chennai", "Pune", "Kolkata",
    "Jaipur",
];

const DISEASES: &[&str] = &[
    "Diabetes",
    "Hypertension",
    "Asthma",
    "Cancer",
    "Heart Disease",
];

#[derive(Debug, Clone, Copy)]
pub struct SeedSummary {
    pub patients: usize,
    pub pseudonymized: usize,
    pub synthetic: usize,
}

struct GeneratedPatient {
    name: String,
    phone: String,
    email: String,
    address: String,
    date_of_birth: String,
    age: i64,
    disease: &'static str,
    purchase_amount: f64,
}

fn generate_patient(rng: &mut impl Rng) -> GeneratedPatient {
    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Aarav");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Sharma");
    let city = CITIES.choose(rng).copied().unwrap_or("Mumbai");
    let disease = DISEASES.choose(rng).copied().unwrap_or("Diabetes");

    let age: i64 = rng.gen_range(20..=80);
    let dob_year = Utc::now().year() as i64 - age;
    let dob_month = rng.gen_range(1..=12);
    let dob_day = rng.gen_range(1..=28);

    let amount: f64 = rng.gen_range(200.0..5000.0);

    GeneratedPatient {
        name: format!("{} {}", first, last),
        phone: format!("+91-{}", rng.gen_range(7_000_000_000u64..=9_999_999_999)),
        email: format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            rng.gen_range(1..1000)
        ),
        address: format!("{} {} Road, {}", rng.gen_range(1..500), last, city),
        date_of_birth: format!("{:04}-{:02}-{:02}", dob_year, dob_month, dob_day),
        age,
        disease,
        purchase_amount: (amount * 100.0).round() / 100.0,
    }
}

/// Stable pseudonym for a patient id: truncated hex SHA-256 over salt and id.
pub fn pseudonymize(salt: &str, patient_id: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(patient_id.to_string().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

fn age_band(age: i64) -> String {
    let low = (age / 10) * 10;
    format!("{}-{}", low, low + 9)
}

/// Replace the contents of all three data sources.
pub fn seed(db: &Database, rows: usize, salt: &str) -> Result<SeedSummary, SeedError> {
    let mut rng = rand::thread_rng();
    let mut conn = db.get_connection()?;
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM patients", [])?;
    tx.execute("DELETE FROM patients_pseudonymized", [])?;
    tx.execute("DELETE FROM patients_synthetic", [])?;

    for table in ["patients", "patients_synthetic"] {
        let sql = format!(
            "INSERT INTO {} (name, phone, email, address, date_of_birth, age, disease, purchase_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            table
        );
        let mut stmt = tx.prepare(&sql)?;
        for _ in 0..rows {
            let p = generate_patient(&mut rng);
            stmt.execute(rusqlite::params![
                p.name,
                p.phone,
                p.email,
                p.address,
                p.date_of_birth,
                p.age,
                p.disease,
                p.purchase_amount,
            ])?;
        }
    }

    // Derive the researcher projection from the raw rows just written.
    let raw: Vec<(i64, i64, String, f64)> = {
        let mut stmt =
            tx.prepare("SELECT id, age, disease, purchase_amount FROM patients ORDER BY id")?;
        let collected = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        collected
    };

    {
        let mut stmt = tx.prepare(
            "INSERT INTO patients_pseudonymized (pseudonym, age_band, disease, purchase_amount)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (id, age, disease, amount) in &raw {
            stmt.execute(rusqlite::params![
                pseudonymize(salt, *id),
                age_band(*age),
                disease,
                amount,
            ])?;
        }
    }

    tx.commit()?;

    Ok(SeedSummary {
        patients: rows,
        pseudonymized: raw.len(),
        synthetic: rows,
    })
}
