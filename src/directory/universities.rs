use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::UniversityModel;

/// Served when the universities table cannot be read or is still empty.
pub const FALLBACK_UNIVERSITIES: &[&str] = &[
    "University of Ghana",
    "Kwame Nkrumah University of Science and Technology",
    "University of Cape Coast",
    "University of Education, Winneba",
    "University for Development Studies",
    "Ashesi University",
    "Central University",
    "University of Professional Studies",
    "Ghana Technology University College",
];

/// (name, abbreviation, location, region)
const SEED_UNIVERSITIES: &[(&str, &str, &str, &str)] = &[
    ("University of Ghana", "UG", "Legon, Accra", "Greater Accra"),
    ("Kwame Nkrumah University of Science and Technology", "KNUST", "Kumasi", "Ashanti"),
    ("University of Cape Coast", "UCC", "Cape Coast", "Central"),
    ("University of Education, Winneba", "UEW", "Winneba", "Central"),
    ("University for Development Studies", "UDS", "Tamale", "Northern"),
    ("Ghana Institute of Management and Public Administration", "GIMPA", "Accra", "Greater Accra"),
    ("Ashesi University", "Ashesi", "Berekuso", "Eastern"),
    ("Central University", "CUC", "Miotso", "Greater Accra"),
    ("Presbyterian University College", "PUC", "Abetifi", "Eastern"),
    ("Valley View University", "VVU", "Techiman", "Brong-Ahafo"),
    ("University of Professional Studies", "UPSA", "Accra", "Greater Accra"),
    ("Ghana Technology University College", "GTUC", "Accra", "Greater Accra"),
    ("Regent University College", "RUC", "Accra", "Greater Accra"),
    ("Wisconsin International University College", "WIUC", "Accra", "Greater Accra"),
    ("Methodist University College", "MUCG", "Accra", "Greater Accra"),
    ("Catholic University College", "CUCG", "Fiapre", "Brong-Ahafo"),
    ("Islamic University College", "IUCG", "Accra", "Greater Accra"),
    ("Pentecost University College", "PUC", "Accra", "Greater Accra"),
    ("Accra Institute of Technology", "AIT", "Accra", "Greater Accra"),
    ("BlueCrest University College", "BCUC", "Accra", "Greater Accra"),
];

pub fn seed_universities() -> Vec<UniversityModel> {
    SEED_UNIVERSITIES
        .iter()
        .map(|(name, abbreviation, location, region)| {
            UniversityModel::new(name, abbreviation, location, region)
        })
        .collect()
}

fn fallback_names() -> Vec<String> {
    let mut names: Vec<String> = FALLBACK_UNIVERSITIES.iter().map(|s| s.to_string()).collect();
    names.sort();
    names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    AlreadySeeded,
    Seeded(usize),
}

/// Read-only list of valid universities.
#[async_trait::async_trait]
pub trait UniversityDirectory: Send + Sync {
    /// Active university names, sorted by name.
    async fn list_names(&self) -> AppResult<Vec<String>>;

    async fn contains(&self, name: &str) -> AppResult<bool> {
        Ok(self.list_names().await?.iter().any(|n| n == name))
    }

    /// Development helper: fills an empty directory with the canonical list.
    async fn seed(&self) -> AppResult<SeedOutcome>;
}

pub struct PgUniversityDirectory {
    pool: PgPool,
}

impl PgUniversityDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UniversityDirectory for PgUniversityDirectory {
    async fn list_names(&self) -> AppResult<Vec<String>> {
        let names: Result<Vec<String>, sqlx::Error> = sqlx::query_scalar(
            "SELECT name FROM universities WHERE is_active = TRUE ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await;

        match names {
            Ok(names) if !names.is_empty() => Ok(names),
            Ok(_) => {
                tracing::warn!("universities table is empty, serving fallback list");
                Ok(fallback_names())
            }
            Err(e) => {
                tracing::error!("Failed to load universities, serving fallback list: {}", e);
                Ok(fallback_names())
            }
        }
    }

    /// Asks the table directly; store failures propagate. Before the table is
    /// seeded, the canonical list is authoritative.
    async fn contains(&self, name: &str) -> AppResult<bool> {
        let (known, seeded): (bool, bool) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM universities WHERE name = $1 AND is_active = TRUE), \
                    EXISTS(SELECT 1 FROM universities)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        if seeded {
            return Ok(known);
        }
        Ok(SEED_UNIVERSITIES.iter().any(|(n, ..)| *n == name))
    }

    async fn seed(&self) -> AppResult<SeedOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM universities")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let universities = seed_universities();
        for u in &universities {
            sqlx::query(
                "INSERT INTO universities (name, abbreviation, location, region, is_active) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (name) DO NOTHING",
            )
            .bind(&u.name)
            .bind(&u.abbreviation)
            .bind(&u.location)
            .bind(&u.region)
            .bind(u.is_active)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!("Seeded {} universities", universities.len());
        Ok(SeedOutcome::Seeded(universities.len()))
    }
}

/// Fixed directory backed by the fallback list.
#[derive(Debug, Clone)]
pub struct StaticUniversityDirectory {
    names: Vec<String>,
}

impl StaticUniversityDirectory {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }
}

impl Default for StaticUniversityDirectory {
    fn default() -> Self {
        Self::new(FALLBACK_UNIVERSITIES.iter().copied())
    }
}

#[async_trait::async_trait]
impl UniversityDirectory for StaticUniversityDirectory {
    async fn list_names(&self) -> AppResult<Vec<String>> {
        Ok(self.names.clone())
    }

    async fn seed(&self) -> AppResult<SeedOutcome> {
        Ok(SeedOutcome::AlreadySeeded)
    }
}
