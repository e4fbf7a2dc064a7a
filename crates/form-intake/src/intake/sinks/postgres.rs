use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{ContactStore, ContactStoreError, StoreCounts};
use crate::config::DatabaseConfig;
use crate::intake::contact::CandidateContact;

const INSERT_CONTACT: &str = r#"
    INSERT INTO contacts (
        id, name, email, phone, type, status, temperature, company, position,
        location, postcode, skills, experience_level, hourly_rate, availability,
        right_to_work, travel_method, contract_preference, shift_availability,
        notes, source, created_at, updated_at
    ) VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
        $17, $18, $19, $20, $21, $22, $23
    )
    RETURNING
        id, name, email, phone, type, status, temperature, company, position,
        location, postcode, skills, experience_level, hourly_rate::float8 AS hourly_rate,
        availability, right_to_work, travel_method, contract_preference,
        shift_availability, notes, source, created_at, updated_at
"#;

/// Contact rows in the CRM database, written through a bounded, lazily connected pool.
#[derive(Debug, Clone)]
pub struct PostgresContactStore {
    pool: PgPool,
}

impl PostgresContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the pool without dialing; connections are opened on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_lazy(&config.url)?;
        Ok(Self::new(pool))
    }

    /// Startup probe. A failure is logged; the service still starts.
    pub async fn probe(&self) -> bool {
        match self.pool.acquire().await {
            Ok(_connection) => {
                info!("connected to primary relational store");
                true
            }
            Err(err) => {
                warn!(error = %err, "primary relational store unreachable at startup");
                false
            }
        }
    }
}

#[async_trait]
impl ContactStore for PostgresContactStore {
    async fn insert_contact(
        &self,
        contact: &CandidateContact,
    ) -> Result<CandidateContact, ContactStoreError> {
        let row = sqlx::query_as::<_, CandidateContact>(INSERT_CONTACT)
            .bind(&contact.id)
            .bind(&contact.name)
            .bind(&contact.email)
            .bind(&contact.phone)
            .bind(&contact.contact_type)
            .bind(&contact.status)
            .bind(&contact.temperature)
            .bind(&contact.company)
            .bind(&contact.position)
            .bind(&contact.location)
            .bind(&contact.postcode)
            .bind(&contact.skills)
            .bind(&contact.experience_level)
            .bind(contact.hourly_rate)
            .bind(&contact.availability)
            .bind(&contact.right_to_work)
            .bind(&contact.travel_method)
            .bind(&contact.contract_preference)
            .bind(&contact.shift_availability)
            .bind(&contact.notes)
            .bind(&contact.source)
            .bind(contact.created_at)
            .bind(contact.updated_at)
            .fetch_one(&self.pool)
            .await?;

        info!(contact_id = %row.id, "candidate saved to primary store");
        Ok(row)
    }

    async fn counts(&self) -> Result<StoreCounts, ContactStoreError> {
        let mut connection = self.pool.acquire().await?;
        let contacts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts")
            .fetch_one(&mut *connection)
            .await?;
        let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&mut *connection)
            .await?;
        let tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&mut *connection)
            .await?;

        Ok(StoreCounts {
            contacts,
            jobs,
            tasks,
        })
    }
}
