//! SurrealDB implementation of [`PackageRepository`].

use chrono::{DateTime, Utc};
use leadport_core::error::LeadportResult;
use leadport_core::models::package::{CreatePackage, Package, UpdatePackage};
use leadport_core::repository::PackageRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct PackageRow {
    tenant_id: String,
    name: String,
    description: String,
    price_cents: i64,
    currency: String,
    duration_days: u32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct PackageRowWithId {
    record_id: String,
    tenant_id: String,
    name: String,
    description: String,
    price_cents: i64,
    currency: String,
    duration_days: u32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PackageRow {
    fn into_package(self, id: Uuid) -> Result<Package, DbError> {
        Ok(Package {
            id,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            currency: self.currency,
            duration_days: self.duration_days,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PackageRowWithId {
    fn try_into_package(self) -> Result<Package, DbError> {
        let id = parse_uuid(&self.record_id, "package")?;
        PackageRow {
            tenant_id: self.tenant_id,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            currency: self.currency,
            duration_days: self.duration_days,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_package(id)
    }
}

/// SurrealDB implementation of the Package repository.
#[derive(Clone)]
pub struct SurrealPackageRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPackageRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PackageRepository for SurrealPackageRepository<C> {
    async fn create(&self, input: CreatePackage) -> LeadportResult<Package> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('package', $id) SET \
                 tenant_id = $tenant_id, name = $name, \
                 description = $description, price_cents = $price_cents, \
                 currency = $currency, duration_days = $duration_days, \
                 active = true",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("price_cents", input.price_cents))
            .bind(("currency", input.currency.to_lowercase()))
            .bind(("duration_days", input.duration_days))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "package"))?;

        let rows: Vec<PackageRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "package".into(),
            id: id_str,
        })?;

        Ok(row.into_package(id)?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> LeadportResult<Package> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('package', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PackageRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "package".into(),
            id: id_str,
        })?;

        Ok(row.into_package(id)?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePackage,
    ) -> LeadportResult<Package> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.price_cents.is_some() {
            sets.push("price_cents = $price_cents");
        }
        if input.duration_days.is_some() {
            sets.push("duration_days = $duration_days");
        }
        if input.active.is_some() {
            sets.push("active = $active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('package', $id) SET {} \
             WHERE tenant_id = $tenant_id",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(price_cents) = input.price_cents {
            builder = builder.bind(("price_cents", price_cents));
        }
        if let Some(duration_days) = input.duration_days {
            builder = builder.bind(("duration_days", duration_days));
        }
        if let Some(active) = input.active {
            builder = builder.bind(("active", active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::classify(e, "package"))?;

        let rows: Vec<PackageRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "package".into(),
            id: id_str,
        })?;

        Ok(row.into_package(id)?)
    }

    async fn list(&self, tenant_id: Uuid, active_only: bool) -> LeadportResult<Vec<Package>> {
        let query = if active_only {
            "SELECT meta::id(id) AS record_id, * FROM package \
             WHERE tenant_id = $tenant_id AND active = true \
             ORDER BY price_cents ASC"
        } else {
            "SELECT meta::id(id) AS record_id, * FROM package \
             WHERE tenant_id = $tenant_id \
             ORDER BY price_cents ASC"
        };

        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PackageRowWithId> = result.take(0).map_err(DbError::from)?;
        let packages = rows
            .into_iter()
            .map(|row| row.try_into_package())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(packages)
    }
}
