//! Database repository for reference data and recorded drops.
//!
//! Uses prepared statements and transactions for data integrity.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CollectionSite, Coordinates, CreatedBy, ReferenceData, ReplaceReferenceRequest, RevisionInfo,
    Town, TownBounds, TrashDrop, UpdateDropRequest,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_revision_id().await
    }

    // ==================== REFERENCE DATA ====================

    /// Get the full reference set.
    pub async fn get_reference(&self) -> Result<ReferenceData, AppError> {
        let meta = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;

        let towns = self.list_towns().await?;
        let sites = self.list_sites().await?;

        Ok(ReferenceData {
            revision_id: meta.get("revision_id"),
            generated_at: meta.get("generated_at"),
            towns,
            sites,
        })
    }

    /// List all towns in their configured order.
    pub async fn list_towns(&self) -> Result<Vec<Town>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, county, allows_roadside, bounds_west, bounds_south, bounds_east, bounds_north FROM towns ORDER BY position"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(town_from_row).collect())
    }

    /// List all collection sites in their configured order.
    pub async fn list_sites(&self) -> Result<Vec<CollectionSite>, AppError> {
        let rows = sqlx::query(
            "SELECT id, town_id, name, address, notes FROM sites ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(site_from_row).collect())
    }

    /// Atomically replace the reference set (administrative import).
    pub async fn replace_reference(
        &self,
        request: &ReplaceReferenceRequest,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM towns").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM sites").execute(&mut *tx).await?;

        for (position, town) in request.towns.iter().enumerate() {
            sqlx::query(
                r#"INSERT INTO towns (
                    id, name, county, allows_roadside,
                    bounds_west, bounds_south, bounds_east, bounds_north, position
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&town.town_id)
            .bind(&town.name)
            .bind(&town.county)
            .bind(town.allows_roadside as i32)
            .bind(town.bounds.west)
            .bind(town.bounds.south)
            .bind(town.bounds.east)
            .bind(town.bounds.north)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (position, site) in request.sites.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sites (id, town_id, name, address, notes, position) VALUES (?, ?, ?, ?, ?, ?)"
            )
            .bind(&site.id)
            .bind(&site.town_id)
            .bind(&site.name)
            .bind(&site.address)
            .bind(&site.notes)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        // Increment revision once for the entire import
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ==================== DROP OPERATIONS ====================

    /// Persist a drop. Records without an id are created, records with an id
    /// are patched; the caller never needs to know which.
    pub async fn save_drop(&self, drop: &TrashDrop) -> Result<TrashDrop, AppError> {
        match &drop.id {
            Some(id) => self.replace_drop(id, drop).await,
            None => self.create_drop(drop).await,
        }
    }

    /// List drops, optionally filtered to (in)active ones.
    pub async fn list_drops(&self, active: Option<bool>) -> Result<Vec<TrashDrop>, AppError> {
        let rows = match active {
            Some(flag) => {
                sqlx::query(
                    "SELECT id, active, team_id, collection_site_id, latitude, longitude, created, was_collected, tags, created_by_user_id, created_by_email, bag_count FROM drops WHERE active = ? ORDER BY created"
                )
                .bind(flag as i32)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, active, team_id, collection_site_id, latitude, longitude, created, was_collected, tags, created_by_user_id, created_by_email, bag_count FROM drops ORDER BY created"
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(drop_from_row).collect())
    }

    /// Get a drop by ID.
    pub async fn get_drop(&self, id: &str) -> Result<Option<TrashDrop>, AppError> {
        let row = sqlx::query(
            "SELECT id, active, team_id, collection_site_id, latitude, longitude, created, was_collected, tags, created_by_user_id, created_by_email, bag_count FROM drops WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(drop_from_row))
    }

    /// Patch a drop. Updates are last-write-wins.
    pub async fn update_drop(
        &self,
        id: &str,
        request: &UpdateDropRequest,
    ) -> Result<TrashDrop, AppError> {
        let mut drop = self
            .get_drop(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Drop {} not found", id)))?;

        if let Some(active) = request.active {
            drop.active = active;
        }
        if let Some(was_collected) = request.was_collected {
            drop.was_collected = was_collected;
        }
        if let Some(team_id) = &request.team_id {
            drop.team_id = Some(team_id.clone());
        }
        if let Some(tags) = &request.tags {
            drop.tags = tags.clone();
        }
        if let Some(bag_count) = request.bag_count {
            drop.bag_count = bag_count;
        }

        self.replace_drop(id, &drop).await
    }

    /// Delete a drop.
    pub async fn delete_drop(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM drops WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Drop {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    /// Insert a new drop with a fresh id.
    async fn create_drop(&self, drop: &TrashDrop) -> Result<TrashDrop, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let tags_json = serde_json::to_string(&drop.tags)?;

        sqlx::query(
            r#"INSERT INTO drops (
                id, active, team_id, collection_site_id, latitude, longitude,
                created, was_collected, tags, created_by_user_id, created_by_email, bag_count
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(drop.active as i32)
        .bind(&drop.team_id)
        .bind(&drop.collection_site_id)
        .bind(drop.location.map(|c| c.latitude))
        .bind(drop.location.map(|c| c.longitude))
        .bind(drop.created.to_rfc3339())
        .bind(drop.was_collected as i32)
        .bind(&tags_json)
        .bind(&drop.created_by.user_id)
        .bind(&drop.created_by.email)
        .bind(i64::from(drop.bag_count))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;

        Ok(TrashDrop {
            id: Some(id),
            ..drop.clone()
        })
    }

    /// Overwrite an existing drop.
    async fn replace_drop(&self, id: &str, drop: &TrashDrop) -> Result<TrashDrop, AppError> {
        let tags_json = serde_json::to_string(&drop.tags)?;

        let result = sqlx::query(
            r#"UPDATE drops SET
                active = ?, team_id = ?, collection_site_id = ?, latitude = ?, longitude = ?,
                created = ?, was_collected = ?, tags = ?, created_by_user_id = ?,
                created_by_email = ?, bag_count = ?
            WHERE id = ?"#,
        )
        .bind(drop.active as i32)
        .bind(&drop.team_id)
        .bind(&drop.collection_site_id)
        .bind(drop.location.map(|c| c.latitude))
        .bind(drop.location.map(|c| c.longitude))
        .bind(drop.created.to_rfc3339())
        .bind(drop.was_collected as i32)
        .bind(&tags_json)
        .bind(&drop.created_by.user_id)
        .bind(&drop.created_by.email)
        .bind(i64::from(drop.bag_count))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Drop {} not found", id)));
        }

        self.increment_revision().await?;

        Ok(TrashDrop {
            id: Some(id.to_string()),
            ..drop.clone()
        })
    }
}

// Helper functions for row conversion

fn town_from_row(row: &sqlx::sqlite::SqliteRow) -> Town {
    let allows_roadside: i32 = row.get("allows_roadside");
    Town {
        town_id: row.get("id"),
        name: row.get("name"),
        county: row.get("county"),
        allows_roadside: allows_roadside != 0,
        bounds: TownBounds {
            west: row.get("bounds_west"),
            south: row.get("bounds_south"),
            east: row.get("bounds_east"),
            north: row.get("bounds_north"),
        },
    }
}

fn site_from_row(row: &sqlx::sqlite::SqliteRow) -> CollectionSite {
    CollectionSite {
        id: row.get("id"),
        town_id: row.get("town_id"),
        name: row.get("name"),
        address: row.get("address"),
        notes: row.get("notes"),
    }
}

fn drop_from_row(row: &sqlx::sqlite::SqliteRow) -> TrashDrop {
    let active: i32 = row.get("active");
    let was_collected: i32 = row.get("was_collected");
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let tags_str: Option<String> = row.get("tags");
    let bag_count: i64 = row.get("bag_count");

    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    TrashDrop {
        id: Some(row.get("id")),
        active: active != 0,
        team_id: row.get("team_id"),
        collection_site_id: row.get("collection_site_id"),
        location,
        coordinates: location,
        created: row.get("created"),
        was_collected: was_collected != 0,
        tags: tags_str.map(|s| parse_json_array(&s)).unwrap_or_default(),
        created_by: CreatedBy {
            user_id: row.get("created_by_user_id"),
            email: row.get("created_by_email"),
        },
        bag_count: bag_count as u32,
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
