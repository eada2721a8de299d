//! Button and step persistence.

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::button::{DownloadButton, NewButton, Step, StepArgs};
use crate::error::{DatabaseError, Pipeline};
use crate::types::{ButtonId, CachePolicy};
use crate::{Error, Result};

use super::{ButtonRow, Database, RecordStore, StepRow};

const BUTTON_COLUMNS: &str = r#"
    id, class_name, lookup_key, button_config, progress_config, downloads,
    download_message, cache, downloaded, callback, form_id, created_at, updated_at
"#;

impl Database {
    /// Insert a new button row
    pub async fn insert_button(&self, new: &NewButton) -> Result<ButtonId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO download_buttons (
                class_name, lookup_key, button_config, progress_config, downloads,
                download_message, cache, downloaded, callback, form_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.class_name)
        .bind(&new.lookup_key)
        .bind(serde_json::to_string(&new.button)?)
        .bind(serde_json::to_string(&new.progress)?)
        .bind(serde_json::to_string(&new.downloads)?)
        .bind(&new.download_message)
        .bind(new.cache.as_str())
        .bind(&new.callback)
        .bind(&new.form_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert download button: {}",
                e
            )))
        })?;

        Ok(ButtonId(result.last_insert_rowid()))
    }

    /// Write a button's state and replace its steps in one transaction
    ///
    /// The transaction rolls back if this future is dropped before it commits.
    pub async fn update_button(&self, button: &DownloadButton) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        Self::write_button(&mut *tx, button).await?;
        Self::replace_steps(&mut *tx, button).await?;

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit download button {}: {}",
                button.id(),
                e
            )))
        })
    }

    async fn write_button(conn: &mut SqliteConnection, button: &DownloadButton) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE download_buttons SET
                button_config = ?, progress_config = ?, downloads = ?,
                download_message = ?, cache = ?, downloaded = ?, callback = ?,
                form_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(&button.button)?)
        .bind(serde_json::to_string(&button.progress)?)
        .bind(serde_json::to_string(&button.downloads)?)
        .bind(&button.download_message)
        .bind(button.cache.as_str())
        .bind(button.downloaded as i32)
        .bind(&button.callback)
        .bind(&button.form_id)
        .bind(now)
        .bind(button.id())
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update download button: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::UnknownEntity {
                id: button.id(),
                cls: button.class_name().to_string(),
            });
        }

        Ok(())
    }

    async fn replace_steps(conn: &mut SqliteConnection, button: &DownloadButton) -> Result<()> {
        sqlx::query("DELETE FROM button_steps WHERE button_id = ?")
            .bind(button.id())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear steps: {}",
                    e
                )))
            })?;

        for pipeline in [Pipeline::FormHandling, Pipeline::FileCreation] {
            for step in button.steps(pipeline) {
                sqlx::query(
                    r#"
                    INSERT INTO button_steps (button_id, pipeline, step_index, name, args)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(button.id())
                .bind(pipeline.as_str())
                .bind(step.index as i64)
                .bind(&step.name)
                .bind(serde_json::to_string(&step.args)?)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to insert step: {}",
                        e
                    )))
                })?;
            }
        }

        Ok(())
    }

    /// Get a button by ID
    pub async fn get_button(&self, id: ButtonId) -> Result<Option<DownloadButton>> {
        let row = sqlx::query_as::<_, ButtonRow>(&format!(
            "SELECT {} FROM download_buttons WHERE id = ?",
            BUTTON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download button: {}",
                e
            )))
        })?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Get a button by class and lookup key
    pub async fn find_button(
        &self,
        class_name: &str,
        lookup_key: &str,
    ) -> Result<Option<DownloadButton>> {
        let row = sqlx::query_as::<_, ButtonRow>(&format!(
            "SELECT {} FROM download_buttons WHERE class_name = ? AND lookup_key = ?",
            BUTTON_COLUMNS
        ))
        .bind(class_name)
        .bind(lookup_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to find download button: {}",
                e
            )))
        })?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Delete a button; its steps go with it
    pub async fn delete_button(&self, id: ButtonId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM download_buttons WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete download button: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Steps of a button, ordered by pipeline and index
    pub async fn get_steps(&self, id: ButtonId) -> Result<Vec<StepRow>> {
        let rows = sqlx::query_as::<_, StepRow>(
            r#"
            SELECT button_id, pipeline, step_index, name, args
            FROM button_steps
            WHERE button_id = ?
            ORDER BY pipeline, step_index
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get steps: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    async fn hydrate(&self, row: ButtonRow) -> Result<DownloadButton> {
        let id = ButtonId(row.id);
        let steps = self.get_steps(id).await?;

        let mut form_steps = Vec::new();
        let mut file_steps = Vec::new();
        for step in steps {
            let pipeline = Pipeline::from_name(&step.pipeline)
                .ok_or_else(|| corrupt(row.id, format!("unknown pipeline {:?}", step.pipeline)))?;
            let index = u32::try_from(step.step_index)
                .map_err(|_| corrupt(row.id, format!("step index {} out of range", step.step_index)))?;
            let args: StepArgs = serde_json::from_str(&step.args)
                .map_err(|e| corrupt(row.id, format!("step args: {}", e)))?;
            let step = Step {
                index,
                name: step.name,
                args,
            };
            match pipeline {
                Pipeline::FormHandling => form_steps.push(step),
                Pipeline::FileCreation => file_steps.push(step),
            }
        }

        let new = NewButton {
            class_name: row.class_name,
            lookup_key: row.lookup_key,
            button: serde_json::from_str(&row.button_config)
                .map_err(|e| corrupt(row.id, format!("button config: {}", e)))?,
            progress: serde_json::from_str(&row.progress_config)
                .map_err(|e| corrupt(row.id, format!("progress config: {}", e)))?,
            downloads: serde_json::from_str(&row.downloads)
                .map_err(|e| corrupt(row.id, format!("downloads: {}", e)))?,
            download_message: row.download_message,
            cache: row
                .cache
                .parse::<CachePolicy>()
                .map_err(|e| corrupt(row.id, e.to_string()))?,
            callback: row.callback,
            form_id: row.form_id,
        };

        Ok(DownloadButton::restore(
            id,
            new,
            row.downloaded != 0,
            form_steps,
            file_steps,
        ))
    }
}

fn corrupt(id: i64, reason: String) -> Error {
    Error::Database(DatabaseError::CorruptRecord { id, reason })
}

#[async_trait]
impl RecordStore for Database {
    async fn add(&self, new: &NewButton) -> Result<ButtonId> {
        let id = self.insert_button(new).await?;
        tracing::debug!(button_id = %id, class = %new.class_name, "download button persisted");
        Ok(id)
    }

    async fn commit(&self, button: &DownloadButton) -> Result<()> {
        self.update_button(button).await
    }

    async fn query_by_id(&self, id: ButtonId) -> Result<Option<DownloadButton>> {
        self.get_button(id).await
    }

    async fn query_by_key(
        &self,
        class_name: &str,
        lookup_key: &str,
    ) -> Result<Option<DownloadButton>> {
        self.find_button(class_name, lookup_key).await
    }

    async fn delete(&self, id: ButtonId) -> Result<bool> {
        self.delete_button(id).await
    }
}
