//! Repository for documents, their metadata links, and snapshot assembly.
//!
//! `apply_change_set` is the engine's single mutation boundary: it locks the
//! document row, reconciles scalars and link tables against the planned
//! change-set, and records scheduled workflow runs, all in one transaction.

use std::collections::HashSet;

use sqlx::{PgPool, Postgres, Transaction};

use docuflow_core::document::{DocumentSnapshot, DocumentSource, NamedRef};
use docuflow_core::plan::ChangeSet;
use docuflow_core::types::DbId;
use docuflow_core::workflow::TriggerType;

use crate::models::document::{CreateDocument, CustomFieldInstanceRow, DocumentRow};
use crate::DbError;

/// Column list for documents queries.
const COLUMNS: &str = "id, title, original_filename, source_path, source, mailrule_id, content, \
    correspondent_id, document_type_id, storage_path_id, owner_id, created, added, modified";

/// Snapshot query row: the document joined with its display names.
#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: DbId,
    title: String,
    original_filename: Option<String>,
    source_path: Option<String>,
    source: Option<String>,
    mailrule_id: Option<DbId>,
    content: String,
    correspondent_id: Option<DbId>,
    correspondent_name: Option<String>,
    document_type_id: Option<DbId>,
    document_type_name: Option<String>,
    storage_path_id: Option<DbId>,
    storage_path_name: Option<String>,
    owner_id: Option<DbId>,
    owner_username: Option<String>,
    created: docuflow_core::types::Timestamp,
    added: docuflow_core::types::Timestamp,
    modified: docuflow_core::types::Timestamp,
}

fn named(id: Option<DbId>, name: Option<String>) -> Option<NamedRef> {
    Some(NamedRef::new(id?, name.unwrap_or_default()))
}

/// Provides document CRUD, snapshot assembly, and transactional
/// change-set application.
pub struct DocumentRepo;

impl DocumentRepo {
    // -- CRUD ---------------------------------------------------------------

    /// Insert a new document, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateDocument) -> Result<DocumentRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents
                (title, original_filename, source_path, source, mailrule_id, content,
                 correspondent_id, document_type_id, storage_path_id, owner_id, created)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, now()))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DocumentRow>(&query)
            .bind(&input.title)
            .bind(&input.original_filename)
            .bind(&input.source_path)
            .bind(&input.source)
            .bind(input.mailrule_id)
            .bind(&input.content)
            .bind(input.correspondent_id)
            .bind(input.document_type_id)
            .bind(input.storage_path_id)
            .bind(input.owner_id)
            .bind(input.created)
            .fetch_one(pool)
            .await
    }

    /// Find a document by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DocumentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, DocumentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All document ids, ascending. Used by the scheduled sweep.
    pub async fn list_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM documents ORDER BY id")
            .fetch_all(pool)
            .await
    }

    /// Tag a document. Idempotent.
    pub async fn add_tag(pool: &PgPool, document_id: DbId, tag_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO document_tags (document_id, tag_id)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(document_id)
        .bind(tag_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Attach a custom field instance to a document. Idempotent — an
    /// existing instance keeps its value.
    pub async fn attach_custom_field(
        pool: &PgPool,
        document_id: DbId,
        field_id: DbId,
        value: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO custom_field_instances (document_id, field_id, value)
             VALUES ($1, $2, $3) ON CONFLICT (document_id, field_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(field_id)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List a document's custom field instances.
    pub async fn custom_fields(
        pool: &PgPool,
        document_id: DbId,
    ) -> Result<Vec<CustomFieldInstanceRow>, sqlx::Error> {
        sqlx::query_as::<_, CustomFieldInstanceRow>(
            "SELECT id, document_id, field_id, value, created_at
             FROM custom_field_instances WHERE document_id = $1 ORDER BY field_id",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
    }

    // -- snapshot -----------------------------------------------------------

    /// Assemble the read-only snapshot the evaluator and planner consume.
    pub async fn snapshot(pool: &PgPool, id: DbId) -> Result<Option<DocumentSnapshot>, DbError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT d.id, d.title, d.original_filename, d.source_path, d.source, d.mailrule_id,
                    d.content,
                    d.correspondent_id, c.name AS correspondent_name,
                    d.document_type_id, dt.name AS document_type_name,
                    d.storage_path_id, sp.name AS storage_path_name,
                    d.owner_id, u.username AS owner_username,
                    d.created, d.added, d.modified
             FROM documents d
             LEFT JOIN correspondents c ON c.id = d.correspondent_id
             LEFT JOIN document_types dt ON dt.id = d.document_type_id
             LEFT JOIN storage_paths sp ON sp.id = d.storage_path_id
             LEFT JOIN users u ON u.id = d.owner_id
             WHERE d.id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let source = row
            .source
            .as_deref()
            .map(DocumentSource::from_str)
            .transpose()?;

        let tags = Self::link_set(pool, "document_tags", "tag_id", id).await?;
        let view_users = Self::link_set(pool, "document_view_users", "user_id", id).await?;
        let change_users = Self::link_set(pool, "document_change_users", "user_id", id).await?;
        let view_groups = Self::link_set(pool, "document_view_groups", "group_id", id).await?;
        let change_groups = Self::link_set(pool, "document_change_groups", "group_id", id).await?;

        let custom_fields: Vec<(DbId, Option<String>)> = sqlx::query_as(
            "SELECT field_id, value FROM custom_field_instances WHERE document_id = $1",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(Some(DocumentSnapshot {
            id: row.id,
            title: row.title,
            original_filename: row.original_filename,
            source_path: row.source_path,
            source,
            mailrule_id: row.mailrule_id,
            content: row.content,
            correspondent: named(row.correspondent_id, row.correspondent_name),
            document_type: named(row.document_type_id, row.document_type_name),
            storage_path: named(row.storage_path_id, row.storage_path_name),
            owner: named(row.owner_id, row.owner_username),
            tags,
            view_users,
            change_users,
            view_groups,
            change_groups,
            custom_fields: custom_fields.into_iter().collect(),
            created: row.created,
            added: row.added,
            modified: row.modified,
        }))
    }

    async fn link_set(
        pool: &PgPool,
        table: &str,
        id_column: &str,
        document_id: DbId,
    ) -> Result<HashSet<DbId>, sqlx::Error> {
        let query = format!("SELECT {id_column} FROM {table} WHERE document_id = $1");
        let ids: Vec<DbId> = sqlx::query_scalar(&query)
            .bind(document_id)
            .fetch_all(pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    // -- change-set application ---------------------------------------------

    /// Apply a planned change-set in a single transaction.
    ///
    /// The document row is locked (`FOR UPDATE`) for the duration, so a
    /// concurrent firing for the same document serializes here. When the
    /// firing was SCHEDULED, one ledger row per fired workflow is inserted
    /// in the same transaction. A failure rolls everything back.
    pub async fn apply_change_set(
        pool: &PgPool,
        snapshot: &DocumentSnapshot,
        change_set: &ChangeSet,
        trigger_type: TriggerType,
        record_runs_for: &[DbId],
    ) -> Result<(), sqlx::Error> {
        tracing::debug!(
            document_id = snapshot.id,
            trigger = trigger_type.as_str(),
            runs = record_runs_for.len(),
            "Applying change-set"
        );
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> = sqlx::query_scalar("SELECT id FROM documents WHERE id = $1 FOR UPDATE")
            .bind(snapshot.id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(sqlx::Error::RowNotFound);
        }

        if change_set.has_document_changes(snapshot) {
            Self::update_scalars(&mut tx, snapshot, change_set).await?;

            Self::reconcile_links(&mut tx, "document_tags", "tag_id", snapshot.id, &snapshot.tags, &change_set.tags).await?;
            Self::reconcile_links(&mut tx, "document_view_users", "user_id", snapshot.id, &snapshot.view_users, &change_set.view_users).await?;
            Self::reconcile_links(&mut tx, "document_change_users", "user_id", snapshot.id, &snapshot.change_users, &change_set.change_users).await?;
            Self::reconcile_links(&mut tx, "document_view_groups", "group_id", snapshot.id, &snapshot.view_groups, &change_set.view_groups).await?;
            Self::reconcile_links(&mut tx, "document_change_groups", "group_id", snapshot.id, &snapshot.change_groups, &change_set.change_groups).await?;

            Self::reconcile_custom_fields(&mut tx, snapshot, change_set).await?;
        }

        for workflow_id in record_runs_for {
            sqlx::query(
                "INSERT INTO workflow_runs (workflow_id, document_id, trigger_type)
                 VALUES ($1, $2, $3)",
            )
            .bind(workflow_id)
            .bind(snapshot.id)
            .bind(trigger_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Write the changed scalar fields and bump `modified`.
    async fn update_scalars(
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &DocumentSnapshot,
        change_set: &ChangeSet,
    ) -> Result<(), sqlx::Error> {
        let mut sets: Vec<String> = vec!["modified = now()".to_string()];
        let mut param_idx: usize = 0;
        let mut push = |sets: &mut Vec<String>, column: &str| {
            param_idx += 1;
            sets.push(format!("{column} = ${param_idx}"));
        };

        if change_set.title.is_some() {
            push(&mut sets, "title");
        }
        if change_set.correspondent.is_some() {
            push(&mut sets, "correspondent_id");
        }
        if change_set.document_type.is_some() {
            push(&mut sets, "document_type_id");
        }
        if change_set.storage_path.is_some() {
            push(&mut sets, "storage_path_id");
        }
        if change_set.owner.is_some() {
            push(&mut sets, "owner_id");
        }

        let query = format!(
            "UPDATE documents SET {} WHERE id = ${}",
            sets.join(", "),
            param_idx + 1
        );

        let mut q = sqlx::query(&query);
        if let Some(title) = &change_set.title {
            q = q.bind(title);
        }
        if let Some(value) = change_set.correspondent {
            q = q.bind(value);
        }
        if let Some(value) = change_set.document_type {
            q = q.bind(value);
        }
        if let Some(value) = change_set.storage_path {
            q = q.bind(value);
        }
        if let Some(value) = change_set.owner {
            q = q.bind(value);
        }
        q.bind(snapshot.id).execute(&mut **tx).await?;
        Ok(())
    }

    /// Insert missing and delete surplus rows in a document link table.
    async fn reconcile_links(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        id_column: &str,
        document_id: DbId,
        current: &HashSet<DbId>,
        desired: &HashSet<DbId>,
    ) -> Result<(), sqlx::Error> {
        let insert = format!(
            "INSERT INTO {table} (document_id, {id_column}) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        );
        for id in desired.difference(current) {
            sqlx::query(&insert)
                .bind(document_id)
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }

        let delete = format!("DELETE FROM {table} WHERE document_id = $1 AND {id_column} = $2");
        for id in current.difference(desired) {
            sqlx::query(&delete)
                .bind(document_id)
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Attach newly desired custom fields (with their staged values) and
    /// detach removed ones. Existing instances are left untouched.
    async fn reconcile_custom_fields(
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &DocumentSnapshot,
        change_set: &ChangeSet,
    ) -> Result<(), sqlx::Error> {
        for (field_id, value) in &change_set.custom_fields {
            if snapshot.custom_fields.contains_key(field_id) {
                continue;
            }
            sqlx::query(
                "INSERT INTO custom_field_instances (document_id, field_id, value)
                 VALUES ($1, $2, $3) ON CONFLICT (document_id, field_id) DO NOTHING",
            )
            .bind(snapshot.id)
            .bind(field_id)
            .bind(value)
            .execute(&mut **tx)
            .await?;
        }

        for field_id in snapshot.custom_fields.keys() {
            if change_set.custom_fields.contains_key(field_id) {
                continue;
            }
            sqlx::query(
                "DELETE FROM custom_field_instances WHERE document_id = $1 AND field_id = $2",
            )
            .bind(snapshot.id)
            .bind(field_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
