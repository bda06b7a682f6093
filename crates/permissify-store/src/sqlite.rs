//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Permissify. It uses rusqlite
//! with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection, OptionalExtension, ToSql, Transaction};

use permissify_core::{
    ContentType, ContentTypeId, ContentTypeKey, CoreError, GrantId, GranteeKind, GranteeRef, Group,
    GroupId, NaturalKey, NewObjectGrant, NewUser, ObjectGrant, ObjectGrantKey, ObjectId, ObjectRef,
    Permission, PermissionId, PermissionMatch, Principal, PrincipalQuery, Role, RoleId, UserId,
    AUTH_APP, PERMISSIFY_APP,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, PermissionFilter, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Table holding the grantees of a kind.
fn directory_table(kind: GranteeKind) -> &'static str {
    match kind {
        GranteeKind::User => "users",
        GranteeKind::Group => "auth_groups",
        GranteeKind::Role => "roles",
    }
}

/// Unscoped edge table and its grantee column.
fn edge_table(kind: GranteeKind) -> (&'static str, &'static str) {
    match kind {
        GranteeKind::User => ("user_permissions", "user_id"),
        GranteeKind::Group => ("group_permissions", "group_id"),
        GranteeKind::Role => ("role_permissions", "role_id"),
    }
}

/// Membership table and its target column. Users have none.
fn membership_table(kind: GranteeKind) -> Option<(&'static str, &'static str)> {
    match kind {
        GranteeKind::User => None,
        GranteeKind::Group => Some(("user_groups", "group_id")),
        GranteeKind::Role => Some(("user_roles", "role_id")),
    }
}

/// Subquery yielding the ids of the `kind` grantees that reach the user
/// identified by the SQL expression `user`.
fn holder_ids(kind: GranteeKind, user: &str) -> String {
    match membership_table(kind) {
        None => format!("SELECT {}", user),
        Some((table, column)) => {
            format!("SELECT {} FROM {} WHERE user_id = {}", column, table, user)
        }
    }
}

const PERMISSION_SELECT: &str = "SELECT p.id, p.codename, p.name, ct.id, ct.app_label, ct.model
     FROM permissions p JOIN content_types ct ON ct.id = p.content_type_id";

const GRANT_SELECT: &str = "SELECT g.id, g.grantee_type, g.grantee_id, ot.app_label, ot.model,
            g.object_id, p.id, p.codename, p.name, ct.id, ct.app_label, ct.model
     FROM object_grants g
     JOIN content_types ot ON ot.id = g.object_type_id
     JOIN permissions p ON p.id = g.permission_id
     JOIN content_types ct ON ct.id = p.content_type_id";

const USER_SELECT: &str = "SELECT u.id, u.username, u.is_active, u.is_superuser FROM users u";

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
    permission_at(row, 0)
}

fn permission_at(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: PermissionId(row.get(offset)?),
        codename: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        content_type: ContentType {
            id: ContentTypeId(row.get(offset + 3)?),
            app_label: row.get(offset + 4)?,
            model: row.get(offset + 5)?,
        },
    })
}

fn row_to_principal(row: &rusqlite::Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        is_active: row.get(2)?,
        is_superuser: row.get(3)?,
        is_anonymous: false,
    })
}

fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectGrant> {
    let grantee_type: String = row.get(1)?;
    let kind: GranteeKind = grantee_type
        .parse()
        .map_err(|e: CoreError| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let object_id: String = row.get(5)?;

    Ok(ObjectGrant {
        id: GrantId(row.get(0)?),
        grantee: GranteeRef::new(kind, row.get(2)?),
        object: ObjectRef::new(
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            ObjectId::from(object_id),
        ),
        permission: permission_at(row, 6)?,
    })
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(StoreError::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared statements
// ─────────────────────────────────────────────────────────────────────────────

fn ensure_content_type(conn: &Connection, key: &ContentTypeKey) -> Result<ContentType> {
    conn.execute(
        "INSERT OR IGNORE INTO content_types (app_label, model) VALUES (?1, ?2)",
        params![key.app_label, key.model],
    )?;
    conn.query_row(
        "SELECT id, app_label, model FROM content_types WHERE app_label = ?1 AND model = ?2",
        params![key.app_label, key.model],
        |row| {
            Ok(ContentType {
                id: ContentTypeId(row.get(0)?),
                app_label: row.get(1)?,
                model: row.get(2)?,
            })
        },
    )
    .map_err(StoreError::from)
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    Ok(conn
        .query_row(sql, [id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn require_grantee(conn: &Connection, grantee: GranteeRef) -> Result<()> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE id = ?1",
        directory_table(grantee.kind)
    );
    if exists(conn, &sql, grantee.id)? {
        Ok(())
    } else {
        Err(StoreError::NotFound(grantee.to_string()))
    }
}

fn require_permission(conn: &Connection, permission: PermissionId) -> Result<()> {
    if exists(conn, "SELECT 1 FROM permissions WHERE id = ?1", permission.get())? {
        Ok(())
    } else {
        Err(StoreError::NotFound(format!("permission {}", permission)))
    }
}

/// Delete a grantee row plus the object grants it holds and the object
/// grants that target it. Edges and memberships go with the row through
/// foreign keys.
fn delete_grantee(tx: Transaction<'_>, grantee: GranteeRef, itself: &ObjectRef) -> Result<bool> {
    let removed = tx.execute(
        &format!("DELETE FROM {} WHERE id = ?1", directory_table(grantee.kind)),
        [grantee.id],
    )?;
    if removed == 0 {
        return Ok(false);
    }

    let held = tx.execute(
        "DELETE FROM object_grants WHERE grantee_type = ?1 AND grantee_id = ?2",
        params![grantee.kind.as_str(), grantee.id],
    )?;
    let targeting = tx.execute(
        "DELETE FROM object_grants
         WHERE object_type_id IN (
             SELECT id FROM content_types WHERE app_label = ?1 AND model = ?2
         ) AND object_id = ?3",
        params![itself.app_label(), itself.model(), itself.object_id.as_str()],
    )?;
    tx.commit()?;

    tracing::debug!(%grantee, held, targeting, "deleted grantee");
    Ok(true)
}

/// SQL fragment and parameters selecting permission ids that match.
fn matching_permissions(
    permission: &PermissionMatch,
    params: &mut Vec<(&'static str, Value)>,
) -> &'static str {
    match permission {
        PermissionMatch::Id(id) => {
            params.push((":permission_id", Value::Integer(id.get())));
            "SELECT :permission_id"
        }
        PermissionMatch::Name {
            app_label,
            codename,
        } => {
            params.push((":permission_app", Value::Text(app_label.clone())));
            params.push((":permission_codename", Value::Text(codename.clone())));
            "SELECT mp.id FROM permissions mp
             JOIN content_types mct ON mct.id = mp.content_type_id
             WHERE mct.app_label = :permission_app AND mp.codename = :permission_codename"
        }
    }
}

fn principal_query_sql(query: &PrincipalQuery) -> (String, Vec<(&'static str, Value)>) {
    let mut params = Vec::new();
    let matching = matching_permissions(&query.permission, &mut params);

    if let Some(object) = &query.object {
        params.push((":object_app", Value::Text(object.app_label().to_string())));
        params.push((":object_model", Value::Text(object.model().to_string())));
        params.push((":object_id", Value::Text(object.object_id.to_string())));
    }

    let mut paths = Vec::new();
    for kind in GranteeKind::ALL {
        if kind == GranteeKind::Role && !query.include_roles {
            continue;
        }
        let holders = holder_ids(kind, "u.id");
        let path = match &query.object {
            Some(_) => format!(
                "EXISTS (SELECT 1 FROM object_grants g
                         JOIN content_types ot ON ot.id = g.object_type_id
                         WHERE g.grantee_type = '{}'
                           AND g.grantee_id IN ({})
                           AND ot.app_label = :object_app
                           AND ot.model = :object_model
                           AND g.object_id = :object_id
                           AND g.permission_id IN ({}))",
                kind.as_str(),
                holders,
                matching
            ),
            None => {
                let (table, column) = edge_table(kind);
                format!(
                    "EXISTS (SELECT 1 FROM {} e
                             WHERE e.{} IN ({})
                               AND e.permission_id IN ({}))",
                    table, column, holders, matching
                )
            }
        };
        paths.push(path);
    }

    let mut admitted = paths;
    if query.include_superusers {
        admitted.push("u.is_superuser = 1".to_string());
    }
    let admitted = if admitted.is_empty() {
        "0".to_string()
    } else {
        admitted.join("\n   OR ")
    };

    let mut sql = format!("{} WHERE ({})", USER_SELECT, admitted);
    if let Some(active) = query.active {
        sql.push_str(" AND u.is_active = :active");
        params.push((":active", Value::Integer(i64::from(active))));
    }
    sql.push_str(" ORDER BY u.id");

    (sql, params)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_or_create_content_type(&self, key: &ContentTypeKey) -> Result<ContentType> {
        let key = key.clone();
        self.run(move |conn| ensure_content_type(conn, &key)).await
    }

    async fn get_content_type(&self, key: &ContentTypeKey) -> Result<Option<ContentType>> {
        let key = key.clone();
        self.run(move |conn| {
            conn.query_row(
                "SELECT id, app_label, model FROM content_types
                 WHERE app_label = ?1 AND model = ?2",
                params![key.app_label, key.model],
                |row| {
                    Ok(ContentType {
                        id: ContentTypeId(row.get(0)?),
                        app_label: row.get(1)?,
                        model: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_or_create_permission(
        &self,
        content_type: &ContentTypeKey,
        codename: &str,
        name: &str,
    ) -> Result<(Permission, InsertResult)> {
        let key = content_type.clone();
        let codename = codename.to_string();
        let name = name.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let ct = ensure_content_type(&tx, &key)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO permissions (content_type_id, codename, name)
                 VALUES (?1, ?2, ?3)",
                params![ct.id.get(), codename, name],
            )?;
            let permission = tx.query_row(
                &format!("{} WHERE p.content_type_id = ?1 AND p.codename = ?2", PERMISSION_SELECT),
                params![ct.id.get(), codename],
                row_to_permission,
            )?;
            tx.commit()?;

            let result = if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            };
            Ok((permission, result))
        })
        .await
    }

    async fn get_permission(&self, app_label: &str, codename: &str) -> Result<Option<Permission>> {
        let app_label = app_label.to_string();
        let codename = codename.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "{} WHERE ct.app_label = ?1 AND p.codename = ?2 ORDER BY p.id LIMIT 1",
                    PERMISSION_SELECT
                ),
                params![app_label, codename],
                row_to_permission,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_permission_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Permission>> {
        let key = key.clone();
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "{} WHERE p.codename = ?1 AND ct.app_label = ?2 AND ct.model = ?3",
                    PERMISSION_SELECT
                ),
                params![key.codename, key.app_label, key.model],
                row_to_permission,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_permissions(&self, filter: &PermissionFilter) -> Result<Vec<Permission>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let (clause, args): (&str, Vec<String>) = match &filter {
                PermissionFilter::All => ("", Vec::new()),
                PermissionFilter::App(app_label) => {
                    (" WHERE ct.app_label = ?1", vec![app_label.clone()])
                }
                PermissionFilter::ContentType(key) => (
                    " WHERE ct.app_label = ?1 AND ct.model = ?2",
                    vec![key.app_label.clone(), key.model.clone()],
                ),
            };
            let mut stmt =
                conn.prepare(&format!("{}{} ORDER BY p.id", PERMISSION_SELECT, clause))?;
            let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_permission)?;
            collect(rows)
        })
        .await
    }

    async fn create_user(&self, user: &NewUser) -> Result<Principal> {
        let user = user.clone();
        self.run(move |conn| {
            let taken = conn
                .query_row(
                    "SELECT 1 FROM users WHERE username = ?1",
                    [&user.username],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if taken {
                return Err(StoreError::InvalidData(format!(
                    "username already taken: {}",
                    user.username
                )));
            }

            conn.execute(
                "INSERT INTO users (username, is_active, is_superuser) VALUES (?1, ?2, ?3)",
                params![user.username, user.is_active, user.is_superuser],
            )?;
            Ok(Principal {
                id: UserId(conn.last_insert_rowid()),
                username: user.username,
                is_active: user.is_active,
                is_superuser: user.is_superuser,
                is_anonymous: false,
            })
        })
        .await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<Principal>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("{} WHERE u.id = ?1", USER_SELECT),
                [id.get()],
                row_to_principal,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        self.run(move |conn| {
            delete_grantee(
                conn.transaction()?,
                GranteeRef::new(GranteeKind::User, id.get()),
                &ObjectRef::new(AUTH_APP, "user", id.get()),
            )
        })
        .await
    }

    async fn create_group(&self, name: &str) -> Result<Group> {
        let name = name.to_string();
        self.run(move |conn| {
            let taken = conn
                .query_row("SELECT 1 FROM auth_groups WHERE name = ?1", [&name], |_| {
                    Ok(())
                })
                .optional()?
                .is_some();
            if taken {
                return Err(StoreError::InvalidData(format!(
                    "group name already taken: {}",
                    name
                )));
            }

            conn.execute("INSERT INTO auth_groups (name) VALUES (?1)", [&name])?;
            Ok(Group {
                id: GroupId(conn.last_insert_rowid()),
                name,
            })
        })
        .await
    }

    async fn delete_group(&self, id: GroupId) -> Result<bool> {
        self.run(move |conn| {
            delete_grantee(
                conn.transaction()?,
                GranteeRef::new(GranteeKind::Group, id.get()),
                &ObjectRef::new(AUTH_APP, "group", id.get()),
            )
        })
        .await
    }

    async fn get_or_create_role(&self, name: &str) -> Result<(Role, InsertResult)> {
        let name = name.to_string();
        self.run(move |conn| {
            let inserted = conn.execute("INSERT OR IGNORE INTO roles (name) VALUES (?1)", [&name])?;
            let id: i64 = conn.query_row("SELECT id FROM roles WHERE name = ?1", [&name], |row| {
                row.get(0)
            })?;
            let result = if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            };
            Ok((
                Role {
                    id: RoleId(id),
                    name,
                },
                result,
            ))
        })
        .await
    }

    async fn get_role(&self, name: &str) -> Result<Option<Role>> {
        let name = name.to_string();
        self.run(move |conn| {
            conn.query_row("SELECT id, name FROM roles WHERE name = ?1", [&name], |row| {
                Ok(Role {
                    id: RoleId(row.get(0)?),
                    name: row.get(1)?,
                })
            })
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool> {
        self.run(move |conn| {
            delete_grantee(
                conn.transaction()?,
                GranteeRef::new(GranteeKind::Role, id.get()),
                &ObjectRef::new(PERMISSIFY_APP, "role", id.get()),
            )
        })
        .await
    }

    async fn add_membership(&self, user: UserId, target: GranteeRef) -> Result<InsertResult> {
        self.run(move |conn| {
            let (table, column) = membership_table(target.kind).ok_or_else(|| {
                StoreError::InvalidData(format!("users cannot be members of {}", target))
            })?;
            require_grantee(conn, GranteeRef::new(GranteeKind::User, user.get()))?;
            require_grantee(conn, target)?;

            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (user_id, {}) VALUES (?1, ?2)",
                    table, column
                ),
                [user.get(), target.id],
            )?;
            Ok(if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn remove_membership(&self, user: UserId, target: GranteeRef) -> Result<bool> {
        self.run(move |conn| {
            let Some((table, column)) = membership_table(target.kind) else {
                return Ok(false);
            };
            let removed = conn.execute(
                &format!("DELETE FROM {} WHERE user_id = ?1 AND {} = ?2", table, column),
                [user.get(), target.id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn memberships(&self, user: UserId, kind: GranteeKind) -> Result<Vec<GranteeRef>> {
        self.run(move |conn| {
            let Some((table, column)) = membership_table(kind) else {
                return Ok(Vec::new());
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE user_id = ?1 ORDER BY {}",
                column, table, column
            ))?;
            let rows = stmt.query_map([user.get()], |row| {
                Ok(GranteeRef::new(kind, row.get(0)?))
            })?;
            collect(rows)
        })
        .await
    }

    async fn add_permission_edge(
        &self,
        grantee: GranteeRef,
        permission: PermissionId,
    ) -> Result<InsertResult> {
        self.run(move |conn| {
            require_grantee(conn, grantee)?;
            require_permission(conn, permission)?;

            let (table, column) = edge_table(grantee.kind);
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} ({}, permission_id) VALUES (?1, ?2)",
                    table, column
                ),
                [grantee.id, permission.get()],
            )?;
            Ok(if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn remove_permission_edge(
        &self,
        grantee: GranteeRef,
        permission: PermissionId,
    ) -> Result<bool> {
        self.run(move |conn| {
            let (table, column) = edge_table(grantee.kind);
            let removed = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1 AND permission_id = ?2",
                    table, column
                ),
                [grantee.id, permission.get()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn replace_permission_edges(
        &self,
        grantee: GranteeRef,
        permissions: &[PermissionId],
    ) -> Result<usize> {
        let permissions = permissions.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_grantee(&tx, grantee)?;
            for permission in &permissions {
                require_permission(&tx, *permission)?;
            }

            let (table, column) = edge_table(grantee.kind);
            let removed = tx.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", table, column),
                [grantee.id],
            )?;
            {
                let mut insert = tx.prepare(&format!(
                    "INSERT OR IGNORE INTO {} ({}, permission_id) VALUES (?1, ?2)",
                    table, column
                ))?;
                for permission in &permissions {
                    insert.execute([grantee.id, permission.get()])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn permission_edges(&self, grantee: GranteeRef) -> Result<Vec<Permission>> {
        self.run(move |conn| {
            let (table, column) = edge_table(grantee.kind);
            let mut stmt = conn.prepare(&format!(
                "{} WHERE p.id IN (SELECT permission_id FROM {} WHERE {} = ?1) ORDER BY p.id",
                PERMISSION_SELECT, table, column
            ))?;
            let rows = stmt.query_map([grantee.id], row_to_permission)?;
            collect(rows)
        })
        .await
    }

    async fn get_or_create_object_grant(
        &self,
        grant: &NewObjectGrant,
    ) -> Result<(ObjectGrant, InsertResult)> {
        let grantee = grant.grantee;
        let permission = grant.permission.id;
        let object = grant.object();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            require_grantee(&tx, grantee)?;
            require_permission(&tx, permission)?;
            let object_type = ensure_content_type(&tx, &object.content_type)?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO object_grants
                     (grantee_type, grantee_id, object_type_id, object_id, permission_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    grantee.kind.as_str(),
                    grantee.id,
                    object_type.id.get(),
                    object.object_id.as_str(),
                    permission.get()
                ],
            )?;
            let stored = tx.query_row(
                &format!(
                    "{} WHERE g.grantee_type = ?1 AND g.grantee_id = ?2
                        AND g.object_type_id = ?3 AND g.object_id = ?4
                        AND g.permission_id = ?5",
                    GRANT_SELECT
                ),
                params![
                    grantee.kind.as_str(),
                    grantee.id,
                    object_type.id.get(),
                    object.object_id.as_str(),
                    permission.get()
                ],
                row_to_grant,
            )?;
            tx.commit()?;

            let result = if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            };
            Ok((stored, result))
        })
        .await
    }

    async fn delete_object_grant(&self, key: &ObjectGrantKey) -> Result<bool> {
        let key = key.clone();
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM object_grants
                 WHERE grantee_type = ?1 AND grantee_id = ?2
                   AND object_type_id IN (
                       SELECT id FROM content_types WHERE app_label = ?3 AND model = ?4
                   )
                   AND object_id = ?5 AND permission_id = ?6",
                params![
                    key.grantee.kind.as_str(),
                    key.grantee.id,
                    key.object.app_label(),
                    key.object.model(),
                    key.object.object_id.as_str(),
                    key.permission.get()
                ],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn object_grants_for(&self, object: &ObjectRef) -> Result<Vec<ObjectGrant>> {
        let object = object.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE ot.app_label = ?1 AND ot.model = ?2 AND g.object_id = ?3 ORDER BY g.id",
                GRANT_SELECT
            ))?;
            let rows = stmt.query_map(
                params![object.app_label(), object.model(), object.object_id.as_str()],
                row_to_grant,
            )?;
            collect(rows)
        })
        .await
    }

    async fn delete_object_grants_for(&self, object: &ObjectRef) -> Result<usize> {
        let object = object.clone();
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM object_grants
                 WHERE object_type_id IN (
                     SELECT id FROM content_types WHERE app_label = ?1 AND model = ?2
                 ) AND object_id = ?3",
                params![object.app_label(), object.model(), object.object_id.as_str()],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn granted_permissions(
        &self,
        user: UserId,
        source: GranteeKind,
    ) -> Result<Vec<Permission>> {
        self.run(move |conn| {
            let (table, column) = edge_table(source);
            let mut stmt = conn.prepare(&format!(
                "{} WHERE p.id IN (
                     SELECT permission_id FROM {} WHERE {} IN ({})
                 ) ORDER BY p.id",
                PERMISSION_SELECT,
                table,
                column,
                holder_ids(source, "?1")
            ))?;
            let rows = stmt.query_map([user.get()], row_to_permission)?;
            collect(rows)
        })
        .await
    }

    async fn object_granted_permissions(
        &self,
        user: UserId,
        source: GranteeKind,
        object: &ObjectRef,
    ) -> Result<Vec<Permission>> {
        let object = object.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE p.id IN (
                     SELECT g.permission_id FROM object_grants g
                     JOIN content_types ot ON ot.id = g.object_type_id
                     WHERE g.grantee_type = ?2 AND g.grantee_id IN ({})
                       AND ot.app_label = ?3 AND ot.model = ?4 AND g.object_id = ?5
                 ) ORDER BY p.id",
                PERMISSION_SELECT,
                holder_ids(source, "?1")
            ))?;
            let rows = stmt.query_map(
                params![
                    user.get(),
                    source.as_str(),
                    object.app_label(),
                    object.model(),
                    object.object_id.as_str()
                ],
                row_to_permission,
            )?;
            collect(rows)
        })
        .await
    }

    async fn filter_principals(&self, query: &PrincipalQuery) -> Result<Vec<Principal>> {
        let (sql, values) = principal_query_sql(query);
        self.run(move |conn| {
            let named: Vec<(&str, &dyn ToSql)> = values
                .iter()
                .map(|(name, value)| (*name, value as &dyn ToSql))
                .collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(named.as_slice(), row_to_principal)?;
            collect(rows)
        })
        .await
    }
}
