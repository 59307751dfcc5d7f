use anyhow::Result;
use auth_core::error::AuthError;
use auth_core::models::Role;
use auth_core::services::authorization::RoleStore;
use sqlx::{MySql, Pool};
use uuid::Uuid;

pub struct RoleRepository {
    pool: Pool<MySql>,
}

impl RoleRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RoleStore for RoleRepository {
    async fn create(&self, role: Role) -> Result<Role, AuthError> {
        // Using sqlx::query instead of query! explicitly to avoid macro type issues with Json types
        sqlx::query(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, parent_role_id, is_system_role, permissions, constraints, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(role.id.to_string())
        .bind(role.tenant_id.to_string())
        .bind(role.name.clone())
        .bind(role.description.clone())
        .bind(role.parent_role_id.map(|u| u.to_string()))
        .bind(role.is_system_role)
        .bind(role.permissions.clone())
        .bind(role.constraints.clone())
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError { message: e.to_string() })?;

        Ok(role)
    }

    async fn update(&self, role: Role) -> Result<Role, AuthError> {
        let mut role = role;
        role.updated_at = Some(chrono::Utc::now());

        sqlx::query(
            r#"
            UPDATE roles
            SET name=?, description=?, parent_role_id=?, permissions=?, constraints=?, updated_at=?
            WHERE id=?
            "#
        )
        .bind(role.name.clone())
        .bind(role.description.clone())
        .bind(role.parent_role_id.map(|u| u.to_string()))
        .bind(role.permissions.clone())
        .bind(role.constraints.clone())
        .bind(role.updated_at)
        .bind(role.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError { message: e.to_string() })?;

        Ok(role)
    }

    async fn delete(&self, id: Uuid, tenant_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM roles WHERE id = ? AND tenant_id = ?")
            .bind(id.to_string())
            .bind(tenant_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError { message: e.to_string() })?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Role>, AuthError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = ? AND tenant_id = ?")
            .bind(id.to_string())
            .bind(tenant_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError { message: e.to_string() })
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Role>, AuthError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE tenant_id = ?")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError { message: e.to_string() })
    }

    async fn assign_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id.to_string())
            .bind(permission_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError { message: e.to_string() })?;
        Ok(())
    }
}
