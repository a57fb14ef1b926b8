use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_json, parse_timestamp, to_json, LocalDao};
use crate::models::Teacher;

pub struct TeacherDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TeacherRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    subjects: String,
    employee_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TeacherRow> for Teacher {
    type Error = sqlx::Error;

    fn try_from(row: TeacherRow) -> Result<Self, Self::Error> {
        Ok(Teacher {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            subjects: parse_json(&row.subjects)?,
            employee_id: row.employee_id,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl TeacherDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LocalDao<Teacher> for TeacherDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, teacher: &Teacher) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO teachers (id, first_name, last_name, email, subjects, employee_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&teacher.id)
        .bind(&teacher.first_name)
        .bind(&teacher.last_name)
        .bind(&teacher.email)
        .bind(to_json(&teacher.subjects)?)
        .bind(&teacher.employee_id)
        .bind(teacher.created_at.to_rfc3339())
        .bind(teacher.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM teachers WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Teacher>, sqlx::Error> {
        let row: Option<TeacherRow> = sqlx::query_as("SELECT * FROM teachers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Teacher::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Teacher>, sqlx::Error> {
        let rows: Vec<TeacherRow> = sqlx::query_as("SELECT * FROM teachers ORDER BY last_name, first_name")
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Teacher::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[tokio::test]
    async fn test_subjects_stored_as_list() {
        let (pool, _temp) = test_pool().await;
        let dao = TeacherDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        let teacher = Teacher::new("Ngozi", "Obi")
            .with_email("ngozi@school.test")
            .with_subjects(vec!["Mathematics".to_string(), "Physics".to_string()])
            .with_employee("emp-7");
        dao.upsert(&mut conn, &teacher).await.unwrap();

        let fetched = dao.find(&mut conn, &teacher.id).await.unwrap().unwrap();
        assert_eq!(fetched.subjects, vec!["Mathematics", "Physics"]);
        assert_eq!(fetched, teacher);
        assert_eq!(dao.list(&mut conn).await.unwrap().len(), 1);
    }
}
