use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_date, parse_text, parse_timestamp, LocalDao};
use crate::models::Student;

pub struct StudentDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: String,
    admission_number: String,
    first_name: String,
    last_name: String,
    class_name: String,
    guardian_name: String,
    guardian_phone: String,
    date_of_birth: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<StudentRow> for Student {
    type Error = sqlx::Error;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(Student {
            id: row.id,
            admission_number: row.admission_number,
            first_name: row.first_name,
            last_name: row.last_name,
            class_name: row.class_name,
            guardian_name: row.guardian_name,
            guardian_phone: row.guardian_phone,
            date_of_birth: row.date_of_birth.as_deref().map(parse_date).transpose()?,
            status: parse_text(&row.status)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl StudentDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_class(&self, class_name: &str) -> Result<Vec<Student>, sqlx::Error> {
        let rows: Vec<StudentRow> = sqlx::query_as(
            "SELECT * FROM students WHERE LOWER(class_name) = LOWER(?) ORDER BY last_name, first_name",
        )
        .bind(class_name)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Student::try_from).collect()
    }
}

impl LocalDao<Student> for StudentDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, student: &Student) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO students (id, admission_number, first_name, last_name, class_name, guardian_name, guardian_phone, date_of_birth, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.id)
        .bind(&student.admission_number)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.class_name)
        .bind(&student.guardian_name)
        .bind(&student.guardian_phone)
        .bind(student.date_of_birth.map(|d| d.to_string()))
        .bind(student.status.to_string())
        .bind(student.created_at.to_rfc3339())
        .bind(student.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Student>, sqlx::Error> {
        let row: Option<StudentRow> = sqlx::query_as("SELECT * FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Student::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Student>, sqlx::Error> {
        let rows: Vec<StudentRow> =
            sqlx::query_as("SELECT * FROM students ORDER BY class_name, last_name, first_name")
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(Student::try_from).collect()
    }
}
