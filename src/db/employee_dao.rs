use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_date, parse_decimal, parse_text, parse_timestamp, LocalDao};
use crate::models::Employee;

pub struct EmployeeDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    department: String,
    position: String,
    hire_date: String,
    salary: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = sqlx::Error;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            department: row.department,
            position: row.position,
            hire_date: parse_date(&row.hire_date)?,
            salary: parse_decimal(&row.salary)?,
            status: parse_text(&row.status)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl EmployeeDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_department(&self, department: &str) -> Result<Vec<Employee>, sqlx::Error> {
        let rows: Vec<EmployeeRow> = sqlx::query_as(
            "SELECT * FROM employees WHERE LOWER(department) = LOWER(?) ORDER BY last_name, first_name",
        )
        .bind(department)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Employee::try_from).collect()
    }
}

impl LocalDao<Employee> for EmployeeDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, employee: &Employee) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO employees (id, first_name, last_name, email, phone, department, position, hire_date, salary, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&employee.id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.phone)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.hire_date.to_string())
        .bind(employee.salary.to_string())
        .bind(employee.status.to_string())
        .bind(employee.created_at.to_rfc3339())
        .bind(employee.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Employee>, sqlx::Error> {
        let row: Option<EmployeeRow> = sqlx::query_as("SELECT * FROM employees WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Employee::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Employee>, sqlx::Error> {
        let rows: Vec<EmployeeRow> =
            sqlx::query_as("SELECT * FROM employees ORDER BY last_name, first_name")
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(Employee::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmployeeStatus;
    use crate::db::testing::test_pool;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn hired() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 9, 1).unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let (pool, _temp) = test_pool().await;
        let dao = EmployeeDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        let mut employee = Employee::new("Chidi", "Okafor", "Admin", "Bursar", hired())
            .with_email("chidi@school.test")
            .with_phone("+234 800 000 0000")
            .with_salary(Decimal::new(35000000, 2));
        employee.status = EmployeeStatus::OnLeave;
        dao.upsert(&mut conn, &employee).await.unwrap();

        let fetched = dao.find(&mut conn, &employee.id).await.unwrap();
        assert_eq!(fetched, Some(employee));
    }

    #[tokio::test]
    async fn test_list_by_department_sorted_by_name() {
        let (pool, _temp) = test_pool().await;
        let dao = EmployeeDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        for (first, last, dept) in [
            ("Bola", "Zubair", "Science"),
            ("Amaka", "Adeyemi", "science"),
            ("Tunde", "Bello", "Arts"),
        ] {
            let employee = Employee::new(first, last, dept, "Teacher", hired());
            dao.upsert(&mut conn, &employee).await.unwrap();
        }

        let science = dao.list_by_department("SCIENCE").await.unwrap();
        let names: Vec<String> = science.iter().map(Employee::full_name).collect();
        assert_eq!(names, vec!["Amaka Adeyemi", "Bola Zubair"]);
    }
}
