use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_json, parse_text, parse_timestamp, to_json, LocalDao};
use crate::models::{Question, Quiz, QuizStatus};

/// Quizzes live in `quizzes`; their questions in `quiz_questions`, ordered by
/// position.
pub struct QuizDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct QuizRow {
    id: String,
    title: String,
    subject: String,
    class_name: String,
    duration_minutes: Option<i32>,
    status: String,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    prompt: String,
    options: String,
    correct_option: i64,
    points: i64,
}

impl TryFrom<QuestionRow> for Question {
    type Error = sqlx::Error;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            prompt: row.prompt,
            options: parse_json(&row.options)?,
            correct_option: usize::try_from(row.correct_option)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            points: u32::try_from(row.points).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        })
    }
}

impl QuizRow {
    fn into_quiz(self, questions: Vec<Question>) -> Result<Quiz, sqlx::Error> {
        Ok(Quiz {
            id: self.id,
            title: self.title,
            subject: self.subject,
            class_name: self.class_name,
            duration_minutes: self.duration_minutes,
            questions,
            status: parse_text(&self.status)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

async fn load_questions(conn: &mut SqliteConnection, quiz_id: &str) -> Result<Vec<Question>, sqlx::Error> {
    let rows: Vec<QuestionRow> = sqlx::query_as(
        "SELECT prompt, options, correct_option, points FROM quiz_questions WHERE quiz_id = ? ORDER BY position",
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Question::try_from).collect()
}

async fn hydrate(conn: &mut SqliteConnection, rows: Vec<QuizRow>) -> Result<Vec<Quiz>, sqlx::Error> {
    let mut quizzes = Vec::with_capacity(rows.len());
    for row in rows {
        let questions = load_questions(conn, &row.id).await?;
        quizzes.push(row.into_quiz(questions)?);
    }
    Ok(quizzes)
}

impl QuizDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_status(&self, status: QuizStatus) -> Result<Vec<Quiz>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<QuizRow> =
            sqlx::query_as("SELECT * FROM quizzes WHERE status = ? ORDER BY created_at, title")
                .bind(status.to_string())
                .fetch_all(&mut *conn)
                .await?;
        hydrate(&mut conn, rows).await
    }
}

impl LocalDao<Quiz> for QuizDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, quiz: &Quiz) -> Result<(), sqlx::Error> {
        // ON CONFLICT rather than REPLACE: a replace deletes the parent row
        // and cascades to the questions.
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, title, subject, class_name, duration_minutes, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                subject = excluded.subject,
                class_name = excluded.class_name,
                duration_minutes = excluded.duration_minutes,
                status = excluded.status,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.subject)
        .bind(&quiz.class_name)
        .bind(quiz.duration_minutes)
        .bind(quiz.status.to_string())
        .bind(quiz.created_at.to_rfc3339())
        .bind(quiz.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = ?")
            .bind(&quiz.id)
            .execute(&mut *conn)
            .await?;

        for (position, question) in quiz.questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO quiz_questions (quiz_id, position, prompt, options, correct_option, points)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&quiz.id)
            .bind(position as i64)
            .bind(&question.prompt)
            .bind(to_json(&question.options)?)
            .bind(question.correct_option as i64)
            .bind(i64::from(question.points))
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
        let row: Option<QuizRow> = sqlx::query_as("SELECT * FROM quizzes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => {
                let questions = load_questions(conn, &row.id).await?;
                Ok(Some(row.into_quiz(questions)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Quiz>, sqlx::Error> {
        let rows: Vec<QuizRow> = sqlx::query_as("SELECT * FROM quizzes ORDER BY created_at, title")
            .fetch_all(&mut *conn)
            .await?;
        hydrate(conn, rows).await
    }
}
