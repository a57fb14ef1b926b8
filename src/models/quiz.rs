use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Draft,
    Published,
    Closed,
}

super::text_enum!(QuizStatus {
    Draft => "draft",
    Published => "published",
    Closed => "closed",
});

impl QuizStatus {
    pub fn can_transition_to(self, next: QuizStatus) -> bool {
        matches!(
            (self, next),
            (QuizStatus::Draft, QuizStatus::Published) | (QuizStatus::Published, QuizStatus::Closed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_option: usize,
    pub points: u32,
}

impl Question {
    pub fn new(prompt: impl Into<String>, options: Vec<String>, correct_option: usize) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct_option,
            points: 1,
        }
    }

    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub class_name: String,
    pub duration_minutes: Option<i32>,
    pub questions: Vec<Question>,
    pub status: QuizStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of grading one set of answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizScore {
    pub earned: u32,
    pub possible: u32,
    pub percentage: f64,
}

impl Quiz {
    pub fn new(
        title: impl Into<String>,
        subject: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            subject: subject.into(),
            class_name: class_name.into(),
            duration_minutes: None,
            questions: Vec::new(),
            status: QuizStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_duration(mut self, minutes: i32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self
    }

    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    /// Scores `answers` positionally against the questions. Missing, unanswered
    /// and wrong answers earn nothing.
    pub fn grade(&self, answers: &[Option<usize>]) -> QuizScore {
        let earned: u32 = self
            .questions
            .iter()
            .zip(answers.iter().copied().chain(std::iter::repeat(None)))
            .filter(|(question, answer)| *answer == Some(question.correct_option))
            .map(|(question, _)| question.points)
            .sum();
        let possible = self.total_points();
        let percentage = if possible == 0 {
            0.0
        } else {
            f64::from(earned) / f64::from(possible) * 100.0
        };

        QuizScore {
            earned,
            possible,
            percentage,
        }
    }
}

impl Entity for Quiz {
    const COLLECTION: Collection = Collection::Quizzes;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", "=".repeat(self.title.len()))?;
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(f, "Class:   {}", self.class_name)?;
        writeln!(f, "Status:  {}", self.status)?;
        if let Some(minutes) = self.duration_minutes {
            writeln!(f, "Time:    {} min", minutes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    fn sample() -> Quiz {
        Quiz::new("Fractions", "Maths", "JSS1").with_questions(vec![
            Question::new("1/2 + 1/4?", options(), 2).with_points(2),
            Question::new("1/3 of 9?", options(), 0),
            Question::new("2/4 simplified?", options(), 1),
        ])
    }

    #[test]
    fn test_grade_all_correct() {
        let score = sample().grade(&[Some(2), Some(0), Some(1)]);
        assert_eq!(score.earned, 4);
        assert_eq!(score.possible, 4);
        assert_eq!(score.percentage, 100.0);
    }

    #[test]
    fn test_grade_partial_and_missing_answers() {
        let score = sample().grade(&[Some(2), None]);
        assert_eq!(score.earned, 2);
        assert_eq!(score.possible, 4);
        assert_eq!(score.percentage, 50.0);
    }

    #[test]
    fn test_grade_empty_quiz() {
        let quiz = Quiz::new("Empty", "Maths", "JSS1");
        let score = quiz.grade(&[Some(0)]);
        assert_eq!(score.possible, 0);
        assert_eq!(score.percentage, 0.0);
    }

    #[test]
    fn test_status_transitions() {
        assert!(QuizStatus::Draft.can_transition_to(QuizStatus::Published));
        assert!(QuizStatus::Published.can_transition_to(QuizStatus::Closed));
        assert!(!QuizStatus::Closed.can_transition_to(QuizStatus::Published));
        assert!(!QuizStatus::Draft.can_transition_to(QuizStatus::Closed));
    }
}
