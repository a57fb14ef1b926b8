use chrono::Utc;
use std::sync::Arc;

use super::{ensure_transition, not_found, validation, CollectionState, Result, UiState};
use crate::app::QuizRepository;
use crate::models::{Question, Quiz, QuizScore, QuizStatus};

pub struct ExamViewModel {
    quiz_repo: Arc<QuizRepository>,
    pub quizzes: CollectionState<Quiz>,
}

impl ExamViewModel {
    pub fn new(quiz_repo: Arc<QuizRepository>) -> Self {
        Self {
            quizzes: CollectionState::bind(quiz_repo.clone()),
            quiz_repo,
        }
    }

    pub async fn ready(&self) -> Result<()> {
        self.quizzes.loaded().await?;
        Ok(())
    }

    /// Saves a new quiz as a draft.
    pub async fn create_quiz(&self, mut quiz: Quiz) -> Result<Quiz> {
        if quiz.title.trim().is_empty() {
            return Err(validation("Quiz title is required"));
        }
        if quiz.duration_minutes.is_some_and(|m| m <= 0) {
            return Err(validation("Duration must be positive"));
        }
        for question in &quiz.questions {
            validate_question(question)?;
        }
        quiz.status = QuizStatus::Draft;
        self.quiz_repo.save(&quiz).await?;
        Ok(quiz)
    }

    pub async fn add_question(&self, quiz_id: &str, question: Question) -> Result<Quiz> {
        validate_question(&question)?;
        let mut quiz = self.editable(quiz_id).await?;
        quiz.questions.push(question);
        self.store(&mut quiz).await?;
        Ok(quiz)
    }

    pub async fn remove_question(&self, quiz_id: &str, index: usize) -> Result<Quiz> {
        let mut quiz = self.editable(quiz_id).await?;
        if index >= quiz.questions.len() {
            return Err(validation(format!(
                "Question {} does not exist; quiz has {}",
                index + 1,
                quiz.questions.len()
            )));
        }
        quiz.questions.remove(index);
        self.store(&mut quiz).await?;
        Ok(quiz)
    }

    pub async fn publish_quiz(&self, id: &str) -> Result<Quiz> {
        let mut quiz = self.load(id).await?;
        ensure_transition(quiz.status, QuizStatus::Published)?;
        if quiz.questions.is_empty() {
            return Err(validation("Cannot publish a quiz with no questions"));
        }
        quiz.status = QuizStatus::Published;
        self.store(&mut quiz).await?;
        Ok(quiz)
    }

    pub async fn close_quiz(&self, id: &str) -> Result<Quiz> {
        let mut quiz = self.load(id).await?;
        ensure_transition(quiz.status, QuizStatus::Closed)?;
        quiz.status = QuizStatus::Closed;
        self.store(&mut quiz).await?;
        Ok(quiz)
    }

    pub fn quizzes_by_status(&self, status: QuizStatus) -> Vec<Quiz> {
        self.quizzes
            .items()
            .into_iter()
            .filter(|q| q.status == status)
            .collect()
    }

    /// Questions of one quiz as screen state. `Empty` means nothing has been
    /// added yet.
    pub fn questions_state(&self, quiz_id: &str) -> Result<UiState<Question>> {
        match self.quizzes.state() {
            UiState::Loading => return Ok(UiState::Loading),
            UiState::Error(message) => return Ok(UiState::Error(message)),
            UiState::Empty | UiState::Success(_) => {}
        }
        let quiz = self
            .quizzes
            .find(quiz_id)
            .ok_or_else(|| not_found("Quiz", quiz_id))?;
        Ok(UiState::from_items(quiz.questions))
    }

    pub async fn grade(&self, quiz_id: &str, answers: &[Option<usize>]) -> Result<QuizScore> {
        let quiz = self.load(quiz_id).await?;
        if quiz.questions.is_empty() {
            return Err(validation("Quiz has no questions to grade"));
        }
        Ok(quiz.grade(answers))
    }

    pub async fn delete_quiz(&self, id: &str) -> Result<()> {
        if !self.quiz_repo.delete(id).await? {
            return Err(not_found("Quiz", id));
        }
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Quiz> {
        self.quiz_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Quiz", id))
    }

    /// Questions can only change while the quiz is a draft.
    async fn editable(&self, id: &str) -> Result<Quiz> {
        let quiz = self.load(id).await?;
        if quiz.status != QuizStatus::Draft {
            return Err(validation(format!(
                "Quiz '{}' is {}; only drafts can be edited",
                quiz.title, quiz.status
            )));
        }
        Ok(quiz)
    }

    async fn store(&self, quiz: &mut Quiz) -> Result<()> {
        quiz.updated_at = Utc::now();
        self.quiz_repo.save(quiz).await?;
        Ok(())
    }
}

fn validate_question(question: &Question) -> Result<()> {
    if question.prompt.trim().is_empty() {
        return Err(validation("Question prompt is required"));
    }
    if question.options.len() < 2 {
        return Err(validation("A question needs at least two options"));
    }
    if question.correct_option >= question.options.len() {
        return Err(validation(format!(
            "Correct option {} is out of range (1-{})",
            question.correct_option + 1,
            question.options.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_context;
    use crate::viewmodel::ViewModelError;

    fn question(prompt: &str, correct: usize) -> Question {
        Question::new(prompt, vec!["A".into(), "B".into(), "C".into()], correct)
    }

    async fn vm_with_quiz() -> (ExamViewModel, Quiz, tempfile::TempDir) {
        let (ctx, temp) = test_context().await;
        let vm = ctx.exam();
        vm.ready().await.unwrap();
        let quiz = vm
            .create_quiz(Quiz::new("Algebra", "Mathematics", "SS1").with_duration(30))
            .await
            .unwrap();
        (vm, quiz, temp)
    }

    #[tokio::test]
    async fn test_quiz_without_questions_is_empty() {
        let (vm, quiz, _temp) = vm_with_quiz().await;
        assert_eq!(vm.questions_state(&quiz.id).unwrap(), UiState::Empty);

        vm.add_question(&quiz.id, question("2 + 2?", 1)).await.unwrap();
        match vm.questions_state(&quiz.id).unwrap() {
            UiState::Success(questions) => assert_eq!(questions.len(), 1),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(matches!(
            vm.questions_state("missing"),
            Err(ViewModelError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_question_validation() {
        let (vm, quiz, _temp) = vm_with_quiz().await;

        let one_option = Question::new("Only?", vec!["A".into()], 0);
        assert!(vm.add_question(&quiz.id, one_option).await.is_err());
        let out_of_range = question("Which?", 3);
        assert!(vm.add_question(&quiz.id, out_of_range).await.is_err());

        vm.add_question(&quiz.id, question("First", 0)).await.unwrap();
        vm.add_question(&quiz.id, question("Second", 1)).await.unwrap();
        let quiz = vm.remove_question(&quiz.id, 0).await.unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].prompt, "Second");
        assert!(vm.remove_question(&quiz.id, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_publish_requires_questions_and_locks_editing() {
        let (vm, quiz, _temp) = vm_with_quiz().await;

        let err = vm.publish_quiz(&quiz.id).await.unwrap_err();
        assert!(matches!(err, ViewModelError::Validation(_)));

        vm.add_question(&quiz.id, question("Q1", 2)).await.unwrap();
        vm.publish_quiz(&quiz.id).await.unwrap();
        assert_eq!(vm.quizzes_by_status(QuizStatus::Published).len(), 1);
        assert!(vm.add_question(&quiz.id, question("Late", 0)).await.is_err());

        vm.close_quiz(&quiz.id).await.unwrap();
        let reopen = vm.publish_quiz(&quiz.id).await.unwrap_err();
        assert!(matches!(reopen, ViewModelError::InvalidTransition { .. }));
        assert_eq!(vm.quizzes_by_status(QuizStatus::Closed).len(), 1);
    }

    #[tokio::test]
    async fn test_grade() {
        let (vm, quiz, _temp) = vm_with_quiz().await;
        assert!(vm.grade(&quiz.id, &[]).await.is_err());

        vm.add_question(&quiz.id, question("Q1", 0)).await.unwrap();
        vm.add_question(&quiz.id, question("Q2", 1).with_points(3)).await.unwrap();

        let score = vm.grade(&quiz.id, &[Some(0), Some(2)]).await.unwrap();
        assert_eq!(score.earned, 1);
        assert_eq!(score.possible, 4);
        assert_eq!(score.percentage, 25.0);

        let unanswered = vm.grade(&quiz.id, &[None]).await.unwrap();
        assert_eq!(unanswered.earned, 0);

        vm.delete_quiz(&quiz.id).await.unwrap();
        assert!(vm.quizzes.items().is_empty());
    }
}
