//! Line-oriented front end over `AppServices`.

use std::error::Error;
use std::fmt;

use phrase_core::model::{AudioHandle, Language, LessonId, Question, QuestionOutcome};
use phrase_core::quiz::{Advance, QuestionState, QuizError};
use services::{AppServices, QuizController, QuizServiceError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type BoxError = Box<dyn Error>;

#[derive(Debug)]
struct UnknownLesson(LessonId);

impl fmt::Display for UnknownLesson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lesson {} does not exist", self.0)
    }
}

impl Error for UnknownLesson {}

/// Pick the label for the active language.
fn label(language: Language, en: &'static str, ja: &'static str) -> &'static str {
    match language {
        Language::En => en,
        Language::Ja => ja,
    }
}

pub struct Console {
    app: AppServices,
    input: Lines<BufReader<Stdin>>,
    takes: u32,
}

/// What the learner typed at a prompt.
enum Reply {
    Text(String),
    Quit,
}

impl Console {
    pub fn new(app: AppServices) -> Self {
        Self {
            app,
            input: BufReader::new(tokio::io::stdin()).lines(),
            takes: 0,
        }
    }

    fn language(&self) -> Language {
        self.app.progress().language()
    }

    pub fn list_lessons(&self) {
        let language = self.language();
        let progress = self.app.progress();
        for lesson in self.app.catalog().lessons() {
            let mark = if progress.is_completed(lesson.id()) { "✓" } else { " " };
            println!(
                "[{mark}] {:>3}  {}  ({} phrases, {} questions)",
                lesson.id(),
                lesson.title().get(language),
                lesson.phrases().len(),
                lesson.quizzes().len()
            );
        }
    }

    pub fn show_lesson(&self, id: LessonId) -> Result<(), BoxError> {
        let lesson = self.app.catalog().get(id).ok_or(UnknownLesson(id))?;
        println!("{}", lesson.title().get(self.language()));
        println!();
        for phrase in lesson.phrases() {
            println!("  {}", phrase.ja);
            println!("    {}", phrase.en);
        }
        Ok(())
    }

    pub async fn set_language(&self, language: Language) -> Result<(), BoxError> {
        self.app.progress().set_language(language).await?;
        println!("{}: {}", label(language, "Language", "言語"), language.native_name());
        Ok(())
    }

    pub fn show_progress(&self) {
        let progress = self.app.progress().snapshot();
        let language = progress.language();
        println!(
            "{}: {}",
            label(language, "Language", "言語"),
            language.native_name()
        );
        let completed: Vec<String> = progress.completed().iter().map(ToString::to_string).collect();
        println!(
            "{}: {}/{} [{}]",
            label(language, "Completed lessons", "完了したレッスン"),
            completed.len(),
            self.app.catalog().len(),
            completed.join(", ")
        );
    }

    pub async fn run_quiz(&mut self, id: LessonId) -> Result<(), BoxError> {
        let mut quiz = self.app.quiz().start(id)?;
        let language = self.language();
        println!("{}", quiz.session().lesson().title().get(language));

        loop {
            let snapshot = quiz.snapshot();
            println!();
            println!("({}/{})", snapshot.current_index + 1, snapshot.total_questions);

            let question = quiz.session().current_question().clone();
            println!("{}", question.prompt().get(language));
            let finished = match question {
                Question::MultipleChoice { options, .. } => {
                    for (i, option) in options.iter().enumerate() {
                        println!("  {}. {}", i + 1, option.get(language));
                    }
                    self.answer_choice(&mut quiz, options.len()).await?
                }
                Question::Speaking { answer, .. } => {
                    println!("  » {}", answer.ja);
                    self.answer_speaking(&mut quiz).await?
                }
            };
            if !finished {
                quiz.abandon();
                println!("{}", label(language, "Quiz abandoned.", "クイズを中断しました。"));
                return Ok(());
            }

            if let Advance::Completed(summary) = quiz.advance().await? {
                let choice = summary.multiple_choice();
                let speaking = summary.speaking();
                let marks: String = quiz
                    .session()
                    .outcomes()
                    .iter()
                    .flatten()
                    .map(|outcome| if outcome.is_success() { '○' } else { '×' })
                    .collect();
                println!();
                println!("{}", label(language, "Lesson complete!", "レッスン完了！"));
                println!("  {marks}");
                println!(
                    "  {}: {}/{}",
                    label(language, "Multiple choice", "選択問題"),
                    choice.correct,
                    choice.total
                );
                println!(
                    "  {}: {}/{} ({} {})",
                    label(language, "Speaking passed", "発音合格"),
                    speaking.passed,
                    speaking.total,
                    speaking.skipped,
                    label(language, "skipped", "スキップ")
                );
                return Ok(());
            }
        }
    }

    /// Returns `false` when the learner quits.
    async fn answer_choice(
        &mut self,
        quiz: &mut QuizController,
        options: usize,
    ) -> Result<bool, BoxError> {
        let language = self.language();
        loop {
            let Reply::Text(line) = self.read_line(label(language, "answer> ", "回答> ")).await? else {
                return Ok(false);
            };
            let chosen = match line.parse::<usize>() {
                Ok(n) if (1..=options).contains(&n) => n - 1,
                _ => {
                    println!("1-{options}");
                    continue;
                }
            };
            let correct = quiz.submit_multiple_choice(chosen)?;
            println!(
                "{}",
                if correct {
                    label(language, "Correct!", "正解！")
                } else {
                    label(language, "Not quite.", "不正解")
                }
            );
            return Ok(true);
        }
    }

    /// Returns `false` when the learner quits.
    async fn answer_speaking(&mut self, quiz: &mut QuizController) -> Result<bool, BoxError> {
        let language = self.language();
        loop {
            match quiz.snapshot().state {
                QuestionState::Answered => {
                    if let Some(QuestionOutcome::Speaking(score)) = quiz.snapshot().outcome {
                        println!(
                            "  {}: {}  {}: {}  {}: {}",
                            label(language, "accuracy", "正確さ"),
                            score.accuracy(),
                            label(language, "fluency", "流暢さ"),
                            score.fluency(),
                            label(language, "overall", "総合"),
                            score.overall()
                        );
                        println!("  {}", score.comment());
                    }
                    return Ok(true);
                }
                QuestionState::Ready => {
                    let prompt = label(
                        language,
                        "press enter to record, or type a recording path> ",
                        "Enterで録音、または録音ファイルのパス> ",
                    );
                    let Reply::Text(line) = self.read_line(prompt).await? else {
                        return Ok(false);
                    };
                    let audio = self.take(line);
                    match quiz.submit_recording(&audio).await {
                        Ok(_) => {}
                        Err(err @ QuizServiceError::Precondition(_)) => println!("{err}"),
                        Err(err) if err.is_retryable() => println!("{err}"),
                        Err(err) => return Err(err.into()),
                    }
                }
                QuestionState::Failed(_) => {
                    let remaining = quiz.session().remaining_retries();
                    let prompt = if remaining > 0 {
                        println!(
                            "{} {remaining}",
                            label(language, "retries left:", "残りリトライ:")
                        );
                        label(language, "[r]etry or [q]uit> ", "[r]リトライ / [q]終了> ")
                    } else {
                        label(language, "[s]kip or [q]uit> ", "[s]スキップ / [q]終了> ")
                    };
                    let Reply::Text(line) = self.read_line(prompt).await? else {
                        return Ok(false);
                    };
                    match line.as_str() {
                        "r" if remaining > 0 => {
                            quiz.retry()?;
                        }
                        "s" if remaining == 0 => quiz.skip()?,
                        _ => {}
                    }
                }
                QuestionState::Evaluating(_) => {
                    return Err(QuizServiceError::Quiz(QuizError::EvaluationInFlight).into());
                }
            }
        }
    }

    /// Stand-in for the recorder: an empty line is a fresh take, any other text
    /// is used as the recording location.
    fn take(&mut self, line: String) -> AudioHandle {
        if line.is_empty() {
            self.takes += 1;
            AudioHandle::new(format!("mic://take/{}", self.takes))
        } else {
            AudioHandle::new(line)
        }
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Reply, BoxError> {
        use std::io::Write;

        print!("{prompt}");
        std::io::stdout().flush()?;
        match self.input.next_line().await? {
            None => Ok(Reply::Quit),
            Some(line) => {
                let line = line.trim().to_string();
                if line == "q" {
                    Ok(Reply::Quit)
                } else {
                    Ok(Reply::Text(line))
                }
            }
        }
    }
}
