//! Essay grading and oral exam sessions
//!
//! Both share the extraction path: render a prompt, run it through a model
//! route, return the model's text. Turns are recorded only after the
//! examiner has answered, so a failed call leaves the session unchanged.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::ai::{Answer, ModelRoute};
use crate::context::{ConversationContext, ReferenceDocument};
use crate::error::{Error, InvocationError, InvocationErrorKind, Result};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// Examiner text and the model that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct ExamReply {
    pub text: String,
    pub model: String,
}

impl TryFrom<Answer> for ExamReply {
    type Error = Error;

    fn try_from(answer: Answer) -> Result<Self> {
        let text = answer
            .reply
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::from(InvocationError::new(
                    &answer.model,
                    InvocationErrorKind::MalformedResponse,
                    "reply carried no text",
                ))
            })?;
        Ok(Self {
            text,
            model: answer.model,
        })
    }
}

/// Grades essays and runs an oral exam over one conversation
pub struct ExamSession<R> {
    route: R,
    grade_prompt: Prompt,
    examiner_prompt: Prompt,
    context: ConversationContext,
}

impl<R: ModelRoute> ExamSession<R> {
    pub fn new(route: R, prompts: &mut PromptLibrary, reference: Option<ReferenceDocument>) -> Result<Self> {
        let grade_prompt = prompts.get(PromptId::GradeEssay)?.clone();
        let examiner_prompt = prompts.get(PromptId::OralExaminer)?.clone();
        let mut context = ConversationContext::new();
        context.set_reference(reference);
        Ok(Self {
            route,
            grade_prompt,
            examiner_prompt,
            context,
        })
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Score an answer out of 10 with feedback and a rewrite
    pub async fn grade_essay(&self, question: &str, answer: &str) -> Result<ExamReply> {
        let (question, answer) = (question.trim(), answer.trim());
        if question.is_empty() || answer.is_empty() {
            return Err(Error::InvalidData(
                "Both a question and an answer are required".to_string(),
            ));
        }

        let context_vars = self.context.to_template_vars();
        let mut vars: HashMap<&str, &str> = context_vars
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        vars.insert("question", question);
        vars.insert("answer", answer);

        let reply = ExamReply::try_from(self.route.run(&self.grade_prompt.to_request(&vars)).await?)?;
        info!(model = %reply.model, "Essay graded");
        Ok(reply)
    }

    /// Send one student turn and return the examiner's reply
    ///
    /// The prompt carries the reference document and every prior turn. On
    /// success the student and examiner turns are appended, in that order.
    pub async fn submit_turn(&mut self, student_text: &str) -> Result<ExamReply> {
        let student_text = student_text.trim();
        if student_text.is_empty() {
            return Err(Error::InvalidData("Student turn must not be empty".to_string()));
        }

        let context_vars = self.context.to_template_vars();
        let mut vars: HashMap<&str, &str> = context_vars
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        vars.insert("text", student_text);

        let request = self.examiner_prompt.to_request(&vars);
        let reply = ExamReply::try_from(self.route.run(&request).await?)?;

        self.context.push_exchange(student_text, reply.text.clone());
        debug!(model = %reply.model, turns = self.context.len(), "Exam turn recorded");
        Ok(reply)
    }

    /// Clear the transcript; the reference document stays loaded
    pub fn reset(&mut self) {
        self.context.clear();
    }
}
