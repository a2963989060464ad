//! Exam command implementations

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    ExamSession, FallbackInvoker, ModelInvoker, ModelRoute, PromptLibrary, ReferenceDocument,
};

/// Answer text from `--answer` or `--answer-file`
pub fn read_answer(answer: Option<String>, answer_file: Option<&Path>) -> Result<String> {
    match (answer, answer_file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read answer file {}", path.display())),
        (None, None) => anyhow::bail!("Provide an answer with --answer or --answer-file"),
    }
}

fn load_reference(path: Option<&Path>) -> Result<Option<ReferenceDocument>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let doc = ReferenceDocument::from_path(path)
        .with_context(|| format!("Failed to load reference {}", path.display()))?;
    if doc.is_blank() {
        tracing::warn!(path = %path.display(), "Reference document is empty");
    }
    Ok(Some(doc))
}

/// Grade one essay answer and print the examiner's verdict
pub async fn cmd_grade<I>(
    question: &str,
    answer: &str,
    reference: Option<&Path>,
    candidates: Vec<String>,
    invoker: I,
) -> Result<()>
where
    I: ModelInvoker,
{
    let reference = load_reference(reference)?;
    let mut prompts = PromptLibrary::new();
    let session = ExamSession::new(FallbackInvoker::new(invoker, candidates), &mut prompts, reference)?;

    let reply = session
        .grade_essay(question, answer)
        .await
        .context("Grading failed")?;

    println!();
    println!("📝 Grading ({})", reply.model);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("{}", reply.text);

    Ok(())
}

/// Interactive oral exam on stdin/stdout
pub async fn cmd_exam<I>(reference: Option<&Path>, candidates: Vec<String>, invoker: I) -> Result<()>
where
    I: ModelInvoker,
{
    let reference = load_reference(reference)?;
    let mut prompts = PromptLibrary::new();
    let mut session =
        ExamSession::new(FallbackInvoker::new(invoker, candidates), &mut prompts, reference)?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_exam_loop(&mut session, stdin.lock(), stdout.lock()).await
}

/// Drive an exam session from line-oriented input
///
/// `/reset` clears the transcript, `/quit` (or end of input) stops. A failed
/// turn is reported and the student can answer again.
pub async fn run_exam_loop<R, In, Out>(
    session: &mut ExamSession<R>,
    input: In,
    mut output: Out,
) -> Result<()>
where
    R: ModelRoute,
    In: BufRead,
    Out: Write,
{
    writeln!(output, "🎓 Oral exam")?;
    if let Some(doc) = session.context().reference() {
        writeln!(output, "   Reference: {}", doc.name())?;
    }
    writeln!(output, "   Type your answer and press Enter. /reset starts over, /quit ends.")?;
    writeln!(output)?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                writeln!(output, "↺ Conversation cleared")?;
                continue;
            }
            _ => {}
        }

        match session.submit_turn(line).await {
            Ok(reply) => {
                writeln!(output, "Examiner: {}", reply.text)?;
                writeln!(output)?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Exam turn failed");
                writeln!(output, "⚠️  {}", e)?;
            }
        }
        output.flush()?;
    }

    writeln!(output, "Exam ended after {} exchange(s)", session.context().len() / 2)?;
    Ok(())
}
