//! reflect 处理器：去重后的新子问题入队；没有新问题时本会话内永久关闭 reflect

use serde_json::json;

use crate::core::AgentError;
use crate::research::action::{ActionKind, ReflectAction};
use crate::research::loop_::{Researcher, StepOutcome};
use crate::research::session::Session;
use crate::tools::choose_k;

impl Researcher {
    pub(crate) async fn handle_reflect(
        &self,
        session: &mut Session,
        action: ReflectAction,
    ) -> Result<StepOutcome, AgentError> {
        let unique = self
            .dedup(&action.questions_to_answer, &session.all_questions)
            .await;
        let new_questions = choose_k(&unique, self.options.max_reflect_per_step);
        let question = session.current_question.clone();

        if !new_questions.is_empty() {
            session.diary.push(format!(
                "At step {}, you took **reflect** and think about the knowledge gaps. You found some sub-questions are important to the question: \"{}\"\nYou realize you need to know the answers to the following sub-questions:\n{}\n\nYou will now figure out the answers to these sub-questions and see if they can help you find the answer to the original question.",
                session.step,
                question,
                new_questions.iter().map(|q| format!("- {}", q)).collect::<Vec<_>>().join("\n")
            ));
            let root = session.question.clone();
            session.gaps.enqueue_with_root(&new_questions, &root);
            session.all_questions.extend(new_questions.iter().cloned());
            let entry = json!({
                "totalStep": session.total_step,
                "action": "reflect",
                "think": action.think,
                "questionsToAnswer": new_questions,
            });
            session.log_step(entry);
        } else {
            session.diary.push(format!(
                "At step {}, you took **reflect** and think about the knowledge gaps. You tried to break down the question \"{}\" into gap-questions like this: {}\nBut then you realized you have asked them before. You decided to think out of the box or cut from a completely different angle.",
                session.step,
                question,
                action.questions_to_answer.join(", ")
            ));
            let entry = json!({
                "totalStep": session.total_step,
                "action": "reflect",
                "think": action.think,
                "questionsToAnswer": action.questions_to_answer,
                "result": "You have tried all possible questions and found no useful information. You must think out of the box or different angle!!!",
            });
            session.log_step(entry);
            session.exhaust(ActionKind::Reflect);
        }
        Ok(StepOutcome::Continue)
    }
}
