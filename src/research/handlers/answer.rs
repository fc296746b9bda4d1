//! answer 处理器
//!
//! - 会话（或重置后）第 1 步直接定稿，不评估
//! - 根问题：通过则定稿；未通过且已达重试上限则保持未定稿并报告上限；
//!   否则记录失败、调用错误分析、子问题入队、bad_attempts + 1、下一步禁用 answer、清空日志、步数归零
//! - 子问题：通过则写入知识；未通过只在日志中记录

use serde_json::json;

use crate::core::AgentError;
use crate::memory::KnowledgeItem;
use crate::research::action::{ActionKind, AnswerAction, StepAction};
use crate::research::evaluator::EvaluationKind;
use crate::research::loop_::{Researcher, StepOutcome};
use crate::research::session::{FailedAttempt, Session};
use crate::tools::{choose_k, normalize_url};

impl Researcher {
    pub(crate) async fn handle_answer(
        &self,
        session: &mut Session,
        mut action: AnswerAction,
    ) -> Result<StepOutcome, AgentError> {
        if session.step == 1 {
            action.is_final = true;
            session.this_step = StepAction::Answer(action);
            return Ok(StepOutcome::Finalized);
        }

        let question = session.current_question.clone();
        for reference in action.references.iter_mut() {
            if !reference.url.is_empty() {
                reference.url = normalize_url(&reference.url);
            }
            reference.title = session.urls.title_of(&reference.url).map(str::to_string);
        }
        let entry = json!({
            "totalStep": session.total_step,
            "question": question,
            "action": "answer",
            "answer": action.answer,
            "references": action.references,
        });
        session.log_step(entry);

        self.trackers
            .action_tracker
            .track_think("Let me evaluate this answer first.");
        let criteria = session
            .evaluation_metrics
            .get(&question)
            .cloned()
            .unwrap_or_else(|| vec![EvaluationKind::Definitive]);
        let evaluation = self
            .collaborators
            .evaluator
            .evaluate(&question, &action, &criteria, session.urls.visited())
            .await?;

        if session.is_root(&question) {
            if evaluation.pass {
                session.diary.push(format!(
                    "At step {}, you took **answer** action and finally found the answer to the original question:\n\nOriginal question:\n{}\n\nYour answer:\n{}\n\nThe evaluator thinks your answer is good because:\n{}\n\nYour journey ends here. You have successfully answered the original question.",
                    session.step, question, action.answer, evaluation.reasoning
                ));
                action.is_final = true;
                session.this_step = StepAction::Answer(action);
                return Ok(StepOutcome::Finalized);
            }

            if session.bad_attempts >= self.options.max_bad_attempts {
                action.is_final = false;
                session.this_step = StepAction::Answer(action);
                return Ok(StepOutcome::RetriesExhausted);
            }

            session.diary.push(format!(
                "At step {}, you took **answer** action but evaluator thinks it is not a good answer:\n\nOriginal question:\n{}\n\nYour answer:\n{}\n\nThe evaluator thinks your answer is bad because:\n{}",
                session.step, question, action.answer, evaluation.reasoning
            ));

            let analysis = self.collaborators.analyzer.analyze(&session.diary).await?;

            session.knowledge.push(KnowledgeItem::qa(
                question.clone(),
                action.answer.clone(),
                action.references.clone(),
            ));
            session.bad_context.push(FailedAttempt {
                question: question.clone(),
                answer: action.answer.clone(),
                evaluation: evaluation.reasoning.clone(),
                recap: analysis.recap,
                blame: analysis.blame,
                improvement: analysis.improvement,
            });

            let sub_questions: Vec<String> = analysis
                .questions_to_answer
                .iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect();
            let sub_questions = choose_k(&sub_questions, self.options.max_reflect_per_step);
            if !sub_questions.is_empty() {
                let root = session.question.clone();
                session.gaps.enqueue_with_root(&sub_questions, &root);
                session.all_questions.extend(sub_questions);
            }

            session.bad_attempts += 1;
            session.permissions.set(ActionKind::Answer, false);
            session.diary.clear();
            session.step = 0;
            tracing::info!(bad_attempts = session.bad_attempts, gaps = session.gaps.len(), "root answer rejected");

            session.this_step = StepAction::Answer(action);
            return Ok(StepOutcome::Continue);
        }

        if evaluation.pass {
            session.diary.push(format!(
                "At step {}, you took **answer** action. You found a good answer to the sub-question:\n\nSub-question:\n{}\n\nYour answer:\n{}\n\nThe evaluator thinks your answer is good because:\n{}\n\nAlthough you solved a sub-question, you still need to find the answer to the original question. You need to keep going.",
                session.step, question, action.answer, evaluation.reasoning
            ));
            session.knowledge.push(KnowledgeItem::qa(
                question,
                action.answer.clone(),
                action.references.clone(),
            ));
        } else {
            session.diary.push(format!(
                "At step {}, you took **answer** action for the sub-question:\n{}\n\nBut the evaluator rejected your answer because:\n{}\n\nYou need to find better evidence before answering it again.",
                session.step, question, evaluation.reasoning
            ));
        }
        session.this_step = StepAction::Answer(action);
        Ok(StepOutcome::Continue)
    }
}
